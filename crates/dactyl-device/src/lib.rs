//! Virtual biometric device and its asynchronous operation engine.
//!
//! A [`Device`] is a session against a simulated fingerprint sensor
//! that a test driver scripts over the command channel. Biometric
//! operations are started non-blocking and completed through an
//! [`OperationHandle`]; the matching decision for verify/identify
//! comes from the scan events the driver queued.
//!
//! # Example
//!
//! ```no_run
//! use dactyl_channel::{ChannelConfig, CommandInjector};
//! use dactyl_core::Finger;
//! use dactyl_device::Device;
//!
//! # async fn example() -> dactyl_core::Result<()> {
//! let config = ChannelConfig::new("/tmp/virtual-device.socket");
//! let mut device = Device::virtual_device(config.clone());
//! device.open().await?;
//!
//! let injector = CommandInjector::new(&config);
//! injector.add(Finger::LeftLittle, "testuser", true).await
//!     .map_err(|e| dactyl_core::Error::transport(e.to_string()))?;
//!
//! let mut template = device.new_template();
//! template.set_finger(Finger::LeftLittle);
//! template.set_username("testuser");
//!
//! let enrolled = device.enroll(template).await?;
//! let result = device.verify(enrolled.clone()).await?;
//! assert!(result.matched);
//!
//! device.close().await?;
//! # Ok(())
//! # }
//! ```

mod device;
mod engine;
mod events;
mod oracle;
mod storage;

pub use device::{Device, DeviceBuilder};
pub use engine::{
    EnrollProgress, IdentifyResult, OperationHandle, OperationKind, ProgressSink, VerifyResult,
    progress_channel,
};
pub use oracle::match_gallery;
pub use storage::StorageTable;

pub use events::ScanEvent;
