//! Device session state and lifecycle.
//!
//! A device moves `Closed → Open → Closed`, with close always explicit
//! and refused while an operation is pending. While open, the finger
//! sub-state tracks whether a scan is expected (`Needed`), being
//! evaluated (`Present`), or neither (`None`); every completed
//! operation leaves it at `None` again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dactyl_channel::{ChannelConfig, CommandListener};
use dactyl_core::constants::{DEFAULT_ENROLL_STAGES, DRIVER_VIRTUAL, DRIVER_VIRTUAL_STORAGE};
use dactyl_core::{DeviceCaps, Error, FingerStatus, Print, Result, ScanType};

use crate::engine::OperationKind;
use crate::events::EventSource;
use crate::storage::StorageTable;

/// Mutable session state, owned exclusively by the device and touched
/// only from the operation engine's completion handling.
pub(crate) struct DeviceState {
    pub open: bool,
    pub finger_status: FingerStatus,
    pub pending: Option<OperationKind>,
    pub storage: StorageTable,
    /// Scripted transient fault: how many enrolled-count queries will
    /// still come back with an empty payload.
    pub empty_count_replies: u32,
}

/// Everything a spawned operation needs a handle on.
pub(crate) struct Shared {
    pub driver: String,
    pub caps: DeviceCaps,
    pub enroll_stages: u32,
    pub state: Mutex<DeviceState>,
    /// Event source; `Some` exactly while the device is open.
    pub events: AsyncMutex<Option<EventSource>>,
}

impl Shared {
    pub(crate) fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A session against a virtual biometric device.
///
/// Constructed closed; [`Device::open`] binds the command channel
/// socket and [`Device::close`] tears it down. Biometric operations
/// live in the operation engine and are available on `&self` once the
/// device is open.
pub struct Device {
    pub(crate) shared: Arc<Shared>,
    config: ChannelConfig,
    scan_type: ScanType,
    shutdown: Option<CancellationToken>,
    listener: Option<JoinHandle<()>>,
}

impl Device {
    /// Builder for a device with custom driver id, capabilities, or
    /// stage count.
    pub fn builder(config: ChannelConfig) -> DeviceBuilder {
        DeviceBuilder::new(config)
    }

    /// The plain virtual device: verify only, no on-device storage.
    pub fn virtual_device(config: ChannelConfig) -> Self {
        Self::builder(config)
            .driver(DRIVER_VIRTUAL)
            .caps(DeviceCaps::VERIFY)
            .build()
    }

    /// The virtual device with storage and identification.
    pub fn virtual_storage(config: ChannelConfig) -> Self {
        Self::builder(config)
            .driver(DRIVER_VIRTUAL_STORAGE)
            .caps(
                DeviceCaps::VERIFY
                    | DeviceCaps::IDENTIFY
                    | DeviceCaps::DUPLICATES_CHECK
                    | DeviceCaps::STORAGE
                    | DeviceCaps::STORAGE_LIST
                    | DeviceCaps::STORAGE_DELETE
                    | DeviceCaps::STORAGE_CLEAR,
            )
            .build()
    }

    /// Open the device: bind the command socket and start consuming
    /// scripted commands.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Open`] if the device is already open or the
    /// socket cannot be bound.
    pub async fn open(&mut self) -> Result<()> {
        if self.shared.state().open {
            return Err(Error::Open("device is already open".into()));
        }

        let (listener, stream) =
            CommandListener::bind(&self.config).map_err(|e| Error::Open(e.to_string()))?;

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(listener.run(shutdown.clone()));

        *self.shared.events.lock().await = Some(EventSource::new(stream));
        self.shutdown = Some(shutdown);
        self.listener = Some(task);

        let mut state = self.shared.state();
        state.open = true;
        state.finger_status = FingerStatus::None;
        drop(state);

        info!(driver = %self.shared.driver, "device opened");
        Ok(())
    }

    /// Close the device.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Close`] if the device is not open, or if an
    /// operation is still pending: resolve or cancel it first.
    pub async fn close(&mut self) -> Result<()> {
        {
            let state = self.shared.state();
            if !state.open {
                return Err(Error::Close("device is not open".into()));
            }
            if let Some(kind) = state.pending {
                return Err(Error::Close(format!("a {kind} operation is still pending")));
            }
        }

        if let Some(shutdown) = self.shutdown.take() {
            shutdown.cancel();
        }
        if let Some(task) = self.listener.take() {
            let _ = task.await;
        }
        *self.shared.events.lock().await = None;

        let mut state = self.shared.state();
        state.open = false;
        state.finger_status = FingerStatus::None;
        drop(state);

        info!(driver = %self.shared.driver, "device closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.shared.state().open
    }

    /// Driver identifier.
    pub fn driver(&self) -> &str {
        &self.shared.driver
    }

    /// Capability set of this device.
    pub fn caps(&self) -> DeviceCaps {
        self.shared.caps
    }

    /// Whether every capability in `caps` is supported.
    pub fn has_feature(&self, caps: DeviceCaps) -> bool {
        self.shared.caps.contains(caps)
    }

    /// Current finger sub-state.
    pub fn finger_status(&self) -> FingerStatus {
        self.shared.state().finger_status
    }

    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    /// Number of capture stages an enrollment goes through.
    pub fn enroll_stages(&self) -> u32 {
        self.shared.enroll_stages
    }

    /// A fresh, empty template bound to this device's format.
    pub fn new_template(&self) -> Print {
        Print::new(self.shared.driver.as_str())
    }

    /// Script the backend's known transient fault: the next `n`
    /// enrolled-count queries reply with an empty payload.
    pub fn inject_empty_count_replies(&self, n: u32) {
        self.shared.state().empty_count_replies = n;
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.cancel();
        }
    }
}

/// Builder for [`Device`] instances.
///
/// # Examples
///
/// ```
/// use dactyl_channel::ChannelConfig;
/// use dactyl_core::{DeviceCaps, ScanType};
/// use dactyl_device::Device;
///
/// let device = Device::builder(ChannelConfig::new("/tmp/dev.socket"))
///     .driver("virtual_device")
///     .caps(DeviceCaps::VERIFY | DeviceCaps::IDENTIFY)
///     .enroll_stages(3)
///     .scan_type(ScanType::Press)
///     .build();
///
/// assert_eq!(device.enroll_stages(), 3);
/// assert!(!device.is_open());
/// ```
pub struct DeviceBuilder {
    config: ChannelConfig,
    driver: String,
    caps: DeviceCaps,
    enroll_stages: u32,
    scan_type: ScanType,
}

impl DeviceBuilder {
    fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            driver: DRIVER_VIRTUAL.to_string(),
            caps: DeviceCaps::VERIFY,
            enroll_stages: DEFAULT_ENROLL_STAGES,
            scan_type: ScanType::Swipe,
        }
    }

    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    pub fn caps(mut self, caps: DeviceCaps) -> Self {
        self.caps = caps;
        self
    }

    /// Stage count; clamped to at least one stage.
    pub fn enroll_stages(mut self, stages: u32) -> Self {
        self.enroll_stages = stages.max(1);
        self
    }

    pub fn scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_type = scan_type;
        self
    }

    pub fn build(self) -> Device {
        Device {
            shared: Arc::new(Shared {
                driver: self.driver,
                caps: self.caps,
                enroll_stages: self.enroll_stages,
                state: Mutex::new(DeviceState {
                    open: false,
                    finger_status: FingerStatus::None,
                    pending: None,
                    storage: StorageTable::new(),
                    empty_count_replies: 0,
                }),
                events: AsyncMutex::new(None),
            }),
            config: self.config,
            scan_type: self.scan_type,
            shutdown: None,
            listener: None,
        }
    }
}
