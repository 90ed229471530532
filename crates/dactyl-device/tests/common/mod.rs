//! Shared harness for device integration tests: a per-test socket in a
//! temporary directory, an opened device, and an injector scripting it.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::time::Duration;

use tempfile::TempDir;

use dactyl_channel::{ChannelConfig, CommandInjector};
use dactyl_core::{Finger, Print};
use dactyl_device::Device;

pub struct Harness {
    // Held so the socket directory outlives the test.
    _dir: TempDir,
    pub config: ChannelConfig,
    pub injector: CommandInjector,
}

pub fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ChannelConfig::new(dir.path().join("virtual-device.socket"));
    let injector = CommandInjector::new(&config);
    Harness {
        _dir: dir,
        config,
        injector,
    }
}

pub async fn open_plain(harness: &Harness) -> Device {
    let mut device = Device::virtual_device(harness.config.clone());
    device.open().await.expect("open device");
    device
}

pub async fn open_storage(harness: &Harness) -> Device {
    let mut device = Device::virtual_storage(harness.config.clone());
    device.open().await.expect("open device");
    device
}

/// A fresh template attributed to `finger`/`username`.
pub fn template(device: &Device, finger: Finger, username: &str) -> Print {
    let mut template = device.new_template();
    template.set_finger(finger);
    template.set_username(username);
    template
}

/// Give the listener task a moment to drain injected commands into the
/// device's queue, for tests whose outcome depends on the command
/// being queued rather than waited for.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

/// Round-trip a print through its serialized form.
pub fn round_trip(print: &Print) -> Print {
    Print::deserialize(&print.serialize().expect("serialize")).expect("deserialize")
}
