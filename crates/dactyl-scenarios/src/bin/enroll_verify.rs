//! Scenario: scripted enroll and verify flows on the plain virtual
//! device, including the caller-owned retry contract.
//!
//! The command socket path comes from `DACTYL_VIRTUAL_DEVICE`; without
//! it the scenario runs self-contained in a private temporary
//! directory.

use anyhow::{Context, ensure};
use tracing::info;

use dactyl_channel::{ChannelConfig, CommandInjector};
use dactyl_core::constants::{DEFAULT_ENROLL_STAGES, DRIVER_VIRTUAL};
use dactyl_core::{DeviceCaps, Error, Finger, FingerStatus, RetryCause, ScanType};
use dactyl_device::Device;

fn main() -> anyhow::Result<()> {
    dactyl_scenarios::init_logging();
    let runtime = dactyl_scenarios::runtime()?;
    runtime.block_on(run())
}

async fn run() -> anyhow::Result<()> {
    let (config, _tmpdir) = match ChannelConfig::from_env() {
        Ok(config) => (config, None),
        Err(_) => {
            let dir = tempfile::tempdir().context("creating socket directory")?;
            let config = ChannelConfig::new(dir.path().join("virtual-device.socket"));
            (config, Some(dir))
        }
    };

    let injector = CommandInjector::new(&config);
    let mut device = Device::virtual_device(config);
    device.open().await?;

    check_properties(&device)?;
    check_enroll_verify_match(&device, &injector).await?;
    check_enroll_verify_no_match(&device, &injector).await?;
    check_verify_retry_contract(&device, &injector).await?;

    device.close().await?;
    ensure!(!device.is_open(), "device still open after close");

    println!("PASS");
    Ok(())
}

fn check_properties(device: &Device) -> anyhow::Result<()> {
    info!("checking device properties");
    ensure!(device.driver() == DRIVER_VIRTUAL, "unexpected driver id");
    ensure!(device.is_open(), "device should be open");
    ensure!(
        device.enroll_stages() == DEFAULT_ENROLL_STAGES,
        "unexpected enroll stage count"
    );
    ensure!(
        device.scan_type() == ScanType::Swipe,
        "unexpected scan type"
    );
    ensure!(device.has_feature(DeviceCaps::VERIFY), "verify missing");
    ensure!(
        !device.has_feature(DeviceCaps::IDENTIFY),
        "plain device must not identify"
    );
    ensure!(
        !device.has_feature(DeviceCaps::STORAGE),
        "plain device must not have storage"
    );
    Ok(())
}

fn template(device: &Device, finger: Finger) -> dactyl_core::Print {
    let mut template = device.new_template();
    template.set_finger(finger);
    template.set_username("testuser");
    template
}

async fn check_enroll_verify_match(
    device: &Device,
    injector: &CommandInjector,
) -> anyhow::Result<()> {
    info!("enrolling a matching print");
    injector.add(Finger::LeftLittle, "testuser", true).await?;

    let enrolled = device.enroll(template(device, Finger::LeftLittle)).await?;
    ensure!(enrolled.username() == "testuser", "wrong username");
    ensure!(enrolled.finger() == Finger::LeftLittle, "wrong finger");
    ensure!(
        device.finger_status() == FingerStatus::None,
        "finger status not reset after enroll"
    );

    let result = device.verify(enrolled.clone()).await?;
    ensure!(result.matched, "expected a match");
    let matched = result.print.context("match without a print")?;
    ensure!(matched.equal(&enrolled), "matched print differs from probe");
    ensure!(
        device.finger_status() == FingerStatus::None,
        "finger status not reset after verify"
    );
    Ok(())
}

async fn check_enroll_verify_no_match(
    device: &Device,
    injector: &CommandInjector,
) -> anyhow::Result<()> {
    info!("enrolling a non-matching print");
    injector.add(Finger::LeftRing, "testuser", false).await?;
    dactyl_scenarios::settle().await;

    let mut template = device.new_template();
    template.set_finger(Finger::LeftRing);
    template.set_username("testuser");

    let enrolled = device.enroll(template).await?;
    let result = device.verify(enrolled).await?;
    ensure!(!result.matched, "expected a non-match");
    ensure!(result.print.is_none(), "non-match must not carry a print");
    Ok(())
}

async fn check_verify_retry_contract(
    device: &Device,
    injector: &CommandInjector,
) -> anyhow::Result<()> {
    info!("exercising the verify retry contract");
    injector.add(Finger::RightThumb, "testuser", true).await?;
    dactyl_scenarios::settle().await;
    let enrolled = device.enroll(template(device, Finger::RightThumb)).await?;

    injector.retry(RetryCause::TooShort).await?;
    injector.add(Finger::RightThumb, "testuser", true).await?;
    dactyl_scenarios::settle().await;

    // The caller owns resubmission: call, observe Retry, call again.
    let mut attempts = 0;
    let result = loop {
        attempts += 1;
        ensure!(attempts <= 5, "verify retried without converging");
        match device.verify(enrolled.clone()).await {
            Ok(result) => break result,
            Err(Error::Retry(cause)) => {
                info!(%cause, "retrying verification");
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    };
    ensure!(result.matched, "expected a match after retries");
    ensure!(attempts >= 2, "the scripted retry was never observed");
    Ok(())
}
