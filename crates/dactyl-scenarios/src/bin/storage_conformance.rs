//! Scenario: storage-device conformance. Enroll, list, verify and
//! identify with the caller-owned retry loops, delete, and clear.
//!
//! Requires `DACTYL_TEST_DRIVER_NAME` to name the expected driver;
//! without it the scenario soft-skips with exit code 77. The command
//! socket path comes from `DACTYL_VIRTUAL_DEVICE` or a private
//! temporary directory.

use anyhow::{Context, bail, ensure};
use tracing::info;

use dactyl_channel::{ChannelConfig, CommandInjector};
use dactyl_core::constants::ENV_TEST_DRIVER_NAME;
use dactyl_core::{Error, Finger, FingerStatus, Print, RetryCause};
use dactyl_device::{Device, EnrollProgress, IdentifyResult, VerifyResult, progress_channel};

fn main() -> anyhow::Result<()> {
    dactyl_scenarios::init_logging();

    let Some(expected_driver) = std::env::var(ENV_TEST_DRIVER_NAME).ok() else {
        dactyl_scenarios::skip(&format!("{ENV_TEST_DRIVER_NAME} is not set"));
    };

    let runtime = dactyl_scenarios::runtime()?;
    runtime.block_on(run(&expected_driver))
}

async fn run(expected_driver: &str) -> anyhow::Result<()> {
    let (config, _tmpdir) = match ChannelConfig::from_env() {
        Ok(config) => (config, None),
        Err(_) => {
            let dir = tempfile::tempdir().context("creating socket directory")?;
            let config = ChannelConfig::new(dir.path().join("virtual-device.socket"));
            (config, Some(dir))
        }
    };

    let injector = CommandInjector::new(&config);
    let mut device = Device::virtual_storage(config);
    ensure!(
        device.driver() == expected_driver,
        "expected driver '{expected_driver}', found '{}'",
        device.driver()
    );

    device.open().await?;

    let enrolled = enroll(&device, &injector).await?;
    let local = list(&device, &enrolled).await?;
    verify(&device, &injector, &local).await?;
    identify(&device, &injector, &local).await?;
    delete(&device, &local).await?;
    clear(&device).await?;

    device.close().await?;
    println!("PASS");
    Ok(())
}

fn stored_copy(local: &Print) -> anyhow::Result<Print> {
    Ok(Print::deserialize(&local.serialize()?)?)
}

async fn enroll(device: &Device, injector: &CommandInjector) -> anyhow::Result<Print> {
    info!("enrolling");
    injector.add(Finger::RightIndex, "testuser", true).await?;

    let mut template = device.new_template();
    template.set_finger(Finger::RightIndex);
    template.set_username("testuser");
    template.set_description("Enroll test template");

    let (sink, mut progress) = progress_channel();
    let handle = device.enroll_start(template, Some(sink))?;
    let enrolled = handle.wait().await?;

    let mut stages = 0;
    while let Ok(event) = progress.try_recv() {
        if let EnrollProgress::Stage { stage, .. } = event {
            ensure!(stage == stages, "stages reported out of order");
            stages += 1;
        }
    }
    ensure!(
        stages == device.enroll_stages(),
        "expected {} stages, saw {stages}",
        device.enroll_stages()
    );
    ensure!(enrolled.is_device_stored(), "print not stored on device");
    ensure!(
        device.finger_status() == FingerStatus::None,
        "finger status not reset after enroll"
    );
    Ok(enrolled)
}

async fn list(device: &Device, enrolled: &Print) -> anyhow::Result<Print> {
    info!("listing");
    let stored = device.list_prints().await?;
    ensure!(stored.len() == 1, "expected one stored print");
    ensure!(stored[0].equal(enrolled), "stored print differs");

    // Hold a deserialized copy, the way an external daemon would.
    stored_copy(&stored[0])
}

async fn verify(
    device: &Device,
    injector: &CommandInjector,
    local: &Print,
) -> anyhow::Result<()> {
    info!("verifying");
    injector.retry(RetryCause::General).await?;
    dactyl_scenarios::settle().await;

    let mut attempts = 0;
    let result: VerifyResult = loop {
        attempts += 1;
        ensure!(attempts <= 5, "verify retried without converging");
        match device.verify(stored_copy(local)?).await {
            Ok(result) => break result,
            Err(Error::Retry(cause)) => {
                info!(%cause, "retrying verification");
                continue;
            }
            Err(e) => bail!(e),
        }
    };
    ensure!(result.matched, "expected a match");
    ensure!(
        device.finger_status() == FingerStatus::None,
        "finger status not reset after verify"
    );
    Ok(())
}

async fn identify(
    device: &Device,
    injector: &CommandInjector,
    local: &Print,
) -> anyhow::Result<()> {
    info!("identifying");
    injector.retry(RetryCause::CenterFinger).await?;
    dactyl_scenarios::settle().await;

    let mut attempts = 0;
    let result: IdentifyResult = loop {
        attempts += 1;
        ensure!(attempts <= 5, "identify retried without converging");
        let gallery = vec![stored_copy(local)?];
        match device.identify(stored_copy(local)?, gallery).await {
            Ok(result) => break result,
            Err(Error::Retry(cause)) => {
                info!(%cause, "retrying identification");
                continue;
            }
            Err(e) => bail!(e),
        }
    };
    ensure!(
        result.matched_entry.equal(&result.probe),
        "identified entry differs from probe"
    );
    Ok(())
}

async fn delete(device: &Device, local: &Print) -> anyhow::Result<()> {
    info!("deleting");
    device.delete_print(stored_copy(local)?).await?;
    ensure!(
        device.list_prints().await?.is_empty(),
        "storage not empty after delete"
    );

    let absent = device.delete_print(stored_copy(local)?).await;
    ensure!(
        matches!(absent, Err(Error::NotFound)),
        "deleting an absent print must fail NotFound"
    );
    Ok(())
}

async fn clear(device: &Device) -> anyhow::Result<()> {
    info!("clearing");
    device.clear_storage().await?;
    device.clear_storage().await?;
    ensure!(
        device.list_prints().await?.is_empty(),
        "storage not empty after clear"
    );
    Ok(())
}
