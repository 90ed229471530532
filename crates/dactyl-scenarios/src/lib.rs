//! Shared plumbing for the standalone conformance scenarios.
//!
//! Every scenario is its own executable with the exit-code contract:
//! 0 means pass, any other code means failure, and 77 is reserved for
//! "missing optional dependency, skip", a soft skip that external
//! frameworks preserve, never a silent success.

use tracing_subscriber::EnvFilter;

use dactyl_core::constants::EXIT_SKIP;

/// Initialize logging from `RUST_LOG`.
///
/// Scenarios log to stdout so external frameworks that treat stderr
/// output as noise see one coherent stream.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stdout)
        .init();
}

/// Soft-skip this scenario.
pub fn skip(reason: &str) -> ! {
    println!("SKIP: {reason}");
    std::process::exit(EXIT_SKIP);
}

/// The scenario-owned scheduler every async operation is driven by.
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Give the device's listener a moment to drain freshly injected
/// commands into its queue.
///
/// The reference driver pumps its event loop after every send; this is
/// the same drain, needed whenever the next operation must consume the
/// injected command rather than replay an earlier scan.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
