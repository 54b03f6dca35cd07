//! bgswap CLI tool
//!
//! Command-line front-end for the bgswap background replacement pipeline:
//! extracts an alpha-matted foreground through the configured segmentation
//! backend and composites it onto a replacement background.

#[cfg(feature = "cli")]
use bgswap::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
