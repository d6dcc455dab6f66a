//! fal-bgremove CLI Tool
//!
//! Command-line interface for removing image backgrounds with the hosted
//! BiRefNet v2 model on FAL.ai.

#[cfg(feature = "cli")]
use fal_bgremove::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
