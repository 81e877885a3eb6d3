//! Batched image download demo.
//!
//! Downloads N copies of a single image URL into a save directory, with a
//! single-line progress display and ctrl-c cancellation.
//!
//! Usage: cargo run --example batch_download -- <url> [count] [parallel] [save_path]

use std::io::Write;
use std::sync::Arc;
use batch_downloader_rs::batch_downloader::{download, ProgressCallback};
use batch_downloader_rs::download_configuration::DownloadConfiguration;
use batch_downloader_rs::error::DownloadError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "https://httpbin.org/image/png".to_string());
    let count: u32 = args.next().and_then(|value| value.parse().ok()).unwrap_or(10);
    let parallel: u32 = args.next().and_then(|value| value.parse().ok()).unwrap_or(4);
    let save_path = args.next().unwrap_or_else(|| "./downloads".to_string());

    let config = DownloadConfiguration::new()
        .set_url(url)
        .set_save_path(save_path)
        .set_total_count(count)
        .set_parallel_count(parallel)
        .set_timeout(30)
        .build()
        .expect("Invalid download configuration");

    let cancel_token = CancellationToken::new();
    let interrupt_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nstopping, cleaning up...");
            interrupt_token.cancel();
        }
    });

    let on_progress: ProgressCallback = Arc::new(|completed, total| {
        print!("\rprogress: {}/{}", completed, total);
        let _ = std::io::stdout().flush();
    });

    match download(config, cancel_token, Some(on_progress)).await {
        Ok(()) => println!("\nall images downloaded"),
        Err(DownloadError::Cancelled) => println!("download cancelled"),
        Err(e) => eprintln!("\ndownload failed: {}", e),
    }
}
