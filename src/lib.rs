//! # batch-downloader-rs
//!
//! An async batched image downloader library for Rust.
//!
//! Features:
//! - Fixed-count downloads from a single source URL, saved as `{index}.png`
//! - Bounded parallelism via fixed-size batches
//! - Cooperative cancellation (tokio-util CancellationToken)
//! - Per-item progress reporting in completion order

mod download_task;
mod stream;
pub mod error;
pub mod download_status;
pub mod download_configuration;
pub mod download_sender;
pub mod download_receiver;
pub mod download_tracker;
pub mod download_operation;
pub mod batch_downloader;
