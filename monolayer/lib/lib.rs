//! `monolayer` applies a single OCI image layer onto a root filesystem.
//!
//! # Overview
//!
//! Container images are stacks of tar archives. Each archive, a layer, describes what changed
//! relative to the layers below it: new and modified entries are stored as-is, while removals are
//! recorded as whiteout markers. monolayer folds one such layer into a directory that holds the
//! state of every layer applied before it.
//!
//! # Key Features
//!
//! - **Whiteouts**: `.wh.<name>` deletions and `.wh..wh..opq` opaque directory resets
//! - **Two-pass application**: every removal lands before any of the layer's content is written
//! - **Compression**: gzip, bzip2, xz and uncompressed layers are detected automatically
//! - **Contained**: marker targets never resolve outside the root filesystem, symlinks included
//! - **Metadata**: permissions, modification times and extended attributes are restored
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use monolayer::{config::ApplyConfig, layer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ApplyConfig::builder()
//!         .rootfs_path("/var/lib/rootfs")
//!         .build();
//!
//!     let report = layer::apply_layer_async("/tmp/layer.tar.gz", config).await?;
//!     println!("{:?}", report);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument parsing
//! - [`config`] - Settings for a layer application
//! - [`layer`] - Whiteout resolution and extraction
//! - [`utils`] - Common constants and helpers

#![warn(missing_docs)]

mod error;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod cli;
pub mod config;
pub mod layer;
pub mod utils;

pub use error::*;
