use std::path::PathBuf;

use clap::Parser;

use super::styles;

//-------------------------------------------------------------------------------------------------
// Types
//-------------------------------------------------------------------------------------------------

/// Monolayer CLI - Apply an OCI image layer, whiteouts included, onto a root filesystem
///
/// The root filesystem is read from the `MONOLAYER_ROOTFS` environment variable.
#[derive(Debug, Parser)]
#[command(name = "monolayer", author, about, version, styles=styles::styles())]
pub struct MonolayerArgs {
    /// The layer archive to apply (tar, optionally gzip, bzip2 or xz compressed)
    #[arg(value_name = "LAYER")]
    pub layer: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

//-------------------------------------------------------------------------------------------------
// Tests
//-------------------------------------------------------------------------------------------------
