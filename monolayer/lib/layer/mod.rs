//! Applying a single OCI image layer onto a root filesystem.
//!
//! A layer is a tar archive describing a filesystem delta. Besides ordinary entries it may carry
//! whiteout markers:
//!
//! - `dir/.wh.name` deletes `dir/name` from the layers below
//! - `dir/.wh..wh..opq` discards everything `dir` held in the layers below
//!
//! Application runs in two passes over the same archive, reopened from the start for each:
//!
//! 1. The whiteout pass resolves every marker against the root filesystem and removes its target
//! 2. The extraction pass writes every other entry, skipping markers and device-like entries
//!
//! Because all removals land before any write, a layer can delete a path and supply a new entry at
//! the same path regardless of where the two appear in the archive.
//!
//! # Examples
//!
//! ```no_run
//! use monolayer::{config::ApplyConfig, layer};
//!
//! # fn example() -> monolayer::LayerResult<()> {
//! let config = ApplyConfig::new("/var/lib/rootfs");
//! let report = layer::apply_layer("/tmp/layer.tar.gz", &config)?;
//! println!("extracted {} entries", report.get_extraction().get_extracted());
//! # Ok(())
//! # }
//! ```

mod apply;
mod archive;
mod extract;
mod marker;
mod mutate;
mod perm_guard;
mod whiteout;
mod workdir_guard;

use std::fmt;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use apply::*;
pub use archive::*;
pub use extract::*;
pub use marker::*;
pub use mutate::*;
pub use perm_guard::*;
pub use whiteout::*;
pub use workdir_guard::*;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// How serious a per-entry problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Logged; processing continues with the next entry.
    Warning,

    /// Processing of the archive aborts.
    Fatal,
}

/// One of the two passes made over a layer archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Resolves whiteout and opaque markers against the root filesystem.
    Whiteout,

    /// Writes the layer's ordinary entries to the root filesystem.
    Extraction,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Whiteout => write!(f, "whiteout"),
            Pass::Extraction => write!(f, "extraction"),
        }
    }
}
