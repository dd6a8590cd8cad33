use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use getset::CopyGetters;

use crate::{config::ApplyConfig, LayerError, LayerResult};

use super::{extract_layer, resolve_whiteouts, ExtractionSummary, LayerArchive, Pass, WhiteoutSummary};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What applying a layer did, pass by pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub with_prefix")]
pub struct ApplyReport {
    /// Counts from the whiteout pass.
    whiteouts: WhiteoutSummary,

    /// Counts from the extraction pass.
    extraction: ExtractionSummary,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Applies the layer at `layer_path` onto the root filesystem named by `config`.
///
/// The archive is streamed twice. The first pass removes everything the layer's whiteout markers
/// name. The second writes the layer's ordinary entries. Both passes run to completion or the call
/// fails, naming the pass that stopped.
///
/// Nothing is rolled back on failure. Applying the same layer again is safe: markers whose target
/// is already gone are no-ops and extraction overwrites.
///
/// # Errors
/// - [`LayerError::RootfsNotFound`] or [`LayerError::RootfsNotDirectory`] if the root is unusable
/// - [`LayerError::LayerNotFound`] or [`LayerError::LayerNotFile`] if the archive is unusable
/// - [`LayerError::PassFailed`] wrapping whatever stopped a pass
pub fn apply_layer(layer_path: impl AsRef<Path>, config: &ApplyConfig) -> LayerResult<ApplyReport> {
    let layer_path = layer_path.as_ref();
    let root = config.get_rootfs_path();

    check_rootfs(root)?;
    check_layer(layer_path)?;

    let archive = LayerArchive::open(layer_path, config.get_block_size())?;

    let whiteouts = resolve_whiteouts(&archive, root).map_err(|e| {
        tracing::error!("Whiteout pass over {} failed: {}", layer_path.display(), e);
        e.in_pass(Pass::Whiteout)
    })?;

    let extraction = extract_layer(&archive, config).map_err(|e| {
        tracing::error!("Extraction pass over {} failed: {}", layer_path.display(), e);
        e.in_pass(Pass::Extraction)
    })?;

    let report = ApplyReport {
        whiteouts,
        extraction,
    };

    tracing::info!(
        "Applied {} onto {}: {} removed by whiteouts, {} entries extracted, {} warnings",
        layer_path.display(),
        root.display(),
        whiteouts.get_removed(),
        extraction.get_extracted(),
        extraction.get_warnings()
    );

    Ok(report)
}

/// Runs [`apply_layer`] on tokio's blocking thread pool.
pub async fn apply_layer_async(
    layer_path: impl Into<PathBuf>,
    config: ApplyConfig,
) -> LayerResult<ApplyReport> {
    let layer_path = layer_path.into();
    tokio::task::spawn_blocking(move || apply_layer(&layer_path, &config)).await?
}

fn check_rootfs(root: &Path) -> LayerResult<()> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(LayerError::RootfsNotDirectory(root.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(LayerError::RootfsNotFound(root.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn check_layer(layer_path: &Path) -> LayerResult<()> {
    match fs::metadata(layer_path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(LayerError::LayerNotFile(layer_path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(LayerError::LayerNotFound(layer_path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
