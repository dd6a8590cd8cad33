use std::path::Path;

use getset::CopyGetters;

use crate::{utils::WHITEOUT_PREFIX, LayerError, LayerResult};

use super::{
    classify, resolve_under_root, EntryClass, FilesystemMutator, LayerArchive, Removal,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Counts gathered by the whiteout pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub with_prefix")]
pub struct WhiteoutSummary {
    /// Opaque markers seen.
    opaque: usize,

    /// Deletion markers seen.
    deletions: usize,

    /// Markers whose target existed and was removed.
    removed: usize,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Streams `archive` once and applies every whiteout marker it holds to `root`.
///
/// Ordinary entries are ignored. The first error stops the pass; removals already made stay made.
pub fn resolve_whiteouts(archive: &LayerArchive, root: &Path) -> LayerResult<WhiteoutSummary> {
    tracing::info!(
        "Resolving whiteouts from {} into {}",
        archive.get_path().display(),
        root.display()
    );

    let mutator = FilesystemMutator::new(root);
    let mut summary = WhiteoutSummary::default();

    let mut reader = archive.entries_reader()?;
    let entries = reader.entries().map_err(|e| archive.read_error(e))?;

    for entry in entries {
        let entry = entry.map_err(|e| archive.read_error(e))?;
        let raw = entry.path_bytes();

        let path = match std::str::from_utf8(&raw) {
            Ok(path) => path,
            Err(_) if contains_token(&raw) => {
                return Err(LayerError::MalformedMarker {
                    path: String::from_utf8_lossy(&raw).into_owned(),
                    reason: "marker path is not valid UTF-8",
                });
            }
            Err(_) => continue,
        };

        let removal = match classify(path)? {
            EntryClass::Ordinary => continue,
            EntryClass::Opaque { target } => {
                summary.opaque += 1;
                let target = resolve_under_root(root, &target)?;
                tracing::debug!("Opaque marker {} resets {}", path, target.display());
                mutator.apply_opaque(&target)?
            }
            EntryClass::Deletion { target } => {
                summary.deletions += 1;
                let target = resolve_under_root(root, &target)?;
                tracing::debug!("Whiteout marker {} deletes {}", path, target.display());
                mutator.apply_deletion(&target)?
            }
        };

        if !matches!(removal, Removal::Absent | Removal::Kept) {
            summary.removed += 1;
        }
    }

    tracing::info!(
        "Whiteout pass finished: {} opaque, {} deletions, {} removed",
        summary.opaque,
        summary.deletions,
        summary.removed
    );

    Ok(summary)
}

fn contains_token(raw: &[u8]) -> bool {
    let token = WHITEOUT_PREFIX.as_bytes();
    raw.windows(token.len()).any(|window| window == token)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
