use std::{
    io::{self, Read},
    path::{Component, PathBuf},
};

use filetime::FileTime;
use getset::CopyGetters;
use tar::Entry;

use crate::{config::ApplyConfig, LayerError, LayerResult};

use super::{entry_path, is_marker_path, EntryKind, LayerArchive, Severity, WorkdirGuard};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Counts gathered by the extraction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub with_prefix")]
pub struct ExtractionSummary {
    /// Entries written to the root filesystem.
    extracted: usize,

    /// Whiteout markers passed over.
    skipped_markers: usize,

    /// Sockets, devices and fifos passed over.
    skipped_devices: usize,

    /// Entries that could not be written and were logged instead.
    warnings: usize,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Streams `archive` and writes every ordinary entry into the configured root filesystem.
///
/// Extraction runs with the root as the working directory. The previous working directory is
/// restored however the pass ends.
///
/// # Errors
/// A header that cannot be read or a truncated stream aborts the pass. Problems writing a single
/// entry are logged and counted as warnings, unless the config is strict.
pub fn extract_layer(archive: &LayerArchive, config: &ApplyConfig) -> LayerResult<ExtractionSummary> {
    let root = config.get_rootfs_path();
    tracing::info!(
        "Extracting {} into {}",
        archive.get_path().display(),
        root.display()
    );

    // The stream is opened first so a relative archive path still resolves
    let mut reader = archive.entries_reader()?;
    reader.set_preserve_permissions(config.get_preserve_permissions());
    reader.set_preserve_mtime(config.get_preserve_mtime());
    reader.set_unpack_xattrs(config.get_unpack_xattrs());
    reader.set_preserve_ownerships(config.get_preserve_ownerships());
    reader.set_overwrite(true);

    let guard = WorkdirGuard::enter(root)?;
    let mut summary = ExtractionSummary::default();

    // Directories are written last, once nothing else needs to be created inside them
    let mut directories = Vec::new();

    let entries = reader.entries().map_err(|e| archive.read_error(e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive.read_error(e))?;
        let path = entry_path(&entry);

        if is_marker_path(&path) {
            tracing::debug!("Skipping whiteout marker {}", path);
            summary.skipped_markers += 1;
            continue;
        }

        let kind = EntryKind::from(entry.header().entry_type());
        if kind.is_device_like() {
            tracing::debug!("Skipping {:?} entry {}", kind, path);
            summary.skipped_devices += 1;
            continue;
        }

        if kind == EntryKind::Directory {
            directories.push((path, entry));
            continue;
        }

        unpack_entry(archive, config, &mut summary, &mut entry, &path)?;
    }

    // Deepest first, so a restrictive parent is applied after everything below it
    directories.sort_by(|(a, _), (b, _)| b.cmp(a));
    for (path, mut entry) in directories {
        if !unpack_entry(archive, config, &mut summary, &mut entry, &path)? {
            continue;
        }

        // The archive engine leaves directory times alone
        if config.get_preserve_mtime() {
            if let Err(source) = restore_dir_mtime(&entry) {
                handle_entry_error(config, &mut summary, &path, source)?;
            }
        }
    }

    guard.leave()?;

    tracing::info!(
        "Extraction pass finished: {} extracted, {} markers skipped, {} devices skipped, {} warnings",
        summary.extracted,
        summary.skipped_markers,
        summary.skipped_devices,
        summary.warnings
    );

    Ok(summary)
}

/// Decides whether a failure to unpack one entry leaves the rest of the stream usable.
///
/// A short read or undecodable data means the stream itself is broken. Anything else is specific
/// to the entry being written.
pub fn classify_unpack_error(error: &io::Error) -> Severity {
    match error.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => Severity::Fatal,
        _ => Severity::Warning,
    }
}

/// Writes one entry below the working directory. Returns whether it landed on disk.
fn unpack_entry<R: Read>(
    archive: &LayerArchive,
    config: &ApplyConfig,
    summary: &mut ExtractionSummary,
    entry: &mut Entry<'_, R>,
    path: &str,
) -> LayerResult<bool> {
    match entry.unpack_in(".") {
        Ok(true) => {
            summary.extracted += 1;
            Ok(true)
        }
        Ok(false) => {
            let source = io::Error::new(
                io::ErrorKind::InvalidInput,
                "entry path leaves the extraction directory",
            );
            handle_entry_error(config, summary, path, source)?;
            Ok(false)
        }
        Err(source) => match classify_unpack_error(&source) {
            Severity::Fatal => {
                tracing::error!("Layer stream is corrupt at {}: {}", path, source);
                Err(archive.read_error(source))
            }
            Severity::Warning => {
                handle_entry_error(config, summary, path, source)?;
                Ok(false)
            }
        },
    }
}

fn restore_dir_mtime<R: Read>(entry: &Entry<'_, R>) -> io::Result<()> {
    let mtime = entry.header().mtime()?;
    let dir: PathBuf = entry
        .path()?
        .components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect();

    let dir = if dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        dir
    };

    filetime::set_file_mtime(&dir, FileTime::from_unix_time(mtime as i64, 0))
}

fn handle_entry_error(
    config: &ApplyConfig,
    summary: &mut ExtractionSummary,
    entry: &str,
    source: io::Error,
) -> LayerResult<()> {
    if config.get_strict() {
        tracing::error!("Failed to extract {}: {}", entry, source);
        return Err(LayerError::Extraction {
            entry: entry.to_string(),
            source,
        });
    }

    tracing::warn!("Failed to extract {}: {}", entry, source);
    summary.warnings += 1;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
