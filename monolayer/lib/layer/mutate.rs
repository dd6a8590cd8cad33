use std::{
    collections::VecDeque,
    ffi::{OsStr, OsString},
    fs, io,
    path::{Component, Path, PathBuf},
};

use crate::{LayerError, LayerResult};

use super::PermissionGuard;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The most symlinks followed while resolving a target's ancestry, matching Linux's `MAXSYMLINKS`.
const MAX_SYMLINK_FOLLOWS: usize = 40;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Applies whiteout and opaque markers to a root filesystem.
///
/// Every call resolves its target, removes it and forgets about it. Nothing is queued between
/// calls.
#[derive(Debug, Clone, Copy)]
pub struct FilesystemMutator<'a> {
    root: &'a Path,
}

/// What a single mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The target did not exist.
    Absent,

    /// The target was left in place because the marker does not apply to its type.
    Kept,

    /// A directory tree was removed.
    Directory,

    /// A file, symlink or other non-directory was unlinked.
    File,

    /// The target was the root itself, whose contents were removed.
    RootContents,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> FilesystemMutator<'a> {
    /// Creates a mutator for the given root filesystem.
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Resets the directory at `path` so the layer's own entries recreate it empty.
    ///
    /// A missing directory is not an error: a layer may mark a directory opaque even though no
    /// lower layer ever created it. Non-directories are left for the extraction pass to replace.
    pub fn apply_opaque(&self, path: &Path) -> LayerResult<Removal> {
        let target = self.resolve(path)?;

        if target == self.root {
            return self.clear_root();
        }

        let removal = match fs::symlink_metadata(&target) {
            Ok(metadata) if metadata.is_dir() => {
                remove_dir_tree(&target)?;
                Removal::Directory
            }
            Ok(_) => {
                tracing::debug!(
                    "Opaque target is not a directory, leaving it: {}",
                    target.display()
                );
                Removal::Kept
            }
            Err(e) if is_absent(&e) => Removal::Absent,
            Err(source) => return Err(LayerError::Mutation { path: target, source }),
        };

        Ok(removal)
    }

    /// Deletes whatever is at `path`: directories recursively, anything else by unlinking.
    ///
    /// A missing target is not an error, which makes re-applying a layer safe.
    pub fn apply_deletion(&self, path: &Path) -> LayerResult<Removal> {
        let target = self.resolve(path)?;

        if target == self.root {
            return Err(LayerError::PathEscapesRoot(path.display().to_string()));
        }

        let removal = match fs::symlink_metadata(&target) {
            Ok(metadata) if metadata.is_dir() => {
                remove_dir_tree(&target)?;
                Removal::Directory
            }
            Ok(_) => {
                tracing::debug!("Removing whiteout-ed file: {}", target.display());
                remove_file(&target)?;
                Removal::File
            }
            Err(e) if is_absent(&e) => Removal::Absent,
            Err(source) => return Err(LayerError::Mutation { path: target, source }),
        };

        Ok(removal)
    }

    /// Maps `path` onto the real filesystem without leaving the root.
    ///
    /// Symlinks among the ancestors are followed as if the root were `/`. The final component is
    /// never followed, so a symlink target is itself unlinked.
    fn resolve(&self, path: &Path) -> LayerResult<PathBuf> {
        let relative = path
            .strip_prefix(self.root)
            .map_err(|_| LayerError::PathEscapesRoot(path.display().to_string()))?;

        scoped_join(self.root, relative).map_err(|source| LayerError::Mutation {
            path: path.to_path_buf(),
            source,
        })
    }

    fn clear_root(&self) -> LayerResult<Removal> {
        tracing::debug!("Opaque marker targets the root, clearing {}", self.root.display());

        let entries = fs::read_dir(self.root).map_err(|source| LayerError::Mutation {
            path: self.root.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| LayerError::Mutation {
                path: self.root.to_path_buf(),
                source,
            })?;

            let path = entry.path();
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => remove_dir_tree(&path)?,
                _ => remove_file(&path)?,
            }
        }

        Ok(Removal::RootContents)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Joins `relative` under `root`, resolving symlinked ancestors without escaping `root`.
fn scoped_join(root: &Path, relative: &Path) -> io::Result<PathBuf> {
    let mut pending: VecDeque<OsString> = components_of(relative);
    let mut resolved: Vec<OsString> = Vec::new();
    let mut follows = 0;

    while let Some(component) = pending.pop_front() {
        if component == OsStr::new("..") {
            resolved.pop();
            continue;
        }

        let candidate = root.join(resolved.iter().collect::<PathBuf>()).join(&component);

        // Only ancestors are followed
        if !pending.is_empty() {
            if let Ok(metadata) = fs::symlink_metadata(&candidate) {
                if metadata.file_type().is_symlink() {
                    follows += 1;
                    if follows > MAX_SYMLINK_FOLLOWS {
                        return Err(io::Error::new(
                            io::ErrorKind::Other,
                            format!("too many levels of symbolic links: {}", candidate.display()),
                        ));
                    }

                    let link = fs::read_link(&candidate)?;
                    if link.is_absolute() {
                        resolved.clear();
                    }

                    let mut expanded = components_of(&link);
                    expanded.extend(pending);
                    pending = expanded;
                    continue;
                }
            }
        }

        resolved.push(component);
    }

    Ok(root.join(resolved.iter().collect::<PathBuf>()))
}

/// A missing target, or one below a non-directory, has nothing to remove.
fn is_absent(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

fn components_of(path: &Path) -> VecDeque<OsString> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_os_string()),
            Component::ParentDir => Some(OsString::from("..")),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
        })
        .collect()
}

fn remove_dir_tree(path: &Path) -> LayerResult<()> {
    let mut guard = PermissionGuard::new();
    if let Some(parent) = path.parent() {
        guard.make_writable(parent)?;
    }

    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            tracing::debug!(
                "Removal of {} hit restricted permissions, retrying",
                path.display()
            );
            guard.make_tree_removable(path)?;
            fs::remove_dir_all(path).map_err(|source| LayerError::Mutation {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(LayerError::Mutation {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    tracing::debug!("Removed directory tree {}", path.display());
    Ok(())
}

fn remove_file(path: &Path) -> LayerResult<()> {
    let mut guard = PermissionGuard::new();
    if let Some(parent) = path.parent() {
        guard.make_writable(parent)?;
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LayerError::Mutation {
            path: path.to_path_buf(),
            source,
        }),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
