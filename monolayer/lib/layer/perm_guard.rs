use std::{
    collections::HashMap,
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use getset::Getters;

use crate::{utils, LayerResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Tracks temporary permission changes made so that whiteout targets can be removed.
///
/// Layers routinely ship read-only directories (`0o555`) and directories with no permissions at
/// all. An unprivileged process cannot unlink entries below such directories, so before a removal
/// the guard adds the owner bits it needs and remembers the original mode. When the guard is
/// dropped every path that still exists gets its original mode back, in reverse order.
///
/// # Example
/// ```no_run
/// use monolayer::{layer::PermissionGuard, LayerResult};
///
/// fn main() -> LayerResult<()> {
///     let mut guard = PermissionGuard::new();
///
///     // Allow entries in a read-only parent to be unlinked
///     guard.make_writable("rootfs/usr/share")?;
///
///     // Permissions are restored when the guard is dropped
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Getters)]
#[getset(get = "pub with_prefix")]
pub struct PermissionGuard {
    /// Maps paths to their original permissions
    original_modes: HashMap<PathBuf, u32>,

    /// Paths in order they were modified (for proper restoration)
    modified_paths: Vec<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PermissionGuard {
    /// Creates a new empty permission guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a directory temporarily writable and searchable, preserving its other bits.
    ///
    /// Symlinks and missing paths are left alone.
    pub fn make_writable(&mut self, path: impl AsRef<Path>) -> LayerResult<()> {
        self.add_owner_bits(path.as_ref(), 0o300)
    }

    /// Makes every directory in a tree readable, writable and searchable by the owner.
    ///
    /// Walks the tree without following symlinks. Afterwards the whole tree can be removed with
    /// [`fs::remove_dir_all`] as long as the caller owns it.
    pub fn make_tree_removable(&mut self, root: impl AsRef<Path>) -> LayerResult<()> {
        let mut stack = vec![root.as_ref().to_path_buf()];

        while let Some(dir) = stack.pop() {
            self.add_owner_bits(&dir, 0o700)?;

            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };

            for entry in entries.flatten() {
                if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    stack.push(entry.path());
                }
            }
        }

        Ok(())
    }

    fn add_owner_bits(&mut self, path: &Path, bits: u32) -> LayerResult<()> {
        if self.original_modes.contains_key(path) {
            return Ok(());
        }

        let Ok(metadata) = fs::symlink_metadata(path) else {
            return Ok(());
        };

        if metadata.file_type().is_symlink() {
            tracing::debug!(
                "Skipping permission modification for symlink: {}",
                path.display()
            );
            return Ok(());
        }

        let mode = metadata.permissions().mode();
        if mode & bits == bits {
            return Ok(());
        }

        let new_mode = mode | bits;
        fs::set_permissions(path, fs::Permissions::from_mode(new_mode))?;
        self.original_modes.insert(path.to_path_buf(), mode);
        self.modified_paths.push(path.to_path_buf());

        tracing::debug!(
            "Relaxed permissions on {}: {} -> {} ({:#o} -> {:#o})",
            path.display(),
            utils::format_mode(mode),
            utils::format_mode(new_mode),
            mode,
            new_mode
        );

        Ok(())
    }

    /// Restores original permissions for all modified paths in reverse order
    fn restore_all(&mut self) -> LayerResult<()> {
        while let Some(path) = self.modified_paths.pop() {
            let Some(&original_mode) = self.original_modes.get(&path) else {
                continue;
            };

            // Removed paths have nothing to restore
            match fs::symlink_metadata(&path) {
                Ok(metadata) if !metadata.file_type().is_symlink() => {}
                _ => continue,
            }

            fs::set_permissions(&path, fs::Permissions::from_mode(original_mode))?;
            tracing::debug!(
                "Restored permissions for: {}, mode: {} ({:#o})",
                path.display(),
                utils::format_mode(original_mode),
                original_mode
            );
        }

        self.original_modes.clear();
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for PermissionGuard {
    fn drop(&mut self) {
        if !self.modified_paths.is_empty() {
            // Don't propagate errors in drop, just log them
            if let Err(e) = self.restore_all() {
                tracing::warn!("Error during permission restoration in drop: {}", e);
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn mode_of(path: &Path) -> u32 {
        fs::symlink_metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test_log::test]
    fn test_perm_guard_restores_on_drop() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let dir = temp.path().join("readonly");
        fs::create_dir(&dir)?;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555))?;

        {
            let mut guard = PermissionGuard::new();
            guard.make_writable(&dir)?;
            assert_eq!(mode_of(&dir), 0o755);
            assert_eq!(guard.get_original_modes().get(&dir), Some(&0o40555));
        }

        assert_eq!(mode_of(&dir), 0o555);
        Ok(())
    }

    #[test_log::test]
    fn test_perm_guard_tree_removable() -> anyhow::Result<()> {
        let temp = tempdir()?;
        let outer = temp.path().join("blocked_dir");
        let inner = outer.join("inner_dir");
        fs::create_dir_all(&inner)?;
        fs::write(inner.join("nested.txt"), "nested file content")?;
        fs::set_permissions(&inner, fs::Permissions::from_mode(0o000))?;
        fs::set_permissions(&outer, fs::Permissions::from_mode(0o000))?;

        let mut guard = PermissionGuard::new();
        guard.make_tree_removable(&outer)?;
        fs::remove_dir_all(&outer)?;
        drop(guard);

        assert!(!outer.exists());
        Ok(())
    }
}
