use std::path::{Path, PathBuf};

use getset::{CopyGetters, Getters};
use typed_builder::TypedBuilder;

use crate::{utils, LayerResult};

use super::{
    DEFAULT_BLOCK_SIZE, DEFAULT_PRESERVE_MTIME, DEFAULT_PRESERVE_OWNERSHIPS,
    DEFAULT_PRESERVE_PERMISSIONS, DEFAULT_UNPACK_XATTRS,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Settings for a single layer application.
///
/// The root filesystem is passed in explicitly rather than looked up from the environment, so the
/// library never depends on process-wide configuration. Use [`ApplyConfig::from_env`] where the
/// environment is the intended source.
///
/// ## Examples
///
/// ```
/// use monolayer::config::ApplyConfig;
///
/// let config = ApplyConfig::builder()
///     .rootfs_path("/var/lib/rootfs")
///     .strict(true)
///     .build();
///
/// assert_eq!(config.get_rootfs_path().to_str(), Some("/var/lib/rootfs"));
/// assert_eq!(config.get_block_size(), 10240);
/// assert!(config.get_strict());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Getters, CopyGetters)]
pub struct ApplyConfig {
    /// The root filesystem the layer is applied onto.
    #[builder(setter(into))]
    #[getset(get = "pub with_prefix")]
    rootfs_path: PathBuf,

    /// The read block size used when streaming the archive.
    #[builder(default = DEFAULT_BLOCK_SIZE)]
    #[getset(get_copy = "pub with_prefix")]
    block_size: usize,

    /// Restore permission bits recorded in the archive.
    #[builder(default = DEFAULT_PRESERVE_PERMISSIONS)]
    #[getset(get_copy = "pub with_prefix")]
    preserve_permissions: bool,

    /// Restore modification times recorded in the archive.
    #[builder(default = DEFAULT_PRESERVE_MTIME)]
    #[getset(get_copy = "pub with_prefix")]
    preserve_mtime: bool,

    /// Restore extended attributes, which carry POSIX ACLs.
    #[builder(default = DEFAULT_UNPACK_XATTRS)]
    #[getset(get_copy = "pub with_prefix")]
    unpack_xattrs: bool,

    /// Restore owner and group recorded in the archive. Usually requires privileges.
    #[builder(default = DEFAULT_PRESERVE_OWNERSHIPS)]
    #[getset(get_copy = "pub with_prefix")]
    preserve_ownerships: bool,

    /// Treat per-entry extraction warnings as fatal.
    #[builder(default)]
    #[getset(get_copy = "pub with_prefix")]
    strict: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ApplyConfig {
    /// Creates a config with default settings for the given root filesystem.
    pub fn new(rootfs_path: impl AsRef<Path>) -> Self {
        Self::builder()
            .rootfs_path(rootfs_path.as_ref())
            .build()
    }

    /// Creates a config with default settings, taking the root filesystem from
    /// `MONOLAYER_ROOTFS`.
    pub fn from_env() -> LayerResult<Self> {
        Ok(Self::new(utils::get_rootfs_path()?))
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_config_defaults() {
        let config = ApplyConfig::new("/rootfs");

        assert_eq!(config.get_rootfs_path(), Path::new("/rootfs"));
        assert_eq!(config.get_block_size(), DEFAULT_BLOCK_SIZE);
        assert!(config.get_preserve_permissions());
        assert!(config.get_preserve_mtime());
        assert!(config.get_unpack_xattrs());
        assert!(!config.get_preserve_ownerships());
        assert!(!config.get_strict());
    }

    #[test]
    fn test_apply_config_builder_overrides() {
        let config = ApplyConfig::builder()
            .rootfs_path(PathBuf::from("/rootfs"))
            .block_size(4096)
            .preserve_mtime(false)
            .build();

        assert_eq!(config.get_block_size(), 4096);
        assert!(!config.get_preserve_mtime());
        assert!(config.get_preserve_permissions());
    }
}
