//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default read block size used when opening a layer archive.
pub const DEFAULT_BLOCK_SIZE: usize = 10240;

/// Whether permission bits recorded in the archive are restored by default.
pub const DEFAULT_PRESERVE_PERMISSIONS: bool = true;

/// Whether modification times recorded in the archive are restored by default.
pub const DEFAULT_PRESERVE_MTIME: bool = true;

/// Whether extended attributes (and with them POSIX ACLs) are restored by default.
pub const DEFAULT_UNPACK_XATTRS: bool = true;

/// Whether owner and group recorded in the archive are restored by default.
pub const DEFAULT_PRESERVE_OWNERSHIPS: bool = false;
