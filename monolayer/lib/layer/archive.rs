use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use getset::{CopyGetters, Getters};
use tar::{Archive, Entry, EntryType};
use xz2::read::XzDecoder;

use crate::{LayerError, LayerResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// The number of leading bytes inspected to detect compression.
const MAGIC_LEN: usize = 6;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The compression wrapped around a layer's tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// A plain tar stream.
    None,

    /// `application/vnd.oci.image.layer.v1.tar+gzip` and docker's default.
    Gzip,

    /// bzip2, found in older docker-save exports.
    Bzip2,

    /// xz.
    Xz,
}

/// A layer archive on disk that can be streamed from the start any number of times.
///
/// Each call to [`LayerArchive::entries_reader`] opens the file afresh. Nothing from one stream is
/// reused by the next, so the two passes never share a handle.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct LayerArchive {
    /// The layer file.
    #[getset(get = "pub with_prefix")]
    path: PathBuf,

    /// The read buffer size used for every stream.
    #[getset(get_copy = "pub with_prefix")]
    block_size: usize,

    /// The compression detected when the archive was opened.
    #[getset(get_copy = "pub with_prefix")]
    compression: Compression,
}

/// The type of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file, including contiguous and GNU sparse files.
    Regular,

    /// A directory.
    Directory,

    /// A symbolic link.
    Symlink,

    /// A hard link to an earlier entry.
    Hardlink,

    /// A unix socket. Tar cannot record sockets, so the engine never yields one.
    Socket,

    /// A character device.
    CharDevice,

    /// A block device.
    BlockDevice,

    /// A named pipe.
    Fifo,

    /// Metadata headers and vendor types.
    Other,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Compression {
    /// Detects compression from the first bytes of a stream.
    ///
    /// Anything unrecognised is assumed to be a plain tar stream.
    pub fn detect(magic: &[u8]) -> io::Result<Self> {
        if magic.starts_with(GZIP_MAGIC) {
            Ok(Compression::Gzip)
        } else if magic.starts_with(BZIP2_MAGIC) {
            Ok(Compression::Bzip2)
        } else if magic.starts_with(XZ_MAGIC) {
            Ok(Compression::Xz)
        } else if magic.starts_with(ZSTD_MAGIC) {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "zstd compressed layers are not supported",
            ))
        } else {
            Ok(Compression::None)
        }
    }

    fn wrap<'a>(&self, reader: impl Read + 'a) -> Box<dyn Read + 'a> {
        match self {
            Compression::None => Box::new(reader),
            Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
            Compression::Xz => Box::new(XzDecoder::new_multi_decoder(reader)),
        }
    }
}

impl LayerArchive {
    /// Opens a layer archive and detects its compression.
    ///
    /// # Errors
    /// Returns [`LayerError::ArchiveOpen`] if the file cannot be read or uses an unsupported
    /// compression.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> LayerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let compression = detect_compression(&path).map_err(|source| LayerError::ArchiveOpen {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(
            "Opened layer archive {} ({:?} compression)",
            path.display(),
            compression
        );

        Ok(Self {
            path,
            block_size: block_size.max(1),
            compression,
        })
    }

    /// Opens a fresh stream over the archive's entries, positioned at the first entry.
    pub fn entries_reader(&self) -> LayerResult<Archive<Box<dyn Read>>> {
        let file = File::open(&self.path).map_err(|source| LayerError::ArchiveOpen {
            path: self.path.clone(),
            source,
        })?;

        let reader = BufReader::with_capacity(self.block_size, file);
        Ok(Archive::new(self.compression.wrap(reader)))
    }

    /// Maps an error raised while reading the stream to a fatal archive error.
    pub(crate) fn read_error(&self, source: io::Error) -> LayerError {
        LayerError::ArchiveRead {
            path: self.path.clone(),
            source,
        }
    }
}

impl EntryKind {
    /// Returns true for entry types a layered filesystem has no use for.
    ///
    /// These are dropped by the extraction pass instead of being written.
    pub fn is_device_like(&self) -> bool {
        matches!(
            self,
            EntryKind::Socket | EntryKind::CharDevice | EntryKind::BlockDevice | EntryKind::Fifo
        )
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the path recorded for an entry as a string.
///
/// Long names from GNU and PAX headers are honoured. Bytes that are not valid UTF-8 are replaced,
/// which is fine for logging and for the marker check on the extraction side. The whiteout pass
/// inspects the raw bytes instead.
pub fn entry_path<R: Read>(entry: &Entry<'_, R>) -> String {
    String::from_utf8_lossy(&entry.path_bytes()).into_owned()
}

fn detect_compression(path: &Path) -> io::Result<Compression> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; MAGIC_LEN];
    let mut filled = 0;

    while filled < MAGIC_LEN {
        match file.read(&mut magic[filled..])? {
            0 => break,
            n => filled += n,
        }
    }

    Compression::detect(&magic[..filled])
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<EntryType> for EntryKind {
    fn from(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                EntryKind::Regular
            }
            EntryType::Directory => EntryKind::Directory,
            EntryType::Symlink => EntryKind::Symlink,
            EntryType::Link => EntryKind::Hardlink,
            EntryType::Char => EntryKind::CharDevice,
            EntryType::Block => EntryKind::BlockDevice,
            EntryType::Fifo => EntryKind::Fifo,
            _ => EntryKind::Other,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
