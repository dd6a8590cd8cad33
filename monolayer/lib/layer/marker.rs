use std::path::{Path, PathBuf};

use typed_path::{Utf8UnixComponent, Utf8UnixPath};

use crate::{
    utils::{OPAQUE_WHITEOUT_MARKER, WHITEOUT_PREFIX},
    LayerError, LayerResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What an archive entry means for the whiteout pass.
///
/// Targets are layer-relative and use `/` separators. They still have to be joined under the root
/// filesystem with [`resolve_under_root`] before anything is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryClass {
    /// A regular archive entry. Written by the extraction pass.
    Ordinary,

    /// A `.wh.<name>` marker deleting `target`.
    Deletion {
        /// The sibling path the marker deletes.
        target: String,
    },

    /// A `.wh..wh..opq` marker resetting `target`.
    Opaque {
        /// The directory whose prior contents are discarded.
        target: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Classifies an entry path recorded in a layer archive.
///
/// Only the final path segment can be a marker. A whiteout token in any other segment means the
/// layer places entries below a marker, which no valid layer does, so it is rejected as malformed.
///
/// Leading `/` characters are dropped, the same way the extraction pass treats ordinary entries,
/// so `/etc/.wh.shadow` targets `etc/shadow` under the root.
///
/// ## Examples
///
/// ```
/// use monolayer::layer::{classify, EntryClass};
///
/// assert_eq!(classify("usr/bin/env").unwrap(), EntryClass::Ordinary);
/// assert_eq!(
///     classify("usr/share/doc/.wh.README").unwrap(),
///     EntryClass::Deletion { target: "usr/share/doc/README".to_string() }
/// );
/// assert_eq!(
///     classify("usr/share/doc/.wh..wh..opq").unwrap(),
///     EntryClass::Opaque { target: "usr/share/doc".to_string() }
/// );
/// assert!(classify(".wh..wh..opq").is_err());
/// ```
pub fn classify(path: &str) -> LayerResult<EntryClass> {
    let trimmed = trim_marker_path(path);
    let (parent, name) = split_last_segment(trimmed);

    if parent
        .map(|p| p.split('/').any(|segment| segment.starts_with(WHITEOUT_PREFIX)))
        .unwrap_or(false)
    {
        return Err(malformed(path, "whiteout token in a parent segment"));
    }

    if !name.starts_with(WHITEOUT_PREFIX) {
        return Ok(EntryClass::Ordinary);
    }

    if name == OPAQUE_WHITEOUT_MARKER {
        return Ok(EntryClass::Opaque {
            target: resolve_opaque_target(path)?,
        });
    }

    Ok(EntryClass::Deletion {
        target: resolve_deletion_target(path)?,
    })
}

/// Returns true if any segment of `path` carries the whiteout token.
///
/// Such entries are never written to disk by the extraction pass.
pub fn is_marker_path(path: &str) -> bool {
    path.split('/')
        .any(|segment| segment.starts_with(WHITEOUT_PREFIX))
}

/// Resolves an opaque marker to the directory it resets.
///
/// The target is everything before the last `/`. A marker without a containing directory cannot be
/// resolved and is an error.
pub fn resolve_opaque_target(marker_path: &str) -> LayerResult<String> {
    let trimmed = trim_marker_path(marker_path);
    match split_last_segment(trimmed) {
        (Some(parent), OPAQUE_WHITEOUT_MARKER) => Ok(parent.to_string()),
        (None, OPAQUE_WHITEOUT_MARKER) => Err(malformed(
            marker_path,
            "opaque marker has no containing directory",
        )),
        _ => Err(malformed(marker_path, "not an opaque marker")),
    }
}

/// Resolves a deletion marker to the sibling path it deletes.
///
/// The token is stripped from the final segment, so `a/b/.wh.c` resolves to `a/b/c`.
pub fn resolve_deletion_target(marker_path: &str) -> LayerResult<String> {
    let trimmed = trim_marker_path(marker_path);
    let (parent, name) = split_last_segment(trimmed);

    let Some(deleted) = name.strip_prefix(WHITEOUT_PREFIX) else {
        return Err(malformed(marker_path, "missing whiteout token"));
    };

    match deleted {
        "" => return Err(malformed(marker_path, "whiteout marker names no file")),
        "." | ".." => return Err(malformed(marker_path, "whiteout marker names a directory link")),
        _ => {}
    }

    Ok(match parent {
        Some(parent) => format!("{parent}/{deleted}"),
        None => deleted.to_string(),
    })
}

/// Joins a layer-relative target under the root filesystem.
///
/// `.` segments and empty segments are dropped and `..` segments are folded. Absolute targets and
/// targets that climb above the root are rejected. An empty result names the root itself.
pub fn resolve_under_root(root: &Path, target: &str) -> LayerResult<PathBuf> {
    let mut segments: Vec<&str> = Vec::new();

    for component in Utf8UnixPath::new(target).components() {
        match component {
            Utf8UnixComponent::RootDir => {
                return Err(LayerError::PathEscapesRoot(target.to_string()));
            }
            Utf8UnixComponent::CurDir => continue,
            Utf8UnixComponent::ParentDir => {
                if segments.pop().is_none() {
                    return Err(LayerError::PathEscapesRoot(target.to_string()));
                }
            }
            Utf8UnixComponent::Normal(segment) if !segment.is_empty() => segments.push(segment),
            Utf8UnixComponent::Normal(_) => continue,
        }
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(segments);
    Ok(resolved)
}

fn trim_marker_path(path: &str) -> &str {
    match path.trim_start_matches('/').trim_end_matches('/') {
        "" => path,
        trimmed => trimmed,
    }
}

fn split_last_segment(path: &str) -> (Option<&str>, &str) {
    match path.rfind('/') {
        Some(index) => (Some(&path[..index]), &path[index + 1..]),
        None => (None, path),
    }
}

fn malformed(path: &str, reason: &'static str) -> LayerError {
    LayerError::MalformedMarker {
        path: path.to_string(),
        reason,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_classify_ordinary_entries() {
        for path in [
            "etc/passwd",
            "usr/",
            "usr/lib/libc.so.6",
            "foo.wh.bar",
            "dir/file.wh..wh..opq",
        ] {
            assert_eq!(classify(path).unwrap(), EntryClass::Ordinary, "{path}");
        }
    }

    #[test]
    fn test_marker_classify_deletion() {
        assert_eq!(
            classify(".wh.file1.txt").unwrap(),
            EntryClass::Deletion {
                target: "file1.txt".to_string()
            }
        );
        assert_eq!(
            classify("usr/share/doc/test/.wh.deletedfile").unwrap(),
            EntryClass::Deletion {
                target: "usr/share/doc/test/deletedfile".to_string()
            }
        );
        assert_eq!(
            classify("./var/.wh.cache").unwrap(),
            EntryClass::Deletion {
                target: "./var/cache".to_string()
            }
        );
    }

    #[test]
    fn test_marker_classify_opaque() {
        assert_eq!(
            classify("usr/share/doc/test/.wh..wh..opq").unwrap(),
            EntryClass::Opaque {
                target: "usr/share/doc/test".to_string()
            }
        );
        assert_eq!(
            classify("./.wh..wh..opq").unwrap(),
            EntryClass::Opaque {
                target: ".".to_string()
            }
        );
    }

    #[test]
    fn test_marker_classify_rejects_malformed_markers() {
        let cases = [
            ".wh..wh..opq",
            ".wh.",
            "dir/.wh.",
            "dir/.wh..",
            "dir/.wh...",
            "dir/.wh.gone/child",
        ];

        for path in cases {
            match classify(path) {
                Err(LayerError::MalformedMarker { path: reported, .. }) => {
                    assert_eq!(reported, path)
                }
                other => panic!("expected malformed marker for {path}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_marker_classify_strips_leading_slashes() {
        assert_eq!(
            classify("/etc/.wh.shadow").unwrap(),
            EntryClass::Deletion {
                target: "etc/shadow".to_string()
            }
        );
        assert_eq!(
            classify("//var/cache/.wh..wh..opq").unwrap(),
            EntryClass::Opaque {
                target: "var/cache".to_string()
            }
        );
        assert!(matches!(
            classify("/.wh..wh..opq"),
            Err(LayerError::MalformedMarker { .. })
        ));
        assert_eq!(classify("/etc/passwd").unwrap(), EntryClass::Ordinary);
    }

    #[test]
    fn test_marker_resolve_targets_directly() {
        assert_eq!(resolve_opaque_target("a/b/.wh..wh..opq").unwrap(), "a/b");
        assert!(resolve_opaque_target("a/b/.wh.c").is_err());
        assert_eq!(resolve_deletion_target("a/b/.wh.c").unwrap(), "a/b/c");
        assert_eq!(resolve_deletion_target("a/.wh..hidden").unwrap(), "a/.hidden");
        assert!(resolve_deletion_target("a/b/c").is_err());
    }

    #[test]
    fn test_marker_is_marker_path() {
        assert!(is_marker_path(".wh.foo"));
        assert!(is_marker_path("a/b/.wh..wh..opq"));
        assert!(is_marker_path("a/.wh.b/c"));
        assert!(!is_marker_path("a/b/c.wh.d"));
        assert!(!is_marker_path("a/b/"));
    }

    #[test]
    fn test_marker_resolve_under_root() {
        let root = Path::new("/rootfs");

        assert_eq!(
            resolve_under_root(root, "usr/lib").unwrap(),
            PathBuf::from("/rootfs/usr/lib")
        );
        assert_eq!(
            resolve_under_root(root, "./usr//lib/").unwrap(),
            PathBuf::from("/rootfs/usr/lib")
        );
        assert_eq!(
            resolve_under_root(root, "usr/tmp/../lib").unwrap(),
            PathBuf::from("/rootfs/usr/lib")
        );
        assert_eq!(resolve_under_root(root, ".").unwrap(), root);
        assert!(matches!(
            resolve_under_root(root, "../etc/passwd"),
            Err(LayerError::PathEscapesRoot(_))
        ));
        assert!(matches!(
            resolve_under_root(root, "usr/../../etc"),
            Err(LayerError::PathEscapesRoot(_))
        ));
        assert!(matches!(
            resolve_under_root(root, "/etc/passwd"),
            Err(LayerError::PathEscapesRoot(_))
        ));
    }
}
