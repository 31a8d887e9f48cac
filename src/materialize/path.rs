//! Mapping a remote folder path and filename onto the local root.
//!
//! The remote folder tree is mirrored under the local root. When the result
//! would reach the path-length limit, leading folder segments are dropped
//! (the local root and the last segment are always kept) until it fits.

use std::path::{Component, Path, PathBuf};

use super::MaterializeError;

/// Default limit on directory + filename length, kept well under the
/// 260-character Windows `MAX_PATH`.
pub const DEFAULT_MAX_PATH_LEN: usize = 200;

/// Where a document will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    /// Directory that must exist before the write.
    pub directory: PathBuf,
    /// Full file path (`directory` joined with the sanitized filename).
    pub file: PathBuf,
    /// Whether leading folder segments were dropped to fit the limit.
    pub shortened: bool,
}

/// Derives the local path for a document.
///
/// `directory length + filename length` is measured in characters; a value
/// `>= max_len` triggers shortening.
///
/// # Errors
///
/// - [`MaterializeError::InvalidSegment`] for `.` / `..` folder segments
/// - [`MaterializeError::InvalidFilename`] for an empty or dot filename
/// - [`MaterializeError::PathTooLong`] when `root/<last segment>/<filename>`
///   still reaches the limit
pub fn plan_target_path(
    root: &Path,
    folder_path: &str,
    filename: &str,
    max_len: usize,
) -> Result<TargetPath, MaterializeError> {
    let filename = sanitize_filename(filename)?;
    let segments = folder_segments(folder_path)?;

    let full = join_segments(root, &segments);
    if measured_len(&full, &filename) < max_len {
        return Ok(TargetPath {
            file: full.join(&filename),
            directory: full,
            shortened: false,
        });
    }

    // Drop leading segments one at a time; always keep the last one.
    let mut shortest = full;
    for start in 1..segments.len() {
        let candidate = join_segments(root, &segments[start..]);
        if measured_len(&candidate, &filename) < max_len {
            return Ok(TargetPath {
                file: candidate.join(&filename),
                directory: candidate,
                shortened: true,
            });
        }
        shortest = candidate;
    }

    let path = shortest.join(&filename);
    Err(MaterializeError::PathTooLong {
        length: measured_len(&shortest, &filename),
        path,
        limit: max_len,
    })
}

fn measured_len(directory: &Path, filename: &str) -> usize {
    directory.to_string_lossy().chars().count() + filename.chars().count()
}

fn join_segments(root: &Path, segments: &[String]) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(segments);
    path
}

/// Splits a slash-delimited remote folder path into sanitized segments.
/// Empty segments (leading, trailing, doubled slashes) are ignored.
fn folder_segments(folder_path: &str) -> Result<Vec<String>, MaterializeError> {
    folder_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if matches!(segment.trim(), "." | "..") {
                return Err(MaterializeError::InvalidSegment {
                    segment: segment.to_string(),
                    folder_path: folder_path.to_string(),
                });
            }
            Ok(sanitize_component(segment))
        })
        .collect()
}

fn sanitize_filename(filename: &str) -> Result<String, MaterializeError> {
    let trimmed = filename.trim();
    let sanitized = sanitize_component(trimmed);
    if matches!(trimmed, "" | "." | "..") || !is_plain_file_name(&sanitized) {
        return Err(MaterializeError::InvalidFilename {
            filename: filename.to_string(),
        });
    }
    Ok(sanitized)
}

/// Makes one path component safe on common filesystems, Windows included:
/// - / \ : * ? " < > | and control characters become `_`
/// - trailing dots and spaces become `_` (Windows strips them silently)
/// - reserved device names (`CON`, `nul.txt`, `LPT1`, ...) get a `_` prefix
fn sanitize_component(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let kept = sanitized.trim_end_matches(['.', ' ']).len();
    let trailing = sanitized.len() - kept;
    if trailing > 0 {
        sanitized.truncate(kept);
        sanitized.push_str(&"_".repeat(trailing));
    }

    let stem = sanitized.split('.').next().unwrap_or_default();
    if is_windows_reserved_name(stem.trim_end()) {
        sanitized.insert(0, '_');
    }
    sanitized
}

/// Returns true if the name is a Windows reserved device name
/// (CON, PRN, AUX, NUL, COM1-9, LPT1-9).
fn is_windows_reserved_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => {
            let bytes = upper.as_bytes();
            bytes.len() == 4
                && (upper.starts_with("COM") || upper.starts_with("LPT"))
                && matches!(bytes[3], b'1'..=b'9')
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_mirrors_remote_folder_under_root() {
        let target = plan_target_path(
            Path::new("/tmp/"),
            "/Provider Licensing/Providers/PROV-001670",
            "license.pdf",
            DEFAULT_MAX_PATH_LEN,
        )
        .unwrap();
        assert_eq!(
            target.file,
            PathBuf::from("/tmp/Provider Licensing/Providers/PROV-001670/license.pdf")
        );
        assert_eq!(
            target.directory,
            PathBuf::from("/tmp/Provider Licensing/Providers/PROV-001670")
        );
        assert!(!target.shortened);
    }

    #[test]
    fn test_plan_without_folder_segments_uses_root() {
        for folder in ["", "/", "//"] {
            let target =
                plan_target_path(Path::new("/mirror"), folder, "a.txt", DEFAULT_MAX_PATH_LEN)
                    .unwrap();
            assert_eq!(target.file, PathBuf::from("/mirror/a.txt"), "folder {folder:?}");
        }
    }

    #[test]
    fn test_plan_sanitizes_reserved_characters() {
        let target = plan_target_path(
            Path::new("/mirror"),
            "/Reports: 2024/Q1|Q2",
            "sum*mary?.pdf",
            DEFAULT_MAX_PATH_LEN,
        )
        .unwrap();
        assert_eq!(
            target.file,
            PathBuf::from("/mirror/Reports_ 2024/Q1_Q2/sum_mary_.pdf")
        );
    }

    #[test]
    fn test_plan_rejects_parent_segments() {
        let err = plan_target_path(Path::new("/mirror"), "/a/../etc", "x", 200).unwrap_err();
        assert!(matches!(err, MaterializeError::InvalidSegment { ref segment, .. } if segment == ".."));
    }

    #[test]
    fn test_plan_rejects_unusable_filenames() {
        for name in ["", "  ", ".", ".."] {
            let err = plan_target_path(Path::new("/mirror"), "/a", name, 200).unwrap_err();
            assert!(
                matches!(err, MaterializeError::InvalidFilename { .. }),
                "name {name:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_plan_replaces_trailing_dots_and_spaces() {
        let target =
            plan_target_path(Path::new("/mirror"), "/Draft. /Final ", "notes..", 200).unwrap();
        assert_eq!(target.file, PathBuf::from("/mirror/Draft__/Final_/notes__"));
    }

    #[test]
    fn test_plan_prefixes_reserved_device_names() {
        let target = plan_target_path(Path::new("/mirror"), "/con/LPT1", "nul.txt", 200).unwrap();
        assert_eq!(target.file, PathBuf::from("/mirror/_con/_LPT1/_nul.txt"));

        // Only exact stems are reserved.
        let target =
            plan_target_path(Path::new("/mirror"), "/CONSOLE/COM10", "aux1.txt", 200).unwrap();
        assert_eq!(target.file, PathBuf::from("/mirror/CONSOLE/COM10/aux1.txt"));
    }

    #[test]
    fn test_plan_backslash_in_filename_cannot_traverse() {
        let target = plan_target_path(Path::new("/mirror"), "/a", "..\\..\\boot.ini", 200).unwrap();
        assert_eq!(target.file, PathBuf::from("/mirror/a/.._.._boot.ini"));
    }

    #[test]
    fn test_plan_shortens_when_limit_reached() {
        let root = Path::new("/tmp/mirror");
        let folder = format!("/{}/{}/PROV-001670", "A".repeat(90), "B".repeat(90));
        let original_len = root.join(&folder[1..]).to_string_lossy().len() + "license.pdf".len();
        assert!(original_len >= DEFAULT_MAX_PATH_LEN);

        let target = plan_target_path(root, &folder, "license.pdf", DEFAULT_MAX_PATH_LEN).unwrap();

        assert!(target.shortened);
        let shortened_len = target.directory.to_string_lossy().len() + "license.pdf".len();
        assert!(shortened_len < original_len);
        assert!(shortened_len < DEFAULT_MAX_PATH_LEN);
        assert!(target.file.starts_with(root));
        // Drops the first segment only; that is enough to fit.
        assert_eq!(
            target.directory,
            root.join("B".repeat(90)).join("PROV-001670")
        );
    }

    #[test]
    fn test_plan_shortens_down_to_last_segment() {
        let root = Path::new("/tmp/mirror");
        let folder = format!("/{}/{}/PROV-001670", "A".repeat(120), "B".repeat(190));
        let target = plan_target_path(root, &folder, "license.pdf", DEFAULT_MAX_PATH_LEN).unwrap();
        assert!(target.shortened);
        assert_eq!(target.file, root.join("PROV-001670").join("license.pdf"));
    }

    #[test]
    fn test_plan_exact_limit_triggers_shortening() {
        let root = Path::new("/r");
        let dir_len = "/r/abcd/efgh".len();
        let filename = "f.txt";
        let limit = dir_len + filename.len();
        let target = plan_target_path(root, "/abcd/efgh", filename, limit).unwrap();
        assert!(target.shortened);
        assert_eq!(target.file, PathBuf::from("/r/efgh/f.txt"));
    }

    #[test]
    fn test_plan_fails_when_last_segment_alone_is_too_long() {
        let root = Path::new("/tmp/mirror");
        let folder = format!("/short/{}", "C".repeat(250));
        let err = plan_target_path(root, &folder, "license.pdf", DEFAULT_MAX_PATH_LEN).unwrap_err();
        match err {
            MaterializeError::PathTooLong { length, limit, path } => {
                assert!(length >= limit);
                assert!(path.starts_with(root));
            }
            other => panic!("expected PathTooLong, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_fails_when_filename_alone_is_too_long() {
        let name = format!("{}.pdf", "n".repeat(300));
        let err = plan_target_path(Path::new("/m"), "", &name, DEFAULT_MAX_PATH_LEN).unwrap_err();
        assert!(matches!(err, MaterializeError::PathTooLong { .. }));
    }
}
