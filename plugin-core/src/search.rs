use std::path::{Path, PathBuf};

#[cfg(target_os = "windows")]
pub const PLUGIN_EXTENSION: &str = "dll";
#[cfg(all(unix, not(target_os = "macos")))]
pub const PLUGIN_EXTENSION: &str = "so";
#[cfg(target_os = "macos")]
pub const PLUGIN_EXTENSION: &str = "dylib";

/// Enumerates regular files under `dir` whose extension matches the platform's dynamic
/// library extension (spec.md §6 "Filesystem"). This walker is deliberately minimal —
/// spec.md §1 treats directory enumeration as an external capability, not a respecified
/// subsystem.
///
/// `recursive` controls whether sub-directories are descended into. Symbolic links are
/// followed as `Path::is_dir`/`is_file` report them, matching the platform directory
/// iterator's own behavior.
///
/// A read error on a nested sub-directory does not abort the whole walk: whatever this
/// call already collected is still returned alongside the first error seen, so the
/// manager can decide (per spec.md §4.6) whether "no candidates were collected" makes
/// the error fatal to this `search` call.
pub fn find_candidates(dir: &Path, recursive: bool) -> (Vec<PathBuf>, Option<std::io::Error>) {
    let mut candidates = Vec::new();
    let err = walk(dir, recursive, &mut candidates).err();
    (candidates, err)
}

fn walk(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut first_err = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                first_err.get_or_insert(e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                if let Err(e) = walk(&path, recursive, out) {
                    first_err.get_or_insert(e);
                }
            }
            continue;
        }
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(PLUGIN_EXTENSION) {
            out.push(path);
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_directory_yields_no_candidates() {
        let dir = tempdir().unwrap();
        let (candidates, err) = find_candidates(dir.path(), true);
        assert!(candidates.is_empty());
        assert!(err.is_none());
    }

    #[test]
    fn matches_only_platform_extension() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(format!("plugin.{PLUGIN_EXTENSION}")), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        let (candidates, err) = find_candidates(dir.path(), true);
        assert_eq!(candidates.len(), 1);
        assert!(err.is_none());
    }

    #[test]
    fn non_recursive_skips_subdirectories() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join(format!("nested.{PLUGIN_EXTENSION}")), b"").unwrap();
        let (candidates, _) = find_candidates(dir.path(), false);
        assert!(candidates.is_empty());
        let (candidates, _) = find_candidates(dir.path(), true);
        assert_eq!(candidates.len(), 1);
    }
}
