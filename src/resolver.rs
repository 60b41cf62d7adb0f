//! Collision-free destination paths.
//!
//! A file moved into a directory that already holds an entry with the same
//! name gets a numeric suffix inserted before its extension:
//! `report.txt`, then `report_1.txt`, `report_2.txt`, and so on. The first
//! free suffix wins, so a gap left by a deleted `report_1.txt` is filled again.

use crate::category::extension_of;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns a path inside `dir` for `file_name` that does not exist right now.
///
/// Entries are checked without following symlinks, so a dangling link still
/// occupies its name. Only a not-found result counts as free; any other stat
/// failure (permission denied on the directory, for instance) is returned.
///
/// # Examples
///
/// ```no_run
/// use dlsort::resolver::resolve;
/// use std::path::Path;
///
/// let dest = resolve(Path::new("/downloads/Documents"), "report.txt".as_ref())?;
/// println!("moving to {}", dest.display());
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn resolve(dir: &Path, file_name: &OsStr) -> io::Result<PathBuf> {
    resolve_with(dir, file_name, path_exists)
}

/// Like [`resolve`], but asks `exists` whether a candidate is taken.
///
/// The dry run uses this to treat destinations claimed by earlier planned moves
/// as occupied.
pub fn resolve_with<F>(dir: &Path, file_name: &OsStr, mut exists: F) -> io::Result<PathBuf>
where
    F: FnMut(&Path) -> io::Result<bool>,
{
    let candidate = dir.join(file_name);
    if !exists(&candidate)? {
        return Ok(candidate);
    }

    let (stem, ext) = split_name(file_name);
    let mut n: u64 = 1;
    loop {
        let mut name = stem.clone();
        name.push(format!("_{n}"));
        name.push(&ext);

        let candidate = dir.join(name);
        if !exists(&candidate)? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Splits a file name into stem and extension, the extension starting at the
/// last `.`. Names that are not valid UTF-8 are treated as having no extension.
fn split_name(file_name: &OsStr) -> (OsString, OsString) {
    match file_name.to_str() {
        Some(name) => {
            let ext = extension_of(name);
            let stem = &name[..name.len() - ext.len()];
            (OsString::from(stem), OsString::from(ext))
        }
        None => (file_name.to_os_string(), OsString::new()),
    }
}

pub(crate) fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").expect("Failed to write test file");
    }

    #[test]
    fn test_free_name_is_returned_unchanged() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = resolve(temp_dir.path(), OsStr::new("report.txt")).unwrap();
        assert_eq!(dest, temp_dir.path().join("report.txt"));
    }

    #[test]
    fn test_collision_gets_first_suffix() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), "report.txt");

        let dest = resolve(temp_dir.path(), OsStr::new("report.txt")).unwrap();
        assert_eq!(dest, temp_dir.path().join("report_1.txt"));
    }

    #[test]
    fn test_collision_chain_advances() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), "report.txt");
        touch(temp_dir.path(), "report_1.txt");

        let dest = resolve(temp_dir.path(), OsStr::new("report.txt")).unwrap();
        assert_eq!(dest, temp_dir.path().join("report_2.txt"));
    }

    #[test]
    fn test_first_free_suffix_wins() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), "report.txt");
        touch(temp_dir.path(), "report_1.txt");
        touch(temp_dir.path(), "report_3.txt");

        let dest = resolve(temp_dir.path(), OsStr::new("report.txt")).unwrap();
        assert_eq!(dest, temp_dir.path().join("report_2.txt"));
    }

    #[test]
    fn test_name_without_extension() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), "README");

        let dest = resolve(temp_dir.path(), OsStr::new("README")).unwrap();
        assert_eq!(dest, temp_dir.path().join("README_1"));
    }

    #[test]
    fn test_suffix_goes_before_last_extension_only() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), "backup.tar.gz");

        let dest = resolve(temp_dir.path(), OsStr::new("backup.tar.gz")).unwrap();
        assert_eq!(dest, temp_dir.path().join("backup.tar_1.gz"));
    }

    #[test]
    fn test_dotfile_suffix_goes_first() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), ".bashrc");

        let dest = resolve(temp_dir.path(), OsStr::new(".bashrc")).unwrap();
        assert_eq!(dest, temp_dir.path().join("_1.bashrc"));
    }

    #[test]
    fn test_directory_occupies_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("notes.md")).unwrap();

        let dest = resolve(temp_dir.path(), OsStr::new("notes.md")).unwrap();
        assert_eq!(dest, temp_dir.path().join("notes_1.md"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_occupies_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::os::unix::fs::symlink(
            temp_dir.path().join("missing-target"),
            temp_dir.path().join("link.txt"),
        )
        .unwrap();

        let dest = resolve(temp_dir.path(), OsStr::new("link.txt")).unwrap();
        assert_eq!(dest, temp_dir.path().join("link_1.txt"));
    }

    #[test]
    fn test_resolve_with_custom_existence_check() {
        let dir = Path::new("/virtual");
        let taken: HashSet<PathBuf> = [dir.join("a.png"), dir.join("a_1.png")].into();

        let dest = resolve_with(dir, OsStr::new("a.png"), |p| Ok(taken.contains(p))).unwrap();
        assert_eq!(dest, dir.join("a_2.png"));
    }

    #[test]
    fn test_existence_check_errors_propagate() {
        let result = resolve_with(Path::new("/virtual"), OsStr::new("a.png"), |_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        });
        assert_eq!(
            result.unwrap_err().kind(),
            io::ErrorKind::PermissionDenied
        );
    }
}
