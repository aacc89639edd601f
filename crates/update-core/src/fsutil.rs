use crate::error::Result;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Delete `dir` if present, then recreate it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Recursively copy every file under `src` into `dst`, preserving relative
/// paths and creating missing directories. Existing files are overwritten.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields children of src");
        let target = dst.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
    }
    Ok(())
}

/// True when `dir` contains no files at any depth.
pub fn dir_is_empty(dir: &Path) -> Result<bool> {
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn reset_clears_previous_content() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("staging");
        fs::create_dir_all(target.join("old")).unwrap();
        fs::write(target.join("old/file"), b"stale").unwrap();

        reset_dir(&target).unwrap();
        assert!(target.exists());
        assert!(dir_is_empty(&target).unwrap());
    }

    #[test]
    fn copy_tree_overlays_and_overwrites() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a"), b"new a").unwrap();
        fs::write(src.join("sub/b"), b"new b").unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("a"), b"old a").unwrap();
        fs::write(dst.join("keep"), b"untouched").unwrap();

        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read(dst.join("a")).unwrap(), b"new a");
        assert_eq!(fs::read(dst.join("sub/b")).unwrap(), b"new b");
        assert_eq!(fs::read(dst.join("keep")).unwrap(), b"untouched");
    }
}
