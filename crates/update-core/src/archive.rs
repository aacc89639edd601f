use crate::error::{CoreError, Result};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

fn zip_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Package every file under `src_dir` into a zip at `archive_path`,
/// preserving paths relative to `src_dir`.
pub fn pack_dir(src_dir: &Path, archive_path: &Path) -> Result<()> {
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(archive_path)?);
    for entry in WalkDir::new(src_dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .expect("walkdir yields children of src_dir");
        // Zip entry names always use forward slashes.
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, zip_options())?;
        let mut file = File::open(entry.path())?;
        io::copy(&mut file, &mut writer)?;
    }
    writer.finish()?;
    Ok(())
}

/// Extract a whole archive into `dest_dir`, overwriting existing files.
pub fn unpack_into(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    visit_entries(archive_path, |rel, data| {
        let target = dest_dir.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        out.write_all(&data)?;
        Ok(())
    })
}

/// Walk every file entry of an archive, handing the visitor its relative
/// path and content. Entries that would escape the extraction root are
/// rejected.
pub fn visit_entries(
    archive_path: &Path,
    mut visit: impl FnMut(&Path, Vec<u8>) -> Result<()>,
) -> Result<()> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let rel = entry
            .enclosed_name()
            .ok_or_else(|| CoreError::UnsafeArchivePath(entry.name().to_string()))?;
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        visit(&rel, data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, data: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    #[test]
    fn pack_then_unpack_preserves_tree() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src.join("app.bin"), b"binary");
        write(&src.join("data/config.toml"), b"key = 1");
        write(&src.join("data/nested/deep.txt"), b"deep");

        let archive = dir.path().join("out.zip");
        pack_dir(&src, &archive).unwrap();

        let dest = dir.path().join("dest");
        unpack_into(&archive, &dest).unwrap();

        assert_eq!(fs::read(dest.join("app.bin")).unwrap(), b"binary");
        assert_eq!(fs::read(dest.join("data/config.toml")).unwrap(), b"key = 1");
        assert_eq!(fs::read(dest.join("data/nested/deep.txt")).unwrap(), b"deep");
    }

    #[test]
    fn unpack_overwrites_existing_files() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src.join("file.txt"), b"new content");
        let archive = dir.path().join("out.zip");
        pack_dir(&src, &archive).unwrap();

        let dest = dir.path().join("dest");
        write(&dest.join("file.txt"), b"old content");
        unpack_into(&archive, &dest).unwrap();
        assert_eq!(fs::read(dest.join("file.txt")).unwrap(), b"new content");
    }

    #[test]
    fn visit_sees_every_file_entry() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src.join("a.txt"), b"a");
        write(&src.join("sub/b.delta"), b"b");
        let archive = dir.path().join("out.zip");
        pack_dir(&src, &archive).unwrap();

        let mut seen = Vec::new();
        visit_entries(&archive, |rel, data| {
            seen.push((rel.to_path_buf(), data));
            Ok(())
        })
        .unwrap();
        seen.sort();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, Path::new("a.txt"));
        assert_eq!(seen[1].0, Path::new("sub/b.delta"));
        assert_eq!(seen[1].1, b"b");
    }
}
