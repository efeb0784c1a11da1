//! `.tar.gz` extraction for downloaded release assets

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::{GheError, Result};

/// Whether a file name looks like a gzipped tarball
pub fn is_tar_gz(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Extract a `.tar.gz` archive into `dest_dir`
///
/// Returns the paths of the regular files written. Entries that would land
/// outside `dest_dir` are skipped by `tar` itself.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let fail = |reason: String| GheError::Extraction {
        archive: archive_path.display().to_string(),
        reason,
    };

    let tar_gz = File::open(archive_path).map_err(|e| fail(format!("cannot open: {}", e)))?;
    fs::create_dir_all(dest_dir)?;

    let mut archive = Archive::new(GzDecoder::new(tar_gz));
    let entries = archive
        .entries()
        .map_err(|e| fail(format!("cannot read entries: {}", e)))?;

    let mut written = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|e| fail(format!("corrupt entry: {}", e)))?;
        let relative = entry
            .path()
            .map_err(|e| fail(format!("bad entry path: {}", e)))?
            .into_owned();
        let is_file = entry.header().entry_type().is_file();

        let unpacked = entry
            .unpack_in(dest_dir)
            .map_err(|e| fail(format!("cannot extract '{}': {}", relative.display(), e)))?;

        if unpacked && is_file {
            written.push(dest_dir.join(&relative));
        }
    }

    tracing::info!(
        archive = %archive_path.display(),
        files = written.len(),
        "archive extracted"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn build_archive(path: &Path, files: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_is_tar_gz() {
        assert!(is_tar_gz(Path::new("tool-linux.tar.gz")));
        assert!(is_tar_gz(Path::new("dir/TOOL.TGZ")));
        assert!(!is_tar_gz(Path::new("tool.zip")));
    }

    #[test]
    fn test_extract_files() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.tar.gz");
        build_archive(&archive, &[("bin/tool", b"#!/bin/sh\n"), ("README", b"hi")]);

        let out = dir.path().join("out");
        let files = extract_tar_gz(&archive, &out).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(fs::read(out.join("README")).unwrap(), b"hi");
        assert!(out.join("bin/tool").exists());
    }

    #[test]
    fn test_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let err = extract_tar_gz(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, GheError::Extraction { .. }));
        assert!(err.to_string().contains("tar -xzf"));
    }
}
