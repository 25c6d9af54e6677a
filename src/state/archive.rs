//! # Archive Codec
//!
//! tar+gzip packing of a directory's entries. Regular files are stored under
//! their bare name, sub-directories recursively under theirs, so unpacking
//! into another directory reproduces the same layout.

use crate::error::{OperatorError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::Path;

fn archive_err(context: impl Into<String>, source: std::io::Error) -> OperatorError {
    OperatorError::Archive {
        context: context.into(),
        source,
    }
}

/// Pack the immediate entries of `dir` into a gzipped tarball
pub fn pack(dir: &Path) -> Result<Vec<u8>> {
    let packing = || format!("packing {}", dir.display());
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    for entry in std::fs::read_dir(dir).map_err(|e| archive_err(packing(), e))? {
        let entry = entry.map_err(|e| archive_err(packing(), e))?;
        let path = entry.path();
        let name = entry.file_name();
        let file_type = entry.file_type().map_err(|e| archive_err(packing(), e))?;
        if file_type.is_dir() {
            builder
                .append_dir_all(&name, &path)
                .map_err(|e| archive_err(format!("adding {}", path.display()), e))?;
        } else {
            builder
                .append_path_with_name(&path, &name)
                .map_err(|e| archive_err(format!("adding {}", path.display()), e))?;
        }
    }

    let encoder = builder.into_inner().map_err(|e| archive_err(packing(), e))?;
    encoder.finish().map_err(|e| archive_err(packing(), e))
}

/// Unpack `archive` into `dir`, creating it if needed and overwriting
/// existing files of the same name
pub fn unpack(archive: &[u8], dir: &Path) -> Result<()> {
    let unpacking = || format!("unpacking into {}", dir.display());
    std::fs::create_dir_all(dir).map_err(|e| archive_err(unpacking(), e))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(archive));
    tarball.set_overwrite(true);
    tarball.set_preserve_permissions(true);
    tarball.unpack(dir).map_err(|e| archive_err(unpacking(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_flat_directory() {
        let src = TempDir::new().expect("src");
        std::fs::write(src.path().join("a.txt"), "1").expect("a");
        std::fs::write(src.path().join("b.txt"), "2").expect("b");

        let archive = pack(src.path()).expect("pack");
        let dst = TempDir::new().expect("dst");
        unpack(&archive, dst.path()).expect("unpack");

        assert_eq!(std::fs::read_to_string(dst.path().join("a.txt")).expect("a"), "1");
        assert_eq!(std::fs::read_to_string(dst.path().join("b.txt")).expect("b"), "2");
        assert_eq!(std::fs::read_dir(dst.path()).expect("list").count(), 2);
    }

    #[test]
    fn test_round_trip_nested_directory() {
        let src = TempDir::new().expect("src");
        std::fs::create_dir_all(src.path().join("secrets/audit")).expect("mkdir");
        std::fs::write(src.path().join("secrets/audit/eprivate_key.json"), "{}").expect("write");

        let archive = pack(src.path()).expect("pack");
        let dst = TempDir::new().expect("dst");
        unpack(&archive, &dst.path().join("restored")).expect("unpack");

        let restored = dst.path().join("restored/secrets/audit/eprivate_key.json");
        assert_eq!(std::fs::read_to_string(restored).expect("read"), "{}");
    }

    #[test]
    fn test_unpack_overwrites_existing_files() {
        let src = TempDir::new().expect("src");
        std::fs::write(src.path().join("key"), "new").expect("write");
        let archive = pack(src.path()).expect("pack");

        let dst = TempDir::new().expect("dst");
        std::fs::write(dst.path().join("key"), "old").expect("write");
        unpack(&archive, dst.path()).expect("unpack");
        assert_eq!(std::fs::read_to_string(dst.path().join("key")).expect("read"), "new");
    }

    #[test]
    fn test_pack_missing_directory_fails() {
        let dir = TempDir::new().expect("dir");
        let err = pack(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, OperatorError::Archive { .. }));
    }

    #[test]
    fn test_unpack_garbage_fails() {
        let dst = TempDir::new().expect("dst");
        let err = unpack(b"not a tarball", dst.path()).unwrap_err();
        assert!(matches!(err, OperatorError::Archive { .. }));
    }
}
