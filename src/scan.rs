//! Source-tree scan feeding [`ArchiveBuilder`](crate::builder::ArchiveBuilder).
//!
//! Walks a directory with `walkdir` and yields one [`SourceFile`] per regular
//! file, in file-name order. The builder only consumes the records; any other
//! walker producing the same records can stand in via
//! [`ArchiveBuilder::load_records`](crate::builder::ArchiveBuilder::load_records).

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::tree::SPACE;

/// One file found under the source root, split the way the tree stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Directory relative to the root, `/`-separated, or `" "` at the root.
    pub location:  String,
    pub name:      String,
    pub extension: String,
    pub size:      u64,
    pub crc:       u32,
    pub source:    PathBuf,
}

impl SourceFile {
    /// Build a record for `source`, which must live under `root`. Reads the
    /// file once to checksum it.
    pub fn from_path(root: &Path, source: &Path) -> Result<Self> {
        let data = fs::read(source)?;
        let relative = source
            .strip_prefix(root)
            .map_err(|_| Error::InvalidPath(source.display().to_string()))?;

        let location = match relative.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            _ => SPACE.to_owned(),
        };

        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidPath(source.display().to_string()))?;
        let (name, extension) = match file_name.rsplit_once('.') {
            Some((n, e)) if !e.is_empty() => (n.to_owned(), e.to_owned()),
            _ => (file_name.clone(), SPACE.to_owned()),
        };
        let name = if name.is_empty() { SPACE.to_owned() } else { name };

        Ok(Self {
            location,
            name,
            extension,
            size: data.len() as u64,
            crc: crc32fast::hash(&data),
            source: source.to_owned(),
        })
    }
}

/// Lazily walk `root`, yielding every regular file below it.
pub fn scan_directory(root: &Path) -> impl Iterator<Item = Result<SourceFile>> + '_ {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(e) if e.file_type().is_file() => Some(SourceFile::from_path(root, e.path())),
            Ok(_) => None,
            Err(e) => Some(Err(Error::Io(e.into()))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn splits_location_name_and_extension() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("materials/brick")).unwrap();
        fs::write(root.join("readme.txt"), b"hi").unwrap();
        fs::write(root.join("materials/brick/wall.vmt"), b"\"LightmappedGeneric\"").unwrap();
        fs::write(root.join("Makefile"), b"all:").unwrap();
        fs::write(root.join(".env"), b"X=1").unwrap();

        let files: Vec<_> = scan_directory(root).collect::<Result<_>>().unwrap();
        let triples: Vec<_> = files
            .iter()
            .map(|f| (f.location.as_str(), f.name.as_str(), f.extension.as_str()))
            .collect();
        assert_eq!(
            triples,
            vec![
                (" ", " ", "env"),
                (" ", "Makefile", " "),
                ("materials/brick", "wall", "vmt"),
                (" ", "readme", "txt"),
            ]
        );
        let readme = files.iter().find(|f| f.name == "readme").unwrap();
        assert_eq!(readme.size, 2);
        assert_eq!(readme.crc, crc32fast::hash(b"hi"));
    }

    #[test]
    fn empty_directory_yields_nothing() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();
        assert_eq!(scan_directory(tmp.path()).count(), 0);
    }
}
