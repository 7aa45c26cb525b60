//! [`ArchiveReader`] — the read side of the crate.
//!
//! ```no_run
//! use vpkrs::ArchiveReader;
//!
//! let mut vpk = ArchiveReader::new("pak01_dir.vpk");
//! if vpk.is_valid() {
//!     vpk.load()?;
//!     let data = vpk.get_file("materials/brick.vmt")?;
//!     vpk.extract("out")?;
//! }
//! # Ok::<(), vpkrs::Error>(())
//! ```

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::entry::DirectoryEntry;
use crate::error::{Error, Result};
use crate::header::{Header, HEADER_V2_LEN};
use crate::resolve::read_entry;
use crate::tree::{read_tree, FileTree};

// ── ReaderState ──────────────────────────────────────────────────────────────

#[derive(Debug)]
enum ReaderState {
    Unloaded,
    Loaded { header: Header, tree: FileTree },
}

// ── ArchiveReader ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ArchiveReader {
    path:  PathBuf,
    state: ReaderState,
}

impl ArchiveReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_owned(), state: ReaderState::Unloaded }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ReaderState::Loaded { .. })
    }

    /// Header-only check. Never changes state and never fails.
    pub fn is_valid(&self) -> bool {
        let Ok(file) = File::open(&self.path) else {
            return false;
        };
        // A v1 header is shorter than the v2 read window; only parse what's there.
        let mut prefix = Vec::with_capacity(HEADER_V2_LEN as usize);
        if file.take(HEADER_V2_LEN).read_to_end(&mut prefix).is_err() {
            return false;
        }
        Header::read(&prefix[..]).is_ok()
    }

    /// Parse header and tree. On failure the reader is left unloaded.
    pub fn load(&mut self) -> Result<()> {
        self.state = ReaderState::Unloaded;
        let (header, tree) = self.parse().map_err(|e| Error::Load {
            path:   self.path.clone(),
            source: Box::new(e),
        })?;
        info!(path = %self.path.display(), version = header.version, files = tree.len(), "loaded archive");
        self.state = ReaderState::Loaded { header, tree };
        Ok(())
    }

    fn parse(&self) -> Result<(Header, FileTree)> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let header = Header::read(&mut reader)?;
        debug!(version = header.version, tree_length = header.tree_length, "parsed header");
        let tree = read_tree(&mut reader)?;
        Ok((header, tree))
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if !self.is_loaded() {
            self.load()?;
        }
        Ok(())
    }

    fn loaded_parts(&self) -> Result<(&Header, &FileTree)> {
        match &self.state {
            ReaderState::Loaded { header, tree } => Ok((header, tree)),
            ReaderState::Unloaded => Err(Error::Load {
                path:   self.path.clone(),
                source: Box::new(Error::NotFound("archive is not loaded".into())),
            }),
        }
    }

    pub fn header(&self) -> Option<&Header> {
        match &self.state {
            ReaderState::Loaded { header, .. } => Some(header),
            ReaderState::Unloaded => None,
        }
    }

    pub fn tree(&self) -> Option<&FileTree> {
        match &self.state {
            ReaderState::Loaded { tree, .. } => Some(tree),
            ReaderState::Unloaded => None,
        }
    }

    pub fn entry(&self, path: &str) -> Option<&DirectoryEntry> {
        self.tree().and_then(|t| t.get(path))
    }

    /// Logical paths in tree order. Empty until loaded.
    pub fn files(&self) -> Vec<&str> {
        self.tree().map(|t| t.paths().collect()).unwrap_or_default()
    }

    /// Read and CRC-check one file, loading the archive first if needed.
    pub fn get_file(&mut self, path: &str) -> Result<Vec<u8>> {
        self.ensure_loaded()?;
        let (header, tree) = self.loaded_parts()?;
        let entry = tree.get(path).ok_or_else(|| Error::NotFound(path.to_owned()))?;
        read_entry(path, entry, header, &self.path)
    }

    /// Write every file under `dest`, recreating the tree's directories.
    ///
    /// A file that cannot be read out of the archive (bad CRC, missing
    /// companion, ...) stops the extraction with that error. Files that were
    /// read but could not be written are collected and reported together in
    /// [`Error::Extract`] once every other file has been attempted. Tree paths
    /// that would climb out of `dest` through `..` are never written and are
    /// reported the same way.
    pub fn extract<P: AsRef<Path>>(&mut self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        self.ensure_loaded()?;
        create_dir(dest)?;

        let (header, tree) = self.loaded_parts()?;

        let mut failed = Vec::new();
        for (path, entry) in tree.iter() {
            let Some(dest_file) = dest_path(dest, path) else {
                warn!(path, "tree path escapes the destination, not extracted");
                failed.push(PathBuf::from(path));
                continue;
            };
            if let Some(parent) = dest_file.parent() {
                create_dir(parent)?;
            }

            let data = read_entry(path, entry, header, &self.path)?;

            if let Err(e) = fs::write(&dest_file, &data) {
                warn!(path = %dest_file.display(), error = %e, "failed to write extracted file");
                failed.push(dest_file);
            }
        }

        if !failed.is_empty() {
            return Err(Error::Extract { failed });
        }
        info!(dest = %dest.display(), files = tree.len(), "extracted archive");
        Ok(())
    }
}

/// Place a tree path under `dest`. Root and prefix components are dropped so
/// absolute paths land inside `dest`; a `..` component has no safe mapping.
fn dest_path(dest: &Path, path: &str) -> Option<PathBuf> {
    let mut out = dest.to_path_buf();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => return None,
        }
    }
    Some(out)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|source| Error::CreateDir { path: path.to_owned(), source })
}
