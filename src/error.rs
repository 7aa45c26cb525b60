use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed archive structure. Always fatal to the current parse.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Invalid signature: {0:#010x}")]
    InvalidSignature(u32),
    #[error("Invalid version: {0}")]
    InvalidVersion(u32),
    #[error("Invalid entry terminator {found:#06x} after '{path}'")]
    InvalidTerminator { path: String, found: u16 },
}

/// Data was located but does not match its recorded checksum.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("CRC mismatch for '{path}': expected {expected:08x}, got {actual:08x}")]
    CrcMismatch { path: String, expected: u32, actual: u32 },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("Path cannot be stored in a tree: '{0}'")]
    InvalidPath(String),
    #[error("No such file in tree: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Unsupported VPK version for building: {0}")]
    UnsupportedVersion(u32),
    #[error("Failed loading {}: {source}", path.display())]
    Load { path: PathBuf, source: Box<Error> },
    #[error("Failed extracting following files: {}", join_paths(failed))]
    Extract { failed: Vec<PathBuf> },
}

pub type Result<T> = std::result::Result<T, Error>;

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// True for errors that mean the archive bytes are corrupt rather than
    /// missing or unreachable.
    pub fn is_corruption(&self) -> bool {
        match self {
            Error::Format(_) | Error::Integrity(_) => true,
            Error::Load { source, .. } => source.is_corruption(),
            _ => false,
        }
    }
}
