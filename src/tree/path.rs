//! Mapping between tree string triples and logical paths.

use crate::error::{Error, Result};

/// Placeholder the tree uses for an absent extension, directory or base name.
pub const SPACE: &str = " ";

/// `[directory "/"] name ["." extension]`, leaving out each part whose tree
/// string is the space placeholder.
pub fn compose_path(directory: &str, filename: &str, extension: &str) -> String {
    let mut path = String::with_capacity(directory.len() + filename.len() + extension.len() + 2);
    if directory != SPACE {
        path.push_str(directory);
        path.push('/');
    }
    if filename != SPACE {
        path.push_str(filename);
    }
    if extension != SPACE {
        path.push('.');
        path.push_str(extension);
    }
    path
}

/// Inverse of [`compose_path`]: returns `(extension, directory, name)` with
/// placeholders filled in. The last `.` of the final component splits off
/// the extension.
///
/// Fails for paths that would need an empty tree string, which the format
/// reads as a group terminator (`"dir/"`, `"file."`, `"/abs"`).
pub fn split_path(path: &str) -> Result<(String, String, String)> {
    let (directory, file) = match path.rsplit_once('/') {
        Some((d, f)) => (d, f),
        None => (SPACE, path),
    };
    let (name, extension) = match file.rsplit_once('.') {
        Some((n, e)) => (n, e),
        None => (file, SPACE),
    };
    if directory.is_empty() || extension.is_empty() || (name.is_empty() && extension == SPACE) {
        return Err(Error::InvalidPath(path.to_owned()));
    }
    let name = if name.is_empty() { SPACE } else { name };
    Ok((extension.to_owned(), directory.to_owned(), name.to_owned()))
}
