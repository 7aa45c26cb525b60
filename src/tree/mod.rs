//! Directory tree codec.
//!
//! On disk the tree is three levels of NUL-terminated strings:
//!
//! ```text
//! extension
//!   directory
//!     filename  <18-byte entry record> [preload bytes]
//!     ...       ""  (end of filenames)
//!   ...         ""  (end of directories)
//! ...           ""  (end of tree)
//! ```
//!
//! A single space stands in for "no extension", "no directory" and "no base
//! name". In memory the tree is flattened to logical paths such as
//! `materials/brick.vmt`; see [`path`] for the mapping in both directions.

use std::collections::HashMap;
use std::io::{self, BufRead, Seek, SeekFrom, Write};

use tracing::trace;

use crate::entry::DirectoryEntry;
use crate::error::{Error, Result};

pub mod path;

pub use path::{compose_path, split_path, SPACE};

// ── FileTree ─────────────────────────────────────────────────────────────────

/// Logical path → entry, kept in the order the paths were read.
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    entries: Vec<(String, DirectoryEntry)>,
    index:   HashMap<String, usize>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced path keeps its original position.
    pub fn insert(&mut self, path: String, entry: DirectoryEntry) -> Option<DirectoryEntry> {
        if let Some(&i) = self.index.get(&path) {
            return Some(std::mem::replace(&mut self.entries[i].1, entry));
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, entry));
        None
    }

    pub fn get(&self, path: &str) -> Option<&DirectoryEntry> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DirectoryEntry)> {
        self.entries.iter().map(|(p, e)| (p.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// Read one NUL-terminated string. Running out of input before the NUL is an error.
fn read_cstring<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut buf = Vec::new();
    reader.read_until(0, &mut buf)?;
    if buf.pop() != Some(0) {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "unterminated tree string"));
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Parse a tree starting at the reader's current position.
///
/// Stream positions are absolute, so `preload_offset` is only meaningful
/// when the reader is positioned over the whole directory file.
pub fn read_tree<R: BufRead + Seek>(reader: &mut R) -> Result<FileTree> {
    let mut tree = FileTree::new();
    loop {
        let extension = read_cstring(reader)?;
        if extension.is_empty() {
            break;
        }
        loop {
            let directory = read_cstring(reader)?;
            if directory.is_empty() {
                break;
            }
            loop {
                let filename = read_cstring(reader)?;
                if filename.is_empty() {
                    break;
                }
                let full_path = compose_path(&directory, &filename, &extension);
                let mut entry = DirectoryEntry::read(&mut *reader, &full_path)?;
                let preload_offset = reader.stream_position()?;
                entry.preload_offset = Some(preload_offset);
                if entry.has_preload() {
                    reader.seek(SeekFrom::Current(entry.preload_bytes as i64))?;
                }
                trace!(path = %full_path, preload_offset, "tree entry");
                tree.insert(full_path, entry);
            }
        }
    }
    Ok(tree)
}

// ── Writing ──────────────────────────────────────────────────────────────────

struct PendingFile {
    name:    String,
    entry:   DirectoryEntry,
    preload: Vec<u8>,
}

#[derive(Default)]
struct DirGroup {
    directory: String,
    files:     Vec<PendingFile>,
}

#[derive(Default)]
struct ExtGroup {
    extension: String,
    dirs:      Vec<DirGroup>,
    dir_index: HashMap<String, usize>,
}

/// Groups flat entries by extension then directory and serializes them in
/// the nested layout [`read_tree`] expects. Groups keep first-seen order.
#[derive(Default)]
pub struct TreeWriter {
    groups:    Vec<ExtGroup>,
    ext_index: HashMap<String, usize>,
}

impl TreeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one file. `preload` must hold exactly `entry.preload_bytes` bytes.
    pub fn add(&mut self, path: &str, entry: DirectoryEntry, preload: Vec<u8>) -> Result<()> {
        if preload.len() != entry.preload_bytes as usize {
            return Err(Error::InvalidPath(format!(
                "{path} (preload is {} bytes, entry declares {})",
                preload.len(),
                entry.preload_bytes
            )));
        }
        let (extension, directory, name) = split_path(path)?;

        let gi = match self.ext_index.get(&extension) {
            Some(&i) => i,
            None => {
                self.ext_index.insert(extension.clone(), self.groups.len());
                self.groups.push(ExtGroup { extension, ..Default::default() });
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[gi];
        let di = match group.dir_index.get(&directory) {
            Some(&i) => i,
            None => {
                group.dir_index.insert(directory.clone(), group.dirs.len());
                group.dirs.push(DirGroup { directory, files: Vec::new() });
                group.dirs.len() - 1
            }
        };
        group.dirs[di].files.push(PendingFile { name, entry, preload });
        Ok(())
    }

    /// Serialize the queued files. Returns the number of bytes written.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<u64> {
        fn put_str<W: Write>(w: &mut W, s: &str) -> io::Result<u64> {
            w.write_all(s.as_bytes())?;
            w.write_all(&[0])?;
            Ok(s.len() as u64 + 1)
        }

        let mut written = 0u64;
        for group in &self.groups {
            written += put_str(&mut writer, &group.extension)?;
            for dir in &group.dirs {
                written += put_str(&mut writer, &dir.directory)?;
                for file in &dir.files {
                    written += put_str(&mut writer, &file.name)?;
                    file.entry.write(&mut writer)?;
                    writer.write_all(&file.preload)?;
                    written += (crate::entry::ENTRY_RECORD_LEN + file.preload.len()) as u64;
                }
                writer.write_all(&[0])?;
                written += 1;
            }
            writer.write_all(&[0])?;
            written += 1;
        }
        writer.write_all(&[0])?;
        Ok(written + 1)
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::DIR_ARCHIVE_INDEX;
    use crate::error::FormatError;
    use std::io::Cursor;

    fn entry(crc: u32, len: u32) -> DirectoryEntry {
        DirectoryEntry {
            crc,
            preload_bytes: 0,
            archive_index: DIR_ARCHIVE_INDEX,
            entry_offset: 0,
            entry_length: len,
            preload_offset: None,
        }
    }

    #[test]
    fn reads_space_sentinels() {
        let mut raw = Vec::new();
        // extension "txt", root directory, two names
        raw.extend_from_slice(b"txt\0 \0readme\0");
        entry(1, 4).write(&mut raw).unwrap();
        raw.extend_from_slice(b" \0");
        entry(2, 4).write(&mut raw).unwrap();
        raw.extend_from_slice(b"\0\0");
        // no extension, nested directory
        raw.extend_from_slice(b" \0maps/sub\0Makefile\0");
        entry(3, 4).write(&mut raw).unwrap();
        raw.extend_from_slice(b"\0\0\0");

        let tree = read_tree(&mut Cursor::new(&raw)).unwrap();
        let paths: Vec<_> = tree.paths().collect();
        assert_eq!(paths, vec!["readme.txt", ".txt", "maps/sub/Makefile"]);
        assert_eq!(tree.get("maps/sub/Makefile").unwrap().crc, 3);
    }

    #[test]
    fn preload_offset_points_past_terminator() {
        let mut e = entry(9, 0);
        e.preload_bytes = 3;
        let mut raw = b"bin\0d\0f\0".to_vec();
        e.write(&mut raw).unwrap();
        let after_record = raw.len() as u64;
        raw.extend_from_slice(b"abc\0\0\0");

        let tree = read_tree(&mut Cursor::new(&raw)).unwrap();
        let parsed = tree.get("d/f.bin").unwrap();
        assert_eq!(parsed.preload_offset, Some(after_record));
        assert_eq!(parsed.preload_bytes, 3);
    }

    #[test]
    fn bad_terminator_fails_parse() {
        let mut raw = b"txt\0 \0a\0".to_vec();
        entry(1, 1).write(&mut raw).unwrap();
        let n = raw.len();
        raw[n - 1] = 0x00;
        raw.extend_from_slice(b"\0\0\0");
        assert!(matches!(
            read_tree(&mut Cursor::new(&raw)),
            Err(Error::Format(FormatError::InvalidTerminator { .. }))
        ));
    }

    #[test]
    fn truncated_tree_is_io_error() {
        let raw = b"txt\0 \0rea".to_vec();
        assert!(matches!(read_tree(&mut Cursor::new(&raw)), Err(Error::Io(_))));
    }

    #[test]
    fn writer_groups_by_extension_and_directory() {
        let mut w = TreeWriter::new();
        w.add("a/x.txt", entry(1, 1), Vec::new()).unwrap();
        w.add("b/y.dat", entry(2, 1), Vec::new()).unwrap();
        w.add("a/z.txt", entry(3, 1), Vec::new()).unwrap();
        let bytes = w.to_bytes().unwrap();

        let mut expected = b"txt\0a\0x\0".to_vec();
        entry(1, 1).write(&mut expected).unwrap();
        expected.extend_from_slice(b"z\0");
        entry(3, 1).write(&mut expected).unwrap();
        expected.extend_from_slice(b"\0\0dat\0b\0y\0");
        entry(2, 1).write(&mut expected).unwrap();
        expected.extend_from_slice(b"\0\0\0");
        assert_eq!(bytes, expected);

        let tree = read_tree(&mut Cursor::new(&bytes)).unwrap();
        let paths: Vec<_> = tree.paths().collect();
        assert_eq!(paths, vec!["a/x.txt", "a/z.txt", "b/y.dat"]);
    }

    #[test]
    fn writer_rejects_preload_length_mismatch() {
        let mut e = entry(1, 0);
        e.preload_bytes = 4;
        assert!(TreeWriter::new().add("a.txt", e, vec![1, 2]).is_err());
    }

    #[test]
    fn duplicate_path_replaces_in_place() {
        let mut tree = FileTree::new();
        tree.insert("a".into(), entry(1, 1));
        tree.insert("b".into(), entry(2, 1));
        assert!(tree.insert("a".into(), entry(3, 1)).is_some());
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.paths().next(), Some("a"));
        assert_eq!(tree.get("a").unwrap().crc, 3);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn logical_path() -> impl Strategy<Value = String> {
            (
                prop::collection::vec("[a-z0-9_]{1,6}", 0..3),
                "[a-z0-9_]{0,6}",
                prop::option::of("[a-z]{1,4}"),
            )
                .prop_filter("path needs a name or extension", |(_, name, ext)| {
                    !name.is_empty() || ext.is_some()
                })
                .prop_map(|(dirs, name, ext)| {
                    let dir = dirs.join("/");
                    let base = match ext {
                        Some(e) => format!("{name}.{e}"),
                        None => name,
                    };
                    if dir.is_empty() { base } else { format!("{dir}/{base}") }
                })
        }

        proptest! {
            #[test]
            fn written_tree_reads_back(
                paths in prop::collection::btree_set(logical_path(), 1..40),
                crcs in prop::collection::vec(any::<u32>(), 40),
            ) {
                let mut w = TreeWriter::new();
                for (path, crc) in paths.iter().zip(&crcs) {
                    w.add(path, entry(*crc, 7), Vec::new()).unwrap();
                }
                let bytes = w.to_bytes().unwrap();
                let tree = read_tree(&mut Cursor::new(&bytes)).unwrap();

                prop_assert_eq!(tree.len(), paths.len());
                for (path, crc) in paths.iter().zip(&crcs) {
                    let got = tree.get(path);
                    prop_assert!(got.is_some(), "missing {}", path);
                    prop_assert_eq!(got.unwrap().crc, *crc);
                }
            }
        }
    }
}
