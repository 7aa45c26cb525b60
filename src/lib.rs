pub mod error;
pub mod header;
pub mod entry;
pub mod tree;
pub mod resolve;
pub mod reader;
pub mod scan;
pub mod builder;

pub use error::{Error, FormatError, IntegrityError, Result};
pub use header::Header;
pub use entry::DirectoryEntry;
pub use tree::{FileTree, TreeWriter};
pub use reader::ArchiveReader;
pub use builder::{ArchiveBuilder, BuildFileRecord};
pub use scan::SourceFile;
