pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use local::LocalVault;
pub use memory::{IoStats, MemoryVault};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// Cheap metadata about an entry. `modified` is an opaque, monotonic stamp;
/// together with `size` it is what the metadata cache validates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub kind: EntryKind,
    pub size: u64,
    pub modified: u128,
}

impl EntryMeta {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// A directory entry returned by [`Vault::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Normalized vault path.
    pub path: String,
    pub kind: EntryKind,
}

/// File operations the host provides.
///
/// All paths are vault-relative and normalized by the caller. Every call is
/// a suspension point; nothing is cancellable once issued.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Metadata for a path, or `None` if nothing exists there.
    async fn stat(&self, path: &str) -> Result<Option<EntryMeta>>;

    /// Immediate children of a folder.
    async fn list(&self, dir: &str) -> Result<Vec<Entry>>;

    /// Create a folder (and missing parents). Succeeds if it already exists.
    async fn create_folder(&self, path: &str) -> Result<()>;

    /// Create a new text file. Fails if anything exists at `path`.
    async fn create(&self, path: &str, content: &str) -> Result<()>;

    /// Overwrite an existing text file.
    async fn modify(&self, path: &str, content: &str) -> Result<()>;

    /// Full content read.
    async fn read(&self, path: &str) -> Result<String>;

    /// Move an entry. Fails if `to` is occupied.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Move an entry to the recoverable trash.
    async fn trash(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.stat(path).await?.is_some())
    }
}
