//! File access port consumed by the walker and organizer.
//!
//! The index never touches `std::fs` directly. Everything goes through
//! [`FileAccess`] so hosts can supply virtual filesystems and tests can count
//! or fail individual calls.

use async_trait::async_trait;
use std::io;
use std::path::Path;

/// What a directory entry is, as reported by the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Asynchronous filesystem primitives.
#[async_trait]
pub trait FileAccess: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;

    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    async fn file_size(&self, path: &Path) -> io::Result<u64>;

    async fn list_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
}

/// [`FileAccess`] backed by the local disk through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileAccess;

#[async_trait]
impl FileAccess for LocalFileAccess {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn list_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            // Follows symlinks so linked prompt folders are indexed like real ones
            let kind = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_dir() => EntryKind::Directory,
                Ok(meta) if meta.is_file() => EntryKind::File,
                Ok(_) => EntryKind::Other,
                // Dangling symlink
                Err(_) => EntryKind::Other,
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        Ok(entries)
    }
}
