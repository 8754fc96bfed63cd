//! In-memory [`FileAccess`] for hosts with virtual documents and for tests.
//!
//! Counts every call and can inject failures per path.

use crate::fs::{DirEntry, EntryKind, FileAccess};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Node {
    File(String),
    Directory,
}

/// Snapshot of the call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounts {
    pub exists: usize,
    pub reads: usize,
    pub stats: usize,
    pub listings: usize,
}

impl IoCounts {
    pub fn total(&self) -> usize {
        self.exists + self.reads + self.stats + self.listings
    }
}

#[derive(Default)]
struct Faults {
    unreadable: HashSet<PathBuf>,
    unlistable: HashSet<PathBuf>,
}

/// A filesystem tree held in memory.
#[derive(Default)]
pub struct MemoryFileAccess {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    faults: Mutex<Faults>,
    latency: Mutex<Option<Duration>>,
    exists_calls: AtomicUsize,
    read_calls: AtomicUsize,
    stat_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MemoryFileAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref();
        let mut nodes = lock(&self.nodes);
        insert_parents(&mut nodes, path);
        nodes.insert(path.to_path_buf(), Node::File(content.into()));
    }

    /// Add a directory and its parents.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut nodes = lock(&self.nodes);
        insert_parents(&mut nodes, path);
        nodes.insert(path.to_path_buf(), Node::Directory);
    }

    /// Remove a file or a directory together with everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        lock(&self.nodes).retain(|p, _| !p.starts_with(path));
    }

    /// Make reads of `path` fail with `PermissionDenied`.
    pub fn fail_reads(&self, path: impl Into<PathBuf>) {
        lock(&self.faults).unreadable.insert(path.into());
    }

    /// Make listings of `path` fail with `PermissionDenied`.
    pub fn fail_listing(&self, path: impl Into<PathBuf>) {
        lock(&self.faults).unlistable.insert(path.into());
    }

    pub fn clear_faults(&self) {
        let mut faults = lock(&self.faults);
        faults.unreadable.clear();
        faults.unlistable.clear();
    }

    /// Delay every call by `latency` (on the tokio clock).
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    pub fn counts(&self) -> IoCounts {
        IoCounts {
            exists: self.exists_calls.load(Ordering::SeqCst),
            reads: self.read_calls.load(Ordering::SeqCst),
            stats: self.stat_calls.load(Ordering::SeqCst),
            listings: self.list_calls.load(Ordering::SeqCst),
        }
    }

    async fn simulate_latency(&self) {
        let latency = *lock(&self.latency);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
    }

    fn file_content(&self, path: &Path) -> io::Result<String> {
        if lock(&self.faults).unreadable.contains(path) {
            return Err(permission_denied(path));
        }
        match lock(&self.nodes).get(path) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Directory) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }
}

#[async_trait]
impl FileAccess for MemoryFileAccess {
    async fn exists(&self, path: &Path) -> bool {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        lock(&self.nodes).contains_key(path)
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.file_content(path)
    }

    async fn file_size(&self, path: &Path) -> io::Result<u64> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.file_content(path).map(|c| c.len() as u64)
    }

    async fn list_directory(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if lock(&self.faults).unlistable.contains(path) {
            return Err(permission_denied(path));
        }

        let nodes = lock(&self.nodes);
        match nodes.get(path) {
            Some(Node::Directory) => {}
            Some(Node::File(_)) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is not a directory", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }

        Ok(nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .filter_map(|(p, node)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                let kind = match node {
                    Node::File(_) => EntryKind::File,
                    Node::Directory => EntryKind::Directory,
                };
                Some(DirEntry { name, kind })
            })
            .collect())
    }
}

fn insert_parents(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        nodes
            .entry(ancestor.to_path_buf())
            .or_insert(Node::Directory);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
}

fn permission_denied(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("{} is not accessible", path.display()),
    )
}
