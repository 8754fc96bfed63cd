//! Bridges filesystem notifications to debounced index invalidations.
//!
//! The watcher does no debouncing of its own: every relevant event calls
//! [`PromptIndex::invalidate`], and the index coalesces bursts into one rebuild.

use crate::config::ScanOptions;
use crate::error::Result;
use crate::manager::{PromptIndex, RefreshReason};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 1024;

/// Keeps a recursive watch on a prompt root alive.
///
/// Dropping the watcher stops both the OS watch and the forwarding task.
pub struct IndexWatcher {
    root: PathBuf,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl IndexWatcher {
    /// Watch `root` recursively and invalidate `index` on relevant changes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(index: PromptIndex, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let (tx, mut rx) = mpsc::channel::<Event>(CHANNEL_CAPACITY);
        let handler = event_forwarder(tx, root.clone(), index.scan_options().clone());

        let mut watcher = RecommendedWatcher::new(handler, notify::Config::default())?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                debug!(kind = ?event.kind, paths = ?event.paths, "Prompt tree changed");
                let _ = index.invalidate(RefreshReason::FileChange);
            }
        });

        debug!(root = %root.display(), "Watching prompt root");
        Ok(Self {
            root,
            _watcher: watcher,
            task,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for IndexWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Notify callback that queues only relevant events.
///
/// When the channel is full, a queued relevant event is still pending and
/// invalidates the index after the dropped change.
fn event_forwarder(
    tx: mpsc::Sender<Event>,
    root: PathBuf,
    options: ScanOptions,
) -> impl FnMut(std::result::Result<Event, notify::Error>) + Send + 'static {
    move |res| match res {
        Ok(event) => {
            if is_relevant(&event, &root, &options) {
                let _ = tx.try_send(event);
            }
        }
        Err(e) => warn!(error = %e, "Filesystem watcher error"),
    }
}

/// Whether `event` can change the structure of the index rooted at `root`.
///
/// Content and name changes of prompt files count, as do directory changes
/// (creating or removing a folder changes the folder list). Access and
/// metadata-only events do not.
pub fn is_relevant(event: &Event, root: &Path, options: &ScanOptions) -> bool {
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        EventKind::Modify(ModifyKind::Metadata(_)) => return false,
        EventKind::Modify(_) | EventKind::Any => {}
        EventKind::Access(_) | EventKind::Other => return false,
    }

    event.paths.iter().any(|path| {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        let hidden = relative.components().any(|c| match c {
            Component::Normal(name) => options.is_hidden(&name.to_string_lossy()),
            _ => false,
        });
        if hidden {
            return false;
        }
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // No extension: a directory, or something that may have been one
        options.matches_extension(&name) || relative.extension().is_none()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, MetadataKind, RemoveKind, RenameMode};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    fn relevant(kind: EventKind, path: &str) -> bool {
        is_relevant(&event(kind, path), Path::new("/p"), &ScanOptions::default())
    }

    #[test]
    fn test_prompt_changes_are_relevant() {
        assert!(relevant(EventKind::Create(CreateKind::File), "/p/a.md"));
        assert!(relevant(EventKind::Modify(ModifyKind::Name(RenameMode::Both)), "/p/sub/b.MD"));
        assert!(relevant(EventKind::Remove(RemoveKind::Folder), "/p/sub"));
    }

    #[test]
    fn test_forwarder_queues_only_relevant_events() {
        let (tx, mut rx) = mpsc::channel::<Event>(1);
        let mut forward = event_forwarder(tx, PathBuf::from("/p"), ScanOptions::default());

        for _ in 0..8 {
            forward(Ok(event(EventKind::Create(CreateKind::File), "/p/x.txt")));
            forward(Ok(event(EventKind::Access(AccessKind::Any), "/p/a.md")));
        }
        forward(Ok(event(EventKind::Create(CreateKind::File), "/p/new.md")));

        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.paths, vec![PathBuf::from("/p/new.md")]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_noise_is_ignored() {
        assert!(!relevant(EventKind::Create(CreateKind::File), "/p/a.txt"));
        assert!(!relevant(EventKind::Access(AccessKind::Any), "/p/a.md"));
        assert!(!relevant(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)), "/p/a.md"));
        assert!(!relevant(EventKind::Create(CreateKind::File), "/p/.git/x.md"));
        assert!(!relevant(EventKind::Create(CreateKind::File), "/other/a.md"));
    }
}
