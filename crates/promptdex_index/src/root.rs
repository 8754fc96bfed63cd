//! Resolution of the directory an index covers.

use std::path::PathBuf;

/// Supplies the current prompt root, or `None` when there is none yet
/// (for example before a workspace is opened).
///
/// Resolved on every build, so the root may change between builds.
pub trait RootResolver: Send + Sync {
    fn resolve(&self) -> Option<PathBuf>;
}

/// A root that never changes.
#[derive(Debug, Clone, Default)]
pub struct FixedRoot(Option<PathBuf>);

impl FixedRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(Some(root.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl RootResolver for FixedRoot {
    fn resolve(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}

impl<F> RootResolver for F
where
    F: Fn() -> Option<PathBuf> + Send + Sync,
{
    fn resolve(&self) -> Option<PathBuf> {
        self()
    }
}
