//! Snapshot data model: prompts, folders and the structure built from them.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single prompt document discovered by the walker.
///
/// Records are never mutated after a scan; a changed file yields a new
/// record in the next snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFile {
    /// File stem (name without extension)
    pub name: String,
    /// Title from the header, first heading, or the humanized file name
    pub title: String,
    /// Absolute path, unique within one snapshot
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Trimmed, deduplicated tags in first-seen order
    #[serde(default)]
    pub tags: IndexSet<String>,
    /// Size in bytes
    pub file_size: u64,
    /// Always false; present so consumers can mix prompts and folders in one tree
    #[serde(default)]
    pub is_directory: bool,
}

/// Prompts whose immediate parent is one directory under the root.
///
/// Folders are not nested objects. Nested directories produce sibling
/// entries, see [`PromptStructure::child_folders`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFolder {
    /// Leaf directory name
    pub name: String,
    /// Absolute directory path
    pub path: PathBuf,
    /// Sorted by title
    pub prompts: Vec<PromptFile>,
}

impl PromptFolder {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            prompts: Vec::new(),
        }
    }

    /// Directory containing this folder.
    pub fn parent_path(&self) -> Option<&Path> {
        self.path.parent()
    }
}

/// One complete index build: folders plus the prompts directly under the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptStructure {
    /// Sorted by name
    pub folders: Vec<PromptFolder>,
    /// Sorted by title
    pub root_prompts: Vec<PromptFile>,
}

impl PromptStructure {
    /// The canonical empty structure.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when there are neither folders nor root prompts.
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.root_prompts.is_empty()
    }

    /// Total number of prompts across the root and all folders.
    pub fn prompt_count(&self) -> usize {
        self.root_prompts.len() + self.folders.iter().map(|f| f.prompts.len()).sum::<usize>()
    }

    /// Every prompt in the snapshot: root prompts first, then folder by folder.
    pub fn all_prompts(&self) -> impl Iterator<Item = &PromptFile> {
        self.root_prompts
            .iter()
            .chain(self.folders.iter().flat_map(|f| f.prompts.iter()))
    }

    pub fn find_prompt(&self, path: &Path) -> Option<&PromptFile> {
        self.all_prompts().find(|p| p.path == path)
    }

    pub fn find_folder(&self, path: &Path) -> Option<&PromptFolder> {
        self.folders.iter().find(|f| f.path == path)
    }

    /// Folders whose parent directory is `parent`, in snapshot order.
    ///
    /// Passing the index root yields the top-level folders.
    pub fn child_folders<'a>(&'a self, parent: &'a Path) -> impl Iterator<Item = &'a PromptFolder> {
        self.folders
            .iter()
            .filter(move |f| f.parent_path() == Some(parent))
    }
}
