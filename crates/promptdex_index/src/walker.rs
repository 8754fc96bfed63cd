//! Filesystem walker: turns matching files under a root into [`PromptFile`] records.
//!
//! # Design
//!
//! - Directory traversal is iterative and goes through the [`FileAccess`] port
//! - A failed directory listing aborts the whole walk (the caller gets `Err`)
//! - A failed file read or stat only drops that file
//! - File reads run concurrently, bounded by `read_concurrency`

use crate::config::{ScanOptions, EXCLUDED_STEM};
use crate::error::{IndexError, Result};
use crate::fs::FileAccess;
use crate::parser::parse_document;
use crate::patterns::ExcludeMatcher;
use crate::types::PromptFile;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Scan options with the exclude globs compiled once.
#[derive(Debug, Clone)]
pub struct ScanScope {
    options: ScanOptions,
    excludes: ExcludeMatcher,
}

impl ScanScope {
    /// Fails when an exclude pattern is not a valid glob.
    pub fn new(options: ScanOptions) -> Result<Self> {
        let excludes = ExcludeMatcher::new(&options.exclude_patterns)?;
        Ok(Self { options, excludes })
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    fn accepts_dir(&self, name: &str, relative: &str) -> bool {
        !self.options.is_hidden(name) && !self.excludes.is_excluded(relative)
    }

    fn accepts_file(&self, name: &str, relative: &str) -> bool {
        if self.options.is_hidden(name) || !self.options.matches_extension(name) {
            return false;
        }
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        stem != EXCLUDED_STEM && !self.excludes.is_excluded(relative)
    }
}

/// Paths visible under a root for one scope.
#[derive(Debug, Default)]
pub struct TreeListing {
    /// Candidate prompt files
    pub files: Vec<PathBuf>,
    /// Every directory below the root that the walk entered or could enter
    pub dirs: Vec<PathBuf>,
}

/// List the tree under `root` without reading any file.
///
/// The root itself must exist; a listing error anywhere is returned as-is.
pub async fn list_tree(
    fs: &dyn FileAccess,
    root: &Path,
    scope: &ScanScope,
) -> Result<TreeListing> {
    let mut listing = TreeListing::default();
    let mut pending: Vec<(PathBuf, String, usize)> = vec![(root.to_path_buf(), String::new(), 0)];

    while let Some((dir, relative, depth)) = pending.pop() {
        let entries = fs
            .list_directory(&dir)
            .await
            .map_err(|e| IndexError::io(&dir, e))?;

        for entry in entries {
            let child_relative = if relative.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", relative, entry.name)
            };

            if entry.is_dir() {
                if depth >= scope.options.max_depth
                    || !scope.accepts_dir(&entry.name, &child_relative)
                {
                    continue;
                }
                let child = dir.join(&entry.name);
                listing.dirs.push(child.clone());
                pending.push((child, child_relative, depth + 1));
            } else if entry.is_file() && scope.accepts_file(&entry.name, &child_relative) {
                listing.files.push(dir.join(&entry.name));
            }
        }
    }

    Ok(listing)
}

/// Scan `root` and return one record per readable matching file.
///
/// Returns an empty list when `root` does not exist. Record order is
/// unspecified.
pub async fn scan(
    fs: &dyn FileAccess,
    root: &Path,
    scope: &ScanScope,
    read_concurrency: usize,
) -> Result<Vec<PromptFile>> {
    if !fs.exists(root).await {
        debug!(root = %root.display(), "Scan root does not exist");
        return Ok(Vec::new());
    }
    scan_existing(fs, root, scope, read_concurrency).await
}

/// [`scan`] for a root the caller has already seen to exist.
pub(crate) async fn scan_existing(
    fs: &dyn FileAccess,
    root: &Path,
    scope: &ScanScope,
    read_concurrency: usize,
) -> Result<Vec<PromptFile>> {
    let listing = list_tree(fs, root, scope).await?;
    let candidates = listing.files.len();

    let records: Vec<PromptFile> = stream::iter(listing.files)
        .map(|path| async move {
            match read_prompt(fs, &path).await {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable prompt");
                    None
                }
            }
        })
        .buffer_unordered(read_concurrency.max(1))
        .filter_map(|record| async move { record })
        .collect()
        .await;

    debug!(
        root = %root.display(),
        candidates,
        indexed = records.len(),
        "Scan finished"
    );
    Ok(records)
}

/// Read and parse one prompt file.
pub async fn read_prompt(fs: &dyn FileAccess, path: &Path) -> Result<PromptFile> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let content = fs
        .read_to_string(path)
        .await
        .map_err(|e| IndexError::io(path, e))?;
    let file_size = fs
        .file_size(path)
        .await
        .map_err(|e| IndexError::io(path, e))?;

    let parsed = parse_document(&content, &name);
    Ok(PromptFile {
        name,
        title: parsed.title,
        path: path.to_path_buf(),
        description: parsed.description,
        tags: parsed.tags,
        file_size,
        is_directory: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFileAccess;

    fn scope(options: ScanOptions) -> ScanScope {
        ScanScope::new(options).unwrap()
    }

    fn names(records: &[PromptFile]) -> Vec<String> {
        let mut names: Vec<String> = records.iter().map(|r| r.name.clone()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let fs = MemoryFileAccess::new();
        let records = scan(&fs, Path::new("/nope"), &scope(ScanOptions::default()), 4)
            .await
            .unwrap();
        assert!(records.is_empty());
        assert_eq!(fs.counts().listings, 0);
    }

    #[tokio::test]
    async fn test_filters_extension_hidden_readme_and_excludes() {
        let fs = MemoryFileAccess::new();
        fs.add_file("/p/keep.md", "# Keep");
        fs.add_file("/p/notes.txt", "text");
        fs.add_file("/p/README.md", "readme");
        fs.add_file("/p/sub/readme.MD", "readme");
        fs.add_file("/p/.hidden.md", "hidden");
        fs.add_file("/p/.git/config.md", "hidden dir");
        fs.add_file("/p/archive/old.md", "old");
        fs.add_file("/p/sub/idea.draft.md", "draft");
        fs.add_file("/p/sub/real.md", "real");

        let options = ScanOptions {
            exclude_patterns: vec!["archive/**".to_string(), "*.draft.md".to_string()],
            ..ScanOptions::default()
        };
        let records = scan(&fs, Path::new("/p"), &scope(options), 4).await.unwrap();
        assert_eq!(names(&records), vec!["keep", "real"]);
    }

    #[tokio::test]
    async fn test_include_hidden() {
        let fs = MemoryFileAccess::new();
        fs.add_file("/p/.hidden.md", "hidden");
        fs.add_file("/p/.dir/inner.md", "inner");
        let options = ScanOptions {
            include_hidden: true,
            ..ScanOptions::default()
        };
        let records = scan(&fs, Path::new("/p"), &scope(options), 4).await.unwrap();
        assert_eq!(names(&records), vec![".hidden", "inner"]);
    }

    #[tokio::test]
    async fn test_max_depth() {
        let fs = MemoryFileAccess::new();
        fs.add_file("/p/d0.md", "");
        fs.add_file("/p/a/d1.md", "");
        fs.add_file("/p/a/b/d2.md", "");

        let shallow = ScanOptions {
            max_depth: 1,
            ..ScanOptions::default()
        };
        let records = scan(&fs, Path::new("/p"), &scope(shallow), 4).await.unwrap();
        assert_eq!(names(&records), vec!["d0", "d1"]);

        let root_only = ScanOptions {
            max_depth: 0,
            ..ScanOptions::default()
        };
        let records = scan(&fs, Path::new("/p"), &scope(root_only), 4).await.unwrap();
        assert_eq!(names(&records), vec!["d0"]);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let fs = MemoryFileAccess::new();
        fs.add_file("/p/good.md", "---\ntitle: Good\ntags: a, b\n---\n");
        fs.add_file("/p/bad.md", "bad");
        fs.fail_reads("/p/bad.md");

        let records = scan(&fs, Path::new("/p"), &scope(ScanOptions::default()), 4)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let good = &records[0];
        assert_eq!(good.title, "Good");
        assert_eq!(good.path, PathBuf::from("/p/good.md"));
        assert_eq!(good.file_size, 31);
        assert!(!good.is_directory);
        assert_eq!(good.tags.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_scan() {
        let fs = MemoryFileAccess::new();
        fs.add_file("/p/ok.md", "ok");
        fs.add_file("/p/locked/x.md", "x");
        fs.fail_listing("/p/locked");

        let err = scan(&fs, Path::new("/p"), &scope(ScanOptions::default()), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Io { ref path, .. } if path == Path::new("/p/locked")));
    }

    #[tokio::test]
    async fn test_list_tree_reports_directories() {
        let fs = MemoryFileAccess::new();
        fs.add_file("/p/a/x.md", "");
        fs.add_dir("/p/a/empty");
        fs.add_dir("/p/.hidden");

        let listing = list_tree(&fs, Path::new("/p"), &scope(ScanOptions::default()))
            .await
            .unwrap();
        let mut dirs = listing.dirs.clone();
        dirs.sort();
        assert_eq!(dirs, vec![PathBuf::from("/p/a"), PathBuf::from("/p/a/empty")]);
        assert_eq!(listing.files, vec![PathBuf::from("/p/a/x.md")]);
    }
}
