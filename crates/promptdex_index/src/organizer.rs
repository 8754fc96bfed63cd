//! Groups scanned prompts into root prompts and per-directory folders.

use crate::error::{IndexError, Result};
use crate::fs::FileAccess;
use crate::types::{PromptFile, PromptFolder, PromptStructure};
use crate::walker::{list_tree, ScanScope};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Locale-aware name order, total over distinct strings.
///
/// Names compare by their accent- and case-folded text first, so "éclair"
/// sorts between "eagle" and "zebra". Ties fall back to the lowercase
/// spelling (unaccented first), then put the lowercase spelling first.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| b.cmp(a))
}

/// NFD-decomposed, combining marks stripped, lowercased.
fn collation_key(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn compare_prompts(a: &PromptFile, b: &PromptFile) -> Ordering {
    compare_names(&a.title, &b.title).then_with(|| a.path.cmp(&b.path))
}

fn compare_folders(a: &PromptFolder, b: &PromptFolder) -> Ordering {
    compare_names(&a.name, &b.name).then_with(|| a.path.cmp(&b.path))
}

/// Build a [`PromptStructure`] from walker records.
///
/// Every distinct root-relative directory becomes its own folder, and
/// directories without any matching prompt are added as empty folders by a
/// second listing pass. A record outside `root` is rejected.
pub async fn organize(
    records: Vec<PromptFile>,
    root: &Path,
    fs: &dyn FileAccess,
    scope: &ScanScope,
) -> Result<PromptStructure> {
    let mut structure = group_records(records, root)?;

    let listing = list_tree(fs, root, scope).await?;
    let mut known: BTreeSet<PathBuf> = structure.folders.iter().map(|f| f.path.clone()).collect();
    for dir in listing.dirs {
        if known.insert(dir.clone()) {
            let name = leaf_name(&dir);
            structure.folders.push(PromptFolder::new(name, dir));
        }
    }

    structure.folders.sort_by(compare_folders);
    Ok(structure)
}

/// Group records by their parent directory without touching the filesystem.
///
/// Folders are returned in no particular order; prompts inside each group
/// and the root prompts are sorted by title.
pub fn group_records(records: Vec<PromptFile>, root: &Path) -> Result<PromptStructure> {
    let mut root_prompts = Vec::new();
    let mut folders: BTreeMap<PathBuf, PromptFolder> = BTreeMap::new();

    for record in records {
        let relative = record
            .path
            .strip_prefix(root)
            .map_err(|_| IndexError::OutsideRoot {
                path: record.path.clone(),
                root: root.to_path_buf(),
            })?;
        let relative_dir = relative.parent().unwrap_or_else(|| Path::new(""));

        if relative_dir.as_os_str().is_empty() {
            root_prompts.push(record);
            continue;
        }

        let folder_path = root.join(relative_dir);
        folders
            .entry(relative_dir.to_path_buf())
            .or_insert_with(|| PromptFolder::new(leaf_name(&folder_path), folder_path))
            .prompts
            .push(record);
    }

    root_prompts.sort_by(compare_prompts);
    let folders = folders
        .into_values()
        .map(|mut folder| {
            folder.prompts.sort_by(compare_prompts);
            folder
        })
        .collect();

    Ok(PromptStructure {
        folders,
        root_prompts,
    })
}

fn leaf_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
