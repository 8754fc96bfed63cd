//! Exclude glob normalization and matching.

use crate::error::{IndexError, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Normalize an exclude pattern for matching against root-relative paths.
///
/// Rules:
/// - Leading slashes and `./` are stripped (relative matching)
/// - Trailing slashes are stripped (`drafts/` excludes the directory)
/// - Patterns without a path separator get a `**/` prefix
pub fn normalize_glob_pattern(raw: &str) -> String {
    let mut pattern = raw.trim();
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    let pattern = pattern.trim_start_matches('/').trim_end_matches('/');

    if pattern.is_empty() {
        return String::new();
    }
    if !pattern.contains('/') && !pattern.starts_with("**") {
        return format!("**/{}", pattern);
    }
    pattern.to_string()
}

/// Compiled exclude patterns, matched case-insensitively.
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    set: GlobSet,
}

impl ExcludeMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for raw in patterns {
            let raw = raw.as_ref();
            let normalized = normalize_glob_pattern(raw);
            if normalized.is_empty() {
                continue;
            }
            builder.add(build_glob(raw, &normalized)?);
            // `dir/**` also excludes `dir` itself so the walker can prune it
            if let Some(base) = normalized.strip_suffix("/**") {
                if !base.is_empty() && base != "**" {
                    builder.add(build_glob(raw, base)?);
                }
            }
        }
        let set = builder.build().map_err(|e| IndexError::Pattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            message: e.to_string(),
        })?;
        Ok(Self { set })
    }

    /// Match a root-relative path written with `/` separators.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        !self.set.is_empty() && self.set.is_match(relative_path.trim_start_matches('/'))
    }
}

fn build_glob(raw: &str, pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map_err(|e| IndexError::Pattern {
            pattern: raw.to_string(),
            message: e.kind().to_string(),
        })
}
