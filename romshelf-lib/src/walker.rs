//! Recursive library traversal with glob-based ignore rules.
//!
//! Ignore patterns are matched against the path relative to the walk root,
//! `/`-separated. `*` stays inside one path segment and `**` spans segments.
//! A `**` that shares a segment with other text is rewritten before
//! compiling: a leading one becomes its own segment (`**.bak` matches like
//! `**/*.bak`) and any other collapses to `*` (`a**b` matches like `a*b`).
//! Ignored directories are pruned, so nothing below them is ever read.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::{DirEntry, WalkDir};

use crate::error::WalkError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A restartable, depth-first file walker.
///
/// Holds no traversal state itself: every call to [`walk`](Self::walk) starts
/// a fresh pass over the tree.
#[derive(Debug, Clone)]
pub struct Walker {
    root: PathBuf,
    ignore: Vec<IgnoreRule>,
}

#[derive(Debug, Clone)]
struct IgnoreRule {
    pattern: Pattern,
    /// For `dir/**` patterns, matches `dir` itself so the directory is pruned.
    dir_prefix: Option<Pattern>,
}

impl IgnoreRule {
    fn new(raw: &str) -> Result<Self, WalkError> {
        let compile = |p: &str| {
            Pattern::new(p).map_err(|source| WalkError::Pattern {
                pattern: raw.to_string(),
                source,
            })
        };
        let stripped = raw.trim_start_matches("./");
        let trimmed = normalize_globstar(stripped);
        if trimmed != stripped {
            log::debug!("Ignore pattern {} treated as {}", raw, trimmed);
        }
        let dir_prefix = match trimmed.strip_suffix("/**") {
            Some(prefix) if !prefix.is_empty() => Some(compile(prefix)?),
            _ => None,
        };
        Ok(Self {
            pattern: compile(&trimmed)?,
            dir_prefix,
        })
    }

    fn matches(&self, rel: &str, is_dir: bool) -> bool {
        if self.pattern.matches_with(rel, MATCH_OPTIONS) {
            return true;
        }
        is_dir
            && self
                .dir_prefix
                .as_ref()
                .is_some_and(|p| p.matches_with(rel, MATCH_OPTIONS))
    }
}

/// Split a `**` out of any segment it shares with other text.
fn normalize_globstar(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| {
            if segment == "**" || !segment.contains("**") {
                return segment.to_string();
            }
            let mut collapsed = String::with_capacity(segment.len());
            for c in segment.chars() {
                if c == '*' && collapsed.ends_with('*') {
                    continue;
                }
                collapsed.push(c);
            }
            if segment.starts_with("**") {
                format!("**/{collapsed}")
            } else {
                collapsed
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl Walker {
    /// Build a walker for `root`, compiling every ignore pattern up front.
    ///
    /// The root is made absolute so yielded paths are absolute too.
    pub fn new<S: AsRef<str>>(root: &Path, ignore: &[S]) -> Result<Self, WalkError> {
        let root = std::path::absolute(root)?;
        let ignore = ignore
            .iter()
            .map(|p| IgnoreRule::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { root, ignore })
    }

    /// Lazily yield the absolute path of every regular file under the root.
    ///
    /// Entries are visited in file-name order within each directory. A
    /// consumer may stop early without paying for the rest of the tree.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, WalkError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| !self.is_ignored(entry))
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                Ok(_) => None,
                Err(e) => Some(Err(WalkError::from(e))),
            })
    }

    /// `path` relative to the root, `/`-separated.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    fn is_ignored(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || self.ignore.is_empty() {
            return false;
        }
        let Some(rel) = self.relative(entry.path()) else {
            return false;
        };
        let is_dir = entry.file_type().is_dir();
        let ignored = self.ignore.iter().any(|rule| rule.matches(&rel, is_dir));
        if ignored && is_dir {
            log::debug!("Pruning ignored directory {}", rel);
        }
        ignored
    }
}

#[cfg(test)]
#[path = "tests/walker_tests.rs"]
mod tests;
