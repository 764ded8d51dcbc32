/*!
 * Path/Filter Engine (C1): normalized paths, glob matching, depth/type
 * filtering.
 *
 * Patterns are compiled once at construction (`glob::Pattern`, precompiled,
 * never recompiled per entry) and evaluated as first-match-wins rules. This
 * engine exposes a single-glob-plus-ignore-list surface: no include/exclude
 * rule lists, no regex, no rule-file DSL.
 */

use glob::Pattern as GlobPattern;
use std::path::Path;
use thiserror::Error;

use crate::config::{FileType, FilterConfig};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// A compiled, reusable predicate built from a `FilterConfig`.
pub struct EntryFilter {
    file_type: FileType,
    max_depth: Option<usize>,
    glob_pattern: Option<CompiledGlob>,
    follow_symlinks: bool,
    ignore_patterns: Vec<GlobPattern>,
}

struct CompiledGlob {
    pattern: GlobPattern,
    /// Whether the source pattern contained `/`: if so it matches the
    /// relative path, otherwise just the basename.
    matches_relative_path: bool,
}

impl EntryFilter {
    pub fn compile(config: &FilterConfig) -> Result<Self, FilterError> {
        let glob_pattern = match &config.glob_pattern {
            Some(raw) => {
                let pattern = GlobPattern::new(raw).map_err(|source| FilterError::InvalidGlob {
                    pattern: raw.clone(),
                    source,
                })?;
                Some(CompiledGlob {
                    pattern,
                    matches_relative_path: raw.contains('/'),
                })
            }
            None => None,
        };

        let mut ignore_patterns = Vec::with_capacity(config.ignore_patterns.len());
        for raw in &config.ignore_patterns {
            let pattern =
                GlobPattern::new(raw).map_err(|source| FilterError::InvalidGlob {
                    pattern: raw.clone(),
                    source,
                })?;
            ignore_patterns.push(pattern);
        }

        Ok(Self {
            file_type: config.file_type,
            max_depth: config.max_depth,
            glob_pattern,
            follow_symlinks: config.follow_symlinks,
            ignore_patterns,
        })
    }

    pub fn follow_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    /// Pushdown check: can this depth even be considered, regardless of the
    /// entry found there? Lets C2 avoid descending into subdirectories past
    /// `max_depth` without reading their contents.
    pub fn depth_in_range(&self, depth: usize) -> bool {
        match self.max_depth {
            Some(max) => depth <= max,
            None => true,
        }
    }

    /// Full predicate over an already-read entry.
    pub fn matches(
        &self,
        relative_path: &Path,
        depth: usize,
        is_file: bool,
        is_dir: bool,
    ) -> bool {
        if !self.depth_in_range(depth) {
            return false;
        }

        match self.file_type {
            FileType::Any => {}
            FileType::File if is_file => {}
            FileType::Dir if is_dir => {}
            _ => return false,
        }

        if let Some(basename) = relative_path.file_name().and_then(|n| n.to_str()) {
            if self.ignore_patterns.iter().any(|p| p.matches(basename)) {
                return false;
            }
        }

        if let Some(glob) = &self.glob_pattern {
            let matched = if glob.matches_relative_path {
                relative_path
                    .to_str()
                    .map(|s| glob.pattern.matches(s))
                    .unwrap_or(false)
            } else {
                relative_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| glob.pattern.matches(s))
                    .unwrap_or(false)
            };
            if !matched {
                return false;
            }
        }

        true
    }
}
