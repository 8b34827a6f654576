//! Path filtering using .gitignore-style patterns
//!
//! Architecture: Service Layer - PathFilter decides which workspace files enter analysis
//! - Encapsulates the rules for include/exclude pattern evaluation
//! - Handles `.boundaryignore` file discovery and parsing
//! - Extension gating keeps non-module assets out of the graph

use crate::domain::violations::{BoundaryError, BoundaryResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Manages path filtering using .gitignore-style patterns
#[derive(Debug, Clone)]
pub struct PathFilter {
    /// Include/exclude patterns in declaration order
    patterns: Vec<FilterPattern>,
    /// Extensions treated as module files
    extensions: Vec<String>,
    /// Whether to process ignore files while walking
    process_ignore_files: bool,
    /// Name of ignore files to process
    ignore_filename: String,
}

/// A single path filter pattern
#[derive(Debug, Clone)]
struct FilterPattern {
    /// The glob pattern
    pattern: glob::Pattern,
    /// Whether this is an include pattern (declared with a `!` prefix)
    is_include: bool,
    /// Original pattern string
    original: String,
}

impl FilterPattern {
    fn parse(raw: &str) -> BoundaryResult<Self> {
        let (is_include, pattern_str) = match raw.strip_prefix('!') {
            Some(stripped) => (true, stripped.to_string()),
            None => (false, raw.to_string()),
        };

        let pattern = glob::Pattern::new(&pattern_str).map_err(|e| {
            BoundaryError::config(format!("Invalid path pattern '{pattern_str}': {e}"))
        })?;

        Ok(Self { pattern, is_include, original: pattern_str })
    }

    /// Match using .gitignore-style rules: slash-containing patterns match the
    /// full relative path, bare patterns match the file name
    fn matches(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/");

        if self.original.contains('/') {
            self.pattern.matches(&path_str)
        } else if let Some(filename) = path.file_name() {
            self.pattern.matches(&filename.to_string_lossy())
        } else {
            false
        }
    }
}

impl PathFilter {
    /// Create a new path filter with the given patterns and extensions
    pub fn new(
        patterns: Vec<String>,
        extensions: Vec<String>,
        ignore_filename: Option<String>,
    ) -> BoundaryResult<Self> {
        let patterns =
            patterns.iter().map(|p| FilterPattern::parse(p)).collect::<BoundaryResult<Vec<_>>>()?;

        Ok(Self {
            patterns,
            extensions,
            process_ignore_files: ignore_filename.is_some(),
            ignore_filename: ignore_filename.unwrap_or_else(|| ".boundaryignore".to_string()),
        })
    }

    /// Add a pattern to the filter
    pub fn add_pattern(&mut self, pattern: &str) -> BoundaryResult<()> {
        self.patterns.push(FilterPattern::parse(pattern)?);
        Ok(())
    }

    /// Whether a workspace-relative file path should enter analysis
    pub fn should_analyze(&self, workspace_root: &Path, relative: &Path) -> BoundaryResult<bool> {
        let has_module_extension = relative
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|known| known == ext))
            .unwrap_or(false);
        if !has_module_extension {
            return Ok(false);
        }

        // Apply patterns in order, last match wins (like .gitignore)
        let mut should_include = true;
        for pattern in &self.patterns {
            if pattern.matches(relative) {
                should_include = pattern.is_include;
            }
        }
        if !should_include {
            return Ok(false);
        }

        if self.process_ignore_files && self.is_ignored_by_files(workspace_root, relative)? {
            return Ok(false);
        }

        Ok(true)
    }

    /// Check ignore files from the workspace root down to the file's directory
    fn is_ignored_by_files(&self, workspace_root: &Path, relative: &Path) -> BoundaryResult<bool> {
        let mut is_ignored = false;
        let mut dirs = vec![PathBuf::new()];
        if let Some(parent) = relative.parent() {
            let mut acc = PathBuf::new();
            for component in parent.components() {
                acc.push(component);
                dirs.push(acc.clone());
            }
        }

        for dir in dirs {
            let ignore_file = workspace_root.join(&dir).join(&self.ignore_filename);
            if !ignore_file.exists() {
                continue;
            }

            let patterns = self.load_ignore_file(&ignore_file)?;
            if let Ok(below) = relative.strip_prefix(&dir) {
                for pattern in patterns {
                    if pattern.matches(below) {
                        is_ignored = !pattern.is_include;
                    }
                }
            }
        }

        Ok(is_ignored)
    }

    /// Load patterns from a .boundaryignore file
    fn load_ignore_file(&self, path: &Path) -> BoundaryResult<Vec<FilterPattern>> {
        let content = fs::read_to_string(path).map_err(|e| {
            BoundaryError::config(format!(
                "Failed to read ignore file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut patterns = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match FilterPattern::parse(line) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => {
                    // Invalid lines are skipped, not fatal
                    tracing::warn!("Skipping pattern in {}: {}", path.display(), e);
                }
            }
        }

        Ok(patterns)
    }

    /// Walk a workspace root and return the relative paths of all module files
    /// that pass the filter, in deterministic order
    pub fn find_module_files(&self, root: &Path) -> BoundaryResult<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.should_analyze(root, relative)? {
                files.push(relative.to_path_buf());
            }
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn filter(patterns: &[&str]) -> PathFilter {
        PathFilter::new(
            patterns.iter().map(|s| s.to_string()).collect(),
            vec!["ts".to_string(), "tsx".to_string()],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_extension_gate() {
        let f = filter(&[]);
        let root = Path::new("/ws");
        assert!(f.should_analyze(root, Path::new("ui/Modal.ts")).unwrap());
        assert!(!f.should_analyze(root, Path::new("ui/Modal.css")).unwrap());
        assert!(!f.should_analyze(root, Path::new("README")).unwrap());
    }

    #[test]
    fn test_exclude_then_include() {
        let f = filter(&["**/generated/**", "!**/generated/keep.ts"]);
        let root = Path::new("/ws");
        assert!(!f.should_analyze(root, Path::new("ui/generated/Modal.ts")).unwrap());
        assert!(f.should_analyze(root, Path::new("ui/generated/keep.ts")).unwrap());
    }

    #[test]
    fn test_bare_pattern_matches_filename() {
        let f = filter(&["*.test.ts"]);
        let root = Path::new("/ws");
        assert!(!f.should_analyze(root, Path::new("deep/nested/Modal.test.ts")).unwrap());
        assert!(f.should_analyze(root, Path::new("deep/nested/Modal.ts")).unwrap());
    }

    #[test]
    fn test_find_module_files_is_sorted() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("util")).unwrap();
        fs::create_dir_all(root.join("entities/order")).unwrap();
        fs::write(root.join("util/b.ts"), "").unwrap();
        fs::write(root.join("util/a.ts"), "").unwrap();
        fs::write(root.join("entities/order/index.ts"), "").unwrap();
        fs::write(root.join("notes.md"), "").unwrap();

        let files = filter(&[]).find_module_files(root).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.to_string_lossy().replace('\\', "/")).collect();
        assert_eq!(names, vec!["entities/order/index.ts", "util/a.ts", "util/b.ts"]);
    }

    #[test]
    fn test_boundaryignore_file() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("ui")).unwrap();
        fs::write(root.join("ui/Modal.ts"), "").unwrap();
        fs::write(root.join("ui/Legacy.ts"), "").unwrap();
        fs::write(root.join("ui/.boundaryignore"), "Legacy.ts\n").unwrap();

        let f = PathFilter::new(
            vec![],
            vec!["ts".to_string()],
            Some(".boundaryignore".to_string()),
        )
        .unwrap();

        assert!(f.should_analyze(root, Path::new("ui/Modal.ts")).unwrap());
        assert!(!f.should_analyze(root, Path::new("ui/Legacy.ts")).unwrap());
    }
}
