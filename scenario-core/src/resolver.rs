//! File lookups for `file:` expressions, external steps and contract code

use crate::{CoreError, CoreResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maps logical file references found in scenarios to byte content
pub trait FileResolver: Send + Sync {
    /// Absolute or context-relative path for a logical reference
    fn resolve_path(&self, value: &str) -> PathBuf;

    /// Contents of the referenced file
    fn resolve_file_value(&self, value: &str) -> CoreResult<Vec<u8>>;

    /// A copy of this resolver whose relative paths start from `context`,
    /// the path of the scenario file being processed
    fn with_context(&self, context: &Path) -> Arc<dyn FileResolver>;
}

/// Resolves paths relative to the directory of the current scenario file.
///
/// Replacements let a test run redirect a logical reference (usually a
/// contract binary) to different content without editing the scenario.
#[derive(Debug, Clone, Default)]
pub struct DefaultFileResolver {
    context_dir: PathBuf,
    replacements: HashMap<String, PathBuf>,
    in_memory: HashMap<String, Vec<u8>>,
}

impl DefaultFileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver whose relative paths start next to `scenario_path`
    pub fn for_scenario(scenario_path: &Path) -> Self {
        Self {
            context_dir: context_dir_of(scenario_path),
            ..Self::default()
        }
    }

    /// Serve `actual` whenever `logical` is requested
    pub fn replace_file(mut self, logical: impl Into<String>, actual: impl Into<PathBuf>) -> Self {
        self.replacements.insert(logical.into(), actual.into());
        self
    }

    /// Serve fixed bytes whenever `logical` is requested
    pub fn with_contents(mut self, logical: impl Into<String>, contents: Vec<u8>) -> Self {
        self.in_memory.insert(logical.into(), contents);
        self
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }
}

fn context_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::new(),
    }
}

impl FileResolver for DefaultFileResolver {
    fn resolve_path(&self, value: &str) -> PathBuf {
        if let Some(replacement) = self.replacements.get(value) {
            return replacement.clone();
        }
        let path = Path::new(value);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.context_dir.join(path)
        }
    }

    fn resolve_file_value(&self, value: &str) -> CoreResult<Vec<u8>> {
        if let Some(contents) = self.in_memory.get(value) {
            return Ok(contents.clone());
        }
        let path = self.resolve_path(value);
        std::fs::read(&path).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn with_context(&self, context: &Path) -> Arc<dyn FileResolver> {
        let mut clone = self.clone();
        clone.context_dir = context_dir_of(context);
        Arc::new(clone)
    }
}
