//! Glob-based exclusion matching for files and directories

use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};

/// Matches paths against a set of glob patterns (`*`, `?`, `[set]`).
///
/// A path is excluded when any pattern matches either the file name or any
/// path component walking upward from the file. Patterns apply to single
/// components, so `**` carries no recursive meaning here.
pub struct ExcludeMatcher {
    matchers: Vec<GlobMatcher>,
}

impl ExcludeMatcher {
    /// Compile the given patterns. Invalid patterns are logged and match
    /// nothing.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matchers = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match GlobBuilder::new(pattern).literal_separator(false).build() {
                Ok(glob) => matchers.push(glob.compile_matcher()),
                Err(e) => {
                    tracing::warn!("invalid exclude pattern {:?}: {}", pattern, e);
                }
            }
        }
        ExcludeMatcher { matchers }
    }

    /// True when the path or any of its components matches a pattern.
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.matchers.is_empty() {
            return false;
        }
        for component in path.components() {
            let name = component.as_os_str();
            if self.matchers.iter().any(|m| m.is_match(name)) {
                return true;
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Default for ExcludeMatcher {
    fn default() -> Self {
        ExcludeMatcher {
            matchers: Vec::new(),
        }
    }
}
