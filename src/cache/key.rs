//! Cache key derivation.

use std::fmt;

/// Identifier of a cache entry, derived from the request path alone.
///
/// Path separators become `_` so the key is usable as a single file name.
/// Method, query string and headers never take part: `/data` and
/// `/data?x=1` share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_path(path: &str) -> Self {
        if path.is_empty() {
            return Self("_".to_string());
        }
        Self(
            path.chars()
                .map(|c| if c == '/' || c == '\\' { '_' } else { c })
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
