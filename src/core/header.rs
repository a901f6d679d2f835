//! Header identities and their PCH roles.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Identity of a resolved header.
///
/// Stored with forward slashes so identities compare equal across platforms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderId(String);

impl HeaderId {
    /// Create a header identity from a path-like string.
    pub fn new(id: impl AsRef<str>) -> Self {
        HeaderId(id.as_ref().replace('\\', "/"))
    }

    /// Create a header identity from a filesystem path.
    pub fn from_path(path: &Path) -> Self {
        HeaderId::new(path.to_string_lossy())
    }

    /// The identity as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity as a path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Check whether `pattern` names this header by its trailing path components.
    ///
    /// `stable.h` matches `/proj/include/stable.h` but not `/proj/unstable.h`.
    pub fn matches(&self, pattern: &str) -> bool {
        let pattern = pattern.replace('\\', "/");
        self.0 == pattern || self.as_path().ends_with(Path::new(&pattern))
    }
}

impl fmt::Display for HeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HeaderId {
    fn from(s: &str) -> Self {
        HeaderId::new(s)
    }
}

/// Role of a header with respect to the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderRole {
    /// Compiled into the precompiled artifact; must precede the boundary.
    Stable,
    /// Recompiled every build; must follow the boundary.
    Unstable,
    /// Not under PCH management; ignored for ordering.
    Neutral,
}

impl HeaderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderRole::Stable => "stable",
            HeaderRole::Unstable => "unstable",
            HeaderRole::Neutral => "neutral",
        }
    }
}

impl fmt::Display for HeaderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-header role classification supplied by the build configuration.
///
/// Keys are header names or path suffixes; lookups fall back to
/// [`HeaderRole::Neutral`]. When several keys match, the longest one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMap {
    roles: BTreeMap<String, HeaderRole>,
}

impl RoleMap {
    /// Create an empty role map.
    pub fn new() -> Self {
        RoleMap::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, pattern: impl Into<String>, role: HeaderRole) -> Self {
        self.insert(pattern, role);
        self
    }

    /// Classify a header name or suffix.
    pub fn insert(&mut self, pattern: impl Into<String>, role: HeaderRole) {
        self.roles.insert(pattern.into().replace('\\', "/"), role);
    }

    /// Look up the role of a resolved header.
    pub fn role_of(&self, header: &HeaderId) -> HeaderRole {
        if let Some(role) = self.roles.get(header.as_str()) {
            return *role;
        }

        self.roles
            .iter()
            .filter(|(pattern, _)| header.matches(pattern))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, role)| *role)
            .unwrap_or(HeaderRole::Neutral)
    }

    /// Number of classified patterns.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Iterate over configured patterns.
    pub fn iter(&self) -> impl Iterator<Item = (&str, HeaderRole)> {
        self.roles.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_matches_suffix() {
        let h = HeaderId::new("/proj/include/stable.h");
        assert!(h.matches("stable.h"));
        assert!(h.matches("include/stable.h"));
        assert!(!h.matches("able.h"));
        assert!(!h.matches("unstable.h"));
    }

    #[test]
    fn test_header_normalizes_separators() {
        let h = HeaderId::new(r"C:\proj\stable.h");
        assert_eq!(h.as_str(), "C:/proj/stable.h");
        assert!(h.matches("stable.h"));
    }

    #[test]
    fn test_role_lookup() {
        let roles = RoleMap::new()
            .with("another.h", HeaderRole::Stable)
            .with("unstable.h", HeaderRole::Unstable);

        assert_eq!(
            roles.role_of(&HeaderId::new("/p/another.h")),
            HeaderRole::Stable
        );
        assert_eq!(
            roles.role_of(&HeaderId::new("/p/unstable.h")),
            HeaderRole::Unstable
        );
        assert_eq!(roles.role_of(&HeaderId::new("/usr/include/stdio.h")), HeaderRole::Neutral);
    }

    #[test]
    fn test_role_longest_pattern_wins() {
        let roles = RoleMap::new()
            .with("config.h", HeaderRole::Stable)
            .with("gen/config.h", HeaderRole::Unstable);

        assert_eq!(
            roles.role_of(&HeaderId::new("/p/gen/config.h")),
            HeaderRole::Unstable
        );
        assert_eq!(
            roles.role_of(&HeaderId::new("/p/src/config.h")),
            HeaderRole::Stable
        );
    }
}
