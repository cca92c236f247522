//! Hierarchical configuration key paths.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A key path into a nested configuration tree, e.g. `geometric->row_list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Creates an empty (root) path.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Creates a path from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a dotted path such as `"echo381.x_range"`.
    #[must_use]
    pub fn parse_dotted(dotted: &str) -> Self {
        Self::new(
            dotted
                .split('.')
                .map(str::trim)
                .filter(|segment| !segment.is_empty()),
        )
    }

    /// Returns a new path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the final segment, if any.
    #[must_use]
    pub fn leaf_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        f.write_str(&self.segments.join("->"))
    }
}

impl From<&[&str]> for KeyPath {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for KeyPath {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_arrows() {
        let path = KeyPath::from(["geometric", "rectangle_row_range"]);
        assert_eq!(path.to_string(), "geometric->rectangle_row_range");
        assert_eq!(KeyPath::root().to_string(), "<root>");
    }

    #[test]
    fn test_parse_dotted() {
        let path = KeyPath::parse_dotted("echo381. x_range");
        assert_eq!(path, KeyPath::from(["echo381", "x_range"]));
        assert_eq!(path.leaf_name(), Some("x_range"));
        assert!(KeyPath::parse_dotted("").is_empty());
    }

    #[test]
    fn test_child_does_not_mutate_parent() {
        let parent = KeyPath::from(["filter"]);
        let child = parent.child("top_count");
        assert_eq!(parent.len(), 1);
        assert_eq!(child.len(), 2);
    }
}
