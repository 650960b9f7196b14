//! Locations inside nested values.
//!
//! A [`Path`] is built outward: an error raised deep inside a structure starts
//! with an empty path and every composite level it passes through prepends its
//! own segment.
use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "[{key:?}]"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self { Segment::Key(key.to_string()) }
}

impl From<String> for Segment {
    fn from(key: String) -> Self { Segment::Key(key) }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self { Segment::Index(index) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn root() -> Self { Self::default() }

    pub fn from_segments<I>(segments: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Segment>,
    {
        Path(segments.into_iter().map(Into::into).collect())
    }

    pub fn is_root(&self) -> bool { self.0.is_empty() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn segments(&self) -> &[Segment] { &self.0 }

    pub fn first(&self) -> Option<&Segment> { self.0.first() }

    /// New path with `segment` in front of the existing ones.
    pub fn prepended(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(segment.into());
        segments.extend(self.0.iter().cloned());
        Path(segments)
    }

    /// New path with `segment` appended.
    pub fn appended(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Path(segments)
    }

    pub fn concat(&self, other: &Path) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Path(segments)
    }

    /// RFC 6901 rendering (`/a/0`), empty string at the root.
    pub fn to_json_pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push('/');
            match segment {
                Segment::Key(key) => out.push_str(&key.replace('~', "~0").replace('/', "~1")),
                Segment::Index(index) => out.push_str(&index.to_string()),
            }
        }
        out
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for segment in &self.0 {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_root_and_nested_paths() {
        assert_eq!(Path::root().to_string(), "root");
        let path = Path::root().prepended(0usize).prepended("items");
        assert_eq!(path.to_string(), r#"["items"][0]"#);
        assert_eq!(path.to_json_pointer(), "/items/0");
    }

    #[test]
    fn prepending_leaves_the_original_untouched() {
        let inner = Path::from_segments(["b"]);
        let outer = inner.prepended("a");
        assert_eq!(inner.len(), 1);
        assert_eq!(outer, Path::from_segments(["a", "b"]));
    }

    #[test]
    fn escapes_pointer_tokens() {
        let path = Path::from_segments(["a/b", "c~d"]);
        assert_eq!(path.to_json_pointer(), "/a~1b/c~0d");
    }
}
