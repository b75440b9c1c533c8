//! Paths into a materialized document.
//!
//! A [`Path`] is a sequence of map keys and list indices starting at the
//! root map. Paths are positional: list indices are resolved against the
//! snapshot a path is used with, so a path taken from an old snapshot can go
//! stale once concurrent edits land.
//!
//! ```
//! use accord::{doc::Segment, path};
//!
//! let path = path!["birds", 0, "species"];
//! assert_eq!(path.len(), 3);
//! assert_eq!(path.last(), Some(&Segment::Key("species".to_string())));
//! assert_eq!(path.to_string(), "birds[0].species");
//! ```

use std::fmt;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::Key(key)
    }
}

impl From<&String> for Segment {
    fn from(key: &String) -> Self {
        Segment::Key(key.clone())
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A location in a document, relative to the root map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The root map.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Extend the path by one segment.
    pub fn push(mut self, segment: impl Into<Segment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// A new path with `segment` appended.
    pub fn join(&self, segment: impl Into<Segment>) -> Self {
        self.clone().push(segment)
    }

    /// Split into the parent path and the final segment.
    pub fn split_last(&self) -> Option<(Path, &Segment)> {
        let (last, parent) = self.segments.split_last()?;
        Some((Path::from_segments(parent.to_vec()), last))
    }

    /// The path made of the first `len` segments.
    pub fn prefix(&self, len: usize) -> Path {
        Path::from_segments(self.segments[..len.min(self.segments.len())].to_vec())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i > 0 => write!(f, ".{key}")?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(key: &str) -> Self {
        Path::root().push(key)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

/// Build a [`Path`] from keys and indices.
///
/// String-like arguments become map keys, `usize` arguments list indices.
#[macro_export]
macro_rules! path {
    () => {
        $crate::doc::Path::root()
    };
    ($($segment:expr),+ $(,)?) => {
        $crate::doc::Path::from_segments(vec![$($crate::doc::Segment::from($segment)),+])
    };
}
