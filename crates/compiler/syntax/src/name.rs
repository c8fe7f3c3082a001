//! Simple and fully-qualified names.

use std::fmt;

use smol_str::SmolStr;

/// A simple (single-segment) name.
pub type Name = SmolStr;

/// An immutable dot-separated hierarchical name.
///
/// The primary key for packages and top-level classes. Invariant:
/// `fq.child(name).parent() == Some(fq)`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FqName {
    segments: Vec<Name>,
}

impl FqName {
    /// The root package name (no segments).
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn from_segments(segments: Vec<Name>) -> Self {
        debug_assert!(segments.iter().all(|s| !s.is_empty() && !s.contains('.')));
        Self { segments }
    }

    /// Parses a dotted rendering; the empty string is the root.
    pub fn from_dotted(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::root();
        }
        Self {
            segments: dotted.split('.').map(Name::from).collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Name] {
        &self.segments
    }

    /// The last segment, `None` for the root.
    pub fn short_name(&self) -> Option<&Name> {
        self.segments.last()
    }

    pub fn child(&self, name: Name) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name);
        Self { segments }
    }

    /// The enclosing name, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// `self` and every ancestor, from the root downwards.
    pub fn path_from_root(&self) -> impl Iterator<Item = FqName> + '_ {
        (0..=self.segments.len()).map(|len| Self {
            segments: self.segments[..len].to_vec(),
        })
    }

    /// Dotted rendering; the root renders as the empty string.
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.to_dotted())
        }
    }
}

impl fmt::Debug for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FqName({self})")
    }
}
