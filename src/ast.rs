//! Filtered declaration tree.
//!
//! The only syntax the record extractor ever sees: translation units,
//! namespaces, record declarations, field declarations and access specifiers.
//! [`clang`] lowers a clang JSON AST dump into this shape.
pub mod clang;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// `struct` members default to public, `class` members to private.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Struct,
    Class,
}

/// Inclusive, 1-based source line range of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    Unit {
        children: Vec<Decl>,
    },
    Namespace {
        name: String,
        children: Vec<Decl>,
    },
    Record {
        name: String,
        aggregate: Aggregate,
        lines: LineRange,
        children: Vec<Decl>,
    },
    Field {
        name: String,
        /// Fully-qualified type spelling.
        signature: String,
        line: usize,
    },
    Access(Visibility),
}

impl Visibility {
    pub fn from_access(access: &str) -> Option<Self> {
        match access {
            "public" => Some(Self::Public),
            "protected" => Some(Self::Protected),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::Protected => "protected",
            Self::Private => "private",
        })
    }
}

impl Aggregate {
    /// clang's `tagUsed`. Unions behave like structs for member access.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "class" => Self::Class,
            _ => Self::Struct,
        }
    }

    pub fn default_visibility(self) -> Visibility {
        match self {
            Self::Struct => Visibility::Public,
            Self::Class => Visibility::Private,
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Struct => "struct",
            Self::Class => "class",
        })
    }
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start: start.min(end), end: start.max(end) }
    }

    pub fn contains(&self, line: usize) -> bool {
        self.start <= line && line <= self.end
    }

    /// Strictly inside `self` (and not the same range).
    pub fn encloses(&self, other: &LineRange) -> bool {
        self != other && self.start <= other.start && other.end <= self.end
    }
}
