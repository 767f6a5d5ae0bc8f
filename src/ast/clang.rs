//! clang `-ast-dump=json` loader.
//!
//! Produce a dump with
//! `clang++ -Xclang -ast-dump=json -fsyntax-only -I<dirs> -x c++ model.h > model.h.ast.json`.
//!
//! Only namespaces, records, fields and access specifiers survive lowering;
//! everything declared in `std` or in an included file is dropped.
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};

use super::{Aggregate, Decl, LineRange, Visibility};
use crate::path_de::{PathError, from_slice_with_path, from_str_with_path};

const TRANSLATION_UNIT: &str = "TranslationUnitDecl";
const NAMESPACE: &str = "NamespaceDecl";
const RECORD: &str = "CXXRecordDecl";
const FIELD: &str = "FieldDecl";
const ACCESS: &str = "AccessSpecDecl";

// -------------------------------- Model ---------------------------------- //

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub loc: Option<Loc>,
    #[serde(default)]
    pub range: Option<Range>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inner: Vec<Node>,
    /// `struct` / `class` / `union` for records.
    #[serde(default)]
    pub tag_used: String,
    #[serde(rename = "type", default)]
    pub ty: Option<QualType>,
    /// `public` / `protected` / `private` for access specifiers.
    #[serde(default)]
    pub access: String,
    #[serde(default)]
    pub is_implicit: bool,
}

/// clang elides `file` and `line` when they repeat the previously printed
/// location, so both are optional here and resolved by [`LocCursor`].
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loc {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<usize>,
    #[serde(default)]
    pub included_from: Option<IncludedFrom>,
    /// Present instead of the plain fields for locations inside macro expansions.
    #[serde(default)]
    pub spelling_loc: Option<Box<Loc>>,
    #[serde(default)]
    pub expansion_loc: Option<Box<Loc>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct IncludedFrom {
    #[serde(default)]
    pub file: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Range {
    #[serde(default)]
    pub begin: Loc,
    #[serde(default)]
    pub end: Loc,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualType {
    #[serde(default)]
    pub qual_type: String,
    /// Fully qualified spelling; preferred when present.
    #[serde(default)]
    pub desugared_qual_type: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse clang AST dump {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: PathError,
    },
    #[error("clang AST dump {} has root `{kind}`, expected `{TRANSLATION_UNIT}`", path.display())]
    NotTranslationUnit { path: PathBuf, kind: String },
}

// -------------------------------- Load ----------------------------------- //

/// Read and lower a dump file.
pub fn load(path: &Path) -> Result<Decl, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    let root = from_slice_with_path::<Node>(&bytes)
        .map_err(|source| LoadError::Json { path: path.to_path_buf(), source })?;
    lower_root(path, &root)
}

/// Lower a dump held in memory; `origin` is only used in error messages.
pub fn from_str(origin: &Path, src: &str) -> Result<Decl, LoadError> {
    let root = from_str_with_path::<Node>(src)
        .map_err(|source| LoadError::Json { path: origin.to_path_buf(), source })?;
    lower_root(origin, &root)
}

fn lower_root(origin: &Path, root: &Node) -> Result<Decl, LoadError> {
    if root.kind != TRANSLATION_UNIT {
        return Err(LoadError::NotTranslationUnit { path: origin.to_path_buf(), kind: root.kind.clone() });
    }
    let decl = lower(root);
    debug!(dump = %origin.display(), "lowered clang AST dump");
    Ok(decl)
}

/// Lower a translation unit node into the filtered declaration tree.
pub fn lower(root: &Node) -> Decl {
    let mut cursor = LocCursor::default();
    lower_node(root, &mut cursor, false).unwrap_or(Decl::Unit { children: Vec::new() })
}

// ------------------------------- Lowering -------------------------------- //

/// Where the last printed location was. Every node is visited in dump order,
/// kept or not, so elided lines resolve to what clang meant.
#[derive(Debug, Default)]
struct LocCursor {
    line: usize,
    included: bool,
}

impl LocCursor {
    /// Advance past `loc`, returning the resolved line.
    fn visit(&mut self, loc: &Loc) -> usize {
        if loc.spelling_loc.is_some() || loc.expansion_loc.is_some() {
            if let Some(spelling) = &loc.spelling_loc {
                self.visit(spelling);
            }
            if let Some(expansion) = &loc.expansion_loc {
                return self.visit(expansion);
            }
            return self.line;
        }
        if loc.file.is_some() {
            self.included = loc.included_from.is_some();
        }
        if let Some(line) = loc.line {
            self.line = line;
        }
        self.line
    }
}

/// Lines covered by a node: (name line, range begin, range end), resolved.
fn visit_locations(node: &Node, cursor: &mut LocCursor) -> (usize, usize, usize, bool) {
    let at = node.loc.as_ref().map(|loc| cursor.visit(loc)).unwrap_or(cursor.line);
    let included = cursor.included;
    let (begin, end) = match &node.range {
        Some(range) => (cursor.visit(&range.begin), cursor.visit(&range.end)),
        None => (at, at),
    };
    (at, begin, end, included)
}

fn lower_children(node: &Node, cursor: &mut LocCursor, skip: bool) -> Vec<Decl> {
    node.inner
        .iter()
        .filter_map(|child| lower_node(child, cursor, skip))
        .collect()
}

/// `skip` is set below a dropped subtree: locations are still visited so the
/// cursor stays in sync, but nothing is kept.
fn lower_node(node: &Node, cursor: &mut LocCursor, skip: bool) -> Option<Decl> {
    let (at, begin, end, included) = visit_locations(node, cursor);
    match node.kind.as_str() {
        TRANSLATION_UNIT => {
            let children = lower_children(node, cursor, skip);
            (!skip).then_some(Decl::Unit { children })
        }
        NAMESPACE => {
            let drop = skip || node.name.is_empty() || node.name == "std" || included;
            let children = lower_children(node, cursor, drop);
            if drop || children.is_empty() {
                trace!(namespace = %node.name, "dropping namespace");
                return None;
            }
            Some(Decl::Namespace { name: node.name.clone(), children })
        }
        RECORD => {
            let drop = skip || node.name.is_empty() || node.is_implicit || included;
            let children = lower_children(node, cursor, drop);
            if drop || children.is_empty() {
                return None;
            }
            Some(Decl::Record {
                name: node.name.clone(),
                aggregate: Aggregate::from_tag(&node.tag_used),
                lines: LineRange::new(begin.min(at), end),
                children,
            })
        }
        FIELD => {
            lower_children(node, cursor, true);
            if skip || node.name.is_empty() {
                return None;
            }
            let Some(ty) = &node.ty else {
                trace!(field = %node.name, "field without a type");
                return None;
            };
            let signature = match &ty.desugared_qual_type {
                Some(desugared) if !desugared.is_empty() => desugared.clone(),
                _ => ty.qual_type.clone(),
            };
            Some(Decl::Field { name: node.name.clone(), signature, line: at })
        }
        ACCESS => {
            lower_children(node, cursor, true);
            if skip {
                return None;
            }
            Visibility::from_access(&node.access).map(Decl::Access)
        }
        _ => {
            lower_children(node, cursor, true);
            None
        }
    }
}

// -------------------------------- Tests ---------------------------------- //
