//! Type-signature parser.
//!
//! Turns a fully-qualified, template-instantiated C++ type spelling (as clang
//! prints it in `qualType` / `desugaredQualType`) into a [`TypeNode`] tree.
//!
//! - Whitespace is normalized first, then brackets are matched in one stack
//!   pass; the recursive descent only ever looks up the matching `>` for a `<`.
//! - Canonical names are re-rendered from the children, never copied from the
//!   input, so `std::vector<int, std::allocator<int> >` and `std::vector<int>`
//!   end up with the same name.
use std::collections::{HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

// ------------------------------ Spellings -------------------------------- //

/// Public spelling of the text type. Every alias below is renamed to this.
pub const TEXT: &str = "std::string";

static PRIMITIVES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bool",
        "char",
        "signed char",
        "unsigned char",
        "short",
        "unsigned short",
        "int",
        "unsigned int",
        "long",
        "unsigned long",
        "long long",
        "unsigned long long",
        "float",
        "double",
        "long double",
    ]
    .into_iter()
    .collect()
});

const TEXT_ALIASES: &[&str] = &[TEXT, "std::__cxx11::string"];

/// Template spellings of `std::string`; only the `char` instantiation is text.
const BASIC_STRINGS: &[&str] = &["std::basic_string", "std::__cxx11::basic_string"];

const SEQUENCES: &[&str] = &["std::vector"];

const ASSOCIATIVES: &[&str] = &["std::map", "std::unordered_map"];

// -------------------------------- Types ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive,
    Text,
    /// One child: the element type.
    Sequence,
    /// Two children: key type, value type.
    Associative,
    /// A user declared record, possibly with template arguments.
    Record,
    RawPointer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNode {
    /// Canonical name; the dedup key for code generation.
    pub name: String,
    pub kind: TypeKind,
    pub children: Vec<TypeNode>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("empty type signature")]
    Empty,
    #[error("unmatched '{bracket}' at offset {offset} in `{signature}`")]
    Unbalanced {
        signature: String,
        bracket: char,
        offset: usize,
    },
    #[error("empty type argument at offset {offset} in `{signature}`")]
    EmptyArgument { signature: String, offset: usize },
    #[error("template arguments without a template name at offset {offset} in `{signature}`")]
    MissingTemplateName { signature: String, offset: usize },
    #[error("`{container}` expects at least {expected} type argument(s), got {actual}")]
    Arity {
        container: String,
        expected: usize,
        actual: usize,
    },
}

// ------------------------------- TypeNode -------------------------------- //

impl TypeNode {
    pub fn leaf(name: impl Into<String>, kind: TypeKind) -> Self {
        Self { name: name.into(), kind, children: Vec::new() }
    }

    /// A reference to a declared record by qualified name.
    pub fn record(name: impl Into<String>) -> Self {
        Self::leaf(name, TypeKind::Record)
    }

    /// Element type of a `Sequence`.
    pub fn element(&self) -> Option<&TypeNode> {
        match (self.kind, self.children.as_slice()) {
            (TypeKind::Sequence, [elem]) => Some(elem),
            _ => None,
        }
    }

    /// Key and value types of an `Associative`.
    pub fn key_value(&self) -> Option<(&TypeNode, &TypeNode)> {
        match (self.kind, self.children.as_slice()) {
            (TypeKind::Associative, [key, value]) => Some((key, value)),
            _ => None,
        }
    }

    /// Names of every record this type refers to, outermost first.
    /// Template arguments of a record node are not descended into.
    pub fn record_names(&self) -> Vec<&str> {
        fn walk<'a>(node: &'a TypeNode, out: &mut Vec<&'a str>) {
            match node.kind {
                TypeKind::Record => out.push(&node.name),
                TypeKind::Sequence | TypeKind::Associative => {
                    for child in &node.children {
                        walk(child, out);
                    }
                }
                _ => {}
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// -------------------------------- Parse ---------------------------------- //

/// Parse a fully-qualified type signature.
pub fn parse(signature: &str) -> Result<TypeNode, SignatureError> {
    let src = normalize_whitespace(signature);
    if src.is_empty() {
        return Err(SignatureError::Empty);
    }
    let closing = match_brackets(&src)?;
    let parser = Parser { src: &src, closing };
    parser.parse_span(0, src.len())
}

/// Collapse whitespace runs to one space and drop the spaces around
/// `<`, `>` and `,`. Multi-word names (`unsigned long`) keep their space.
fn normalize_whitespace(signature: &str) -> String {
    let mut out = String::with_capacity(signature.len());
    let mut pending_space = false;
    for c in signature.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space && !matches!(c, '<' | '>' | ',') && !out.ends_with(['<', '>', ',']) {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Map every `<` offset to the offset of its matching `>`.
fn match_brackets(src: &str) -> Result<HashMap<usize, usize>, SignatureError> {
    let mut open = Vec::new();
    let mut closing = HashMap::new();
    for (offset, byte) in src.bytes().enumerate() {
        match byte {
            b'<' => open.push(offset),
            b'>' => match open.pop() {
                Some(start) => {
                    closing.insert(start, offset);
                }
                None => {
                    return Err(SignatureError::Unbalanced {
                        signature: src.to_string(),
                        bracket: '>',
                        offset,
                    });
                }
            },
            _ => {}
        }
    }
    match open.pop() {
        Some(offset) => Err(SignatureError::Unbalanced {
            signature: src.to_string(),
            bracket: '<',
            offset,
        }),
        None => Ok(closing),
    }
}

struct Parser<'a> {
    src: &'a str,
    closing: HashMap<usize, usize>,
}

impl Parser<'_> {
    /// Matching `>` for the `<` at `open`. Total once `match_brackets` succeeded.
    fn close_of(&self, open: usize) -> usize {
        self.closing[&open]
    }

    fn parse_span(&self, begin: usize, end: usize) -> Result<TypeNode, SignatureError> {
        let span = &self.src[begin..end];
        if span.is_empty() {
            return Err(SignatureError::EmptyArgument { signature: self.src.to_string(), offset: begin });
        }
        // `std::vector<int> *` is a pointer, whatever it points at.
        if span.ends_with('*') {
            return Ok(TypeNode::leaf(span, TypeKind::RawPointer));
        }
        let Some(rel) = span.find('<') else {
            return Ok(classify_leaf(span));
        };
        let open = begin + rel;
        let close = self.close_of(open);
        if close + 1 != end {
            return self.parse_nested_name(begin, end);
        }
        let prefix = &self.src[begin..open];
        if prefix.is_empty() {
            return Err(SignatureError::MissingTemplateName { signature: self.src.to_string(), offset: begin });
        }
        let args = self.parse_args(open, close)?;
        classify_container(prefix, args)
    }

    fn parse_args(&self, open: usize, close: usize) -> Result<Vec<TypeNode>, SignatureError> {
        self.split_args(open + 1, close)
            .into_iter()
            .map(|(b, e)| self.parse_span(b, e))
            .collect()
    }

    /// A name that continues after a template argument list, such as
    /// `Outer<int>::Inner`. Every argument list is parsed and re-rendered; the
    /// whole name is an opaque record.
    fn parse_nested_name(&self, begin: usize, end: usize) -> Result<TypeNode, SignatureError> {
        let mut name = String::new();
        let mut at = begin;
        while let Some(rel) = self.src[at..end].find('<') {
            let open = at + rel;
            // `A<int><bool>`: an argument list with nothing to name it
            if open == at {
                return Err(SignatureError::MissingTemplateName { signature: self.src.to_string(), offset: at });
            }
            let close = self.close_of(open);
            let args = self.parse_args(open, close)?;
            name.push_str(&self.src[at..open]);
            name.push_str(&render("", &args));
            at = close + 1;
        }
        name.push_str(&self.src[at..end]);
        Ok(TypeNode::record(name))
    }

    /// Split `begin..end` at top-level commas, jumping over nested `<...>`.
    fn split_args(&self, begin: usize, end: usize) -> Vec<(usize, usize)> {
        let bytes = self.src.as_bytes();
        let mut spans = Vec::new();
        let mut start = begin;
        let mut i = begin;
        while i < end {
            match bytes[i] {
                b'<' => i = self.close_of(i) + 1,
                b',' => {
                    spans.push((start, i));
                    start = i + 1;
                    i += 1;
                }
                _ => i += 1,
            }
        }
        spans.push((start, end));
        spans
    }
}

fn classify_leaf(name: &str) -> TypeNode {
    if PRIMITIVES.contains(name) {
        TypeNode::leaf(name, TypeKind::Primitive)
    } else if TEXT_ALIASES.contains(&name) {
        TypeNode::leaf(TEXT, TypeKind::Text)
    } else {
        TypeNode::record(name)
    }
}

fn classify_container(prefix: &str, mut args: Vec<TypeNode>) -> Result<TypeNode, SignatureError> {
    let arity = |expected: usize, actual: usize| SignatureError::Arity {
        container: prefix.to_string(),
        expected,
        actual,
    };

    if SEQUENCES.contains(&prefix) {
        // allocator arguments of the desugared spelling are dropped
        if args.is_empty() {
            return Err(arity(1, 0));
        }
        args.truncate(1);
        return Ok(TypeNode { name: render(prefix, &args), kind: TypeKind::Sequence, children: args });
    }
    if ASSOCIATIVES.contains(&prefix) {
        if args.len() < 2 {
            return Err(arity(2, args.len()));
        }
        args.truncate(2);
        return Ok(TypeNode { name: render(prefix, &args), kind: TypeKind::Associative, children: args });
    }
    if BASIC_STRINGS.contains(&prefix) && args.first().is_some_and(|a| a.name == "char") {
        return Ok(TypeNode::leaf(TEXT, TypeKind::Text));
    }
    Ok(TypeNode { name: render(prefix, &args), kind: TypeKind::Record, children: args })
}

fn render(prefix: &str, args: &[TypeNode]) -> String {
    let args = args.iter().map(|a| a.name.as_str()).collect::<Vec<_>>();
    format!("{prefix}<{}>", args.join(", "))
}

// -------------------------------- Tests ---------------------------------- //
