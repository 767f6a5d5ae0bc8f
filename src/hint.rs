//! Hint resolution.
//!
//! A [`HintScanner`] finds raw hint payloads on source lines; this module
//! works out which field each hint belongs to, parses the payload into a
//! [`FieldHint`] and attaches it.
pub mod marker;

use std::path::PathBuf;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::error::GenError;
use crate::records::{FieldHint, Location, RecordTable};

pub use marker::AttributeMarker;

/// Payload tag: `json:"key"`.
pub const TAG: &str = "json";

const OMIT_EMPTY: &str = "omitempty";

/// Source lines per file, as handed to the resolver.
pub type Sources = IndexMap<PathBuf, Vec<String>>;

/// A hint marker found on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHint {
    /// Text between the marker's delimiters.
    pub payload: String,
    /// Byte offset just past the marker; the field declaration starts here.
    pub end: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("expected `(\"` after `{marker}` at column {column}")]
    MissingOpen { marker: &'static str, column: usize },
    #[error("expected `\")` to close `{marker}` at column {column}")]
    MissingClose { marker: &'static str, column: usize },
    #[error("hint payload is empty")]
    Empty,
}

/// Finds hint markers in a single source line.
pub trait HintScanner {
    fn scan(&self, line: &str) -> Result<Option<RawHint>, ScanError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("expected `{TAG}:` at the start of `{0}`")]
    MissingTag(String),
    #[error("unterminated quoted key in `{0}`")]
    Unterminated(String),
    #[error("empty key in `{0}`")]
    EmptyKey(String),
    #[error("key `{0}` may not contain '\"' or '\\'")]
    InvalidKey(String),
    #[error("unknown option `{0}`")]
    UnknownOption(String),
}

// ------------------------------- Payload --------------------------------- //

/// Parse `json:"key"`, `json:"key,omitempty"` or the bare `json:key` form.
pub fn parse_payload(payload: &str) -> Result<FieldHint, PayloadError> {
    let body = payload
        .trim()
        .strip_prefix(TAG)
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::trim)
        .ok_or_else(|| PayloadError::MissingTag(payload.to_string()))?;

    let body = match body.strip_prefix('"') {
        Some(quoted) => quoted
            .strip_suffix('"')
            .ok_or_else(|| PayloadError::Unterminated(payload.to_string()))?,
        None => body,
    };

    let mut parts = body.split(',');
    let key = parts.next().unwrap_or_default().trim();
    if key.is_empty() {
        return Err(PayloadError::EmptyKey(payload.to_string()));
    }
    if key.contains(['"', '\\']) {
        return Err(PayloadError::InvalidKey(key.to_string()));
    }

    let mut omit_empty = false;
    for option in parts.map(str::trim) {
        match option {
            OMIT_EMPTY => omit_empty = true,
            other => return Err(PayloadError::UnknownOption(other.to_string())),
        }
    }
    Ok(FieldHint { key: key.to_string(), omit_empty })
}

// ------------------------------- Resolve --------------------------------- //

/// Attach hints to the fields of every record in `table`.
///
/// Each record is scanned over its own line range, minus the ranges of
/// records nested inside it. A later hint for the same field replaces an
/// earlier one.
pub fn resolve<S: HintScanner>(mut table: RecordTable, sources: &Sources, scanner: &S) -> Result<RecordTable, GenError> {
    let plan = table
        .files()
        .map(|(file, names)| (file.to_path_buf(), names.to_vec()))
        .collect::<Vec<_>>();

    for (file, names) in plan {
        let lines = sources.get(&file).ok_or_else(|| GenError::MissingSource { file: file.clone() })?;
        let ranges = names
            .iter()
            .filter_map(|name| table.get(name).map(|r| (name.as_str(), r.lines)))
            .collect::<Vec<_>>();

        for &(name, range) in &ranges {
            let nested = ranges
                .iter()
                .filter(|(_, other)| range.encloses(other))
                .map(|(_, other)| *other)
                .collect::<Vec<_>>();

            for line_no in range.start..=range.end {
                if nested.iter().any(|n| n.contains(line_no)) {
                    continue;
                }
                let Some(text) = line_no.checked_sub(1).and_then(|i| lines.get(i)) else {
                    break;
                };
                let location = Location::new(&file, line_no);
                let hint_error = |reason: String| GenError::HintFormat {
                    location: location.clone(),
                    record: name.to_string(),
                    reason,
                };

                let Some(raw) = scanner.scan(text).map_err(|e| hint_error(e.to_string()))? else {
                    continue;
                };
                let field = field_after_hint(lines, line_no, raw.end, range.end)
                    .ok_or_else(|| hint_error(format!("no field declaration follows `{}`", raw.payload)))?;
                let hint = parse_payload(&raw.payload).map_err(|e| hint_error(e.to_string()))?;

                let record = table
                    .get_mut(name)
                    .ok_or_else(|| GenError::UnknownRecordType { name: name.to_string() })?;
                let Some(target) = record.field_mut(&field) else {
                    return Err(GenError::FieldNotFound { location, record: name.to_string(), field });
                };
                debug!(record = %name, field = %field, key = %hint.key, omit_empty = hint.omit_empty, "hint");
                target.hint = Some(hint);
            }
        }
    }
    Ok(table)
}

/// Name of the field a hint on `line_no` (1-based) annotates: the identifier
/// right before the next `;`, looking no further than `last_line`.
fn field_after_hint(lines: &[String], line_no: usize, column: usize, last_line: usize) -> Option<String> {
    let mut statement = String::new();
    let last = last_line.min(lines.len());
    for (offset, line) in lines.get(line_no - 1..last)?.iter().enumerate() {
        let text = if offset == 0 { line.get(column..).unwrap_or_default() } else { line.as_str() };
        match text.find(';') {
            Some(semi) => {
                statement.push_str(&text[..semi]);
                return declared_name(&statement);
            }
            None => {
                statement.push_str(text);
                statement.push(' ');
            }
        }
    }
    None
}

/// Trailing identifier of a declaration, ignoring any initializer.
fn declared_name(statement: &str) -> Option<String> {
    let declarator = statement.split(['=', '{']).next().unwrap_or_default().trim_end();
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let start = declarator.trim_end_matches(is_ident).len();
    let name = &declarator[start..];
    match name.chars().next() {
        Some(first) if !first.is_ascii_digit() => Some(name.to_string()),
        _ => None,
    }
}

/// Split a source file into the per-line form [`Sources`] holds.
pub fn source_lines(source: &str) -> Vec<String> {
    source.lines().map(str::to_string).collect()
}

// -------------------------------- Tests ---------------------------------- //

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::ast::{Aggregate, Decl, LineRange};
    use crate::extract::extract;

    #[test]
    fn payload_quoted_and_bare_forms() {
        assert_eq!(parse_payload(r#"json:"id""#).unwrap(), FieldHint { key: "id".into(), omit_empty: false });
        assert_eq!(parse_payload("json:id").unwrap(), FieldHint { key: "id".into(), omit_empty: false });
        assert_eq!(
            parse_payload(r#" json : "first name,omitempty" "#).unwrap(),
            FieldHint { key: "first name".into(), omit_empty: true }
        );
        assert_eq!(parse_payload("json:tags,omitempty").unwrap(), FieldHint { key: "tags".into(), omit_empty: true });
    }

    #[test]
    fn payload_errors() {
        assert!(matches!(parse_payload("xml:\"id\""), Err(PayloadError::MissingTag(_))));
        assert!(matches!(parse_payload("json \"id\""), Err(PayloadError::MissingTag(_))));
        assert!(matches!(parse_payload("json:\"id"), Err(PayloadError::Unterminated(_))));
        assert!(matches!(parse_payload("json:\"\""), Err(PayloadError::EmptyKey(_))));
        assert!(matches!(parse_payload("json:\",omitempty\""), Err(PayloadError::EmptyKey(_))));
        assert!(matches!(parse_payload("json:a\\b"), Err(PayloadError::InvalidKey(_))));
        assert!(matches!(parse_payload("json:\"id,string\""), Err(PayloadError::UnknownOption(o)) if o == "string"));
    }

    #[test]
    fn declared_name_skips_initializers() {
        assert_eq!(declared_name(" int x").as_deref(), Some("x"));
        assert_eq!(declared_name(" std::vector<int> values{1, 2").as_deref(), Some("values"));
        assert_eq!(declared_name(" unsigned long id = 0").as_deref(), Some("id"));
        assert_eq!(declared_name(" int bits : 3"), None);
        assert_eq!(declared_name("   "), None);
    }

    const HEADER: &str = r#"namespace shop {
struct Point {
    Attribute("json:x") int x;
    Attribute("json:\"y\"")
        int
        y;
    int z;
};
class Order {
    struct Line {
        Attribute("json:sku") std::string sku;
    };
public:
    Attribute("json:\"point,omitempty\"") Point point;
    Attribute("json:first") int revision = 0;
    Attribute("json:second") int revision2;
};
}
"#;

    fn decls() -> Decl {
        let f = |name: &str, signature: &str, line| Decl::Field { name: name.into(), signature: signature.into(), line };
        Decl::Unit {
            children: vec![Decl::Namespace {
                name: "shop".into(),
                children: vec![
                    Decl::Record {
                        name: "Point".into(),
                        aggregate: Aggregate::Struct,
                        lines: LineRange::new(2, 8),
                        children: vec![f("x", "int", 3), f("y", "int", 6), f("z", "int", 7)],
                    },
                    Decl::Record {
                        name: "Order".into(),
                        aggregate: Aggregate::Class,
                        lines: LineRange::new(9, 17),
                        children: vec![
                            Decl::Record {
                                name: "Line".into(),
                                aggregate: Aggregate::Struct,
                                lines: LineRange::new(10, 12),
                                children: vec![f("sku", "std::string", 11)],
                            },
                            f("point", "shop::Point", 14),
                            f("revision", "int", 15),
                            f("revision2", "int", 16),
                        ],
                    },
                ],
            }],
        }
    }

    fn resolved(header: &str) -> Result<RecordTable, GenError> {
        let file = Path::new("model.h");
        let table = extract(file, &decls())?;
        let sources = Sources::from_iter([(file.to_path_buf(), source_lines(header))]);
        resolve(table, &sources, &AttributeMarker)
    }

    #[test]
    fn hints_attach_to_the_following_declaration() {
        let table = resolved(HEADER).unwrap();
        let point = table.get("shop::Point").unwrap();
        assert_eq!(point.field("x").unwrap().hint.as_ref().unwrap().key, "x");
        assert_eq!(point.field("y").unwrap().hint.as_ref().unwrap().key, "y");
        assert!(point.field("z").unwrap().hint.is_none());

        let order = table.get("shop::Order").unwrap();
        assert_eq!(
            order.field("point").unwrap().hint,
            Some(FieldHint { key: "point".into(), omit_empty: true })
        );
        assert_eq!(order.field("revision").unwrap().hint.as_ref().unwrap().key, "first");
        assert_eq!(order.field("revision2").unwrap().hint.as_ref().unwrap().key, "second");
    }

    #[test]
    fn later_hint_for_the_same_field_wins() {
        let header = "struct Point {\n    Attribute(\"json:a\")\n    Attribute(\"json:b\") int x;\n};\n";
        let unit = Decl::Unit {
            children: vec![Decl::Record {
                name: "Point".into(),
                aggregate: Aggregate::Struct,
                lines: LineRange::new(1, 4),
                children: vec![Decl::Field { name: "x".into(), signature: "int".into(), line: 3 }],
            }],
        };
        let file = Path::new("point.h");
        let table = extract(file, &unit).unwrap();
        let sources = Sources::from_iter([(file.to_path_buf(), source_lines(header))]);
        let table = resolve(table, &sources, &AttributeMarker).unwrap();
        let hint = table.get("Point").unwrap().field("x").unwrap().hint.clone();
        assert_eq!(hint, Some(FieldHint { key: "b".into(), omit_empty: false }));
    }

    #[test]
    fn nested_record_hints_resolve_against_the_nested_record() {
        let table = resolved(HEADER).unwrap();
        let line = table.get("shop::Order::Line").unwrap();
        assert_eq!(line.field("sku").unwrap().hint.as_ref().unwrap().key, "sku");
    }

    #[test]
    fn unknown_field_is_reported() {
        let header = HEADER.replace("int z;", "Attribute(\"json:z\") int w;");
        let err = resolved(&header).unwrap_err();
        let GenError::FieldNotFound { location, record, field } = &err else { panic!("{err}") };
        assert_eq!(location.line, 7);
        assert_eq!(record, "shop::Point");
        assert_eq!(field, "w");
    }

    #[test]
    fn bad_payload_is_a_format_error() {
        let header = HEADER.replace("json:x", "yaml:x");
        let err = resolved(&header).unwrap_err();
        assert!(matches!(&err, GenError::HintFormat { location, .. } if location.line == 3), "{err}");
    }

    #[test]
    fn unterminated_declaration_is_a_format_error() {
        let header = HEADER.replace("    int z;\n};", "    Attribute(\"json:z\") int z\n};");
        let err = resolved(&header).unwrap_err();
        assert!(matches!(&err, GenError::HintFormat { reason, .. } if reason.contains("no field declaration")), "{err}");
    }

    #[test]
    fn missing_source_is_reported() {
        let table = extract(Path::new("model.h"), &decls()).unwrap();
        let err = resolve(table, &Sources::new(), &AttributeMarker).unwrap_err();
        assert!(matches!(err, GenError::MissingSource { .. }));
    }
}
