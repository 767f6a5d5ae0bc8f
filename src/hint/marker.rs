//! `Attribute("...")` marker scanner.
//!
//! Headers declare `#define Attribute(...)` so the marker vanishes for the
//! compiler, and annotate fields with `Attribute("json:\"id\"") int id;`.
use once_cell::sync::Lazy;
use regex::Regex;

use super::{HintScanner, RawHint, ScanError};

const KEYWORD: &str = "Attribute";

static KEYWORD_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bAttribute\b").expect("valid keyword regex"));

static MARKER_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\AAttribute\s*\(\s*"((?:[^"\\]|\\.)*)"\s*\)"#).expect("valid marker regex")
});

static OPEN_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\AAttribute\s*\(\s*""#).expect("valid open regex"));

/// The default [`HintScanner`]: the first `Attribute("payload")` on a line.
/// Escaped quotes and backslashes inside the payload are unescaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeMarker;

impl HintScanner for AttributeMarker {
    fn scan(&self, line: &str) -> Result<Option<RawHint>, ScanError> {
        if line.trim_start().starts_with('#') {
            return Ok(None);
        }
        let Some(keyword) = KEYWORD_RX.find(line) else {
            return Ok(None);
        };
        let tail = &line[keyword.start()..];
        let column = keyword.start() + 1;
        let Some(caps) = MARKER_RX.captures(tail) else {
            return Err(if OPEN_RX.is_match(tail) {
                ScanError::MissingClose { marker: KEYWORD, column }
            } else {
                ScanError::MissingOpen { marker: KEYWORD, column }
            });
        };
        let (Some(whole), Some(payload)) = (caps.get(0), caps.get(1)) else {
            return Ok(None);
        };
        let payload = unescape(payload.as_str());
        if payload.trim().is_empty() {
            return Err(ScanError::Empty);
        }
        Ok(Some(RawHint { payload, end: keyword.start() + whole.end() }))
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(line: &str) -> Result<Option<RawHint>, ScanError> {
        AttributeMarker.scan(line)
    }

    #[test]
    fn finds_plain_and_escaped_payloads() {
        let line = r#"    Attribute("json:id") unsigned long id;"#;
        let hint = scan(line).unwrap().unwrap();
        assert_eq!(hint.payload, "json:id");
        assert_eq!(&line[hint.end..], " unsigned long id;");

        let hint = scan(r#"Attribute( "json:\"tags,omitempty\"" ) std::vector<int> tags;"#).unwrap().unwrap();
        assert_eq!(hint.payload, r#"json:"tags,omitempty""#);
    }

    #[test]
    fn lines_without_marker_are_skipped() {
        assert_eq!(scan("    int plain;"), Ok(None));
        assert_eq!(scan("    AttributeList list;"), Ok(None));
        assert_eq!(scan("#define Attribute(...)"), Ok(None));
    }

    #[test]
    fn malformed_markers_are_errors() {
        assert_eq!(scan("  Attribute(json:id) int x;"), Err(ScanError::MissingOpen { marker: KEYWORD, column: 3 }));
        assert_eq!(scan(r#"Attribute("json:id" int x;"#), Err(ScanError::MissingClose { marker: KEYWORD, column: 1 }));
        assert_eq!(scan(r#"Attribute("  ") int x;"#), Err(ScanError::Empty));
    }
}
