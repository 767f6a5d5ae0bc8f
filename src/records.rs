//! Record table: what the extractor builds and the hint resolver annotates.
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::ast::{Aggregate, LineRange, Visibility};
use crate::signature::TypeNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    /// 1-based.
    pub line: usize,
}

/// Resolved serialization directive for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHint {
    /// JSON object key; never empty.
    pub key: String,
    pub omit_empty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub visibility: Visibility,
    pub ty: TypeNode,
    /// `None` until the hint resolver attaches one; unhinted fields are not serialized.
    pub hint: Option<FieldHint>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// `::`-joined namespace and enclosing record names.
    pub name: String,
    pub aggregate: Aggregate,
    pub file: PathBuf,
    pub lines: LineRange,
    pub fields: Vec<Field>,
}

/// Records by qualified name, in declaration order, plus the records each
/// file declares (the hint resolver scans per file).
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    records: IndexMap<String, Record>,
    files: IndexMap<PathBuf, Vec<String>>,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self { file: file.into(), line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

impl fmt::Display for FieldHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.omit_empty {
            true => write!(f, "json:\"{},omitempty\"", self.key),
            false => write!(f, "json:\"{}\"", self.key),
        }
    }
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn location(&self) -> Location {
        Location::new(&self.file, self.lines.start)
    }
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Record> {
        self.records.get_mut(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Files in first-seen order with their record names in declaration order.
    pub fn files(&self) -> impl Iterator<Item = (&Path, &[String])> {
        self.files.iter().map(|(file, names)| (file.as_path(), names.as_slice()))
    }

    /// Open (or reopen) a record. A redeclaration in the same file widens the
    /// line range and keeps the fields gathered so far; one in another file
    /// only contributes fields.
    pub fn open(&mut self, name: &str, aggregate: Aggregate, file: &Path, lines: LineRange) -> &mut Record {
        let record = self.records.entry(name.to_string()).or_insert_with(|| Record {
            name: name.to_string(),
            aggregate,
            file: file.to_path_buf(),
            lines,
            fields: Vec::new(),
        });
        if record.file == file {
            record.lines = LineRange::new(record.lines.start.min(lines.start), record.lines.end.max(lines.end));
            let names = self.files.entry(file.to_path_buf()).or_default();
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        record
    }

    pub fn into_records(self) -> IndexMap<String, Record> {
        self.records
    }
}

impl FromIterator<Record> for RecordTable {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            let names = table.files.entry(record.file.clone()).or_default();
            if !names.contains(&record.name) {
                names.push(record.name.clone());
            }
            table.records.insert(record.name.clone(), record);
        }
        table
    }
}

/// Text view of the table: each record with a field, its line range and its
/// fields grouped by access, hints in backticks.
pub fn describe(table: &RecordTable) -> String {
    let mut out = String::new();
    for record in table.records().filter(|r| !r.fields.is_empty()) {
        out += &format!("{} {} {{ // {}:[{}, {}]\n", record.aggregate, record.name, record.file.display(), record.lines.start, record.lines.end);
        for access in [Visibility::Public, Visibility::Private, Visibility::Protected] {
            let mut fields = record.fields.iter().filter(|f| f.visibility == access).peekable();
            if fields.peek().is_none() {
                continue;
            }
            out += &format!(" {access}:\n");
            for field in fields {
                match &field.hint {
                    Some(hint) => out += &format!("  {} {} `{hint}`\n", field.ty, field.name),
                    None => out += &format!("  {} {}\n", field.ty, field.name),
                }
            }
        }
        out += "};\n";
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::parse;

    fn field(name: &str, visibility: Visibility, sig: &str, hint: Option<FieldHint>) -> Field {
        Field { name: name.into(), visibility, ty: parse(sig).unwrap(), hint, location: Location::new("a.h", 1) }
    }

    #[test]
    fn open_merges_redeclarations() {
        let mut table = RecordTable::new();
        table.open("Point", Aggregate::Struct, Path::new("a.h"), LineRange::new(3, 3));
        table.open("Point", Aggregate::Struct, Path::new("a.h"), LineRange::new(5, 9));
        table.open("Point", Aggregate::Struct, Path::new("b.h"), LineRange::new(20, 30));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("Point").unwrap().lines, LineRange::new(3, 9));
        assert_eq!(table.get("Point").unwrap().location(), Location::new("a.h", 3));
        let files = table.files().collect::<Vec<_>>();
        assert_eq!(files, vec![(Path::new("a.h"), &["Point".to_string()][..])]);
    }

    #[test]
    fn describe_groups_fields_by_access() {
        let mut table = RecordTable::new();
        let record = table.open("geo::Point", Aggregate::Class, Path::new("a.h"), LineRange::new(2, 7));
        record.fields = vec![
            field("y", Visibility::Private, "int", None),
            field("x", Visibility::Public, "std::vector<int, std::allocator<int> >", Some(FieldHint { key: "x".into(), omit_empty: true })),
        ];
        table.open("geo::Empty", Aggregate::Struct, Path::new("a.h"), LineRange::new(8, 9));
        assert_eq!(
            describe(&table),
            "class geo::Point { // a.h:[2, 7]\n public:\n  std::vector<int> x `json:\"x,omitempty\"`\n private:\n  int y\n};\n"
        );
    }
}
