//! Validation: strip unhinted fields and records, then check what is left.
//!
//! Every violation across every record is collected before failing, so one
//! run reports all of them.
use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use indexmap::map::Entry;
use thiserror::Error;
use tracing::{debug, info};

use crate::ast::Visibility;
use crate::error::GenError;
use crate::records::{FieldHint, Location, RecordTable};
use crate::signature::{TypeKind, TypeNode};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("{location}: {record}::{field} is {visibility}")]
    FieldNotAccessible {
        location: Location,
        record: String,
        field: String,
        visibility: Visibility,
    },
    #[error("{location}: {record}::{field} is not a supported type, type: {ty}")]
    UnsupportedFieldType {
        location: Location,
        record: String,
        field: String,
        ty: String,
    },
    #[error("{location}: {record}::{field} reuses JSON key \"{key}\" of {record}::{previous}")]
    DuplicateKey {
        location: Location,
        record: String,
        field: String,
        key: String,
        previous: String,
    },
    #[error("{location}: record {record} references itself: {}", chain.join(" -> "))]
    CyclicRecord {
        location: Location,
        record: String,
        chain: Vec<String>,
    },
}

/// A field that carries a hint.
#[derive(Debug, Clone, PartialEq)]
pub struct HintedField {
    pub name: String,
    pub visibility: Visibility,
    pub ty: TypeNode,
    pub hint: FieldHint,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HintedRecord {
    pub name: String,
    pub file: PathBuf,
    pub fields: Vec<HintedField>,
}

/// Records that passed validation, in declaration order. The code generator
/// only accepts this.
#[derive(Debug, Clone, Default)]
pub struct ValidatedTable {
    records: IndexMap<String, HintedRecord>,
}

impl ValidatedTable {
    pub fn get(&self, name: &str) -> Option<&HintedRecord> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &HintedRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Strip, then check visibility, type support, duplicate keys and cycles.
pub fn validate(table: RecordTable) -> Result<ValidatedTable, GenError> {
    let records = strip_unhinted(table);
    let mut violations = Vec::new();

    for record in records.values() {
        let mut keys: IndexMap<&str, &str> = IndexMap::new();
        for field in &record.fields {
            if field.visibility != Visibility::Public {
                violations.push(Violation::FieldNotAccessible {
                    location: field.location.clone(),
                    record: record.name.clone(),
                    field: field.name.clone(),
                    visibility: field.visibility,
                });
            }
            if !is_supported(&field.ty, &records) {
                violations.push(Violation::UnsupportedFieldType {
                    location: field.location.clone(),
                    record: record.name.clone(),
                    field: field.name.clone(),
                    ty: field.ty.name.clone(),
                });
            }
            match keys.entry(field.hint.key.as_str()) {
                Entry::Occupied(previous) => violations.push(Violation::DuplicateKey {
                    location: field.location.clone(),
                    record: record.name.clone(),
                    field: field.name.clone(),
                    key: field.hint.key.clone(),
                    previous: previous.get().to_string(),
                }),
                Entry::Vacant(slot) => {
                    slot.insert(field.name.as_str());
                }
            }
        }
    }
    violations.extend(CycleFinder::new(&records).run());

    if !violations.is_empty() {
        return Err(GenError::Validation(violations));
    }
    info!(records = records.len(), "validation passed");
    Ok(ValidatedTable { records })
}

/// Drop unhinted fields, then records left with no fields.
fn strip_unhinted(table: RecordTable) -> IndexMap<String, HintedRecord> {
    let mut out = IndexMap::new();
    for (name, record) in table.into_records() {
        let location = record.location();
        let fields = record
            .fields
            .into_iter()
            .filter_map(|field| {
                let hint = field.hint?;
                Some(HintedField {
                    name: field.name,
                    visibility: field.visibility,
                    ty: field.ty,
                    hint,
                    location: field.location,
                })
            })
            .collect::<Vec<_>>();
        if fields.is_empty() {
            debug!(record = %name, %location, "no hinted fields, dropped");
            continue;
        }
        out.insert(name.clone(), HintedRecord { name, file: record.file, fields });
    }
    out
}

fn is_supported(ty: &TypeNode, records: &IndexMap<String, HintedRecord>) -> bool {
    match ty.kind {
        TypeKind::Primitive | TypeKind::Text => true,
        TypeKind::Sequence => ty.element().is_some_and(|elem| is_supported(elem, records)),
        TypeKind::Associative => ty
            .key_value()
            .is_some_and(|(key, value)| key.kind == TypeKind::Text && is_supported(value, records)),
        TypeKind::RawPointer => false,
        TypeKind::Record => records.contains_key(&ty.name),
    }
}

// -------------------------------- Cycles --------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Active,
    Done,
}

/// Depth-first search over record references; a reference back into the
/// active path is a cycle.
struct CycleFinder<'a> {
    records: &'a IndexMap<String, HintedRecord>,
    marks: HashMap<&'a str, Mark>,
    path: Vec<&'a str>,
    found: Vec<Violation>,
}

impl<'a> CycleFinder<'a> {
    fn new(records: &'a IndexMap<String, HintedRecord>) -> Self {
        Self { records, marks: HashMap::new(), path: Vec::new(), found: Vec::new() }
    }

    fn run(mut self) -> Vec<Violation> {
        let records = self.records;
        for name in records.keys() {
            self.visit(name, None);
        }
        self.found
    }

    fn visit(&mut self, name: &'a str, via: Option<&'a HintedField>) {
        match self.marks.get(name) {
            Some(Mark::Done) => return,
            Some(Mark::Active) => {
                let start = self.path.iter().position(|n| *n == name).unwrap_or(0);
                let mut chain = self.path[start..].iter().map(|n| n.to_string()).collect::<Vec<_>>();
                chain.push(name.to_string());
                let referrer = self.path.last().copied().unwrap_or(name);
                let location = via
                    .map(|f| f.location.clone())
                    .unwrap_or_else(|| Location::new(PathBuf::new(), 0));
                self.found.push(Violation::CyclicRecord { location, record: referrer.to_string(), chain });
                return;
            }
            None => {}
        }
        let records = self.records;
        let Some((key, record)) = records.get_key_value(name) else {
            return;
        };
        let name = key.as_str();
        self.marks.insert(name, Mark::Active);
        self.path.push(name);
        for field in &record.fields {
            for target in field.ty.record_names() {
                self.visit(target, Some(field));
            }
        }
        self.path.pop();
        self.marks.insert(name, Mark::Done);
    }
}

// -------------------------------- Tests ---------------------------------- //
