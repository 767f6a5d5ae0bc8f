//! Record extraction: declaration tree → [`RecordTable`].
use std::path::Path;

use tracing::{debug, warn};

use crate::ast::{Decl, Visibility};
use crate::error::GenError;
use crate::records::{Field, Location, RecordTable};
use crate::signature;

/// Extract the records of a single translation unit.
pub fn extract(file: &Path, unit: &Decl) -> Result<RecordTable, GenError> {
    let mut extractor = Extractor::new();
    extractor.add_unit(file, unit)?;
    Ok(extractor.finish())
}

/// Accumulates records across translation units.
#[derive(Debug, Default)]
pub struct Extractor {
    table: RecordTable,
}

/// The record whose fields are being collected and its access cursor.
#[derive(Debug)]
struct Cursor {
    record: String,
    access: Visibility,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(&mut self, file: &Path, unit: &Decl) -> Result<(), GenError> {
        let mut scope = Vec::new();
        self.walk(file, unit, &mut scope, &mut None)
    }

    pub fn finish(self) -> RecordTable {
        self.table
    }

    fn walk(
        &mut self,
        file: &Path,
        decl: &Decl,
        scope: &mut Vec<String>,
        enclosing: &mut Option<Cursor>,
    ) -> Result<(), GenError> {
        match decl {
            Decl::Unit { children } => {
                for child in children {
                    self.walk(file, child, scope, enclosing)?;
                }
            }
            Decl::Namespace { name, children } => {
                scope.push(name.clone());
                let mut outside = None;
                for child in children {
                    self.walk(file, child, scope, &mut outside)?;
                }
                scope.pop();
            }
            Decl::Record { name, aggregate, lines, children } => {
                scope.push(name.clone());
                let qualified = scope.join("::");
                self.table.open(&qualified, *aggregate, file, *lines);
                debug!(record = %qualified, file = %file.display(), "record");
                // the nested cursor is dropped on exit, so the parent's access is untouched
                let mut cursor = Some(Cursor { record: qualified, access: aggregate.default_visibility() });
                for child in children {
                    self.walk(file, child, scope, &mut cursor)?;
                }
                scope.pop();
            }
            Decl::Access(visibility) => {
                if let Some(cursor) = enclosing {
                    cursor.access = *visibility;
                }
            }
            Decl::Field { name, signature, line } => {
                let Some(cursor) = enclosing else {
                    warn!(field = %name, line, "field declaration outside a record, skipped");
                    return Ok(());
                };
                let location = Location::new(file, *line);
                let ty = signature::parse(signature).map_err(|source| GenError::MalformedSignature {
                    location: location.clone(),
                    record: cursor.record.clone(),
                    field: name.clone(),
                    source,
                })?;
                debug!(record = %cursor.record, field = %name, ty = %ty, access = %cursor.access, "field");
                if let Some(record) = self.table.get_mut(&cursor.record) {
                    record.fields.push(Field {
                        name: name.clone(),
                        visibility: cursor.access,
                        ty,
                        hint: None,
                        location,
                    });
                }
            }
        }
        Ok(())
    }
}
