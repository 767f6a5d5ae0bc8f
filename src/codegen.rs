//! Dependency-ordered code generation.
//!
//! Two passes over the validated table, unmarshal then marshal. Each pass
//! walks the type trees of every record, in table order, depth first; a type is
//! claimed in the pass's [`GenerationState`] before its children are visited
//! and its routine is appended after them, so every routine only calls
//! routines emitted earlier and every canonical type appears once per pass.
pub mod cxx;

use std::fmt;

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::error::GenError;
use crate::signature::{TypeKind, TypeNode};
use crate::validate::ValidatedTable;

// -------------------------------- Types ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Unmarshal,
    Marshal,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unmarshal => "unmarshal",
            Self::Marshal => "marshal",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The per-type `unmarshal` / `convert` overload.
    Routine,
    /// String-level `marshal` / `unmarshal` for a record.
    EntryPoint,
}

/// One emitted routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Canonical name of the type the routine handles.
    pub ty: String,
    pub pass: Pass,
    pub role: Role,
    pub code: String,
}

/// Canonical type names already emitted in the current pass.
#[derive(Debug, Clone, Default)]
pub struct GenerationState {
    emitted: IndexSet<String>,
}

impl GenerationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_emitted(&self, name: &str) -> bool {
        self.emitted.contains(name)
    }

    /// Mark `name` as emitted. False if it already was.
    pub fn claim(&mut self, name: &str) -> bool {
        if self.emitted.contains(name) {
            return false;
        }
        self.emitted.insert(name.to_string())
    }

    /// Claimed names in claim order.
    pub fn emitted(&self) -> impl Iterator<Item = &str> {
        self.emitted.iter().map(String::as_str)
    }
}

// ------------------------------- Generate -------------------------------- //

/// Both passes over `table`, each with a fresh state.
pub fn generate(table: &ValidatedTable) -> Result<Vec<Fragment>, GenError> {
    let roots = table.records().map(|record| record.name.as_str()).collect::<Vec<_>>();
    let mut fragments = Vec::new();
    for pass in [Pass::Unmarshal, Pass::Marshal] {
        let mut state = GenerationState::new();
        let emitted = emit_pass(table, pass, &roots, &mut state)?;
        info!(%pass, routines = state.emitted().count(), fragments = emitted.len(), "pass complete");
        fragments.extend(emitted);
    }
    Ok(fragments)
}

/// One pass rooted at `roots`. In the marshal pass every record routine is
/// followed by that record's string entry points.
pub fn emit_pass(
    table: &ValidatedTable,
    pass: Pass,
    roots: &[&str],
    state: &mut GenerationState,
) -> Result<Vec<Fragment>, GenError> {
    let mut emitter = Emitter { table, pass, state, out: Vec::new() };
    for root in roots {
        emitter.emit(&TypeNode::record(*root))?;
    }
    Ok(emitter.out)
}

/// Wrap fragments into a complete header.
pub fn render_unit(headers: &[String], json_include: &str, fragments: &[Fragment]) -> String {
    cxx::unit(
        headers.iter().map(String::as_str),
        json_include,
        fragments.iter().map(|f| f.code.as_str()),
    )
}

struct Emitter<'a> {
    table: &'a ValidatedTable,
    pass: Pass,
    state: &'a mut GenerationState,
    out: Vec<Fragment>,
}

impl Emitter<'_> {
    fn emit(&mut self, ty: &TypeNode) -> Result<(), GenError> {
        if !self.state.claim(&ty.name) {
            return Ok(());
        }
        let unexpected = || GenError::UnexpectedType { name: ty.name.clone(), kind: ty.kind };
        let code = match (ty.kind, self.pass) {
            (TypeKind::Primitive | TypeKind::Text, Pass::Unmarshal) => cxx::unmarshal_scalar(ty),
            (TypeKind::Primitive | TypeKind::Text, Pass::Marshal) => cxx::marshal_scalar(ty),
            (TypeKind::Sequence, pass) => {
                let elem = ty.element().ok_or_else(unexpected)?;
                self.emit(elem)?;
                match pass {
                    Pass::Unmarshal => cxx::unmarshal_container(ty, elem),
                    Pass::Marshal => cxx::marshal_sequence(ty),
                }
            }
            (TypeKind::Associative, pass) => {
                let (_, value) = ty.key_value().ok_or_else(unexpected)?;
                self.emit(value)?;
                match pass {
                    Pass::Unmarshal => cxx::unmarshal_container(ty, value),
                    Pass::Marshal => cxx::marshal_associative(ty),
                }
            }
            (TypeKind::Record, pass) => {
                let table = self.table;
                let record = table
                    .get(&ty.name)
                    .ok_or_else(|| GenError::UnknownRecordType { name: ty.name.clone() })?;
                for field in &record.fields {
                    self.emit(&field.ty)?;
                }
                match pass {
                    Pass::Unmarshal => cxx::unmarshal_record(record),
                    Pass::Marshal => cxx::marshal_record(record),
                }
            }
            (TypeKind::RawPointer, _) => return Err(unexpected()),
        };
        debug!(pass = %self.pass, ty = %ty.name, "emit");
        self.out.push(Fragment { ty: ty.name.clone(), pass: self.pass, role: Role::Routine, code });
        if ty.kind == TypeKind::Record && self.pass == Pass::Marshal {
            for code in cxx::entry_points(&ty.name) {
                self.out.push(Fragment { ty: ty.name.clone(), pass: self.pass, role: Role::EntryPoint, code });
            }
        }
        Ok(())
    }
}

// -------------------------------- Tests ---------------------------------- //
