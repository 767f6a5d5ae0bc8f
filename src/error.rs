use std::path::PathBuf;

use thiserror::Error;

use crate::records::Location;
use crate::signature::{SignatureError, TypeKind};
use crate::validate::Violation;

/// Everything that stops a generation run.
///
/// Signature and hint errors abort on the spot; validation gathers every
/// [`Violation`] first. `UnknownRecordType` and `UnexpectedType` are internal
/// defects: the validator should have rejected their input.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("{location}: malformed type signature for {record}::{field}: {source}")]
    MalformedSignature {
        location: Location,
        record: String,
        field: String,
        #[source]
        source: SignatureError,
    },
    #[error("{location}: hint format error in {record}: {reason}")]
    HintFormat {
        location: Location,
        record: String,
        reason: String,
    },
    #[error("{location}: hint names field `{field}`, which {record} does not declare")]
    FieldNotFound {
        location: Location,
        record: String,
        field: String,
    },
    #[error("no source lines loaded for {}", file.display())]
    MissingSource { file: PathBuf },
    #[error("{}", render_violations(.0))]
    Validation(Vec<Violation>),
    #[error("internal error: record type `{name}` is not in the validated table")]
    UnknownRecordType { name: String },
    #[error("internal error: {kind:?} type `{name}` reached code generation")]
    UnexpectedType { name: String, kind: TypeKind },
}

impl GenError {
    /// Validation violations, empty for every other error.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation(violations) => violations,
            _ => &[],
        }
    }
}

fn render_violations(violations: &[Violation]) -> String {
    let mut out = format!("check field failed ({} violation(s))", violations.len());
    for violation in violations {
        out.push_str("\n  ");
        out.push_str(&violation.to_string());
    }
    out
}
