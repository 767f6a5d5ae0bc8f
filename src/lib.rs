//! Generate C++ JSON marshal/unmarshal routines for annotated record types.
//!
//! Record layout comes from clang's JSON AST dump, per-field keys from
//! `Attribute("json:<key>")` markers in the header source:
//!
//! ```text
//! clang AST ─► ast::Decl ─► extract ─► hint::resolve ─► validate ─► codegen
//! ```
pub mod ast;
pub mod codegen;
pub mod error;
pub mod extract;
pub mod hint;
pub mod path_de;
pub mod pipeline;
pub mod records;
pub mod signature;
pub mod validate;

pub use error::GenError;
pub use pipeline::{Pipeline, TranslationUnit};
