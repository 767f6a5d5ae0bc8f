//! End-to-end driver: translation units in, rendered header out.
use std::path::{Path, PathBuf};

use tracing::info;

use crate::ast::Decl;
use crate::ast::clang::{self, LoadError};
use crate::codegen::{self, Fragment};
use crate::error::GenError;
use crate::extract::Extractor;
use crate::hint::{self, AttributeMarker, HintScanner, Sources};
use crate::records::RecordTable;
use crate::validate;

/// Default include for the `json::Json` value type.
pub const JSON_INCLUDE: &str = "json.h";

/// One header with its source lines and declaration tree.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub header: PathBuf,
    pub lines: Vec<String>,
    pub decls: Decl,
}

impl TranslationUnit {
    pub fn new(header: impl Into<PathBuf>, source: &str, decls: Decl) -> Self {
        Self { header: header.into(), lines: hint::source_lines(source), decls }
    }

    /// Read `header` and the clang dump at `ast`.
    pub fn load(header: &Path, ast: &Path) -> Result<Self, LoadError> {
        let source = std::fs::read_to_string(header)
            .map_err(|source| LoadError::Io { path: header.to_path_buf(), source })?;
        let decls = clang::load(ast)?;
        Ok(Self::new(header, &source, decls))
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline<S = AttributeMarker> {
    scanner: S,
    json_include: String,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(JSON_INCLUDE)
    }
}

impl Pipeline {
    pub fn new(json_include: impl Into<String>) -> Self {
        Self::with_scanner(AttributeMarker, json_include)
    }
}

impl<S: HintScanner> Pipeline<S> {
    pub fn with_scanner(scanner: S, json_include: impl Into<String>) -> Self {
        Self { scanner, json_include: json_include.into() }
    }

    /// Extract and resolve hints, without validating.
    pub fn records(&self, units: &[TranslationUnit]) -> Result<RecordTable, GenError> {
        let mut extractor = Extractor::new();
        let mut sources = Sources::new();
        for unit in units {
            extractor.add_unit(&unit.header, &unit.decls)?;
            sources.insert(unit.header.clone(), unit.lines.clone());
        }
        let table = extractor.finish();
        info!(units = units.len(), records = table.len(), "extracted records");
        hint::resolve(table, &sources, &self.scanner)
    }

    /// Everything up to, and including, code generation.
    pub fn fragments(&self, units: &[TranslationUnit]) -> Result<Vec<Fragment>, GenError> {
        let table = validate::validate(self.records(units)?)?;
        codegen::generate(&table)
    }

    /// The complete generated header.
    pub fn run(&self, units: &[TranslationUnit]) -> Result<String, GenError> {
        let fragments = self.fragments(units)?;
        let headers = units.iter().map(|u| u.header.display().to_string()).collect::<Vec<_>>();
        info!(fragments = fragments.len(), "rendering header");
        Ok(codegen::render_unit(&headers, &self.json_include, &fragments))
    }
}

/// Write `text` to `out`, creating parent directories.
pub fn write_header(out: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, text)
}
