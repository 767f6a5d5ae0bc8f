//! CLI: clang AST dumps + headers → (generated header | record table)
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use cxx_json_gen::pipeline::{self, Pipeline, TranslationUnit};
use cxx_json_gen::records;

// --------------------------------- Types --------------------------------- //

/// generate C++ JSON marshal/unmarshal routines from annotated headers
#[derive(Parser, Debug)]
#[command(name = "cxx-json-gen", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate the marshal/unmarshal header
    Generate(GenerateOut),
    /// print the extracted records with their hints
    Records(RecordsOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more headers. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// suffix appended to each header path to find its clang dump
    /// (`clang++ -Xclang -ast-dump=json -fsyntax-only -x c++ model.h > model.h.ast.json`)
    #[arg(long, default_value = ".ast.json")]
    ast_suffix: String,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// header providing `json::Json`
    #[arg(long, default_value = pipeline::JSON_INCLUDE)]
    json_include: String,

    /// output header (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct RecordsOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ---------------------------- Implementation ----------------------------- //

impl InputSettings {
    fn load_units(&self) -> anyhow::Result<Vec<TranslationUnit>> {
        let headers = resolve_file_path_patterns(&self.input)?;
        headers
            .iter()
            .map(|header| {
                let ast = ast_path(header, &self.ast_suffix);
                debug!(header = %header.display(), ast = %ast.display(), "loading");
                TranslationUnit::load(header, &ast)
                    .with_context(|| format!("failed to load {}", header.display()))
            })
            .collect()
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let units = target.input_settings.load_units()?;
                let header = Pipeline::new(&target.json_include).run(&units)?;
                match target.out.as_ref() {
                    Some(out) => {
                        pipeline::write_header(out, &header)
                            .with_context(|| format!("failed to write {}", out.display()))?;
                        info!(out = %out.display(), "wrote generated header");
                    }
                    None => print!("{header}"),
                }
            }
            Command::Records(target) => {
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let units = target.input_settings.load_units()?;
                let table = Pipeline::default().records(&units)?;
                print!("{}", records::describe(&table));
            }
        }
        Ok(())
    }
}

// --------------------------- Internal helpers ---------------------------- //

fn ast_path(header: &Path, suffix: &str) -> PathBuf {
    let mut path = header.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
