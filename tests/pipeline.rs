use std::path::{Path, PathBuf};

use cxx_json_gen::codegen::{Fragment, Pass, Role};
use cxx_json_gen::records::describe;
use cxx_json_gen::validate::Violation;
use cxx_json_gen::{GenError, Pipeline, TranslationUnit};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn model() -> TranslationUnit {
    TranslationUnit::load(&fixture("model.h"), &fixture("model.h.ast.json")).unwrap()
}

fn routines(fragments: &[Fragment], pass: Pass) -> Vec<&str> {
    fragments
        .iter()
        .filter(|f| f.pass == pass && f.role == Role::Routine)
        .map(|f| f.ty.as_str())
        .collect()
}

#[test]
fn records_view_lists_every_field() {
    let table = Pipeline::default().records(&[model()]).unwrap();
    let text = describe(&table);
    assert!(text.contains("struct shop::Point {"), "{text}");
    assert!(text.contains("  int x `json:\"x\"`\n"), "{text}");
    assert!(text.contains("  int scratch\n"), "{text}");
    assert!(text.contains(" private:\n  int cache\n"), "{text}");
    assert!(text.contains("  std::string customer `json:\"customer,omitempty\"`\n"), "{text}");
}

#[test]
fn routines_are_dependency_ordered() {
    let fragments = Pipeline::default().fragments(&[model()]).unwrap();
    let expected = vec![
        "int",
        "shop::Point",
        "unsigned long",
        "std::string",
        "std::vector<std::string>",
        "std::vector<shop::Point>",
        "std::map<std::string, std::vector<shop::Point>>",
        "shop::Order",
    ];
    assert_eq!(routines(&fragments, Pass::Unmarshal), expected);
    assert_eq!(routines(&fragments, Pass::Marshal), expected);

    let unmarshal_count = fragments.iter().take_while(|f| f.pass == Pass::Unmarshal).count();
    assert_eq!(unmarshal_count, expected.len(), "unmarshal pass comes first");
}

#[test]
fn entry_points_for_every_record() {
    let fragments = Pipeline::default().fragments(&[model()]).unwrap();
    let entries = fragments.iter().filter(|f| f.role == Role::EntryPoint).collect::<Vec<_>>();
    assert_eq!(entries.len(), 8);
    assert!(entries[..4].iter().all(|f| f.ty == "shop::Point"));
    assert!(entries[4..].iter().all(|f| f.ty == "shop::Order"));
    assert!(entries[0].code.starts_with("inline std::string marshal(const shop::Point& model)"));
    assert!(fragments.last().unwrap().code.starts_with("inline const char* unmarshal(const std::string& raw, shop::Order& ret)"));
}

#[test]
fn generated_header_shape() {
    let text = Pipeline::default().run(&[model()]).unwrap();
    assert!(text.starts_with("#pragma once\n\n#include \""));
    assert!(text.contains("model.h\"\n#include \"json.h\"\n\nnamespace json {\n\n"));
    assert!(text.ends_with("} // namespace json\n"));

    assert!(text.contains(
        "inline void unmarshal(json::Json& j, shop::Order& ret) {\n\
         \x20 unmarshal(j[\"id\"], ret.id);\n\
         \x20 unmarshal(j[\"customer\"], ret.customer);\n\
         \x20 unmarshal(j[\"tags\"], ret.tags);\n\
         \x20 unmarshal(j[\"route\"], ret.route);\n\
         \x20 unmarshal(j[\"origin\"], ret.origin);\n\
         }"
    ));
    assert!(text.contains("  if (!model.customer.empty()) {\n    j.add(\"customer\", convert(std::move(model.customer)));\n  }\n"));
    assert!(!text.contains("scratch"));
    assert!(!text.contains("cache"));
}

#[test]
fn violations_are_reported_together() {
    let source = std::fs::read_to_string(fixture("model.h"))
        .unwrap()
        .replace("    int scratch;", "    Attribute(\"json:x\") int scratch;")
        .replace("    int cache;", "    Attribute(\"json:cache\") int cache;");
    let decls = cxx_json_gen::ast::clang::load(&fixture("model.h.ast.json")).unwrap();
    let unit = TranslationUnit::new("model.h", &source, decls);

    let err = Pipeline::default().run(&[unit]).unwrap_err();
    let violations = err.violations();
    assert_eq!(violations.len(), 2, "{err}");
    assert!(matches!(&violations[0], Violation::DuplicateKey { field, previous, .. } if field == "scratch" && previous == "x"));
    assert!(matches!(&violations[1], Violation::FieldNotAccessible { field, .. } if field == "cache"));
    assert!(err.to_string().starts_with("check field failed (2 violation(s))"));
}

#[test]
fn unknown_hinted_field_aborts() {
    let source = std::fs::read_to_string(fixture("model.h"))
        .unwrap()
        .replace("Attribute(\"json:y\") int y;", "Attribute(\"json:y\") int why;");
    let decls = cxx_json_gen::ast::clang::load(&fixture("model.h.ast.json")).unwrap();
    let err = Pipeline::default().run(&[TranslationUnit::new("model.h", &source, decls)]).unwrap_err();
    assert!(matches!(&err, GenError::FieldNotFound { location, field, .. } if location.line == 13 && field == "why"), "{err}");
}

#[test]
fn writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("generated/model_json.h");
    let text = Pipeline::new("json/json.h").run(&[model()]).unwrap();
    cxx_json_gen::pipeline::write_header(&out, &text).unwrap();
    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.contains("#include \"json/json.h\"\n"));
    assert_eq!(written, text);
}
