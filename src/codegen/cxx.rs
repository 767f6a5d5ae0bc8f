//! C++ snippets targeting the `json::Json` value type.
//!
//! Unmarshal routines are `void unmarshal(json::Json&, T&)` overloads,
//! marshal routines are `convert(T&&)` overloads; both are emitted inside
//! `namespace json`.
use crate::signature::{TypeKind, TypeNode};
use crate::validate::HintedRecord;

// ------------------------------ Unmarshal -------------------------------- //

pub fn unmarshal_scalar(ty: &TypeNode) -> String {
    format!("inline void unmarshal(json::Json& j, {ty}& ret) {{\n  j.move_to(ret);\n}}")
}

/// Sequences and associatives: the container walks itself and hands every
/// element (or value) to the `unmarshal` overload for `inner`.
pub fn unmarshal_container(ty: &TypeNode, inner: &TypeNode) -> String {
    format!(
        "inline void unmarshal(json::Json& j, {ty}& ret) {{\n\
         \x20 j.move_to(ret, static_cast<void(*)(json::Json&, {inner}&)>(unmarshal));\n\
         }}"
    )
}

pub fn unmarshal_record(record: &HintedRecord) -> String {
    let mut code = format!("inline void unmarshal(json::Json& j, {}& ret) {{\n", record.name);
    for field in &record.fields {
        code += &format!("  unmarshal(j[\"{}\"], ret.{});\n", field.hint.key, field.name);
    }
    code += "}";
    code
}

// ------------------------------- Marshal --------------------------------- //

pub fn marshal_scalar(ty: &TypeNode) -> String {
    let value = match ty.kind {
        TypeKind::Text => "std::move(model)",
        _ => "model",
    };
    format!("inline {ty} convert({ty}&& model) {{\n  return {value};\n}}")
}

pub fn marshal_sequence(ty: &TypeNode) -> String {
    format!(
        "inline json::Json convert({ty}&& model) {{\n\
         \x20 json::Json j(json::Json::Array{{}});\n\
         \x20 for (auto&& elem : model) {{\n\
         \x20   j.add(convert(std::move(elem)));\n\
         \x20 }}\n\
         \x20 return j;\n\
         }}"
    )
}

/// Keys pass through verbatim; only values are converted.
pub fn marshal_associative(ty: &TypeNode) -> String {
    format!(
        "inline json::Json convert({ty}&& model) {{\n\
         \x20 json::Json j(json::Json::Object{{}});\n\
         \x20 for (auto& kv : model) {{\n\
         \x20   j.add(kv.first, convert(std::move(kv.second)));\n\
         \x20 }}\n\
         \x20 return j;\n\
         }}"
    )
}

pub fn marshal_record(record: &HintedRecord) -> String {
    let mut code = format!(
        "inline json::Json convert({}&& model) {{\n  json::Json j(json::Json::Object{{}});\n",
        record.name
    );
    for field in &record.fields {
        let add = format!("j.add(\"{}\", convert(std::move(model.{})));", field.hint.key, field.name);
        match omit_guard(&field.ty, &field.name).filter(|_| field.hint.omit_empty) {
            Some(guard) => code += &format!("  if ({guard}) {{\n    {add}\n  }}\n"),
            None => code += &format!("  {add}\n"),
        }
    }
    code += "  return j;\n}";
    code
}

/// Condition under which an `omitempty` field is written. Records are always written.
fn omit_guard(ty: &TypeNode, field: &str) -> Option<String> {
    match ty.kind {
        TypeKind::Text | TypeKind::Sequence | TypeKind::Associative => Some(format!("!model.{field}.empty()")),
        TypeKind::Primitive => Some(format!("model.{field} != 0")),
        TypeKind::Record | TypeKind::RawPointer => None,
    }
}

// ----------------------------- Entry points ------------------------------ //

/// String-level entry points for a record, in emission order.
pub fn entry_points(record: &str) -> [String; 4] {
    [
        format!("inline std::string marshal(const {record}& model) {{\n  return convert({record}(model)).marshal();\n}}"),
        format!("inline std::string marshal({record}&& model) {{\n  return convert(std::move(model)).marshal();\n}}"),
        format!(
            "inline const char* unmarshal(const char* raw, {record}& ret) {{\n\
             \x20 const char* errmsg = nullptr;\n\
             \x20 json::Json j = json::Json::unmarshal(raw, errmsg);\n\
             \x20 if (errmsg != nullptr) {{\n\
             \x20   return errmsg;\n\
             \x20 }}\n\
             \x20 unmarshal(j, ret);\n\
             \x20 return nullptr;\n\
             }}"
        ),
        format!("inline const char* unmarshal(const std::string& raw, {record}& ret) {{\n  return unmarshal(raw.c_str(), ret);\n}}"),
    ]
}

// ------------------------------- Wrapping -------------------------------- //

/// Wrap emitted code into one header.
pub fn unit<'a>(headers: impl IntoIterator<Item = &'a str>, json_include: &str, code: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::from("#pragma once\n\n");
    for header in headers {
        out += &format!("#include \"{header}\"\n");
    }
    out += &format!("#include \"{json_include}\"\n\nnamespace json {{\n\n");
    for fragment in code {
        out += fragment;
        out += "\n\n";
    }
    out += "} // namespace json\n";
    out
}
