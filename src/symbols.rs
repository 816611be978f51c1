// Structural symbol extraction: a direct tree-walk per language family
// (rather than one tree-sitter Query per extension) over the Symbol shape in
// model.rs, covering scope, parameters, modifiers, and the Arduino
// setup/loop marker.

use tree_sitter::Node;

use crate::language::Language;
use crate::model::{Location, Parameter, Symbol, SymbolId, SymbolKind, SymbolScope};
use crate::parser;

pub struct SymbolExtractor;

impl SymbolExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts symbols from `source`. Unknown/unparseable languages (only
    /// Markdown today) yield an empty list rather than an error.
    pub fn extract(&self, source: &str, language: Language, path: &str) -> Vec<Symbol> {
        if language == Language::Markdown {
            return Vec::new();
        }

        let parsed = match parser::parse(source, language) {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };

        let mut ctx = ExtractCtx {
            source,
            language,
            path,
            symbols: Vec::new(),
        };

        let root = parsed.root_node();
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            walk_top_level(&mut ctx, child, None, SymbolScope::Global);
        }
        ctx.symbols
    }
}

impl Default for SymbolExtractor {
    fn default() -> Self {
        Self::new()
    }
}

struct ExtractCtx<'a> {
    source: &'a str,
    language: Language,
    path: &'a str,
    symbols: Vec<Symbol>,
}

fn node_text<'a>(source: &'a str, node: Node) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn location_of(node: Node) -> Location {
    let start = node.start_position();
    let end = node.end_position();
    Location {
        start_line: start.row as u32,
        end_line: end.row as u32,
        start_col: start.column as u32,
        end_col: end.column as u32,
    }
}

fn field_name<'a>(source: &'a str, node: Node, field: &str) -> Option<&'a str> {
    node.child_by_field_name(field).map(|n| node_text(source, n))
}

fn has_ancestor_keyword(node: Node, keyword: &str, source: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == keyword || node_text(source, c) == keyword);
    found
}

fn push_symbol(ctx: &mut ExtractCtx, mut symbol: Symbol, parent: Option<SymbolId>) -> SymbolId {
    let id = ctx.symbols.len();
    symbol.id = id;
    ctx.symbols.push(symbol);
    if let Some(parent_id) = parent {
        ctx.symbols[parent_id].members.push(id);
    }
    id
}

fn base_symbol(kind: SymbolKind, name: String, scope: SymbolScope, node: Node) -> Symbol {
    Symbol {
        id: 0,
        name,
        kind,
        scope,
        location: location_of(node),
        parameters: Vec::new(),
        return_type: None,
        is_async: false,
        is_exported: false,
        is_abstract: false,
        is_arduino_special: false,
        extends: Vec::new(),
        members: Vec::new(),
    }
}

fn extract_parameters(source: &str, params_node: Option<Node>) -> Vec<Parameter> {
    let Some(params_node) = params_node else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "required_parameter"
                | "optional_parameter"
                | "identifier"
                | "parameter_declaration"
                | "formal_parameter"
                | "typed_parameter"
                | "parameter"
        ) {
            let name = field_name(source, child, "name")
                .or_else(|| field_name(source, child, "pattern"))
                .unwrap_or_else(|| node_text(source, child))
                .to_string();
            let type_annotation = field_name(source, child, "type").map(|s| s.to_string());
            out.push(Parameter {
                name,
                type_annotation,
            });
        }
    }
    out
}

fn walk_top_level(ctx: &mut ExtractCtx, node: Node, parent: Option<SymbolId>, scope: SymbolScope) {
    match ctx.language {
        Language::TypeScript | Language::JavaScript => extract_js_like(ctx, node, parent, scope),
        Language::Python => extract_python(ctx, node, parent, scope),
        Language::Go => extract_go(ctx, node, parent),
        Language::Rust => extract_rust(ctx, node, parent, scope),
        Language::Java => extract_java(ctx, node, parent, scope),
        Language::C | Language::Cpp => extract_c_like(ctx, node, parent, scope, ctx.language == Language::Cpp),
        Language::Markdown => {}
    }
}

fn recurse_children(ctx: &mut ExtractCtx, node: Node, parent: Option<SymbolId>, scope: SymbolScope) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        walk_top_level(ctx, child, parent, scope);
    }
}

// ---- TypeScript / JavaScript ----

fn extract_js_like(ctx: &mut ExtractCtx, node: Node, parent: Option<SymbolId>, scope: SymbolScope) {
    match node.kind() {
        "export_statement" => {
            let mut cursor = node.walk();
            let inner: Vec<Node> = node.children(&mut cursor).collect();
            for child in inner {
                if matches!(
                    child.kind(),
                    "class_declaration"
                        | "interface_declaration"
                        | "enum_declaration"
                        | "function_declaration"
                        | "lexical_declaration"
                        | "variable_declaration"
                ) {
                    let before = ctx.symbols.len();
                    walk_top_level(ctx, child, parent, scope);
                    for s in ctx.symbols.iter_mut().skip(before) {
                        s.is_exported = true;
                    }
                }
            }
        }
        "class_declaration" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let extends = node
                .child_by_field_name("superclass")
                .or_else(|| node.child_by_field_name("heritage"))
                .map(|n| node_text(ctx.source, n).to_string())
                .into_iter()
                .collect();
            let mut symbol = base_symbol(SymbolKind::Class, name, scope, node);
            symbol.extends = extends;
            let id = push_symbol(ctx, symbol, parent);
            if let Some(body) = node.child_by_field_name("body") {
                recurse_children(ctx, body, Some(id), SymbolScope::Class);
            }
        }
        "interface_declaration" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let symbol = base_symbol(SymbolKind::Interface, name, scope, node);
            push_symbol(ctx, symbol, parent);
        }
        "enum_declaration" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let symbol = base_symbol(SymbolKind::Enum, name, scope, node);
            push_symbol(ctx, symbol, parent);
        }
        "method_definition" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let mut symbol = base_symbol(SymbolKind::Method, name, SymbolScope::Class, node);
            symbol.is_async = has_ancestor_keyword(node, "async", ctx.source);
            symbol.parameters = extract_parameters(ctx.source, node.child_by_field_name("parameters"));
            symbol.return_type = field_name(ctx.source, node, "return_type").map(String::from);
            push_symbol(ctx, symbol, parent);
        }
        "function_declaration" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let mut symbol = base_symbol(SymbolKind::Function, name, scope, node);
            symbol.is_async = has_ancestor_keyword(node, "async", ctx.source);
            symbol.parameters = extract_parameters(ctx.source, node.child_by_field_name("parameters"));
            symbol.return_type = field_name(ctx.source, node, "return_type").map(String::from);
            push_symbol(ctx, symbol, parent);
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            for declarator in node.children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(value) = declarator.child_by_field_name("value") else {
                    continue;
                };
                if matches!(value.kind(), "arrow_function" | "function" | "function_expression") {
                    let name = field_name(ctx.source, declarator, "name").unwrap_or("").to_string();
                    let mut symbol = base_symbol(SymbolKind::Function, name, scope, declarator);
                    symbol.is_async = has_ancestor_keyword(value, "async", ctx.source);
                    symbol.parameters = extract_parameters(ctx.source, value.child_by_field_name("parameters"));
                    push_symbol(ctx, symbol, parent);
                }
            }
        }
        "program" | "statement_block" => recurse_children(ctx, node, parent, scope),
        _ => {}
    }
}

// ---- Python ----

fn extract_python(ctx: &mut ExtractCtx, node: Node, parent: Option<SymbolId>, scope: SymbolScope) {
    match node.kind() {
        "class_definition" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let extends = node
                .child_by_field_name("superclasses")
                .map(|n| node_text(ctx.source, n).trim_matches(|c| c == '(' || c == ')').to_string())
                .filter(|s| !s.is_empty())
                .map(|s| s.split(',').map(|p| p.trim().to_string()).collect())
                .unwrap_or_default();
            let mut symbol = base_symbol(SymbolKind::Class, name, scope, node);
            symbol.extends = extends;
            let id = push_symbol(ctx, symbol, parent);
            if let Some(body) = node.child_by_field_name("body") {
                recurse_children(ctx, body, Some(id), SymbolScope::Class);
            }
        }
        "function_definition" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let is_async = node
                .prev_sibling()
                .map(|s| s.kind() == "async")
                .unwrap_or(false)
                || node_text(ctx.source, node).trim_start().starts_with("async");
            let kind = if scope == SymbolScope::Class {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            };
            let mut symbol = base_symbol(kind, name, scope, node);
            symbol.is_async = is_async;
            symbol.parameters = extract_parameters(ctx.source, node.child_by_field_name("parameters"));
            symbol.return_type = field_name(ctx.source, node, "return_type").map(String::from);
            push_symbol(ctx, symbol, parent);
        }
        "expression_statement" => {
            let mut cursor = node.walk();
            for assign in node.children(&mut cursor) {
                if assign.kind() != "assignment" {
                    continue;
                }
                let Some(left) = assign.child_by_field_name("left") else {
                    continue;
                };
                let name = node_text(ctx.source, left);
                if scope == SymbolScope::Global
                    && !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
                {
                    let symbol = base_symbol(SymbolKind::Constant, name.to_string(), scope, assign);
                    push_symbol(ctx, symbol, parent);
                }
            }
        }
        "module" | "block" => recurse_children(ctx, node, parent, scope),
        _ => {}
    }
}

// ---- Go ----

fn extract_go(ctx: &mut ExtractCtx, node: Node, parent: Option<SymbolId>) {
    match node.kind() {
        "const_declaration" => extract_go_spec_list(ctx, node, SymbolKind::Constant, parent),
        "var_declaration" => extract_go_spec_list(ctx, node, SymbolKind::Variable, parent),
        "type_declaration" => {
            let mut cursor = node.walk();
            for spec in node.children(&mut cursor) {
                if spec.kind() != "type_spec" {
                    continue;
                }
                let name = field_name(ctx.source, spec, "name").unwrap_or("").to_string();
                let kind = match spec.child_by_field_name("type").map(|n| n.kind()) {
                    Some("struct_type") => SymbolKind::Struct,
                    Some("interface_type") => SymbolKind::Interface,
                    _ => continue,
                };
                let symbol = base_symbol(kind, name, SymbolScope::Global, spec);
                push_symbol(ctx, symbol, parent);
            }
        }
        "function_declaration" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let mut symbol = base_symbol(SymbolKind::Function, name, SymbolScope::Global, node);
            symbol.parameters = extract_parameters(ctx.source, node.child_by_field_name("parameters"));
            push_symbol(ctx, symbol, parent);
        }
        "method_declaration" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let mut symbol = base_symbol(SymbolKind::Method, name, SymbolScope::Global, node);
            symbol.parameters = extract_parameters(ctx.source, node.child_by_field_name("parameters"));
            if let Some(receiver) = node.child_by_field_name("receiver") {
                symbol.extends = vec![node_text(ctx.source, receiver).to_string()];
            }
            push_symbol(ctx, symbol, parent);
        }
        "source_file" => recurse_go(ctx, node, parent),
        _ => {}
    }
}

fn recurse_go(ctx: &mut ExtractCtx, node: Node, parent: Option<SymbolId>) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        extract_go(ctx, child, parent);
    }
}

fn extract_go_spec_list(ctx: &mut ExtractCtx, node: Node, kind: SymbolKind, parent: Option<SymbolId>) {
    let mut cursor = node.walk();
    for spec in node.children(&mut cursor) {
        if spec.kind() != "const_spec" && spec.kind() != "var_spec" {
            continue;
        }
        let name = field_name(ctx.source, spec, "name").unwrap_or("").to_string();
        if name.is_empty() {
            continue;
        }
        let symbol = base_symbol(kind, name, SymbolScope::Global, spec);
        push_symbol(ctx, symbol, parent);
    }
}

// ---- Rust ----

fn extract_rust(ctx: &mut ExtractCtx, node: Node, parent: Option<SymbolId>, scope: SymbolScope) {
    match node.kind() {
        "struct_item" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let symbol = base_symbol(SymbolKind::Struct, name, scope, node);
            push_symbol(ctx, symbol, parent);
        }
        "trait_item" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let symbol = base_symbol(SymbolKind::Trait, name, scope, node);
            let id = push_symbol(ctx, symbol, parent);
            if let Some(body) = node.child_by_field_name("body") {
                recurse_children(ctx, body, Some(id), SymbolScope::Class);
            }
        }
        "impl_item" => {
            let name = field_name(ctx.source, node, "type").unwrap_or("").to_string();
            let mut symbol = base_symbol(SymbolKind::Impl, name, scope, node);
            if let Some(trait_ref) = node.child_by_field_name("trait") {
                symbol.extends = vec![node_text(ctx.source, trait_ref).to_string()];
            }
            let id = push_symbol(ctx, symbol, parent);
            if let Some(body) = node.child_by_field_name("body") {
                recurse_children(ctx, body, Some(id), SymbolScope::Class);
            }
        }
        "function_item" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let kind = if scope == SymbolScope::Class {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            };
            let mut symbol = base_symbol(kind, name, scope, node);
            symbol.is_async = has_ancestor_keyword(node, "async", ctx.source);
            symbol.parameters = extract_parameters(ctx.source, node.child_by_field_name("parameters"));
            symbol.return_type = field_name(ctx.source, node, "return_type").map(String::from);
            symbol.is_exported = node_text(ctx.source, node).trim_start().starts_with("pub");
            push_symbol(ctx, symbol, parent);
        }
        "const_item" | "static_item" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let symbol = base_symbol(SymbolKind::Constant, name, scope, node);
            push_symbol(ctx, symbol, parent);
        }
        "source_file" | "declaration_list" | "mod_item" => recurse_children(ctx, node, parent, scope),
        _ => {}
    }
}

// ---- Java ----

fn extract_java(ctx: &mut ExtractCtx, node: Node, parent: Option<SymbolId>, scope: SymbolScope) {
    match node.kind() {
        "class_declaration" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let extends = node
                .child_by_field_name("superclass")
                .map(|n| node_text(ctx.source, n).to_string())
                .into_iter()
                .collect();
            let mut symbol = base_symbol(SymbolKind::Class, name, scope, node);
            symbol.extends = extends;
            let id = push_symbol(ctx, symbol, parent);
            if let Some(body) = node.child_by_field_name("body") {
                recurse_children(ctx, body, Some(id), SymbolScope::Class);
            }
        }
        "interface_declaration" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let symbol = base_symbol(SymbolKind::Interface, name, scope, node);
            let id = push_symbol(ctx, symbol, parent);
            if let Some(body) = node.child_by_field_name("body") {
                recurse_children(ctx, body, Some(id), SymbolScope::Class);
            }
        }
        "method_declaration" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let mut symbol = base_symbol(SymbolKind::Method, name, SymbolScope::Class, node);
            symbol.parameters = extract_parameters(ctx.source, node.child_by_field_name("parameters"));
            symbol.return_type = field_name(ctx.source, node, "type").map(String::from);
            symbol.is_abstract = node_text(ctx.source, node).contains("abstract");
            push_symbol(ctx, symbol, parent);
        }
        "field_declaration" => {
            let name = node
                .child_by_field_name("declarator")
                .and_then(|d| field_name(ctx.source, d, "name"))
                .unwrap_or("")
                .to_string();
            let symbol = base_symbol(SymbolKind::Variable, name, SymbolScope::Class, node);
            push_symbol(ctx, symbol, parent);
        }
        "program" | "class_body" => recurse_children(ctx, node, parent, scope),
        _ => {}
    }
}

// ---- C / C++ ----

fn extract_c_like(ctx: &mut ExtractCtx, node: Node, parent: Option<SymbolId>, scope: SymbolScope, is_cpp: bool) {
    match node.kind() {
        "struct_specifier" => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let symbol = base_symbol(SymbolKind::Struct, name, scope, node);
            push_symbol(ctx, symbol, parent);
        }
        "class_specifier" if is_cpp => {
            let name = field_name(ctx.source, node, "name").unwrap_or("").to_string();
            let symbol = base_symbol(SymbolKind::Class, name, scope, node);
            let id = push_symbol(ctx, symbol, parent);
            if let Some(body) = node.child_by_field_name("body") {
                recurse_children(ctx, body, Some(id), SymbolScope::Class);
            }
        }
        "function_definition" => {
            let declarator = node.child_by_field_name("declarator");
            let name = declarator
                .and_then(|d| d.child_by_field_name("declarator"))
                .map(|n| node_text(ctx.source, n).to_string())
                .or_else(|| declarator.map(|d| node_text(ctx.source, d).to_string()))
                .unwrap_or_default();
            let is_arduino = ctx.path.ends_with(".ino") && (name == "setup" || name == "loop");
            let kind = if scope == SymbolScope::Class {
                SymbolKind::Method
            } else if is_arduino {
                SymbolKind::ArduinoSpecialFunction
            } else {
                SymbolKind::Function
            };
            let mut symbol = base_symbol(kind, name, scope, node);
            symbol.is_arduino_special = is_arduino;
            push_symbol(ctx, symbol, parent);
        }
        "translation_unit" => recurse_children(ctx, node, parent, scope),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rust_function_and_struct() {
        let source = "pub struct Foo { x: i32 }\nasync fn bar(x: i32) -> i32 { x }\n";
        let symbols = SymbolExtractor::new().extract(source, Language::Rust, "lib.rs");
        assert!(symbols.iter().any(|s| s.name == "Foo" && s.kind == SymbolKind::Struct));
        let bar = symbols.iter().find(|s| s.name == "bar").unwrap();
        assert!(bar.is_async);
    }

    #[test]
    fn arduino_sketch_marks_setup_and_loop() {
        let source = "void setup(){} void loop(){} int readButton(int pin){return 0;}";
        let symbols = SymbolExtractor::new().extract(source, Language::Cpp, "sketch.ino");
        assert_eq!(symbols.len(), 3);
        let special: Vec<_> = symbols.iter().filter(|s| s.is_arduino_special).collect();
        assert_eq!(special.len(), 2);
        assert!(special.iter().any(|s| s.name == "setup"));
        assert!(special.iter().any(|s| s.name == "loop"));
    }

    #[test]
    fn python_module_level_upper_snake_is_constant() {
        let source = "MAX_SIZE = 10\n\ndef f():\n    pass\n";
        let symbols = SymbolExtractor::new().extract(source, Language::Python, "m.py");
        assert!(symbols
            .iter()
            .any(|s| s.name == "MAX_SIZE" && s.kind == SymbolKind::Constant));
    }

    #[test]
    fn unsupported_language_yields_empty() {
        let symbols = SymbolExtractor::new().extract("# hi", Language::Markdown, "README.md");
        assert!(symbols.is_empty());
    }

    #[test]
    fn symbol_span_is_well_formed() {
        let source = "fn a() {}\nfn b() {}\n";
        let symbols = SymbolExtractor::new().extract(source, Language::Rust, "lib.rs");
        for s in symbols {
            assert!(s.location.start_line <= s.location.end_line);
        }
    }
}
