//! Per-language tree-sitter adapters.
//!
//! Every grammar-backed language is described by a [`LanguageAdapter`]:
//! which AST node kinds produce symbols, how to pull a name out of them,
//! how to recognize call expressions and type references, and how the
//! language expresses visibility and test code. The extractor drives one
//! generic traversal over the tree and asks the adapter at each node, so
//! adding a language means adding a table entry here, not another arm to
//! a growing match in the traversal.

use tree_sitter::{Language, Node};

use crate::models::ChunkKind;

/// A symbol recognized at a node.
pub struct SymbolMatch {
    pub kind: ChunkKind,
    pub name: String,
    /// Overrides the traversal parent (Go method receivers).
    pub parent_override: Option<String>,
}

/// Everything the extractor needs to know about one language.
pub struct LanguageAdapter {
    pub name: &'static str,
    pub grammar: Language,
    /// Recognize a symbol-bearing node. `parent` is the enclosing
    /// class-like symbol name, empty at top level.
    pub symbol: fn(&Node, &[u8], &str) -> Option<SymbolMatch>,
    /// If the node is a call expression, the callee name (dotted form
    /// for member calls).
    pub call: fn(&Node, &[u8]) -> Option<String>,
    /// If the node is a type reference, the referenced type name.
    pub reference: fn(&Node, &[u8]) -> Option<String>,
    /// Visibility rule for a named symbol node.
    pub is_exported: fn(&Node, &str, &[u8]) -> bool,
    pub keywords: &'static [&'static str],
    pub builtin_types: &'static [&'static str],
    /// Content substrings that classify a file as a test.
    pub test_markers: &'static [&'static str],
}

/// Look up the adapter for a language tag, if a grammar is available.
pub fn adapter_for(language: &str) -> Option<&'static LanguageAdapter> {
    ADAPTERS.iter().find(|a| a.name == language)
}

pub fn supported_languages() -> Vec<&'static str> {
    ADAPTERS.iter().map(|a| a.name).collect()
}

fn node_text(node: &Node, src: &[u8]) -> String {
    node.utf8_text(src).unwrap_or_default().to_string()
}

fn field_text(node: &Node, field: &str, src: &[u8]) -> Option<String> {
    node.child_by_field_name(field).map(|n| node_text(&n, src))
}

/// Callee name from the function position of a call expression. Member
/// and scoped forms keep their full dotted spelling; `::` paths are
/// normalized to dots so suffix matching works uniformly.
fn callee_name(node: &Node, src: &[u8]) -> Option<String> {
    let text = match node.kind() {
        "identifier" | "type_identifier" | "field_identifier" | "property_identifier"
        | "constant" => node_text(node, src),
        "selector_expression" | "member_expression" | "attribute" | "field_expression"
        | "member_access_expression" | "scoped_identifier" | "navigation_expression" => {
            node_text(node, src)
        }
        "parenthesized_expression" | "generic_function" => {
            let child = node.child_by_field_name("function").or_else(|| node.child(0))?;
            return callee_name(&child, src);
        }
        _ => {
            // Complex expression: keep the rightmost identifier.
            let text = node_text(node, src);
            match text.rfind('.') {
                Some(idx) => text[idx + 1..].to_string(),
                None => text,
            }
        }
    };

    let text = text.replace("::", ".");
    if text.is_empty() || text.contains('(') || text.contains('\n') || text.len() > 128 {
        return None;
    }
    Some(text)
}

/// First identifier found under a declarator (C/C++ function names).
fn find_identifier<'t>(node: Node<'t>) -> Option<Node<'t>> {
    if node.kind() == "identifier" || node.kind() == "field_identifier" {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        if let Some(found) = find_identifier(child) {
            return Some(found);
        }
    }
    None
}

fn has_ancestor_kind(node: &Node, kind: &str) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == kind {
            return true;
        }
        current = n.parent();
    }
    false
}

fn has_child_kind(node: &Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|c| c.kind() == kind);
    result
}

fn modifiers_contain(node: &Node, needle: &str, src: &[u8]) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(
            child.kind(),
            "modifiers" | "modifier" | "visibility_modifier"
        ) && node_text(&child, src).contains(needle)
        {
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------- go

fn go_symbol(node: &Node, src: &[u8], _parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "function_declaration" => Some(SymbolMatch {
            kind: ChunkKind::Function,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "method_declaration" => {
            let name = field_text(node, "name", src)?;
            let receiver = node
                .child_by_field_name("receiver")
                .and_then(|recv| go_receiver_type(&recv, src));
            Some(SymbolMatch {
                kind: ChunkKind::Method,
                name,
                parent_override: receiver,
            })
        }
        "type_declaration" => {
            let mut cursor = node.walk();
            let spec = node
                .children(&mut cursor)
                .find(|c| c.kind() == "type_spec")?;
            Some(SymbolMatch {
                kind: ChunkKind::Class,
                name: field_text(&spec, "name", src)?,
                parent_override: None,
            })
        }
        _ => None,
    }
}

fn go_receiver_type(recv: &Node, src: &[u8]) -> Option<String> {
    let mut cursor = recv.walk();
    for child in recv.children(&mut cursor) {
        if child.kind() == "parameter_declaration" {
            if let Some(ty) = child.child_by_field_name("type") {
                let text = node_text(&ty, src);
                return Some(text.trim_start_matches('*').to_string());
            }
        }
    }
    None
}

fn go_call(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    callee_name(&node.child_by_field_name("function")?, src)
}

fn go_reference(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() == "type_identifier" {
        return Some(node_text(node, src));
    }
    None
}

fn go_exported(_node: &Node, name: &str, _src: &[u8]) -> bool {
    let base = name.rsplit('.').next().unwrap_or(name);
    base.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

// ------------------------------------------------------------ python

fn python_symbol(node: &Node, src: &[u8], parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "function_definition" => Some(SymbolMatch {
            kind: if parent.is_empty() {
                ChunkKind::Function
            } else {
                ChunkKind::Method
            },
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "class_definition" => Some(SymbolMatch {
            kind: ChunkKind::Class,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        _ => None,
    }
}

fn python_call(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "call" {
        return None;
    }
    callee_name(&node.child_by_field_name("function")?, src)
}

fn python_reference(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "identifier" {
        return None;
    }
    let parent = node.parent()?;
    if parent.kind() == "type" || parent.kind().contains("annotation") {
        return Some(node_text(node, src));
    }
    None
}

fn python_exported(_node: &Node, name: &str, _src: &[u8]) -> bool {
    let base = name.rsplit('.').next().unwrap_or(name);
    !base.starts_with('_')
}

// -------------------------------------------- javascript / typescript

fn js_symbol(node: &Node, src: &[u8], _parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => Some(SymbolMatch {
            kind: ChunkKind::Function,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "method_definition" => Some(SymbolMatch {
            kind: ChunkKind::Method,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "class_declaration" => Some(SymbolMatch {
            kind: ChunkKind::Class,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "arrow_function" => {
            let parent = node.parent()?;
            if parent.kind() != "variable_declarator" {
                return None;
            }
            Some(SymbolMatch {
                kind: ChunkKind::Function,
                name: field_text(&parent, "name", src)?,
                parent_override: None,
            })
        }
        _ => None,
    }
}

fn ts_symbol(node: &Node, src: &[u8], parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "interface_declaration" | "enum_declaration" | "type_alias_declaration" => {
            Some(SymbolMatch {
                kind: ChunkKind::Class,
                name: field_text(node, "name", src)?,
                parent_override: None,
            })
        }
        _ => js_symbol(node, src, parent),
    }
}

fn js_call(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    callee_name(&node.child_by_field_name("function")?, src)
}

fn js_reference(_node: &Node, _src: &[u8]) -> Option<String> {
    None
}

fn ts_reference(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "type_identifier" && node.kind() != "identifier" {
        return None;
    }
    let parent = node.parent()?;
    if node.kind() == "type_identifier" || parent.kind().contains("type") {
        return Some(node_text(node, src));
    }
    None
}

fn js_exported(node: &Node, _name: &str, _src: &[u8]) -> bool {
    has_ancestor_kind(node, "export_statement")
}

// -------------------------------------------------------------- rust

fn rust_symbol(node: &Node, src: &[u8], parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "function_item" => Some(SymbolMatch {
            kind: if parent.is_empty() {
                ChunkKind::Function
            } else {
                ChunkKind::Method
            },
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "impl_item" => {
            let name = field_text(node, "type", src).or_else(|| {
                let mut cursor = node.walk();
                let result = node
                    .children(&mut cursor)
                    .find(|c| c.kind() == "type_identifier")
                    .map(|c| node_text(&c, src));
                result
            })?;
            Some(SymbolMatch {
                kind: ChunkKind::Class,
                name,
                parent_override: None,
            })
        }
        "struct_item" | "enum_item" | "trait_item" | "type_item" => Some(SymbolMatch {
            kind: ChunkKind::Class,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        _ => None,
    }
}

fn rust_call(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    callee_name(&node.child_by_field_name("function")?, src)
}

fn rust_reference(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() == "type_identifier" {
        return Some(node_text(node, src));
    }
    None
}

fn rust_exported(node: &Node, _name: &str, _src: &[u8]) -> bool {
    has_child_kind(node, "visibility_modifier")
}

// ------------------------------------------------------ java / c#

fn java_symbol(node: &Node, src: &[u8], _parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "method_declaration" | "constructor_declaration" => Some(SymbolMatch {
            kind: ChunkKind::Method,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "class_declaration" | "interface_declaration" | "enum_declaration"
        | "record_declaration" => Some(SymbolMatch {
            kind: ChunkKind::Class,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        _ => None,
    }
}

fn java_call(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "method_invocation" {
        return None;
    }
    callee_name(&node.child_by_field_name("name")?, src)
}

fn typeish_reference(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "type_identifier" && node.kind() != "identifier" {
        return None;
    }
    let parent = node.parent()?;
    if node.kind() == "type_identifier" || parent.kind().contains("type") {
        return Some(node_text(node, src));
    }
    None
}

fn modifier_exported(node: &Node, _name: &str, src: &[u8]) -> bool {
    modifiers_contain(node, "public", src)
}

fn csharp_symbol(node: &Node, src: &[u8], _parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "method_declaration" | "constructor_declaration" => Some(SymbolMatch {
            kind: ChunkKind::Method,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "class_declaration" | "interface_declaration" | "struct_declaration"
        | "enum_declaration" | "record_declaration" => Some(SymbolMatch {
            kind: ChunkKind::Class,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        _ => None,
    }
}

fn csharp_call(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "invocation_expression" {
        return None;
    }
    callee_name(&node.child_by_field_name("function")?, src)
}

// -------------------------------------------------------------- ruby

fn ruby_symbol(node: &Node, src: &[u8], _parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "method" | "singleton_method" => Some(SymbolMatch {
            kind: ChunkKind::Method,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "class" | "module" => Some(SymbolMatch {
            kind: ChunkKind::Class,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        _ => None,
    }
}

fn ruby_call(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "call" {
        return None;
    }
    callee_name(&node.child_by_field_name("method")?, src)
}

// --------------------------------------------------------- c / c++

fn c_symbol(node: &Node, src: &[u8], _parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "function_definition" => {
            let declarator = node.child_by_field_name("declarator")?;
            let ident = find_identifier(declarator)?;
            Some(SymbolMatch {
                kind: ChunkKind::Function,
                name: node_text(&ident, src),
                parent_override: None,
            })
        }
        "class_specifier" | "struct_specifier" => {
            // Anonymous structs in typedefs have no name field.
            let name = field_text(node, "name", src)?;
            Some(SymbolMatch {
                kind: ChunkKind::Class,
                name,
                parent_override: None,
            })
        }
        _ => None,
    }
}

fn c_call(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    callee_name(&node.child_by_field_name("function")?, src)
}

fn c_reference(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() == "type_identifier" {
        return Some(node_text(node, src));
    }
    None
}

// --------------------------------------------------------------- php

fn php_symbol(node: &Node, src: &[u8], _parent: &str) -> Option<SymbolMatch> {
    match node.kind() {
        "function_definition" => Some(SymbolMatch {
            kind: ChunkKind::Function,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "method_declaration" => Some(SymbolMatch {
            kind: ChunkKind::Method,
            name: field_text(node, "name", src)?,
            parent_override: None,
        }),
        "class_declaration" | "interface_declaration" | "trait_declaration" => {
            Some(SymbolMatch {
                kind: ChunkKind::Class,
                name: field_text(node, "name", src)?,
                parent_override: None,
            })
        }
        _ => None,
    }
}

fn php_call(node: &Node, src: &[u8]) -> Option<String> {
    match node.kind() {
        "function_call_expression" => callee_name(&node.child_by_field_name("function")?, src),
        "member_call_expression" => callee_name(&node.child_by_field_name("name")?, src),
        _ => None,
    }
}

// -------------------------------------------------------------- bash

fn bash_symbol(node: &Node, src: &[u8], _parent: &str) -> Option<SymbolMatch> {
    if node.kind() != "function_definition" {
        return None;
    }
    Some(SymbolMatch {
        kind: ChunkKind::Function,
        name: field_text(node, "name", src)?,
        parent_override: None,
    })
}

fn bash_call(node: &Node, src: &[u8]) -> Option<String> {
    if node.kind() != "command" {
        return None;
    }
    callee_name(&node.child_by_field_name("name")?, src)
}

fn no_reference(_node: &Node, _src: &[u8]) -> Option<String> {
    None
}

fn always_exported(_node: &Node, _name: &str, _src: &[u8]) -> bool {
    true
}

// ------------------------------------------------------- tables

const GO_KEYWORDS: &[&str] = &[
    "if", "else", "for", "range", "switch", "case", "default", "return", "break", "continue",
    "go", "defer", "select", "chan", "map", "make", "new", "len", "cap", "append", "copy",
    "delete", "panic", "recover", "print", "println", "close", "error", "nil", "true", "false",
];

const GO_BUILTINS: &[&str] = &[
    "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64",
    "float32", "float64", "complex64", "complex128", "string", "bool", "byte", "rune", "error",
    "any", "comparable",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "if", "else", "elif", "for", "while", "try", "except", "finally", "with", "as", "import",
    "from", "class", "def", "return", "yield", "raise", "pass", "break", "continue", "lambda",
    "and", "or", "not", "in", "is", "None", "True", "False", "print", "len", "range", "list",
    "dict", "set", "tuple", "str", "int", "float", "bool", "type", "self", "cls", "super",
    "isinstance", "hasattr",
];

const PYTHON_BUILTINS: &[&str] = &[
    "int", "float", "str", "bool", "list", "dict", "set", "tuple", "None", "bytes", "object",
    "type", "range", "slice",
];

const JS_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "default", "break", "continue",
    "return", "throw", "try", "catch", "finally", "function", "class", "new", "this", "super",
    "import", "export", "const", "let", "var", "async", "await", "typeof", "instanceof", "null",
    "undefined", "true", "false", "console", "require", "module", "exports", "Array", "Object",
    "String", "Number", "Boolean", "Promise", "Map", "Set", "JSON", "Math",
];

const TS_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "default", "break", "continue",
    "return", "throw", "try", "catch", "finally", "function", "class", "new", "this", "super",
    "import", "export", "const", "let", "var", "async", "await", "typeof", "instanceof", "null",
    "undefined", "true", "false", "interface", "type", "enum", "namespace", "public", "private",
    "protected", "readonly", "any", "unknown", "never", "void", "console", "require", "Promise",
    "JSON", "Math",
];

const JS_BUILTINS: &[&str] = &[
    "string", "number", "boolean", "object", "function", "undefined", "symbol", "bigint",
];

const TS_BUILTINS: &[&str] = &[
    "string", "number", "boolean", "object", "any", "unknown", "never", "void", "null",
    "undefined", "symbol", "bigint",
];

const RUST_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "loop", "match", "return", "break", "continue", "let", "mut",
    "fn", "impl", "struct", "enum", "trait", "mod", "use", "pub", "self", "Self", "super",
    "crate", "true", "false", "Some", "None", "Ok", "Err", "vec", "println", "eprintln",
    "format", "panic", "assert", "assert_eq", "assert_ne", "todo", "unimplemented", "write",
    "writeln", "matches",
];

const RUST_BUILTINS: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize",
    "f32", "f64", "bool", "char", "str", "String", "Vec", "Option", "Result", "Box", "Rc",
    "Arc", "Self",
];

const COMMON_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "return", "break", "continue", "true", "false", "null", "new",
    "this", "self", "class", "function", "print", "echo", "require", "include",
];

const COMMON_BUILTINS: &[&str] = &[
    "int", "long", "short", "float", "double", "char", "bool", "boolean", "string", "void",
    "object", "byte",
];

static ADAPTERS: std::sync::LazyLock<Vec<LanguageAdapter>> = std::sync::LazyLock::new(|| {
    vec![
        LanguageAdapter {
            name: "go",
            grammar: tree_sitter_go::LANGUAGE.into(),
            symbol: go_symbol,
            call: go_call,
            reference: go_reference,
            is_exported: go_exported,
            keywords: GO_KEYWORDS,
            builtin_types: GO_BUILTINS,
            test_markers: &["func Test", "testing.T"],
        },
        LanguageAdapter {
            name: "python",
            grammar: tree_sitter_python::LANGUAGE.into(),
            symbol: python_symbol,
            call: python_call,
            reference: python_reference,
            is_exported: python_exported,
            keywords: PYTHON_KEYWORDS,
            builtin_types: PYTHON_BUILTINS,
            test_markers: &["def test_", "unittest", "pytest"],
        },
        LanguageAdapter {
            name: "javascript",
            grammar: tree_sitter_javascript::LANGUAGE.into(),
            symbol: js_symbol,
            call: js_call,
            reference: js_reference,
            is_exported: js_exported,
            keywords: JS_KEYWORDS,
            builtin_types: JS_BUILTINS,
            test_markers: &["describe(", "it(", "test("],
        },
        LanguageAdapter {
            name: "typescript",
            grammar: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            symbol: ts_symbol,
            call: js_call,
            reference: ts_reference,
            is_exported: js_exported,
            keywords: TS_KEYWORDS,
            builtin_types: TS_BUILTINS,
            test_markers: &["describe(", "it(", "test("],
        },
        LanguageAdapter {
            name: "rust",
            grammar: tree_sitter_rust::LANGUAGE.into(),
            symbol: rust_symbol,
            call: rust_call,
            reference: rust_reference,
            is_exported: rust_exported,
            keywords: RUST_KEYWORDS,
            builtin_types: RUST_BUILTINS,
            test_markers: &["#[test]", "#[cfg(test)]"],
        },
        LanguageAdapter {
            name: "java",
            grammar: tree_sitter_java::LANGUAGE.into(),
            symbol: java_symbol,
            call: java_call,
            reference: typeish_reference,
            is_exported: modifier_exported,
            keywords: COMMON_KEYWORDS,
            builtin_types: COMMON_BUILTINS,
            test_markers: &["@Test", "junit"],
        },
        LanguageAdapter {
            name: "csharp",
            grammar: tree_sitter_c_sharp::LANGUAGE.into(),
            symbol: csharp_symbol,
            call: csharp_call,
            reference: typeish_reference,
            is_exported: modifier_exported,
            keywords: COMMON_KEYWORDS,
            builtin_types: COMMON_BUILTINS,
            test_markers: &["[Test]", "[Fact]"],
        },
        LanguageAdapter {
            name: "ruby",
            grammar: tree_sitter_ruby::LANGUAGE.into(),
            symbol: ruby_symbol,
            call: ruby_call,
            reference: no_reference,
            is_exported: always_exported,
            keywords: COMMON_KEYWORDS,
            builtin_types: COMMON_BUILTINS,
            test_markers: &["RSpec", "def test_"],
        },
        LanguageAdapter {
            name: "c",
            grammar: tree_sitter_c::LANGUAGE.into(),
            symbol: c_symbol,
            call: c_call,
            reference: c_reference,
            is_exported: always_exported,
            keywords: COMMON_KEYWORDS,
            builtin_types: COMMON_BUILTINS,
            test_markers: &[],
        },
        LanguageAdapter {
            name: "cpp",
            grammar: tree_sitter_cpp::LANGUAGE.into(),
            symbol: c_symbol,
            call: c_call,
            reference: c_reference,
            is_exported: always_exported,
            keywords: COMMON_KEYWORDS,
            builtin_types: COMMON_BUILTINS,
            test_markers: &["TEST(", "TEST_F("],
        },
        LanguageAdapter {
            name: "php",
            grammar: tree_sitter_php::LANGUAGE_PHP.into(),
            symbol: php_symbol,
            call: php_call,
            reference: no_reference,
            is_exported: modifier_exported,
            keywords: COMMON_KEYWORDS,
            builtin_types: COMMON_BUILTINS,
            test_markers: &["PHPUnit", "function test"],
        },
        LanguageAdapter {
            name: "bash",
            grammar: tree_sitter_bash::LANGUAGE.into(),
            symbol: bash_symbol,
            call: bash_call,
            reference: no_reference,
            is_exported: always_exported,
            keywords: COMMON_KEYWORDS,
            builtin_types: COMMON_BUILTINS,
            test_markers: &[],
        },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_lookup() {
        assert!(adapter_for("rust").is_some());
        assert!(adapter_for("go").is_some());
        assert!(adapter_for("python").is_some());
        assert!(adapter_for("cobol").is_none());
    }

    #[test]
    fn test_supported_languages_contains_core_set() {
        let langs = supported_languages();
        for expected in ["rust", "go", "python", "javascript", "typescript", "java"] {
            assert!(langs.contains(&expected), "missing {expected}");
        }
    }
}
