//! Identifier conventions for generated code

use proc_macro2::Span;
use syn::Ident;

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn",
    "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let", "loop",
    "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "static",
    "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use", "virtual",
    "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers
const NON_RAW: &[&str] = &["self", "Self", "super", "crate", "_"];

/// Split a database name into lowercase words
fn words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `UserAccounts` -> `user_accounts`, invalid characters become `_`
pub fn to_snake_case(name: &str) -> String {
    let snake = words(name).join("_");
    if snake.is_empty() {
        return "_".to_string();
    }
    if snake.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", snake)
    } else {
        snake
    }
}

/// `user_accounts` -> `UserAccounts`
pub fn to_pascal_case(name: &str) -> String {
    let pascal: String = words(name)
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if pascal.is_empty() || pascal.starts_with(|c: char| c.is_ascii_digit()) {
        format!("T{}", pascal)
    } else {
        pascal
    }
}

/// Identifier for a snake_case name, raw when it is a keyword
pub fn snake_ident(name: &str) -> Ident {
    ident(&to_snake_case(name))
}

/// Identifier for a PascalCase name
pub fn pascal_ident(name: &str) -> Ident {
    ident(&to_pascal_case(name))
}

/// Identifier from an already-cased name
pub fn ident(name: &str) -> Ident {
    if NON_RAW.contains(&name) {
        Ident::new(&format!("{}_", name), Span::call_site())
    } else if KEYWORDS.contains(&name) {
        Ident::new_raw(name, Span::call_site())
    } else {
        Ident::new(name, Span::call_site())
    }
}

/// File stem for a table module
pub fn module_file_stem(table: &str) -> String {
    let snake = to_snake_case(table);
    if NON_RAW.contains(&snake.as_str()) {
        format!("{}_", snake)
    } else {
        snake
    }
}
