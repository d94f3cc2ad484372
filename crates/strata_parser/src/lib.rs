//! Hand-rolled recursive descent parser for the `.schema` IDL.
//!
//! The main entry point is [`parse_file`], which takes a loaded source file
//! and returns a [`SchemaFile`]. Errors are reported to a
//! [`DiagnosticSink`]; the returned AST holds whatever could be recovered.
//! [`scan_imports`] and [`scan_package`] are tolerant fast paths that
//! extract import paths and the package name without building an AST, used
//! to discover module dependencies and package-wide targets.
//!
//! # Architecture
//!
//! - **Lexer** ([`lexer`]): source text to tokens, skipping comments.
//! - **Parser** ([`parser`]): recursive descent with statement-level recovery.
//! - **AST** ([`ast`]): node types with spans and serde support.

#![warn(missing_docs)]

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::SchemaFile;
pub use token::{SchemaToken, Token};

use strata_diagnostics::DiagnosticSink;
use strata_source::{FileId, SourceFile};

/// Parses a loaded schema file into an AST.
pub fn parse_file(file: &SourceFile, sink: &DiagnosticSink) -> SchemaFile {
    parse_source(&file.content, file.id, sink)
}

/// Parses schema text attributed to `file_id`.
pub fn parse_source(source: &str, file_id: FileId, sink: &DiagnosticSink) -> SchemaFile {
    let tokens = lexer::lex(source, file_id, sink);
    let mut parser = parser::SchemaParser::new(tokens, source, sink);
    parser.parse_file()
}

/// Extracts the paths of all `import` statements in `source`.
///
/// Lexing errors are ignored. Paths are returned in source order and may
/// repeat.
pub fn scan_imports(source: &str) -> Vec<String> {
    let sink = DiagnosticSink::new();
    let tokens = lexer::lex(source, FileId::DUMMY, &sink);
    let text = |token: &Token| {
        source
            .get(token.span.start as usize..token.span.end as usize)
            .unwrap_or("")
    };
    let mut imports = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].kind != SchemaToken::Import {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        if tokens.get(j).map(|t| t.kind) == Some(SchemaToken::Public) {
            j += 1;
        }
        match tokens.get(j) {
            Some(token) if token.kind == SchemaToken::StringLiteral => {
                imports.push(lexer::unquote(text(token)));
                i = j + 1;
            }
            _ => i = j,
        }
    }
    imports
}

/// Extracts the name declared by the top-level `package` statement of
/// `source`, if there is a well-formed one.
///
/// Lexing errors are ignored.
pub fn scan_package(source: &str) -> Option<String> {
    let sink = DiagnosticSink::new();
    let tokens = lexer::lex(source, FileId::DUMMY, &sink);
    let text = |token: &Token| {
        source
            .get(token.span.start as usize..token.span.end as usize)
            .unwrap_or("")
    };
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            SchemaToken::LeftBrace => depth += 1,
            SchemaToken::RightBrace => depth = depth.saturating_sub(1),
            SchemaToken::Package if depth == 0 => {
                let mut name = String::new();
                let mut expect_name = true;
                for next in &tokens[i + 1..] {
                    match next.kind {
                        kind if expect_name && kind.is_name() => name.push_str(text(next)),
                        SchemaToken::Dot if !expect_name => name.push('.'),
                        SchemaToken::Semicolon if !expect_name => return Some(name),
                        _ => break,
                    }
                    expect_name = !expect_name;
                }
            }
            _ => {}
        }
    }
    None
}
