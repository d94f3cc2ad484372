//! Recursive descent parser for schema files.
//!
//! The [`SchemaParser`] struct provides primitive operations (advance,
//! expect, eat) and statement-level error recovery. Errors are reported to
//! the diagnostic sink; the parser always returns a [`SchemaFile`] holding
//! whatever it could recover.

use crate::ast::*;
use crate::lexer::unquote;
use crate::token::{SchemaToken, Token};
use strata_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink, Label};
use strata_source::Span;

const EXPECTED: DiagnosticCode = DiagnosticCode::new(Category::Parse, 101);
const SYNTAX_PLACEMENT: DiagnosticCode = DiagnosticCode::new(Category::Parse, 102);
const UNKNOWN_SYNTAX: DiagnosticCode = DiagnosticCode::new(Category::Parse, 103);
const DUPLICATE_PACKAGE: DiagnosticCode = DiagnosticCode::new(Category::Parse, 104);
const NUMBER_RANGE: DiagnosticCode = DiagnosticCode::new(Category::Parse, 105);

/// The largest field number a message may declare.
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// A recursive descent parser over a token stream.
pub struct SchemaParser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    sink: &'src DiagnosticSink,
}

impl<'src> SchemaParser<'src> {
    /// Creates a parser over `tokens`, which must have been lexed from
    /// `source`.
    pub fn new(tokens: Vec<Token>, source: &'src str, sink: &'src DiagnosticSink) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            sink,
        }
    }

    // ========================================================================
    // Primitive operations
    // ========================================================================

    fn current(&self) -> SchemaToken {
        self.tokens
            .get(self.pos)
            .map(|t| t.kind)
            .unwrap_or(SchemaToken::Eof)
    }

    fn current_span(&self) -> Span {
        match self.tokens.get(self.pos).or(self.tokens.last()) {
            Some(token) => token.span,
            None => Span::DUMMY,
        }
    }

    fn current_text(&self) -> &'src str {
        let span = self.current_span();
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or("")
    }

    fn at(&self, kind: SchemaToken) -> bool {
        self.current() == kind
    }

    fn at_eof(&self) -> bool {
        self.at(SchemaToken::Eof)
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: SchemaToken) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: SchemaToken) -> bool {
        let ok = self.eat(kind);
        if !ok {
            self.expected(kind.describe());
        }
        ok
    }

    fn expect_name(&mut self) -> Option<(String, Span)> {
        if self.current().is_name() {
            let name = self.current_text().to_string();
            let span = self.current_span();
            self.advance();
            Some((name, span))
        } else {
            self.expected("identifier");
            None
        }
    }

    fn expect_string(&mut self) -> Option<String> {
        if self.at(SchemaToken::StringLiteral) {
            let value = unquote(self.current_text());
            self.advance();
            Some(value)
        } else {
            self.expected("string");
            None
        }
    }

    // ========================================================================
    // Error handling and recovery
    // ========================================================================

    fn error(&self, code: DiagnosticCode, msg: impl Into<String>, span: Span) {
        self.sink.emit(Diagnostic::error(code, msg, span));
    }

    fn expected(&self, what: &str) {
        // The lexer has already reported error tokens.
        if self.at(SchemaToken::Error) {
            return;
        }
        let found = match self.current() {
            SchemaToken::Identifier => format!("'{}'", self.current_text()),
            other => other.describe().to_string(),
        };
        self.error(
            EXPECTED,
            format!("expected {what}, found {found}"),
            self.current_span(),
        );
    }

    /// Skips to just past the next `;`, or up to a `}` or end of file.
    fn recover_statement(&mut self) {
        while !self.at_eof() && !self.at(SchemaToken::RightBrace) {
            if self.eat(SchemaToken::Semicolon) {
                return;
            }
            self.advance();
        }
    }

    // ========================================================================
    // Top-level parsing
    // ========================================================================

    /// Parses a complete file.
    pub fn parse_file(&mut self) -> SchemaFile {
        let start = self.current_span();
        let mut file = SchemaFile {
            syntax: None,
            package: None,
            imports: Vec::new(),
            items: Vec::new(),
            span: start,
        };
        let mut statements = 0usize;
        while !self.at_eof() {
            match self.current() {
                SchemaToken::Syntax => {
                    let decl = self.parse_syntax();
                    if let Some(decl) = decl {
                        if file.syntax.is_some() || statements > 0 {
                            self.error(
                                SYNTAX_PLACEMENT,
                                "syntax statement must be the first statement and appear only once",
                                decl.span,
                            );
                        } else {
                            file.syntax = Some(decl);
                        }
                    }
                }
                SchemaToken::Package => {
                    if let Some(decl) = self.parse_package() {
                        match &file.package {
                            Some(previous) => self.sink.emit(
                                Diagnostic::error(
                                    DUPLICATE_PACKAGE,
                                    "multiple package statements",
                                    decl.span,
                                )
                                .with_label(Label::secondary(previous.span, "first declared here")),
                            ),
                            None => file.package = Some(decl),
                        }
                    }
                }
                SchemaToken::Import => {
                    if let Some(decl) = self.parse_import() {
                        file.imports.push(decl);
                    }
                }
                SchemaToken::Message => file.items.push(Item::Message(self.parse_message())),
                SchemaToken::Enum => file.items.push(Item::Enum(self.parse_enum())),
                SchemaToken::Semicolon => self.advance(),
                _ => {
                    self.expected("'syntax', 'package', 'import', 'message' or 'enum'");
                    self.advance();
                    self.recover_statement();
                    if self.at(SchemaToken::RightBrace) {
                        self.advance();
                    }
                }
            }
            statements += 1;
        }
        file.span = start.to(self.prev_span());
        file
    }

    fn parse_syntax(&mut self) -> Option<SyntaxDecl> {
        let start = self.current_span();
        self.advance();
        if !self.expect(SchemaToken::Equals) {
            self.recover_statement();
            return None;
        }
        let value_span = self.current_span();
        let Some(value) = self.expect_string() else {
            self.recover_statement();
            return None;
        };
        self.expect(SchemaToken::Semicolon);
        if !KNOWN_SYNTAXES.contains(&value.as_str()) {
            self.error(
                UNKNOWN_SYNTAX,
                format!("unknown syntax {value:?}, expected \"schema1\" or \"schema2\""),
                value_span,
            );
        }
        Some(SyntaxDecl {
            value,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_package(&mut self) -> Option<PackageDecl> {
        let start = self.current_span();
        self.advance();
        let Some(name) = self.parse_dotted_name() else {
            self.recover_statement();
            return None;
        };
        self.expect(SchemaToken::Semicolon);
        Some(PackageDecl {
            name,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_import(&mut self) -> Option<ImportDecl> {
        let start = self.current_span();
        self.advance();
        let public = self.eat(SchemaToken::Public);
        let Some(path) = self.expect_string() else {
            self.recover_statement();
            return None;
        };
        self.expect(SchemaToken::Semicolon);
        Some(ImportDecl {
            path,
            public,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_dotted_name(&mut self) -> Option<String> {
        let (mut name, _) = self.expect_name()?;
        while self.eat(SchemaToken::Dot) {
            let (part, _) = self.expect_name()?;
            name.push('.');
            name.push_str(&part);
        }
        Some(name)
    }

    fn parse_message(&mut self) -> MessageDecl {
        let start = self.current_span();
        self.advance();
        let (name, name_span) = self
            .expect_name()
            .unwrap_or_else(|| ("<missing>".to_string(), self.current_span()));
        let mut message = MessageDecl {
            name,
            name_span,
            fields: Vec::new(),
            nested: Vec::new(),
            span: start,
        };
        if !self.expect(SchemaToken::LeftBrace) {
            self.recover_statement();
            message.span = start.to(self.prev_span());
            return message;
        }
        while !self.at_eof() && !self.at(SchemaToken::RightBrace) {
            match self.current() {
                SchemaToken::Message if self.peek_is_name() => {
                    message.nested.push(Item::Message(self.parse_message()))
                }
                SchemaToken::Enum if self.peek_is_name() => {
                    message.nested.push(Item::Enum(self.parse_enum()))
                }
                SchemaToken::Semicolon => self.advance(),
                _ => {
                    if let Some(field) = self.parse_field() {
                        message.fields.push(field);
                    }
                }
            }
        }
        self.expect(SchemaToken::RightBrace);
        message.span = start.to(self.prev_span());
        message
    }

    /// `message Foo {` starts a nested declaration, `message foo = 1;` is a
    /// field whose type is named `message`.
    fn peek_is_name(&self) -> bool {
        let next = self.tokens.get(self.pos + 1).map(|t| t.kind);
        let after = self.tokens.get(self.pos + 2).map(|t| t.kind);
        matches!(next, Some(kind) if kind.is_name()) && after == Some(SchemaToken::LeftBrace)
    }

    fn parse_field(&mut self) -> Option<FieldDecl> {
        let start = self.current_span();
        let label = if self.eat(SchemaToken::Repeated) {
            FieldLabel::Repeated
        } else if self.eat(SchemaToken::Optional) {
            FieldLabel::Optional
        } else {
            FieldLabel::None
        };
        let Some(ty) = self.parse_type() else {
            self.recover_statement();
            return None;
        };
        let Some((name, name_span)) = self.expect_name() else {
            self.recover_statement();
            return None;
        };
        if !self.expect(SchemaToken::Equals) {
            self.recover_statement();
            return None;
        }
        let number_span = self.current_span();
        let number = match self.parse_int() {
            Some(value) if (1..=i64::from(MAX_FIELD_NUMBER)).contains(&value) => value as u32,
            Some(value) => {
                self.error(
                    NUMBER_RANGE,
                    format!("field number {value} must be between 1 and {MAX_FIELD_NUMBER}"),
                    number_span,
                );
                0
            }
            None => {
                self.recover_statement();
                return None;
            }
        };
        self.expect(SchemaToken::Semicolon);
        Some(FieldDecl {
            label,
            ty,
            name,
            name_span,
            number,
            number_span,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_type(&mut self) -> Option<TypeRef> {
        let start = self.current_span();
        let absolute = self.eat(SchemaToken::Dot);
        let name = self.parse_dotted_name()?;
        let span = start.to(self.prev_span());
        if !absolute && !name.contains('.') {
            if let Some(scalar) = ScalarType::from_name(&name) {
                return Some(TypeRef::Scalar { scalar, span });
            }
        }
        Some(TypeRef::Named {
            name,
            absolute,
            span,
        })
    }

    fn parse_int(&mut self) -> Option<i64> {
        let start = self.current_span();
        let negative = self.eat(SchemaToken::Minus);
        if !self.at(SchemaToken::IntLiteral) {
            self.expected("integer");
            return None;
        }
        let parsed = self.current_text().parse::<i64>();
        self.advance();
        match parsed {
            Ok(value) if negative => Some(-value),
            Ok(value) => Some(value),
            Err(_) => {
                self.error(
                    NUMBER_RANGE,
                    "integer literal out of range",
                    start.to(self.prev_span()),
                );
                None
            }
        }
    }

    fn parse_enum(&mut self) -> EnumDecl {
        let start = self.current_span();
        self.advance();
        let (name, name_span) = self
            .expect_name()
            .unwrap_or_else(|| ("<missing>".to_string(), self.current_span()));
        let mut decl = EnumDecl {
            name,
            name_span,
            values: Vec::new(),
            span: start,
        };
        if !self.expect(SchemaToken::LeftBrace) {
            self.recover_statement();
            decl.span = start.to(self.prev_span());
            return decl;
        }
        while !self.at_eof() && !self.at(SchemaToken::RightBrace) {
            if self.eat(SchemaToken::Semicolon) {
                continue;
            }
            if let Some(value) = self.parse_enum_value() {
                decl.values.push(value);
            }
        }
        self.expect(SchemaToken::RightBrace);
        decl.span = start.to(self.prev_span());
        decl
    }

    fn parse_enum_value(&mut self) -> Option<EnumValue> {
        let start = self.current_span();
        let Some((name, _)) = self.expect_name() else {
            self.recover_statement();
            return None;
        };
        if !self.expect(SchemaToken::Equals) {
            self.recover_statement();
            return None;
        }
        let number_span = self.current_span();
        let number = match self.parse_int() {
            Some(value) => i32::try_from(value).unwrap_or_else(|_| {
                self.error(
                    NUMBER_RANGE,
                    format!("enum value {value} does not fit in 32 bits"),
                    number_span,
                );
                0
            }),
            None => {
                self.recover_statement();
                return None;
            }
        };
        self.expect(SchemaToken::Semicolon);
        Some(EnumValue {
            name,
            number,
            span: start.to(self.prev_span()),
        })
    }
}
