//! Lexical analyzer for schema source text.
//!
//! Converts source text into a sequence of [`Token`]s, handling keywords,
//! identifiers, decimal integers, quoted strings with C-style escapes, and
//! `//` and `/* */` comments. Errors are reported to the [`DiagnosticSink`]
//! and produce [`SchemaToken::Error`] tokens.

use crate::token::{lookup_keyword, SchemaToken, Token};
use strata_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use strata_source::{FileId, Span};

const LEX_ERROR: DiagnosticCode = DiagnosticCode::new(Category::Parse, 100);

/// Lexes the given schema source text into a vector of tokens.
///
/// Whitespace and comments are skipped. The returned vector always ends with
/// a [`SchemaToken::Eof`] token.
pub fn lex(source: &str, file: FileId, sink: &DiagnosticSink) -> Vec<Token> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        file,
        sink,
    };
    lexer.lex_all()
}

/// Decodes the text of a string literal token, including its quotes.
///
/// Unknown escapes keep the escaped character. Returns the content unchanged
/// if the text is not quoted.
pub fn unquote(text: &str) -> String {
    let inner = match text.as_bytes().first() {
        Some(b'"') | Some(b'\'') if text.len() >= 2 => &text[1..text.len() - 1],
        _ => return text.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    file: FileId,
    sink: &'a DiagnosticSink,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: SchemaToken::Eof,
                    span: Span::new(self.file, self.pos as u32, self.pos as u32),
                });
                break;
            }
            tokens.push(self.next_token());
        }
        tokens
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn error(&self, msg: &str, span: Span) {
        self.sink.emit(Diagnostic::error(LEX_ERROR, msg, span));
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos >= self.source.len() {
                return;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'*' {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos >= self.source.len() {
                        self.error("unterminated block comment", self.span_from(start));
                        break;
                    }
                    if self.source[self.pos] == b'*' && self.peek_at(1) == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.peek();
        let kind = match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while matches!(self.peek(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
                    self.pos += 1;
                }
                let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
                lookup_keyword(text).unwrap_or(SchemaToken::Identifier)
            }
            b'0'..=b'9' => {
                while self.peek().is_ascii_digit() {
                    self.pos += 1;
                }
                if self.peek().is_ascii_alphabetic() || self.peek() == b'_' {
                    while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
                        self.pos += 1;
                    }
                    self.error("malformed integer literal", self.span_from(start));
                    SchemaToken::Error
                } else {
                    SchemaToken::IntLiteral
                }
            }
            b'"' | b'\'' => self.lex_string(b),
            _ => {
                self.pos += 1;
                match b {
                    b'=' => SchemaToken::Equals,
                    b';' => SchemaToken::Semicolon,
                    b'.' => SchemaToken::Dot,
                    b'-' => SchemaToken::Minus,
                    b'{' => SchemaToken::LeftBrace,
                    b'}' => SchemaToken::RightBrace,
                    _ => {
                        // Step over the rest of a multi-byte character.
                        while self.pos < self.source.len() && (self.source[self.pos] & 0xC0) == 0x80 {
                            self.pos += 1;
                        }
                        self.error("unexpected character", self.span_from(start));
                        SchemaToken::Error
                    }
                }
            }
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn lex_string(&mut self, quote: u8) -> SchemaToken {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                0 if self.pos >= self.source.len() => {
                    self.error("unterminated string literal", self.span_from(start));
                    return SchemaToken::Error;
                }
                b'\n' => {
                    self.error("unterminated string literal", self.span_from(start));
                    return SchemaToken::Error;
                }
                b'\\' => self.pos += 2,
                c if c == quote => {
                    self.pos += 1;
                    return SchemaToken::StringLiteral;
                }
                _ => self.pos += 1,
            }
        }
    }
}
