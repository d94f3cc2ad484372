//! Token types for the schema lexer.
//!
//! Defines the [`SchemaToken`] enum covering keywords, punctuation and
//! literals, plus the [`Token`] struct pairing a token kind with its source
//! [`Span`].

use serde::{Deserialize, Serialize};
use strata_source::Span;

/// A schema token kind.
///
/// Literal values are not stored in the token; they are read back from the
/// source text using the token's span.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SchemaToken {
    // === Keywords ===
    /// `enum`
    Enum,
    /// `import`
    Import,
    /// `message`
    Message,
    /// `optional`
    Optional,
    /// `package`
    Package,
    /// `public`
    Public,
    /// `repeated`
    Repeated,
    /// `syntax`
    Syntax,

    // === Literals ===
    /// An identifier.
    Identifier,
    /// A decimal integer literal.
    IntLiteral,
    /// A single- or double-quoted string literal.
    StringLiteral,

    // === Punctuation ===
    /// `=`
    Equals,
    /// `;`
    Semicolon,
    /// `.`
    Dot,
    /// `-`
    Minus,
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,

    // === Special ===
    /// A character sequence the lexer could not classify.
    Error,
    /// End of input.
    Eof,
}

impl SchemaToken {
    /// Returns `true` for reserved words.
    ///
    /// Keywords may still be used as names where the grammar expects one.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            SchemaToken::Enum
                | SchemaToken::Import
                | SchemaToken::Message
                | SchemaToken::Optional
                | SchemaToken::Package
                | SchemaToken::Public
                | SchemaToken::Repeated
                | SchemaToken::Syntax
        )
    }

    /// Returns `true` for tokens that can name a declaration.
    pub fn is_name(self) -> bool {
        self == SchemaToken::Identifier || self.is_keyword()
    }

    /// A short human-readable description used in "expected X" messages.
    pub fn describe(self) -> &'static str {
        match self {
            SchemaToken::Enum => "'enum'",
            SchemaToken::Import => "'import'",
            SchemaToken::Message => "'message'",
            SchemaToken::Optional => "'optional'",
            SchemaToken::Package => "'package'",
            SchemaToken::Public => "'public'",
            SchemaToken::Repeated => "'repeated'",
            SchemaToken::Syntax => "'syntax'",
            SchemaToken::Identifier => "identifier",
            SchemaToken::IntLiteral => "integer",
            SchemaToken::StringLiteral => "string",
            SchemaToken::Equals => "'='",
            SchemaToken::Semicolon => "';'",
            SchemaToken::Dot => "'.'",
            SchemaToken::Minus => "'-'",
            SchemaToken::LeftBrace => "'{'",
            SchemaToken::RightBrace => "'}'",
            SchemaToken::Error => "invalid token",
            SchemaToken::Eof => "end of file",
        }
    }
}

/// A token with its kind and source location.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Token {
    /// The kind of token.
    pub kind: SchemaToken,
    /// The source span of this token.
    pub span: Span,
}

/// Looks up a keyword by its text. Keywords are case-sensitive.
pub fn lookup_keyword(text: &str) -> Option<SchemaToken> {
    match text {
        "enum" => Some(SchemaToken::Enum),
        "import" => Some(SchemaToken::Import),
        "message" => Some(SchemaToken::Message),
        "optional" => Some(SchemaToken::Optional),
        "package" => Some(SchemaToken::Package),
        "public" => Some(SchemaToken::Public),
        "repeated" => Some(SchemaToken::Repeated),
        "syntax" => Some(SchemaToken::Syntax),
        _ => None,
    }
}
