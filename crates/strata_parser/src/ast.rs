//! AST node types for schema files.
//!
//! Every node carries the [`Span`] it was parsed from so that later stages
//! can report positioned diagnostics.

use serde::{Deserialize, Serialize};
use strata_source::Span;

/// The syntax assumed when a file has no `syntax` statement.
pub const DEFAULT_SYNTAX: &str = "schema1";

/// The accepted `syntax` values.
pub const KNOWN_SYNTAXES: [&str; 2] = ["schema1", "schema2"];

/// A parsed schema file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaFile {
    /// The `syntax` statement, if present.
    pub syntax: Option<SyntaxDecl>,
    /// The `package` statement, if present.
    pub package: Option<PackageDecl>,
    /// Import statements in source order.
    pub imports: Vec<ImportDecl>,
    /// Top-level messages and enums in source order.
    pub items: Vec<Item>,
    /// The span of the whole file.
    pub span: Span,
}

impl SchemaFile {
    /// The effective syntax, falling back to [`DEFAULT_SYNTAX`].
    pub fn syntax_value(&self) -> &str {
        self.syntax
            .as_ref()
            .map(|syntax| syntax.value.as_str())
            .unwrap_or(DEFAULT_SYNTAX)
    }

    /// The declared package, or `""`.
    pub fn package_name(&self) -> &str {
        self.package
            .as_ref()
            .map(|package| package.name.as_str())
            .unwrap_or("")
    }
}

/// `syntax = "schema2";`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyntaxDecl {
    /// The decoded string value.
    pub value: String,
    /// The statement's span.
    pub span: Span,
}

/// `package acme.pets.v1;`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackageDecl {
    /// The dotted package name.
    pub name: String,
    /// The statement's span.
    pub span: Span,
}

/// `import [public] "path";`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportDecl {
    /// The imported path.
    pub path: String,
    /// Whether the import re-exports its symbols to importers of this file.
    pub public: bool,
    /// The statement's span.
    pub span: Span,
}

/// A top-level or nested declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Item {
    /// A message declaration.
    Message(MessageDecl),
    /// An enum declaration.
    Enum(EnumDecl),
}

impl Item {
    /// The declared name.
    pub fn name(&self) -> &str {
        match self {
            Item::Message(message) => &message.name,
            Item::Enum(en) => &en.name,
        }
    }

    /// The span of the declared name.
    pub fn name_span(&self) -> Span {
        match self {
            Item::Message(message) => message.name_span,
            Item::Enum(en) => en.name_span,
        }
    }
}

/// `message Name { ... }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageDecl {
    /// The message name.
    pub name: String,
    /// The span of the name.
    pub name_span: Span,
    /// Fields in source order.
    pub fields: Vec<FieldDecl>,
    /// Nested messages and enums in source order.
    pub nested: Vec<Item>,
    /// The declaration's span.
    pub span: Span,
}

/// The cardinality label of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldLabel {
    /// No label.
    None,
    /// `optional`
    Optional,
    /// `repeated`
    Repeated,
}

/// `[label] type name = number;`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    /// The cardinality label.
    pub label: FieldLabel,
    /// The declared type.
    pub ty: TypeRef,
    /// The field name.
    pub name: String,
    /// The span of the name.
    pub name_span: Span,
    /// The field number.
    pub number: u32,
    /// The span of the number.
    pub number_span: Span,
    /// The declaration's span.
    pub span: Span,
}

/// A built-in scalar type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// `string`
    String,
    /// `bytes`
    Bytes,
    /// `bool`
    Bool,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
    /// `float`
    Float,
    /// `double`
    Double,
}

impl ScalarType {
    /// Looks up a scalar by its keyword.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            "bool" => ScalarType::Bool,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "float" => ScalarType::Float,
            "double" => ScalarType::Double,
            _ => return None,
        })
    }

    /// The keyword for this scalar.
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
            ScalarType::Bool => "bool",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }
}

/// A field type as written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TypeRef {
    /// A scalar type.
    Scalar {
        /// Which scalar.
        scalar: ScalarType,
        /// Where it was written.
        span: Span,
    },
    /// A reference to a message or enum.
    Named {
        /// The dotted name, without any leading dot.
        name: String,
        /// `true` if written with a leading dot.
        absolute: bool,
        /// Where it was written.
        span: Span,
    },
}

impl TypeRef {
    /// The span of the type as written.
    pub fn span(&self) -> Span {
        match self {
            TypeRef::Scalar { span, .. } | TypeRef::Named { span, .. } => *span,
        }
    }
}

/// `enum Name { VALUE = 0; ... }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    /// The enum name.
    pub name: String,
    /// The span of the name.
    pub name_span: Span,
    /// Values in source order.
    pub values: Vec<EnumValue>,
    /// The declaration's span.
    pub span: Span,
}

/// `NAME = number;`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    /// The value name.
    pub name: String,
    /// The numeric value.
    pub number: i32,
    /// The declaration's span.
    pub span: Span,
}
