//! Compiled file descriptors.
//!
//! A descriptor is the linked form of one schema file: every type reference
//! is resolved to the fully qualified name of a message or enum, and nested
//! declarations carry their full names.

use serde::{Deserialize, Serialize};
use strata_parser::ast::{FieldLabel, ScalarType};

/// A compiled schema file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// The file's path within its module.
    pub name: String,
    /// The declared package, or `""`.
    pub package: String,
    /// The effective syntax.
    pub syntax: String,
    /// Imported paths in declaration order.
    pub dependencies: Vec<String>,
    /// Indexes into `dependencies` of `public` imports.
    pub public_dependencies: Vec<usize>,
    /// Top-level messages.
    pub message_types: Vec<MessageDescriptor>,
    /// Top-level enums.
    pub enum_types: Vec<EnumDescriptor>,
    /// Declaration positions, unless excluded at compile time.
    pub source_code_info: Option<SourceCodeInfo>,
}

impl FileDescriptor {
    /// Visits every message, nested ones included, in declaration order.
    pub fn all_messages(&self) -> Vec<&MessageDescriptor> {
        let mut out = Vec::new();
        let mut stack: Vec<&MessageDescriptor> = self.message_types.iter().rev().collect();
        while let Some(message) = stack.pop() {
            out.push(message);
            stack.extend(message.nested_types.iter().rev());
        }
        out
    }

    /// Visits every enum, nested ones included.
    pub fn all_enums(&self) -> Vec<&EnumDescriptor> {
        let mut out: Vec<&EnumDescriptor> = self.enum_types.iter().collect();
        for message in self.all_messages() {
            out.extend(message.enum_types.iter());
        }
        out
    }

    /// Looks up the recorded position of a declaration by its full name.
    pub fn location(&self, full_name: &str) -> Option<&SourceLocation> {
        self.source_code_info
            .as_ref()?
            .locations
            .iter()
            .find(|location| location.symbol == full_name)
    }
}

/// A compiled message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    /// The simple name.
    pub name: String,
    /// The fully qualified name, without a leading dot.
    pub full_name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Nested messages.
    pub nested_types: Vec<MessageDescriptor>,
    /// Nested enums.
    pub enum_types: Vec<EnumDescriptor>,
}

impl MessageDescriptor {
    /// Looks up a field by number.
    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.number == number)
    }
}

/// A compiled field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// The field name.
    pub name: String,
    /// The field number.
    pub number: u32,
    /// The cardinality label.
    pub label: FieldLabel,
    /// The resolved type.
    pub field_type: FieldType,
}

/// The resolved type of a field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// A built-in scalar.
    Scalar(ScalarType),
    /// A message, by full name.
    Message(String),
    /// An enum, by full name.
    Enum(String),
}

impl FieldType {
    /// The type as it would be written with an absolute name.
    pub fn display_name(&self) -> String {
        match self {
            FieldType::Scalar(scalar) => scalar.as_str().to_string(),
            FieldType::Message(name) | FieldType::Enum(name) => format!(".{name}"),
        }
    }
}

/// A compiled enum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    /// The simple name.
    pub name: String,
    /// The fully qualified name, without a leading dot.
    pub full_name: String,
    /// Values in declaration order.
    pub values: Vec<EnumValueDescriptor>,
}

/// A compiled enum value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValueDescriptor {
    /// The value name.
    pub name: String,
    /// The numeric value.
    pub number: i32,
}

/// Positions of the declarations in a file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCodeInfo {
    /// One entry per message, enum, and field, in declaration order.
    pub locations: Vec<SourceLocation>,
}

/// The position of one declaration. Lines and columns are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// The full name of the declaration; fields use `Message.field`.
    pub symbol: String,
    /// The starting line.
    pub start_line: u32,
    /// The starting column.
    pub start_column: u32,
    /// The ending line.
    pub end_line: u32,
    /// The ending column.
    pub end_column: u32,
}
