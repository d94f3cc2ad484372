//! Registry naming: module full names, module references, and commit IDs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors produced while parsing names.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// A module full name did not have the `registry/owner/name` shape.
    #[error("invalid module name {value:?}: {reason}")]
    InvalidModuleFullName {
        /// The rejected input.
        value: String,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// A module reference had an empty ref after the colon.
    #[error("invalid module reference {value:?}: {reason}")]
    InvalidModuleRef {
        /// The rejected input.
        value: String,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// A commit ID was not 32 lowercase hex characters.
    #[error("invalid commit ID {value:?}: expected 32 lowercase hex characters")]
    InvalidCommitId {
        /// The rejected input.
        value: String,
    },
}

/// The fully qualified name of a module on a registry.
///
/// The string form is `registry/owner/name`. Equality is case-sensitive and
/// structural.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleFullName {
    registry: String,
    owner: String,
    name: String,
}

impl ModuleFullName {
    /// Creates a full name from its three components.
    pub fn new(
        registry: impl Into<String>,
        owner: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, NameError> {
        let full = Self {
            registry: registry.into(),
            owner: owner.into(),
            name: name.into(),
        };
        for component in [&full.registry, &full.owner, &full.name] {
            if component.is_empty() {
                return Err(NameError::InvalidModuleFullName {
                    value: full.to_string(),
                    reason: "components must not be empty",
                });
            }
            if component.contains(['/', ':']) || component.chars().any(char::is_whitespace) {
                return Err(NameError::InvalidModuleFullName {
                    value: full.to_string(),
                    reason: "components must not contain '/', ':' or whitespace",
                });
            }
        }
        Ok(full)
    }

    /// Parses the `registry/owner/name` form.
    pub fn parse(value: &str) -> Result<Self, NameError> {
        let parts: Vec<&str> = value.split('/').collect();
        match parts.as_slice() {
            [registry, owner, name] => Self::new(*registry, *owner, *name),
            _ => Err(NameError::InvalidModuleFullName {
                value: value.to_string(),
                reason: "expected registry/owner/name",
            }),
        }
    }

    /// The registry hostname.
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// The owning user or organization.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The module name within its owner.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ModuleFullName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.registry, self.owner, self.name)
    }
}

impl TryFrom<String> for ModuleFullName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModuleFullName> for String {
    fn from(value: ModuleFullName) -> Self {
        value.to_string()
    }
}

/// A module full name plus an optional ref (label or commit), written
/// `registry/owner/name[:ref]`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleRef {
    full_name: ModuleFullName,
    reference: Option<String>,
}

impl ModuleRef {
    /// Creates a reference from a full name and an optional ref.
    pub fn new(full_name: ModuleFullName, reference: Option<String>) -> Self {
        Self {
            full_name,
            reference,
        }
    }

    /// Parses `registry/owner/name[:ref]`.
    pub fn parse(value: &str) -> Result<Self, NameError> {
        match value.split_once(':') {
            Some((_, "")) => Err(NameError::InvalidModuleRef {
                value: value.to_string(),
                reason: "ref after ':' must not be empty",
            }),
            Some((name, reference)) => Ok(Self {
                full_name: ModuleFullName::parse(name)?,
                reference: Some(reference.to_string()),
            }),
            None => Ok(Self {
                full_name: ModuleFullName::parse(value)?,
                reference: None,
            }),
        }
    }

    /// The referenced module.
    pub fn full_name(&self) -> &ModuleFullName {
        &self.full_name
    }

    /// The ref, if any.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{}:{reference}", self.full_name),
            None => write!(f, "{}", self.full_name),
        }
    }
}

impl TryFrom<String> for ModuleRef {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModuleRef> for String {
    fn from(value: ModuleRef) -> Self {
        value.to_string()
    }
}

/// A registry-assigned commit identifier: 32 lowercase hex characters.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    /// Validates and wraps a commit ID.
    pub fn parse(value: &str) -> Result<Self, NameError> {
        let valid = value.len() == 32
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(NameError::InvalidCommitId {
                value: value.to_string(),
            })
        }
    }

    /// The commit ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CommitId {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommitId> for String {
    fn from(value: CommitId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_round_trips_through_display() {
        let name = ModuleFullName::parse("registry.example.com/acme/petapis").unwrap();
        assert_eq!(name.registry(), "registry.example.com");
        assert_eq!(name.owner(), "acme");
        assert_eq!(name.name(), "petapis");
        assert_eq!(name.to_string(), "registry.example.com/acme/petapis");
    }

    #[test]
    fn full_name_rejects_bad_shapes() {
        assert!(ModuleFullName::parse("acme/petapis").is_err());
        assert!(ModuleFullName::parse("a//b").is_err());
        assert!(ModuleFullName::parse("a/b/c/d").is_err());
    }

    #[test]
    fn full_name_is_case_sensitive() {
        let lower = ModuleFullName::parse("r.com/acme/pets").unwrap();
        let upper = ModuleFullName::parse("r.com/Acme/pets").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn module_ref_with_and_without_ref() {
        let with = ModuleRef::parse("r.com/acme/pets:main").unwrap();
        assert_eq!(with.reference(), Some("main"));
        assert_eq!(with.to_string(), "r.com/acme/pets:main");
        let without = ModuleRef::parse("r.com/acme/pets").unwrap();
        assert_eq!(without.reference(), None);
        assert!(ModuleRef::parse("r.com/acme/pets:").is_err());
    }

    #[test]
    fn commit_id_validation() {
        assert!(CommitId::parse("0123456789abcdef0123456789abcdef").is_ok());
        assert!(CommitId::parse("0123456789ABCDEF0123456789ABCDEF").is_err());
        assert!(CommitId::parse("abc").is_err());
    }

    #[test]
    fn serde_uses_string_form() {
        let name = ModuleFullName::parse("r.com/acme/pets").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"r.com/acme/pets\"");
        let back: ModuleFullName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }
}
