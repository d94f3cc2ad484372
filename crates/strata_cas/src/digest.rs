//! Typed digests: the algorithm tag plus the content digest.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::cas_digest::CasDigest;
use crate::error::CasError;
use crate::manifest::Manifest;

/// The algorithm family a [`Digest`] was computed with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum DigestType {
    /// Module digest over the file manifest only.
    B4,
    /// Module digest over the file manifest and the dependency digests.
    B5,
    /// Plugin digest over the plugin's bytes.
    P1,
}

impl DigestType {
    /// The lowercase prefix used in the string form.
    pub fn as_str(self) -> &'static str {
        match self {
            DigestType::B4 => "b4",
            DigestType::B5 => "b5",
            DigestType::P1 => "p1",
        }
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestType {
    type Err = CasError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "b4" => Ok(DigestType::B4),
            "b5" => Ok(DigestType::B5),
            "p1" => Ok(DigestType::P1),
            _ => Err(CasError::InvalidDigestType {
                value: value.to_string(),
            }),
        }
    }
}

/// A content digest tagged with the algorithm that produced it.
///
/// The string form is `<type>:<hex>`, for example `b5:9f86...`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    digest_type: DigestType,
    value: CasDigest,
}

impl Digest {
    /// Tags a content digest with a type.
    pub fn new(digest_type: DigestType, value: CasDigest) -> Self {
        Self { digest_type, value }
    }

    /// Parses the `<type>:<hex>` form.
    ///
    /// A missing, empty, or unknown type prefix is an
    /// [`CasError::InvalidDigestType`] error.
    pub fn parse(value: &str) -> Result<Self, CasError> {
        let (type_str, hex) = value.split_once(':').ok_or_else(|| CasError::InvalidDigestType {
            value: String::new(),
        })?;
        let digest_type: DigestType = type_str.parse()?;
        let value = CasDigest::parse_hex(hex)?;
        Ok(Self { digest_type, value })
    }

    /// The algorithm family.
    pub fn digest_type(&self) -> DigestType {
        self.digest_type
    }

    /// The untyped content digest.
    pub fn value(&self) -> &CasDigest {
        &self.value
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.digest_type, self.value)
    }
}

impl FromStr for Digest {
    type Err = CasError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for Digest {
    type Error = CasError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.to_string()
    }
}

/// Returns `true` only if both digests share a type and a value.
pub fn digest_equal(a: &Digest, b: &Digest) -> bool {
    a.digest_type == b.digest_type && a.value == b.value
}

/// Computes the B4 digest of a module's files.
pub fn b4_digest(files: &Manifest) -> Digest {
    Digest::new(DigestType::B4, files.digest())
}

/// Computes the B5 digest of a module from its files and the B5 digests of
/// all of its dependencies.
///
/// Dependency digests are sorted and deduplicated here, so the result does
/// not depend on the order in which dependencies were discovered.
pub fn b5_digest(files: &Manifest, dep_digests: &[Digest]) -> Result<Digest, CasError> {
    let mut deps: Vec<String> = Vec::with_capacity(dep_digests.len());
    for dep in dep_digests {
        if dep.digest_type != DigestType::B5 {
            return Err(CasError::UnexpectedDigestType {
                expected: DigestType::B5.to_string(),
                actual: dep.to_string(),
            });
        }
        deps.push(dep.to_string());
    }
    deps.sort();
    deps.dedup();

    let mut hasher = Sha256::new();
    hasher.update(format!("files:{}\n", files.digest()).as_bytes());
    for dep in &deps {
        hasher.update(format!("dep:{dep}\n").as_bytes());
    }
    let value: [u8; 32] = hasher.finalize().into();
    Ok(Digest::new(DigestType::B5, CasDigest::from_raw(value)))
}

/// Computes the P1 digest of a plugin's bytes.
pub fn p1_digest(data: &[u8]) -> Digest {
    Digest::new(DigestType::P1, CasDigest::from_bytes(data))
}
