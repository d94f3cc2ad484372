//! Raw SHA-256 content digests.

use std::fmt;
use std::io::{self, Read};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::CasError;

/// A 256-bit SHA-256 digest of some content.
///
/// Serializes as a lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CasDigest([u8; 32]);

impl CasDigest {
    /// Digests a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Digests everything readable from `reader`.
    pub fn from_reader(reader: &mut dyn Read) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.finalize().into()))
    }

    /// Parses a 64-character lowercase hex string.
    pub fn parse_hex(value: &str) -> Result<Self, CasError> {
        let invalid = |reason: &str| CasError::InvalidDigest {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        if value.len() != 64 {
            return Err(invalid("expected 64 hex characters"));
        }
        let mut out = [0u8; 32];
        for (i, chunk) in value.as_bytes().chunks(2).enumerate() {
            let hi = hex_value(chunk[0]).ok_or_else(|| invalid("non-hex character"))?;
            let lo = hex_value(chunk[1]).ok_or_else(|| invalid("non-hex character"))?;
            out[i] = (hi << 4) | lo;
        }
        Ok(Self(out))
    }

    /// Wraps an already computed 32-byte SHA-256 value.
    pub fn from_raw(value: [u8; 32]) -> Self {
        Self(value)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

impl fmt::Display for CasDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CasDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CasDigest({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

impl TryFrom<String> for CasDigest {
    type Error = CasError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value)
    }
}

impl From<CasDigest> for String {
    fn from(value: CasDigest) -> Self {
        value.to_string()
    }
}
