use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Size of a program tag in bytes.
pub const TAG_SIZE: usize = 8;

/// Content fingerprint the kernel computes over a program's instructions.
///
/// Two programs loaded from the same bytecode share a tag, so it works as an
/// alternate lookup key. There is no kernel index over tags: finding a
/// program by tag means walking every program id.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag([u8; TAG_SIZE]);

impl Tag {
    pub const fn from_bytes(bytes: [u8; TAG_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }

    /// Contiguous lowercase hex, e.g. `f0055c08993fc5c3`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse either the contiguous form or the colon-separated display form.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let compact: String = if s.contains(':') {
            s.split(':').collect()
        } else {
            s.to_string()
        };
        let bytes = hex::decode(&compact).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != TAG_SIZE {
            return Err(TypeError::InvalidLength {
                expected: TAG_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; TAG_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.to_hex())
    }
}

/// Colon-separated bytes, the way program listings print tags.
impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Tag {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; TAG_SIZE]> for Tag {
    fn from(bytes: [u8; TAG_SIZE]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
