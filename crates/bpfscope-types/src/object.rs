use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a kernel object handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Unknown,
    Program,
    Map,
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Program => "program",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An id namespace kept by the kernel. Programs and maps are numbered
/// independently, so every id lookup is scoped to one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Program,
    Map,
}

impl Namespace {
    /// The object kind every handle from this namespace must classify as.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Program => ObjectKind::Program,
            Self::Map => ObjectKind::Map,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind().fmt(f)
    }
}

/// Which instruction image of a program to retrieve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsnKind {
    /// The verifier-rewritten BPF instructions.
    Xlated,
    /// The native code produced by the JIT.
    Jited,
}

impl InsnKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Xlated => "xlated",
            Self::Jited => "jited",
        }
    }
}

impl fmt::Display for InsnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_maps_to_kind() {
        assert_eq!(Namespace::Program.kind(), ObjectKind::Program);
        assert_eq!(Namespace::Map.kind(), ObjectKind::Map);
    }

    #[test]
    fn display_names() {
        assert_eq!(ObjectKind::Unknown.to_string(), "unknown");
        assert_eq!(Namespace::Map.to_string(), "map");
        assert_eq!(InsnKind::Jited.to_string(), "jited");
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&ObjectKind::Program).unwrap();
        assert_eq!(json, "\"program\"");
    }
}
