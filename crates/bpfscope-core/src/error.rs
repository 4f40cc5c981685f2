use std::fmt;
use std::path::PathBuf;

use bpfscope_sys::SysError;
use bpfscope_types::{InsnKind, ObjectKind};
use thiserror::Error;

use crate::reference::ObjectRef;

/// A byte slot in an entry specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Key,
    Value,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Key => "key",
            Self::Value => "value",
        })
    }
}

/// Malformed command input. Always names the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected {expected}, got nothing")]
    MissingArgument { expected: &'static str },

    #[error("expected {expected}, got: '{token}'")]
    UnexpectedToken {
        expected: &'static str,
        token: String,
    },

    #[error("can't parse {token} as ID")]
    BadId { token: String },

    #[error("can't parse tag {token}: {reason}")]
    BadTag { token: String, reason: String },

    #[error("error parsing byte: {token}")]
    BadByte { token: String },

    #[error("{slot} expected {expected} bytes got {got}")]
    LengthMismatch {
        slot: Slot,
        expected: usize,
        got: usize,
    },

    #[error("duplicate {0}")]
    DuplicateSlot(Slot),

    #[error("unnecessary {0}")]
    UnexpectedSlot(Slot),

    #[error("did not find {0}")]
    MissingSlot(Slot),

    #[error("flags specified multiple times: {token}")]
    DuplicateFlags { token: String },

    #[error("update flags not accepted here: {token}")]
    UnexpectedFlags { token: String },
}

/// Failure to turn a reference into a handle of the expected kind.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{reference}: not found")]
    NotFound { reference: ObjectRef },

    #[error("{reference}: incorrect object type: expected {expected}, got {actual}")]
    WrongKind {
        reference: ObjectRef,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// The info record size matched no known record. Only reachable on the
    /// size-based fallback, which breaks whenever the kernel grows a record.
    #[error("{reference}: can't classify object from a {len}-byte info record")]
    ClassificationFailed { reference: ObjectRef, len: usize },

    #[error("{reference}: lookup failed: {source}")]
    LookupFailed {
        reference: ObjectRef,
        source: SysError,
    },
}

/// A human explanation for a well-known kernel failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// `EPERM` on pin: the target directory is not on a BPF filesystem.
    OutsideBpffs { dir: PathBuf },
    /// `ENOENT` on pin: no BPF filesystem where one was expected.
    BpffsNotMounted { root: PathBuf },
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideBpffs { dir } => write!(f, "is {} in BPF file system?", dir.display()),
            Self::BpffsNotMounted { root } => {
                write!(f, "is BPF file system mounted at {}?", root.display())
            }
        }
    }
}

fn with_diagnosis(diagnosis: &Option<Diagnosis>) -> String {
    match diagnosis {
        Some(d) => format!(" ({d})"),
        None => String::new(),
    }
}

/// Errors from a typed operation.
#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{op} failed: {source}{}", with_diagnosis(.diagnosis))]
    KernelRejected {
        op: &'static str,
        source: SysError,
        diagnosis: Option<Diagnosis>,
    },

    #[error("update failed: {source}")]
    UpdateRejected { source: SysError },

    #[error("can't allocate {size} bytes for {what}")]
    AllocationFailed { what: &'static str, size: usize },

    #[error("too many instructions returned: {kind} image grew from {probed} to {reported} bytes")]
    PayloadTooLarge {
        kind: InsnKind,
        probed: usize,
        reported: usize,
    },

    #[error("can't write {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl OpError {
    pub(crate) fn kernel(op: &'static str, source: SysError) -> Self {
        Self::KernelRejected {
            op,
            source,
            diagnosis: None,
        }
    }
}

/// Failure to load a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Result alias for typed operations.
pub type OpResult<T> = Result<T, OpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_name_the_token() {
        let err = ParseError::BadByte { token: "0xzz".into() };
        assert_eq!(err.to_string(), "error parsing byte: 0xzz");
        let err = ParseError::LengthMismatch {
            slot: Slot::Key,
            expected: 4,
            got: 2,
        };
        assert_eq!(err.to_string(), "key expected 4 bytes got 2");
    }

    #[test]
    fn kernel_rejection_carries_diagnosis() {
        let err = OpError::KernelRejected {
            op: "pin",
            source: SysError::Errno(libc::EPERM),
            diagnosis: Some(Diagnosis::OutsideBpffs { dir: "/tmp".into() }),
        };
        let text = err.to_string();
        assert!(text.starts_with("pin failed: "));
        assert!(text.ends_with("(is /tmp in BPF file system?)"));
    }
}
