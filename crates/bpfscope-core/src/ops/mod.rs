//! Typed operations.
//!
//! Every operation resolves its own handle, uses it, and lets it drop before
//! returning, so nothing outlives a single call to [`execute`]. Results come
//! back as an [`Outcome`] for the caller to render.

mod map;
mod pin;
mod prog;

use std::path::PathBuf;

use bpfscope_sys::Kernel;
use bpfscope_types::{InsnKind, MapInfo, Namespace, ProgInfo};
use serde::Serialize;

use crate::config::ToolConfig;
use crate::error::{OpResult, ParseError};
use crate::layout::ValueLayout;
use crate::reference::{parse_reference, ObjectRef};

pub use map::{delete, dump_map, get_next, lookup, show_maps, update};
pub use pin::pin;
pub use prog::{dump_insns, parse_insn_kind, show_programs};

/// One command, fully parsed except for entry bytes, whose sizes are only
/// known once the map has been resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    ShowPrograms(Option<ObjectRef>),
    ShowMaps(Option<ObjectRef>),
    DumpInsns {
        reference: ObjectRef,
        kind: InsnKind,
        path: PathBuf,
    },
    DumpMap(ObjectRef),
    Update {
        reference: ObjectRef,
        tokens: Vec<String>,
    },
    Lookup {
        reference: ObjectRef,
        tokens: Vec<String>,
    },
    GetNext {
        reference: ObjectRef,
        tokens: Vec<String>,
    },
    Delete {
        reference: ObjectRef,
        tokens: Vec<String>,
    },
    Pin {
        ns: Namespace,
        reference: ObjectRef,
        path: PathBuf,
    },
}

impl Operation {
    /// `show [REF]`
    pub fn show<S: AsRef<str>>(ns: Namespace, tokens: &[S]) -> Result<Self, ParseError> {
        let reference = if tokens.is_empty() {
            None
        } else {
            let (reference, rest) = parse_reference(tokens, ns)?;
            expect_end(rest)?;
            Some(reference)
        };
        Ok(match ns {
            Namespace::Program => Self::ShowPrograms(reference),
            Namespace::Map => Self::ShowMaps(reference),
        })
    }

    /// `dump {xlated|jited} REF file PATH`
    pub fn dump_insns<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ParseError> {
        let (kind, rest) = tokens.split_first().ok_or(ParseError::MissingArgument {
            expected: "'xlated' or 'jited'",
        })?;
        let kind = parse_insn_kind(kind.as_ref())?;
        let (reference, rest) = parse_reference(rest, Namespace::Program)?;
        let (keyword, rest) = rest.split_first().ok_or(ParseError::MissingArgument {
            expected: "'file'",
        })?;
        if !crate::codec::is_prefix(keyword.as_ref(), "file") {
            return Err(ParseError::UnexpectedToken {
                expected: "'file'",
                token: keyword.as_ref().to_string(),
            });
        }
        let (path, rest) = rest.split_first().ok_or(ParseError::MissingArgument {
            expected: "an output file",
        })?;
        expect_end(rest)?;
        Ok(Self::DumpInsns {
            reference,
            kind,
            path: PathBuf::from(path.as_ref()),
        })
    }

    /// `dump REF`
    pub fn dump_map<S: AsRef<str>>(tokens: &[S]) -> Result<Self, ParseError> {
        let (reference, rest) = parse_reference(tokens, Namespace::Map)?;
        expect_end(rest)?;
        Ok(Self::DumpMap(reference))
    }

    /// `update`, `lookup`, `getnext` and `delete`: a map reference followed
    /// by an entry specification.
    pub fn entry<S: AsRef<str>>(verb: EntryVerb, tokens: &[S]) -> Result<Self, ParseError> {
        let (reference, rest) = parse_reference(tokens, Namespace::Map)?;
        let tokens = rest.iter().map(|t| t.as_ref().to_string()).collect();
        Ok(match verb {
            EntryVerb::Update => Self::Update { reference, tokens },
            EntryVerb::Lookup => Self::Lookup { reference, tokens },
            EntryVerb::GetNext => Self::GetNext { reference, tokens },
            EntryVerb::Delete => Self::Delete { reference, tokens },
        })
    }

    /// `pin REF PATH`
    pub fn pin<S: AsRef<str>>(ns: Namespace, tokens: &[S]) -> Result<Self, ParseError> {
        let (reference, rest) = parse_reference(tokens, ns)?;
        let (path, rest) = rest.split_first().ok_or(ParseError::MissingArgument {
            expected: "a pin path",
        })?;
        expect_end(rest)?;
        Ok(Self::Pin {
            ns,
            reference,
            path: PathBuf::from(path.as_ref()),
        })
    }
}

/// Map commands that take an entry specification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryVerb {
    Update,
    Lookup,
    GetNext,
    Delete,
}

fn expect_end<S: AsRef<str>>(rest: &[S]) -> Result<(), ParseError> {
    match rest.first() {
        None => Ok(()),
        Some(token) => Err(ParseError::UnexpectedToken {
            expected: "no more arguments",
            token: token.as_ref().to_string(),
        }),
    }
}

/// Entries read by a map dump.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MapDump {
    pub info: MapInfo,
    pub layout: ValueLayout,
    pub entries: Vec<(Vec<u8>, Vec<u8>)>,
    /// Keys listed by the kernel whose value could not be read.
    pub failures: Vec<Vec<u8>>,
}

/// What an operation produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Programs(Vec<ProgInfo>),
    Maps(Vec<MapInfo>),
    InsnsWritten {
        path: PathBuf,
        kind: InsnKind,
        bytes: usize,
    },
    /// The program has no image of the requested kind.
    NoInsns { kind: InsnKind },
    Dump(MapDump),
    Updated,
    Lookup {
        info: MapInfo,
        layout: ValueLayout,
        key: Vec<u8>,
        /// `None` when the key is absent.
        value: Option<Vec<u8>>,
    },
    NextKey {
        info: MapInfo,
        key: Option<Vec<u8>>,
        next_key: Vec<u8>,
    },
    Deleted,
    Pinned { path: PathBuf },
}

/// Run one operation against `kernel`.
pub fn execute(kernel: &dyn Kernel, config: &ToolConfig, op: &Operation) -> OpResult<Outcome> {
    match op {
        Operation::ShowPrograms(reference) => {
            show_programs(kernel, reference.as_ref()).map(Outcome::Programs)
        }
        Operation::ShowMaps(reference) => show_maps(kernel, reference.as_ref()).map(Outcome::Maps),
        Operation::DumpInsns {
            reference,
            kind,
            path,
        } => dump_insns(kernel, reference, *kind, path),
        Operation::DumpMap(reference) => dump_map(kernel, reference).map(Outcome::Dump),
        Operation::Update { reference, tokens } => {
            update(kernel, reference, tokens).map(|()| Outcome::Updated)
        }
        Operation::Lookup { reference, tokens } => lookup(kernel, reference, tokens),
        Operation::GetNext { reference, tokens } => get_next(kernel, reference, tokens),
        Operation::Delete { reference, tokens } => {
            delete(kernel, reference, tokens).map(|()| Outcome::Deleted)
        }
        Operation::Pin {
            ns,
            reference,
            path,
        } => pin(kernel, config, *ns, reference, path).map(|()| Outcome::Pinned {
            path: path.clone(),
        }),
    }
}
