use std::fmt;
use std::path::PathBuf;

use bpfscope_types::{Namespace, Tag};
use serde::Serialize;

use crate::codec::{is_prefix, parse_ulong};
use crate::error::ParseError;

/// How the user named an object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectRef {
    Id(u32),
    /// Programs only; resolved by scanning every program.
    Tag(Tag),
    Pinned(PathBuf),
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Tag(tag) => write!(f, "tag {tag}"),
            Self::Pinned(path) => write!(f, "pinned {}", path.display()),
        }
    }
}

fn expected(ns: Namespace) -> &'static str {
    match ns {
        Namespace::Program => "'id', 'tag' or 'pinned'",
        Namespace::Map => "'id' or 'pinned'",
    }
}

/// Parse `id NUM | pinned PATH | tag HEX` from the front of `tokens`,
/// returning the reference and the unconsumed rest.
pub fn parse_reference<S: AsRef<str>>(
    tokens: &[S],
    ns: Namespace,
) -> Result<(ObjectRef, &[S]), ParseError> {
    let Some((keyword, rest)) = tokens.split_first() else {
        return Err(ParseError::MissingArgument {
            expected: expected(ns),
        });
    };
    let keyword = keyword.as_ref();

    let (value, rest) = match rest.split_first() {
        Some((value, rest)) => (value.as_ref(), rest),
        None if is_prefix(keyword, "id")
            || is_prefix(keyword, "pinned")
            || (ns == Namespace::Program && is_prefix(keyword, "tag")) =>
        {
            return Err(ParseError::MissingArgument {
                expected: "a value after the reference keyword",
            })
        }
        None => {
            return Err(ParseError::UnexpectedToken {
                expected: expected(ns),
                token: keyword.to_string(),
            })
        }
    };

    if is_prefix(keyword, "id") {
        let id = parse_ulong(value)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ParseError::BadId {
                token: value.to_string(),
            })?;
        Ok((ObjectRef::Id(id), rest))
    } else if ns == Namespace::Program && is_prefix(keyword, "tag") {
        let tag = Tag::from_hex(value).map_err(|e| ParseError::BadTag {
            token: value.to_string(),
            reason: e.to_string(),
        })?;
        Ok((ObjectRef::Tag(tag), rest))
    } else if is_prefix(keyword, "pinned") {
        Ok((ObjectRef::Pinned(PathBuf::from(value)), rest))
    } else {
        Err(ParseError::UnexpectedToken {
            expected: expected(ns),
            token: keyword.to_string(),
        })
    }
}
