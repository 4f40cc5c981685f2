//! Entry specifications: `key BYTES`, `value BYTES` and an optional
//! existence flag, in any order, each at most once.

use bpfscope_types::UpdateMode;

use crate::codec::{is_prefix, parse_bytes};
use crate::error::{ParseError, Slot};

/// Buffers an operation expects to be filled. A `None` slot is not
/// accepted; naming it is an error.
#[derive(Debug, Default)]
pub struct EntrySlots<'a> {
    pub key: Option<&'a mut [u8]>,
    pub value: Option<&'a mut [u8]>,
    /// Receives the existence flag if one is given; left untouched
    /// otherwise, so callers pre-set the default.
    pub mode: Option<&'a mut UpdateMode>,
}

impl<'a> EntrySlots<'a> {
    pub fn key(key: &'a mut [u8]) -> Self {
        Self {
            key: Some(key),
            ..Default::default()
        }
    }

    pub fn update(key: &'a mut [u8], value: &'a mut [u8], mode: &'a mut UpdateMode) -> Self {
        Self {
            key: Some(key),
            value: Some(value),
            mode: Some(mode),
        }
    }
}

const MODES: [(&str, UpdateMode); 3] = [
    ("any", UpdateMode::Any),
    ("noexist", UpdateMode::NoExist),
    ("exist", UpdateMode::Exist),
];

/// Consume `tokens` entirely, filling the slots that were asked for.
pub fn parse_entry<S: AsRef<str>>(tokens: &[S], slots: EntrySlots<'_>) -> Result<(), ParseError> {
    let EntrySlots {
        mut key,
        mut value,
        mut mode,
    } = slots;
    let (mut key_seen, mut value_seen, mut mode_seen) = (false, false, false);
    let mut rest = tokens;

    while let Some((first, tail)) = rest.split_first() {
        let token = first.as_ref();
        if is_prefix(token, "key") || is_prefix(token, "value") {
            let (slot, buf, seen) = if is_prefix(token, "key") {
                (Slot::Key, key.as_deref_mut(), &mut key_seen)
            } else {
                (Slot::Value, value.as_deref_mut(), &mut value_seen)
            };
            let Some(buf) = buf else {
                return Err(ParseError::UnexpectedSlot(slot));
            };
            if *seen {
                return Err(ParseError::DuplicateSlot(slot));
            }
            let used = parse_bytes(tail, slot, buf)?;
            *seen = true;
            rest = &tail[used..];
        } else if let Some((_, chosen)) = MODES.iter().find(|(name, _)| is_prefix(token, name)) {
            let Some(target) = mode.as_deref_mut() else {
                return Err(ParseError::UnexpectedFlags {
                    token: token.to_string(),
                });
            };
            if mode_seen {
                return Err(ParseError::DuplicateFlags {
                    token: token.to_string(),
                });
            }
            *target = *chosen;
            mode_seen = true;
            rest = tail;
        } else {
            return Err(ParseError::UnexpectedToken {
                expected: "key or value",
                token: token.to_string(),
            });
        }
    }

    if key.is_some() && !key_seen {
        return Err(ParseError::MissingSlot(Slot::Key));
    }
    if value.is_some() && !value_seen {
        return Err(ParseError::MissingSlot(Slot::Value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    #[test]
    fn key_value_and_mode_in_any_order() {
        let (mut k, mut v, mut m) = ([0u8; 2], [0u8; 1], UpdateMode::Any);
        parse_entry(
            &toks("noexist value 9 key 1 2"),
            EntrySlots::update(&mut k, &mut v, &mut m),
        )
        .unwrap();
        assert_eq!(k, [1, 2]);
        assert_eq!(v, [9]);
        assert_eq!(m, UpdateMode::NoExist);
    }

    #[test]
    fn mode_defaults_when_absent() {
        let (mut k, mut v, mut m) = ([0u8; 1], [0u8; 1], UpdateMode::Any);
        parse_entry(&toks("k 1 v 2"), EntrySlots::update(&mut k, &mut v, &mut m)).unwrap();
        assert_eq!(m, UpdateMode::Any);
    }

    #[test]
    fn exist_abbreviation() {
        let (mut k, mut v, mut m) = ([0u8; 1], [0u8; 1], UpdateMode::Any);
        parse_entry(&toks("key 1 value 2 e"), EntrySlots::update(&mut k, &mut v, &mut m)).unwrap();
        assert_eq!(m, UpdateMode::Exist);
    }

    #[test]
    fn duplicate_key() {
        let mut k = [0u8; 1];
        let err = parse_entry(&toks("key 1 key 2"), EntrySlots::key(&mut k)).unwrap_err();
        assert_eq!(err, ParseError::DuplicateSlot(Slot::Key));
    }

    #[test]
    fn unexpected_value() {
        let mut k = [0u8; 1];
        let err = parse_entry(&toks("key 1 value 2"), EntrySlots::key(&mut k)).unwrap_err();
        assert_eq!(err, ParseError::UnexpectedSlot(Slot::Value));
    }

    #[test]
    fn flags_twice() {
        let (mut k, mut v, mut m) = ([0u8; 1], [0u8; 1], UpdateMode::Any);
        let err = parse_entry(
            &toks("key 1 value 2 any exist"),
            EntrySlots::update(&mut k, &mut v, &mut m),
        )
        .unwrap_err();
        assert_eq!(err, ParseError::DuplicateFlags { token: "exist".into() });
    }

    #[test]
    fn flags_where_none_are_accepted() {
        let mut k = [0u8; 1];
        let err = parse_entry(&toks("key 1 any"), EntrySlots::key(&mut k)).unwrap_err();
        assert_eq!(err, ParseError::UnexpectedFlags { token: "any".into() });
    }

    #[test]
    fn missing_value() {
        let (mut k, mut v, mut m) = ([0u8; 1], [0u8; 1], UpdateMode::Any);
        let err = parse_entry(&toks("key 1"), EntrySlots::update(&mut k, &mut v, &mut m)).unwrap_err();
        assert_eq!(err, ParseError::MissingSlot(Slot::Value));
    }

    #[test]
    fn trailing_garbage() {
        let mut k = [0u8; 1];
        let err = parse_entry(&toks("key 1 2"), EntrySlots::key(&mut k)).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedToken {
                expected: "key or value",
                token: "2".into()
            }
        );
    }

    #[test]
    fn short_key_names_the_keyword_that_interrupted_it() {
        let (mut k, mut v, mut m) = ([0u8; 4], [0u8; 1], UpdateMode::Any);
        let err = parse_entry(
            &toks("key 1 2 value 3"),
            EntrySlots::update(&mut k, &mut v, &mut m),
        )
        .unwrap_err();
        assert_eq!(err, ParseError::BadByte { token: "value".into() });
    }
}
