use std::fmt;

use serde::{Deserialize, Serialize};

/// Existence semantics applied to a map update.
///
/// The discriminants are the kernel's `BPF_ANY`, `BPF_NOEXIST` and
/// `BPF_EXIST` flag values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Create the entry or overwrite it.
    #[default]
    Any = 0,
    /// Only create; fail if the key is present.
    NoExist = 1,
    /// Only overwrite; fail if the key is absent.
    Exist = 2,
}

impl UpdateMode {
    pub fn flags(&self) -> u64 {
        *self as u64
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::NoExist => "noexist",
            Self::Exist => "exist",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
