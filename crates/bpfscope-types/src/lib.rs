//! Foundation types for bpfscope.
//!
//! This crate provides the kernel-facing data shapes shared by every other
//! bpfscope crate: object classification, the fixed-layout info records the
//! kernel fills in, program tags, and the kind-code to display-name mapping.
//!
//! # Key Types
//!
//! - [`ObjectKind`] -- what a handle refers to (program, map, or unknown)
//! - [`Namespace`] -- which id namespace an operation walks
//! - [`ProgInfo`] / [`MapInfo`] -- byte-exact info records with short-record tolerance
//! - [`Tag`] -- 8-byte program content fingerprint
//! - [`ProgType`] / [`MapType`] -- open kind-code sets with a `type:<code>` fallback
//! - [`UpdateMode`] -- existence semantics for map updates

pub mod error;
pub mod info;
pub mod kinds;
pub mod mode;
pub mod object;
pub mod tag;

pub use error::TypeError;
pub use info::{MapInfo, ProgInfo, INFO_UNION_SIZE};
pub use kinds::{MapType, ProgType};
pub use mode::UpdateMode;
pub use object::{InsnKind, Namespace, ObjectKind};
pub use tag::{Tag, TAG_SIZE};
