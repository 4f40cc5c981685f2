//! Object resolution and typed data access for bpfscope.
//!
//! This crate sits between the command line and the [`Kernel`] capability.
//! It turns references (`id`, `tag`, `pinned`) into classified handles,
//! reads info records, sizes key and value buffers (per-CPU maps included),
//! parses and prints byte sequences, and drives the namespace and key walks
//! behind every `prog` and `map` command.
//!
//! # Key Types
//!
//! - [`ObjectRef`] -- a parsed reference to a program or map
//! - [`Resolver`] -- opens and classifies the object a reference names
//! - [`ValueLayout`] -- single or per-CPU value shape of a map
//! - [`Operation`] / [`Outcome`] -- one command and what it produced
//! - [`ToolConfig`] -- host paths and output format
//!
//! Every operation releases the handles it opened before it returns, on
//! success and failure alike.
//!
//! [`Kernel`]: bpfscope_sys::Kernel

pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod info;
pub mod iter;
pub mod layout;
pub mod ops;
pub mod reference;
pub mod render;
pub mod resolve;

pub use codec::{format_hex, is_prefix, parse_bytes, parse_ulong};
pub use config::{OutputFormat, ToolConfig, CONFIG_ENV};
pub use entry::{parse_entry, EntrySlots};
pub use error::{ConfigError, Diagnosis, OpError, OpResult, ParseError, ResolveError, Slot};
pub use info::{fetch_info, fetch_insns, map_info, prog_info, RawInfo};
pub use iter::{next_id, next_key, IdIter, KeyIter};
pub use layout::{alloc_buffer, format_entry, is_compact, ValueLayout};
pub use ops::{execute, EntryVerb, MapDump, Operation, Outcome};
pub use reference::{parse_reference, ObjectRef};
pub use render::{render_json, render_text, status_line};
pub use resolve::Resolver;
