//! Kernel capability layer for bpfscope.
//!
//! Everything bpfscope knows about the kernel goes through the [`Kernel`]
//! trait: walking id namespaces, opening handles by id or pin path, reading
//! info records, and the map element calls. Handles are wrapped in the
//! [`Handle`] guard, which closes them on drop so every exit path releases
//! exactly once.
//!
//! # Backends
//!
//! - [`LinuxKernel`] -- raw `bpf(2)` syscalls through `libc`
//! - [`InMemoryKernel`] -- deterministic in-process model for tests, with
//!   fault injection and open-handle accounting
//!
//! Errors keep the kernel's errno so callers can tell "no more entries"
//! (`ENOENT`) apart from real failures.

pub mod cpus;
pub mod error;
pub mod handle;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod memory;
pub mod traits;

pub use cpus::{parse_cpu_list, possible_cpus_from};
pub use error::{SysError, SysResult};
pub use handle::Handle;
#[cfg(target_os = "linux")]
pub use linux::LinuxKernel;
pub use memory::{Fault, InMemoryKernel};
pub use traits::{InsnBuffer, Kernel, RawHandle};
