//! Value sizing and entry rendering.
//!
//! Per-CPU maps store one copy of the value for every possible CPU, laid out
//! CPU-major in a single buffer. Everything else stores `value_size` bytes.

use std::fmt::Write;

use bpfscope_sys::{Kernel, SysResult};
use bpfscope_types::MapInfo;
use serde::Serialize;

use crate::codec::format_hex;
use crate::error::{OpError, OpResult};

/// Widest key or value still printed on the same line as its label.
const COMPACT_SLOT: usize = 16;
/// Widest combined key and value printed on one line.
const COMPACT_ENTRY: usize = 24;

/// How a map's value buffer is shaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ValueLayout {
    value_size: usize,
    replicas: Option<usize>,
}

impl ValueLayout {
    /// Layout for `info`, asking the kernel for the CPU count only when the
    /// map is per-CPU.
    pub fn for_map(info: &MapInfo, kernel: &dyn Kernel) -> SysResult<Self> {
        if info.map_type.is_per_cpu() {
            Ok(Self::replicated(info.value_size(), kernel.possible_cpus()?))
        } else {
            Ok(Self::single(info.value_size()))
        }
    }

    pub fn single(value_size: usize) -> Self {
        Self {
            value_size,
            replicas: None,
        }
    }

    pub fn replicated(value_size: usize, replicas: usize) -> Self {
        Self {
            value_size,
            replicas: Some(replicas),
        }
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    /// CPU count for per-CPU maps.
    pub fn replicas(&self) -> Option<usize> {
        self.replicas
    }

    pub fn is_replicated(&self) -> bool {
        self.replicas.is_some()
    }

    /// Bytes needed to hold one value.
    pub fn buffer_size(&self) -> usize {
        self.value_size * self.replicas.unwrap_or(1)
    }

    /// One value per CPU, in CPU order.
    pub fn chunks<'v>(&self, value: &'v [u8]) -> impl Iterator<Item = &'v [u8]> {
        value.chunks(self.value_size.max(1))
    }
}

/// Zeroed buffer of exactly `size` bytes; allocation failure is reported
/// instead of aborting.
pub fn alloc_buffer(size: usize, what: &'static str) -> OpResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| OpError::AllocationFailed { what, size })?;
    buf.resize(size, 0);
    Ok(buf)
}

/// Whether a non-replicated entry of this map fits on one line.
pub fn is_compact(info: &MapInfo) -> bool {
    let (k, v) = (info.key_size(), info.value_size());
    k + v <= COMPACT_ENTRY && k.max(v) <= COMPACT_SLOT
}

/// Render one entry, without a trailing newline.
pub fn format_entry(info: &MapInfo, layout: &ValueLayout, key: &[u8], value: &[u8]) -> String {
    let mut out = String::new();
    if !layout.is_replicated() {
        let sep = if is_compact(info) { "  " } else { "\n" };
        let _ = write!(
            out,
            "key: {}{sep}value: {}",
            format_hex(key, " "),
            format_hex(value, " ")
        );
        return out;
    }

    let sep = if layout.value_size() > COMPACT_SLOT { '\n' } else { ' ' };
    let _ = write!(out, "key:\n{}", format_hex(key, " "));
    for (cpu, chunk) in layout.chunks(value).enumerate() {
        let _ = write!(out, "\nvalue (CPU {cpu:02}):{sep}{}", format_hex(chunk, " "));
    }
    out
}
