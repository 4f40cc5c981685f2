//! Info record retrieval.
//!
//! Records are always fetched into a caller-sized buffer and the kernel's
//! reported length is kept next to the bytes. Instruction images use a
//! probe-then-fetch protocol: the first query learns the image length, the
//! second supplies a buffer of exactly that size.

use bpfscope_sys::{Handle, InsnBuffer, SysResult};
use bpfscope_types::{InsnKind, MapInfo, ProgInfo};
use tracing::debug;

use crate::error::{OpError, OpResult};
use crate::layout::alloc_buffer;

/// An info record as the kernel wrote it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawInfo {
    buf: Vec<u8>,
    used: usize,
}

impl RawInfo {
    /// Capacity the record was fetched with.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes the kernel reported writing.
    pub fn used(&self) -> usize {
        self.used
    }

    /// An older-format record: trailing fields were not written.
    pub fn is_short(&self) -> bool {
        self.used < self.buf.len()
    }

    /// The written prefix of the record.
    pub fn payload(&self) -> &[u8] {
        &self.buf[..self.used.min(self.buf.len())]
    }
}

/// Fetch the info record for `handle` with the given capacity.
pub fn fetch_info(handle: &Handle<'_>, capacity: usize) -> SysResult<RawInfo> {
    let mut buf = vec![0u8; capacity];
    let used = handle.info(&mut buf, None)?;
    debug!(raw = handle.raw(), capacity, used, "fetched info record");
    Ok(RawInfo { buf, used })
}

pub fn prog_info(handle: &Handle<'_>) -> SysResult<ProgInfo> {
    let raw = fetch_info(handle, ProgInfo::SIZE)?;
    Ok(ProgInfo::from_bytes(raw.payload()))
}

pub fn map_info(handle: &Handle<'_>) -> SysResult<MapInfo> {
    let raw = fetch_info(handle, MapInfo::SIZE)?;
    Ok(MapInfo::from_bytes(raw.payload()))
}

/// Fetch one instruction image of a program.
///
/// Returns `Ok(None)` when the kernel has no image of that kind, without
/// allocating. If the image grew between the probe and the fetch the
/// partial data is discarded and `PayloadTooLarge` is returned.
pub fn fetch_insns(handle: &Handle<'_>, kind: InsnKind) -> OpResult<Option<Vec<u8>>> {
    let probe = prog_info(handle).map_err(|e| OpError::kernel("get program info", e))?;
    let probed = probe.insn_len(kind) as usize;
    debug!(raw = handle.raw(), %kind, probed, "probed instruction image");
    if probed == 0 {
        return Ok(None);
    }

    let mut image = alloc_buffer(probed, "instruction image")?;
    let mut record = [0u8; ProgInfo::SIZE];
    let used = handle
        .info(
            &mut record,
            Some(InsnBuffer {
                kind,
                buf: &mut image,
            }),
        )
        .map_err(|e| OpError::kernel("get program info", e))?;

    let reported = ProgInfo::from_bytes(&record[..used.min(record.len())]).insn_len(kind) as usize;
    if reported > probed {
        return Err(OpError::PayloadTooLarge {
            kind,
            probed,
            reported,
        });
    }
    image.truncate(reported);
    Ok(Some(image))
}
