use std::path::Path;

use bpfscope_types::{InsnKind, Namespace, ObjectKind, UpdateMode};

use crate::error::SysResult;

/// Opaque handle number. On Linux this is a file descriptor.
pub type RawHandle = i32;

/// Destination for one instruction image during an info query.
///
/// The kernel copies at most `buf.len()` bytes and reports the full image
/// length in the returned record, which may exceed the buffer.
#[derive(Debug)]
pub struct InsnBuffer<'a> {
    pub kind: InsnKind,
    pub buf: &'a mut [u8],
}

/// The kernel's BPF object interface.
///
/// Calls mirror the `bpf(2)` commands one-to-one and report failures with
/// the kernel's errno. In particular `next_id` and `map_next_key` fail with
/// `ENOENT` at the end of a sequence; interpreting that is left to callers.
///
/// Raw handles returned by `open_by_id` and `open_pinned` are owned by the
/// caller and must be passed to `close` exactly once. Prefer
/// [`Handle`](crate::Handle), which does this on drop.
pub trait Kernel: Send + Sync {
    /// Smallest live id in `ns` strictly greater than `start`.
    fn next_id(&self, ns: Namespace, start: u32) -> SysResult<u32>;

    /// Open a handle to the object with the given id.
    fn open_by_id(&self, ns: Namespace, id: u32) -> SysResult<RawHandle>;

    /// Open a handle to the object pinned at `path`.
    fn open_pinned(&self, path: &Path) -> SysResult<RawHandle>;

    /// Pin the object behind `handle` at `path`.
    fn pin(&self, handle: RawHandle, path: &Path) -> SysResult<()>;

    /// Release a handle.
    fn close(&self, handle: RawHandle);

    /// The kind recorded for a handle, if the host exposes one.
    ///
    /// `Ok(None)` means the host has no record and callers must classify
    /// the handle some other way.
    fn handle_kind(&self, handle: RawHandle) -> SysResult<Option<ObjectKind>>;

    /// Fill `info` with the object's info record and return the number of
    /// bytes the kernel wrote.
    fn object_info(
        &self,
        handle: RawHandle,
        info: &mut [u8],
        insns: Option<InsnBuffer<'_>>,
    ) -> SysResult<usize>;

    fn map_lookup(&self, handle: RawHandle, key: &[u8], value: &mut [u8]) -> SysResult<()>;

    fn map_update(
        &self,
        handle: RawHandle,
        key: &[u8],
        value: &[u8],
        mode: UpdateMode,
    ) -> SysResult<()>;

    fn map_delete(&self, handle: RawHandle, key: &[u8]) -> SysResult<()>;

    /// Write the key following `key` (or the first key for `None`) into
    /// `next`.
    fn map_next_key(&self, handle: RawHandle, key: Option<&[u8]>, next: &mut [u8])
        -> SysResult<()>;

    /// Number of possible CPUs on the host.
    fn possible_cpus(&self) -> SysResult<usize>;
}
