use std::fmt;
use std::path::Path;

use bpfscope_types::{Namespace, ObjectKind, UpdateMode};
use tracing::trace;

use crate::error::SysResult;
use crate::traits::{InsnBuffer, Kernel, RawHandle};

/// Scoped ownership of a kernel handle.
///
/// The handle is closed when the guard drops, so success, error and early
/// return paths all release it exactly once.
pub struct Handle<'k> {
    kernel: &'k dyn Kernel,
    raw: RawHandle,
}

impl<'k> Handle<'k> {
    /// Take ownership of an already opened raw handle.
    pub fn from_raw(kernel: &'k dyn Kernel, raw: RawHandle) -> Self {
        Self { kernel, raw }
    }

    pub fn by_id(kernel: &'k dyn Kernel, ns: Namespace, id: u32) -> SysResult<Self> {
        let raw = kernel.open_by_id(ns, id)?;
        trace!(%ns, id, raw, "opened handle by id");
        Ok(Self::from_raw(kernel, raw))
    }

    pub fn pinned(kernel: &'k dyn Kernel, path: &Path) -> SysResult<Self> {
        let raw = kernel.open_pinned(path)?;
        trace!(path = %path.display(), raw, "opened pinned handle");
        Ok(Self::from_raw(kernel, raw))
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn kernel(&self) -> &'k dyn Kernel {
        self.kernel
    }

    pub fn kind(&self) -> SysResult<Option<ObjectKind>> {
        self.kernel.handle_kind(self.raw)
    }

    pub fn info(&self, buf: &mut [u8], insns: Option<InsnBuffer<'_>>) -> SysResult<usize> {
        self.kernel.object_info(self.raw, buf, insns)
    }

    pub fn lookup(&self, key: &[u8], value: &mut [u8]) -> SysResult<()> {
        self.kernel.map_lookup(self.raw, key, value)
    }

    pub fn update(&self, key: &[u8], value: &[u8], mode: UpdateMode) -> SysResult<()> {
        self.kernel.map_update(self.raw, key, value, mode)
    }

    pub fn delete(&self, key: &[u8]) -> SysResult<()> {
        self.kernel.map_delete(self.raw, key)
    }

    pub fn next_key(&self, key: Option<&[u8]>, next: &mut [u8]) -> SysResult<()> {
        self.kernel.map_next_key(self.raw, key, next)
    }

    pub fn pin(&self, path: &Path) -> SysResult<()> {
        self.kernel.pin(self.raw, path)
    }
}

impl Drop for Handle<'_> {
    fn drop(&mut self) {
        trace!(raw = self.raw, "closing handle");
        self.kernel.close(self.raw);
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("raw", &self.raw).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryKernel;
    use bpfscope_types::MapType;

    #[test]
    fn drop_releases_handle() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_map(MapType::HASH, 4, 4, 16, 0);
        {
            let handle = Handle::by_id(&kernel, Namespace::Map, id).unwrap();
            assert_eq!(kernel.open_handles(), 1);
            assert!(handle.raw() >= 3);
        }
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn failed_open_leaves_nothing_open() {
        let kernel = InMemoryKernel::new();
        let err = Handle::by_id(&kernel, Namespace::Program, 99).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(kernel.open_handles(), 0);
    }
}
