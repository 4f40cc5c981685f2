//! Namespace and key-space walks.
//!
//! Both walks end cleanly when the kernel reports `ENOENT`; any other error
//! is yielded once and ends the walk. Neither walk can be resumed after an
//! error, and interleaving other mutations of the same object makes the
//! order undefined.

use bpfscope_sys::{Handle, Kernel, SysResult};
use bpfscope_types::Namespace;

/// The id following `current` in `ns`, or `None` at the end.
pub fn next_id(kernel: &dyn Kernel, ns: Namespace, current: u32) -> SysResult<Option<u32>> {
    match kernel.next_id(ns, current) {
        Ok(id) => Ok(Some(id)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// The key following `prev` (the first key for `None`), or `None` at the
/// end.
pub fn next_key(
    handle: &Handle<'_>,
    prev: Option<&[u8]>,
    key_size: usize,
) -> SysResult<Option<Vec<u8>>> {
    let mut next = vec![0u8; key_size];
    match handle.next_key(prev, &mut next) {
        Ok(()) => Ok(Some(next)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Every live id in a namespace, lowest first.
pub struct IdIter<'k> {
    kernel: &'k dyn Kernel,
    ns: Namespace,
    current: u32,
    done: bool,
}

impl<'k> IdIter<'k> {
    pub fn new(kernel: &'k dyn Kernel, ns: Namespace) -> Self {
        Self {
            kernel,
            ns,
            current: 0,
            done: false,
        }
    }
}

impl Iterator for IdIter<'_> {
    type Item = SysResult<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match next_id(self.kernel, self.ns, self.current) {
            Ok(Some(id)) => {
                self.current = id;
                Some(Ok(id))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for IdIter<'_> {}

/// Every key of a map, in kernel order.
pub struct KeyIter<'h, 'k> {
    handle: &'h Handle<'k>,
    key_size: usize,
    prev: Option<Vec<u8>>,
    done: bool,
}

impl<'h, 'k> KeyIter<'h, 'k> {
    pub fn new(handle: &'h Handle<'k>, key_size: usize) -> Self {
        Self {
            handle,
            key_size,
            prev: None,
            done: false,
        }
    }
}

impl Iterator for KeyIter<'_, '_> {
    type Item = SysResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match next_key(self.handle, self.prev.as_deref(), self.key_size) {
            Ok(Some(key)) => {
                self.prev = Some(key.clone());
                Some(Ok(key))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for KeyIter<'_, '_> {}
