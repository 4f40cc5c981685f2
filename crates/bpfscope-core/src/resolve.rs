//! Turning an [`ObjectRef`] into an open, classified handle.

use bpfscope_sys::{Handle, Kernel, SysError};
use bpfscope_types::{MapInfo, Namespace, ObjectKind, ProgInfo, Tag, INFO_UNION_SIZE};
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::info::{fetch_info, prog_info};
use crate::iter::IdIter;
use crate::reference::ObjectRef;

/// Resolves references against one kernel.
#[derive(Clone, Copy)]
pub struct Resolver<'k> {
    kernel: &'k dyn Kernel,
}

impl<'k> Resolver<'k> {
    pub fn new(kernel: &'k dyn Kernel) -> Self {
        Self { kernel }
    }

    /// Open the object `reference` names and report what it is.
    ///
    /// `ns` picks the namespace for id references. Tag references always
    /// scan programs; pinned references carry their own kind.
    pub fn resolve(
        &self,
        reference: &ObjectRef,
        ns: Namespace,
    ) -> Result<(Handle<'k>, ObjectKind), ResolveError> {
        match reference {
            ObjectRef::Id(id) => {
                let handle = Handle::by_id(self.kernel, ns, *id)
                    .map_err(|e| lookup_error(reference, e))?;
                debug!(%reference, %ns, "resolved by id");
                Ok((handle, ns.kind()))
            }
            ObjectRef::Tag(tag) => {
                let handle = self.scan_for_tag(reference, tag)?;
                Ok((handle, ObjectKind::Program))
            }
            ObjectRef::Pinned(path) => {
                let handle =
                    Handle::pinned(self.kernel, path).map_err(|e| lookup_error(reference, e))?;
                let kind = self.classify(reference, &handle)?;
                debug!(%reference, %kind, "resolved pin");
                Ok((handle, kind))
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but the object must belong to `ns`.
    /// A mismatched handle is closed before the error is returned.
    pub fn resolve_as(
        &self,
        reference: &ObjectRef,
        ns: Namespace,
    ) -> Result<Handle<'k>, ResolveError> {
        let (handle, actual) = self.resolve(reference, ns)?;
        let expected = ns.kind();
        if actual != expected {
            drop(handle);
            return Err(ResolveError::WrongKind {
                reference: reference.clone(),
                expected,
                actual,
            });
        }
        Ok(handle)
    }

    fn scan_for_tag(&self, reference: &ObjectRef, tag: &Tag) -> Result<Handle<'k>, ResolveError> {
        for id in IdIter::new(self.kernel, Namespace::Program) {
            let id = id.map_err(|e| failed(reference, e))?;
            let handle = Handle::by_id(self.kernel, Namespace::Program, id)
                .map_err(|e| failed(reference, e))?;
            let info = prog_info(&handle).map_err(|e| failed(reference, e))?;
            if info.tag == *tag {
                debug!(%reference, id, "resolved tag");
                return Ok(handle);
            }
        }
        Err(ResolveError::NotFound {
            reference: reference.clone(),
        })
    }

    fn classify(&self, reference: &ObjectRef, handle: &Handle<'_>) -> Result<ObjectKind, ResolveError> {
        if let Some(kind) = handle.kind().map_err(|e| failed(reference, e))? {
            return Ok(kind);
        }

        // Without a recorded kind, the only signal is which record the
        // kernel filled. Breaks if the records ever grow or share a size.
        warn!(%reference, "no recorded object kind, classifying by info record size");
        let raw = fetch_info(handle, INFO_UNION_SIZE).map_err(|e| failed(reference, e))?;
        match raw.used() {
            ProgInfo::SIZE => Ok(ObjectKind::Program),
            MapInfo::SIZE => Ok(ObjectKind::Map),
            len => Err(ResolveError::ClassificationFailed {
                reference: reference.clone(),
                len,
            }),
        }
    }
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

fn failed(reference: &ObjectRef, source: SysError) -> ResolveError {
    ResolveError::LookupFailed {
        reference: reference.clone(),
        source,
    }
}

fn lookup_error(reference: &ObjectRef, source: SysError) -> ResolveError {
    if source.is_not_found() {
        ResolveError::NotFound {
            reference: reference.clone(),
        }
    } else {
        failed(reference, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpfscope_sys::{Fault, InMemoryKernel};
    use bpfscope_types::{MapType, ProgType};

    const AA: Tag = Tag::from_bytes([0xaa; 8]);
    const BB: Tag = Tag::from_bytes([0xbb; 8]);

    fn pin(kernel: &InMemoryKernel, ns: Namespace, id: u32, path: &str) {
        let handle = Handle::by_id(kernel, ns, id).unwrap();
        handle.pin(path.as_ref()).unwrap();
    }

    #[test]
    fn by_id() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_map(MapType::HASH, 4, 4, 8, 0);
        {
            let (handle, kind) = Resolver::new(&kernel)
                .resolve(&ObjectRef::Id(id), Namespace::Map)
                .unwrap();
            assert_eq!(kind, ObjectKind::Map);
            assert_eq!(kernel.open_handles(), 1);
            drop(handle);
        }
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn missing_id_is_not_found() {
        let kernel = InMemoryKernel::new();
        let err = Resolver::new(&kernel)
            .resolve(&ObjectRef::Id(42), Namespace::Program)
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(err.to_string(), "id 42: not found");
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn tag_scan_skips_non_matching() {
        let kernel = InMemoryKernel::new();
        kernel.add_program(ProgType::XDP, AA, &[], &[]);
        let bb = kernel.add_program(ProgType::KPROBE, BB, &[], &[]);
        {
            let handle = Resolver::new(&kernel)
                .resolve_as(&ObjectRef::Tag(BB), Namespace::Program)
                .unwrap();
            let info = prog_info(&handle).unwrap();
            assert_eq!(info.tag, BB);
            assert_eq!(info.id, bb);
            assert_eq!(kernel.open_handles(), 1);
        }
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn tag_without_match() {
        let kernel = InMemoryKernel::new();
        kernel.add_program(ProgType::XDP, AA, &[], &[]);
        let err = Resolver::new(&kernel)
            .resolve(&ObjectRef::Tag(BB), Namespace::Program)
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn tag_scan_surfaces_intermediate_failure() {
        let kernel = InMemoryKernel::new();
        let aa = kernel.add_program(ProgType::XDP, AA, &[], &[]);
        kernel.add_program(ProgType::XDP, BB, &[], &[]);
        kernel.inject(Fault::InfoFails {
            ns: Namespace::Program,
            id: aa,
            errno: libc::EACCES,
        });
        let err = Resolver::new(&kernel)
            .resolve(&ObjectRef::Tag(BB), Namespace::Program)
            .unwrap_err();
        assert!(matches!(err, ResolveError::LookupFailed { .. }));
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn pinned_uses_recorded_kind() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_program(ProgType::XDP, AA, &[], &[]);
        pin(&kernel, Namespace::Program, id, "/sys/fs/bpf/prog");
        let reference = ObjectRef::Pinned("/sys/fs/bpf/prog".into());
        {
            let (_handle, kind) = Resolver::new(&kernel)
                .resolve(&reference, Namespace::Map)
                .unwrap();
            assert_eq!(kind, ObjectKind::Program);
        }
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn wrong_kind_closes_the_handle() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_program(ProgType::XDP, AA, &[], &[]);
        pin(&kernel, Namespace::Program, id, "/sys/fs/bpf/prog");
        let err = Resolver::new(&kernel)
            .resolve_as(&ObjectRef::Pinned("/sys/fs/bpf/prog".into()), Namespace::Map)
            .unwrap_err();
        match err {
            ResolveError::WrongKind {
                expected, actual, ..
            } => {
                assert_eq!(expected, ObjectKind::Map);
                assert_eq!(actual, ObjectKind::Program);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn size_fallback_classifies_both_kinds() {
        let kernel = InMemoryKernel::new().without_handle_kinds();
        let prog = kernel.add_program(ProgType::XDP, AA, &[], &[]);
        let map = kernel.add_map(MapType::ARRAY, 4, 4, 2, 0);
        pin(&kernel, Namespace::Program, prog, "/sys/fs/bpf/p");
        pin(&kernel, Namespace::Map, map, "/sys/fs/bpf/m");
        let resolver = Resolver::new(&kernel);
        {
            let (_p, kind) = resolver
                .resolve(&ObjectRef::Pinned("/sys/fs/bpf/p".into()), Namespace::Program)
                .unwrap();
            assert_eq!(kind, ObjectKind::Program);
            let (_m, kind) = resolver
                .resolve(&ObjectRef::Pinned("/sys/fs/bpf/m".into()), Namespace::Map)
                .unwrap();
            assert_eq!(kind, ObjectKind::Map);
        }
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn size_fallback_rejects_unknown_record_size() {
        let kernel = InMemoryKernel::new()
            .without_handle_kinds()
            .with_record_sizes(ProgInfo::SIZE, 32);
        let map = kernel.add_map(MapType::HASH, 4, 4, 2, 0);
        pin(&kernel, Namespace::Map, map, "/sys/fs/bpf/m");
        let err = Resolver::new(&kernel)
            .resolve(&ObjectRef::Pinned("/sys/fs/bpf/m".into()), Namespace::Map)
            .unwrap_err();
        match err {
            ResolveError::ClassificationFailed { len, .. } => assert_eq!(len, 32),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn missing_pin_is_not_found() {
        let kernel = InMemoryKernel::new();
        let err = Resolver::new(&kernel)
            .resolve(&ObjectRef::Pinned("/sys/fs/bpf/none".into()), Namespace::Map)
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }
}
