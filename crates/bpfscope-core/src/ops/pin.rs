use std::path::Path;

use bpfscope_sys::{Kernel, SysError};
use bpfscope_types::Namespace;
use tracing::info;

use crate::config::ToolConfig;
use crate::error::{Diagnosis, OpError, OpResult};
use crate::reference::ObjectRef;
use crate::resolve::Resolver;

/// Pin the referenced object at `path`.
pub fn pin(
    kernel: &dyn Kernel,
    config: &ToolConfig,
    ns: Namespace,
    reference: &ObjectRef,
    path: &Path,
) -> OpResult<()> {
    let handle = Resolver::new(kernel).resolve_as(reference, ns)?;
    handle.pin(path).map_err(|source| {
        let diagnosis = diagnose(&source, path, config);
        OpError::KernelRejected {
            op: "pin",
            source,
            diagnosis,
        }
    })?;
    info!(%reference, path = %path.display(), "pinned object");
    Ok(())
}

fn diagnose(source: &SysError, path: &Path, config: &ToolConfig) -> Option<Diagnosis> {
    if source.is_permission_denied() {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };
        Some(Diagnosis::OutsideBpffs { dir })
    } else if source.is_not_found() {
        Some(Diagnosis::BpffsNotMounted {
            root: config.bpffs_root.clone(),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpfscope_sys::InMemoryKernel;
    use bpfscope_types::{MapType, ProgType, Tag};

    #[test]
    fn pin_then_resolve() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_map(MapType::HASH, 4, 4, 4, 0);
        let path = Path::new("/sys/fs/bpf/counters");
        pin(&kernel, &ToolConfig::default(), Namespace::Map, &ObjectRef::Id(id), path).unwrap();
        assert!(kernel.is_pinned(path));

        let handle = Resolver::new(&kernel)
            .resolve_as(&ObjectRef::Pinned(path.into()), Namespace::Map)
            .unwrap();
        drop(handle);
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn pin_by_tag() {
        let kernel = InMemoryKernel::new();
        let tag = Tag::from_bytes([7; 8]);
        kernel.add_program(ProgType::XDP, tag, &[], &[]);
        let path = Path::new("/sys/fs/bpf/xdp");
        pin(&kernel, &ToolConfig::default(), Namespace::Program, &ObjectRef::Tag(tag), path).unwrap();
        assert!(kernel.is_pinned(path));
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn outside_bpffs_is_diagnosed() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_map(MapType::HASH, 4, 4, 4, 0);
        let err = pin(
            &kernel,
            &ToolConfig::default(),
            Namespace::Map,
            &ObjectRef::Id(id),
            Path::new("/tmp/pins/m"),
        )
        .unwrap_err();
        match &err {
            OpError::KernelRejected { diagnosis, .. } => assert_eq!(
                diagnosis,
                &Some(Diagnosis::OutsideBpffs {
                    dir: "/tmp/pins".into()
                })
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().ends_with("(is /tmp/pins in BPF file system?)"));
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn missing_bpffs_names_the_root() {
        let kernel = InMemoryKernel::new().with_bpffs(None);
        let id = kernel.add_map(MapType::HASH, 4, 4, 4, 0);
        let config = ToolConfig {
            bpffs_root: "/mnt/bpf".into(),
            ..ToolConfig::default()
        };
        let err = pin(&kernel, &config, Namespace::Map, &ObjectRef::Id(id), Path::new("/mnt/bpf/m"))
            .unwrap_err();
        assert!(err.to_string().ends_with("(is BPF file system mounted at /mnt/bpf?)"));
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn duplicate_pin_has_no_diagnosis() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_map(MapType::HASH, 4, 4, 4, 0);
        let path = Path::new("/sys/fs/bpf/m");
        let config = ToolConfig::default();
        pin(&kernel, &config, Namespace::Map, &ObjectRef::Id(id), path).unwrap();
        let err = pin(&kernel, &config, Namespace::Map, &ObjectRef::Id(id), path).unwrap_err();
        assert!(matches!(err, OpError::KernelRejected { diagnosis: None, .. }));
        assert_eq!(kernel.open_handles(), 0);
    }
}
