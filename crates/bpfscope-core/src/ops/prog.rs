use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use bpfscope_sys::{Handle, Kernel};
use bpfscope_types::{InsnKind, Namespace, ProgInfo};
use tracing::debug;

use crate::codec::is_prefix;
use crate::error::{OpError, OpResult, ParseError};
use crate::info::{fetch_insns, prog_info};
use crate::iter::IdIter;
use crate::ops::Outcome;
use crate::reference::ObjectRef;
use crate::resolve::Resolver;

const INSN_KINDS: [(&str, InsnKind); 4] = [
    ("xlated", InsnKind::Xlated),
    ("jited", InsnKind::Jited),
    ("translated", InsnKind::Xlated),
    ("compiled", InsnKind::Jited),
];

/// `xlated`/`translated` or `jited`/`compiled`, abbreviations allowed.
pub fn parse_insn_kind(token: &str) -> Result<InsnKind, ParseError> {
    INSN_KINDS
        .iter()
        .find(|(name, _)| is_prefix(token, name))
        .map(|(_, kind)| *kind)
        .ok_or_else(|| ParseError::UnexpectedToken {
            expected: "'xlated' or 'jited'",
            token: token.to_string(),
        })
}

/// Info for one program, or for every program when `reference` is `None`.
pub fn show_programs(
    kernel: &dyn Kernel,
    reference: Option<&ObjectRef>,
) -> OpResult<Vec<ProgInfo>> {
    if let Some(reference) = reference {
        let handle = Resolver::new(kernel).resolve_as(reference, Namespace::Program)?;
        let info = prog_info(&handle).map_err(|e| OpError::kernel("get program info", e))?;
        return Ok(vec![info]);
    }

    let mut progs = Vec::new();
    for id in IdIter::new(kernel, Namespace::Program) {
        let id = id.map_err(|e| OpError::kernel("get next program", e))?;
        let handle = Handle::by_id(kernel, Namespace::Program, id)
            .map_err(|e| OpError::kernel("get program by id", e))?;
        progs.push(prog_info(&handle).map_err(|e| OpError::kernel("get program info", e))?);
    }
    Ok(progs)
}

/// Write one instruction image of a program to `path`, mode 0600. No file
/// is created when the program has no image of that kind.
pub fn dump_insns(
    kernel: &dyn Kernel,
    reference: &ObjectRef,
    kind: InsnKind,
    path: &Path,
) -> OpResult<Outcome> {
    let image = {
        let handle = Resolver::new(kernel).resolve_as(reference, Namespace::Program)?;
        fetch_insns(&handle, kind)?
    };
    let Some(image) = image else {
        return Ok(Outcome::NoInsns { kind });
    };

    let output = |source| OpError::Output {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(output)?;
    file.write_all(&image).map_err(output)?;
    debug!(%reference, %kind, bytes = image.len(), path = %path.display(), "wrote instruction image");

    Ok(Outcome::InsnsWritten {
        path: path.to_path_buf(),
        kind,
        bytes: image.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use bpfscope_sys::InMemoryKernel;
    use bpfscope_types::{MapType, ProgType, Tag};
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn insn_kind_names() {
        assert_eq!(parse_insn_kind("x").unwrap(), InsnKind::Xlated);
        assert_eq!(parse_insn_kind("translated").unwrap(), InsnKind::Xlated);
        assert_eq!(parse_insn_kind("j").unwrap(), InsnKind::Jited);
        assert_eq!(parse_insn_kind("comp").unwrap(), InsnKind::Jited);
        assert!(parse_insn_kind("raw").is_err());
        assert!(parse_insn_kind("").is_err());
    }

    #[test]
    fn dump_writes_private_file() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_program(ProgType::XDP, Tag::default(), &[0xb7, 0, 0, 0], &[0x90; 6]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.bin");

        let outcome = dump_insns(&kernel, &ObjectRef::Id(id), InsnKind::Jited, &path).unwrap();
        assert_eq!(
            outcome,
            Outcome::InsnsWritten {
                path: path.clone(),
                kind: InsnKind::Jited,
                bytes: 6
            }
        );
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x90; 6]);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn dump_truncates_existing_file() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_program(ProgType::XDP, Tag::default(), &[1, 2], &[]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.bin");
        std::fs::write(&path, [9u8; 64]).unwrap();
        dump_insns(&kernel, &ObjectRef::Id(id), InsnKind::Xlated, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2]);
    }

    #[test]
    fn empty_image_creates_nothing() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_program(ProgType::XDP, Tag::default(), &[1; 8], &[]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jited.bin");
        let outcome = dump_insns(&kernel, &ObjectRef::Id(id), InsnKind::Jited, &path).unwrap();
        assert_eq!(outcome, Outcome::NoInsns { kind: InsnKind::Jited });
        assert!(!path.exists());
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn unwritable_path_is_output_error() {
        let kernel = InMemoryKernel::new();
        let id = kernel.add_program(ProgType::XDP, Tag::default(), &[1; 8], &[]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");
        let err = dump_insns(&kernel, &ObjectRef::Id(id), InsnKind::Xlated, &path).unwrap_err();
        assert!(matches!(err, OpError::Output { .. }));
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn show_by_tag() {
        let kernel = InMemoryKernel::new();
        kernel.add_program(ProgType::XDP, Tag::from_bytes([0xaa; 8]), &[], &[]);
        let bb = kernel.add_program(ProgType::SCHED_CLS, Tag::from_bytes([0xbb; 8]), &[], &[]);
        let progs =
            show_programs(&kernel, Some(&ObjectRef::Tag(Tag::from_bytes([0xbb; 8])))).unwrap();
        assert_eq!(progs.len(), 1);
        assert_eq!(progs[0].id, bb);
        assert_eq!(kernel.open_handles(), 0);
    }

    #[test]
    fn map_id_is_not_a_program() {
        let kernel = InMemoryKernel::new();
        kernel.add_map(MapType::HASH, 4, 4, 4, 0);
        let err = show_programs(&kernel, Some(&ObjectRef::Id(1))).unwrap_err();
        assert!(matches!(err, OpError::Resolve(ResolveError::NotFound { .. })));
        assert_eq!(kernel.open_handles(), 0);
    }
}
