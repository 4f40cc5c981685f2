//! `bpf(2)` backend.
//!
//! Each command gets its own `#[repr(C)]` slice of `union bpf_attr`. The
//! kernel accepts an attr shorter than its own definition as long as the
//! bytes it does not receive would have been zero, so every attr is zeroed
//! before its fields are set.

use std::ffi::CString;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use bpfscope_types::{Namespace, ObjectKind, ProgInfo, UpdateMode};
use tracing::debug;

use crate::cpus::possible_cpus_from;
use crate::error::{SysError, SysResult};
use crate::traits::{InsnBuffer, Kernel, RawHandle};

const BPF_MAP_LOOKUP_ELEM: libc::c_long = 1;
const BPF_MAP_UPDATE_ELEM: libc::c_long = 2;
const BPF_MAP_DELETE_ELEM: libc::c_long = 3;
const BPF_MAP_GET_NEXT_KEY: libc::c_long = 4;
const BPF_OBJ_PIN: libc::c_long = 6;
const BPF_OBJ_GET: libc::c_long = 7;
const BPF_PROG_GET_NEXT_ID: libc::c_long = 11;
const BPF_MAP_GET_NEXT_ID: libc::c_long = 12;
const BPF_PROG_GET_FD_BY_ID: libc::c_long = 13;
const BPF_MAP_GET_FD_BY_ID: libc::c_long = 14;
const BPF_OBJ_GET_INFO_BY_FD: libc::c_long = 15;

#[repr(C, align(8))]
struct ElemAttr {
    map_fd: u32,
    _pad: u32,
    key: u64,
    value_or_next_key: u64,
    flags: u64,
}

#[repr(C, align(8))]
struct ObjAttr {
    pathname: u64,
    bpf_fd: u32,
    file_flags: u32,
}

#[repr(C, align(8))]
struct IdAttr {
    id: u32,
    next_id: u32,
    open_flags: u32,
}

#[repr(C, align(8))]
struct InfoAttr {
    bpf_fd: u32,
    info_len: u32,
    info: u64,
}

fn zeroed<T>() -> T {
    // SAFETY: only used for the plain-integer attr structs above, for which
    // all-zero is a valid value.
    unsafe { mem::zeroed() }
}

fn sys_bpf<T>(cmd: libc::c_long, attr: &mut T) -> SysResult<libc::c_long> {
    // SAFETY: `attr` is a live, properly sized `bpf_attr` prefix and every
    // pointer stored in it refers to memory borrowed for this call.
    let ret = unsafe {
        libc::syscall(
            libc::SYS_bpf,
            cmd,
            attr as *mut T as *mut libc::c_void,
            mem::size_of::<T>() as libc::c_uint,
        )
    };
    if ret < 0 {
        Err(SysError::last_os_error())
    } else {
        Ok(ret)
    }
}

fn ptr_to_u64<T>(ptr: *const T) -> u64 {
    ptr as usize as u64
}

fn path_to_cstring(path: &Path) -> SysResult<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| SysError::Errno(libc::EINVAL))
}

/// The host kernel, reached through raw `bpf(2)` calls.
#[derive(Clone, Debug)]
pub struct LinuxKernel {
    possible_cpus_path: PathBuf,
    proc_fd_dir: PathBuf,
}

impl LinuxKernel {
    pub fn new() -> Self {
        Self::with_paths(
            PathBuf::from("/sys/devices/system/cpu/possible"),
            PathBuf::from("/proc/self/fd"),
        )
    }

    pub fn with_paths(possible_cpus_path: PathBuf, proc_fd_dir: PathBuf) -> Self {
        Self {
            possible_cpus_path,
            proc_fd_dir,
        }
    }

    fn elem_call(
        &self,
        cmd: libc::c_long,
        handle: RawHandle,
        key: u64,
        value: u64,
        flags: u64,
    ) -> SysResult<()> {
        let mut attr: ElemAttr = zeroed();
        attr.map_fd = handle as u32;
        attr.key = key;
        attr.value_or_next_key = value;
        attr.flags = flags;
        sys_bpf(cmd, &mut attr).map(|_| ())
    }
}

impl Default for LinuxKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for LinuxKernel {
    fn next_id(&self, ns: Namespace, start: u32) -> SysResult<u32> {
        let cmd = match ns {
            Namespace::Program => BPF_PROG_GET_NEXT_ID,
            Namespace::Map => BPF_MAP_GET_NEXT_ID,
        };
        let mut attr: IdAttr = zeroed();
        attr.id = start;
        sys_bpf(cmd, &mut attr)?;
        Ok(attr.next_id)
    }

    fn open_by_id(&self, ns: Namespace, id: u32) -> SysResult<RawHandle> {
        let cmd = match ns {
            Namespace::Program => BPF_PROG_GET_FD_BY_ID,
            Namespace::Map => BPF_MAP_GET_FD_BY_ID,
        };
        let mut attr: IdAttr = zeroed();
        attr.id = id;
        let fd = sys_bpf(cmd, &mut attr)?;
        Ok(fd as RawHandle)
    }

    fn open_pinned(&self, path: &Path) -> SysResult<RawHandle> {
        let cpath = path_to_cstring(path)?;
        let mut attr: ObjAttr = zeroed();
        attr.pathname = ptr_to_u64(cpath.as_ptr());
        let fd = sys_bpf(BPF_OBJ_GET, &mut attr)?;
        Ok(fd as RawHandle)
    }

    fn pin(&self, handle: RawHandle, path: &Path) -> SysResult<()> {
        let cpath = path_to_cstring(path)?;
        let mut attr: ObjAttr = zeroed();
        attr.pathname = ptr_to_u64(cpath.as_ptr());
        attr.bpf_fd = handle as u32;
        sys_bpf(BPF_OBJ_PIN, &mut attr).map(|_| ())
    }

    fn close(&self, handle: RawHandle) {
        // SAFETY: the handle is an fd this process owns; callers close each
        // handle exactly once.
        unsafe {
            libc::close(handle);
        }
    }

    fn handle_kind(&self, handle: RawHandle) -> SysResult<Option<ObjectKind>> {
        let link = self.proc_fd_dir.join(handle.to_string());
        let target = match std::fs::read_link(&link) {
            Ok(target) => target,
            Err(e) => {
                debug!(link = %link.display(), error = %e, "can't read handle link");
                return Ok(None);
            }
        };
        let target = target.to_string_lossy();
        let kind = if target.contains("bpf-map") {
            ObjectKind::Map
        } else if target.contains("bpf-prog") {
            ObjectKind::Program
        } else {
            ObjectKind::Unknown
        };
        Ok(Some(kind))
    }

    fn object_info(
        &self,
        handle: RawHandle,
        info: &mut [u8],
        insns: Option<InsnBuffer<'_>>,
    ) -> SysResult<usize> {
        if let Some(InsnBuffer { kind, buf }) = insns {
            if info.len() < ProgInfo::SIZE {
                return Err(SysError::Errno(libc::EINVAL));
            }
            let (len_off, ptr_off) = ProgInfo::insn_field_offsets(kind);
            info[len_off..len_off + 4].copy_from_slice(&(buf.len() as u32).to_ne_bytes());
            info[ptr_off..ptr_off + 8].copy_from_slice(&ptr_to_u64(buf.as_mut_ptr()).to_ne_bytes());
        }
        let mut attr: InfoAttr = zeroed();
        attr.bpf_fd = handle as u32;
        attr.info_len = info.len() as u32;
        attr.info = ptr_to_u64(info.as_mut_ptr());
        sys_bpf(BPF_OBJ_GET_INFO_BY_FD, &mut attr)?;
        Ok(attr.info_len as usize)
    }

    fn map_lookup(&self, handle: RawHandle, key: &[u8], value: &mut [u8]) -> SysResult<()> {
        self.elem_call(
            BPF_MAP_LOOKUP_ELEM,
            handle,
            ptr_to_u64(key.as_ptr()),
            ptr_to_u64(value.as_mut_ptr()),
            0,
        )
    }

    fn map_update(
        &self,
        handle: RawHandle,
        key: &[u8],
        value: &[u8],
        mode: UpdateMode,
    ) -> SysResult<()> {
        self.elem_call(
            BPF_MAP_UPDATE_ELEM,
            handle,
            ptr_to_u64(key.as_ptr()),
            ptr_to_u64(value.as_ptr()),
            mode.flags(),
        )
    }

    fn map_delete(&self, handle: RawHandle, key: &[u8]) -> SysResult<()> {
        self.elem_call(BPF_MAP_DELETE_ELEM, handle, ptr_to_u64(key.as_ptr()), 0, 0)
    }

    fn map_next_key(
        &self,
        handle: RawHandle,
        key: Option<&[u8]>,
        next: &mut [u8],
    ) -> SysResult<()> {
        let key_ptr = key.map(|k| ptr_to_u64(k.as_ptr())).unwrap_or(0);
        self.elem_call(
            BPF_MAP_GET_NEXT_KEY,
            handle,
            key_ptr,
            ptr_to_u64(next.as_mut_ptr()),
            0,
        )
    }

    fn possible_cpus(&self) -> SysResult<usize> {
        possible_cpus_from(&self.possible_cpus_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_sizes_match_kernel_prefixes() {
        assert_eq!(mem::size_of::<ElemAttr>(), 32);
        assert_eq!(mem::size_of::<ObjAttr>(), 16);
        assert_eq!(mem::size_of::<IdAttr>(), 16);
        assert_eq!(mem::size_of::<InfoAttr>(), 16);
    }

    #[test]
    fn nul_in_path_is_rejected() {
        let err = path_to_cstring(Path::new("/sys/fs/bpf/a\0b")).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EINVAL));
    }

    #[test]
    fn unreadable_fd_link_has_no_kind() {
        let kernel = LinuxKernel::with_paths(
            PathBuf::from("/nonexistent/possible"),
            PathBuf::from("/nonexistent/fd"),
        );
        assert_eq!(kernel.handle_kind(1_000_000).unwrap(), None);
    }

    #[test]
    fn fd_link_target_names_the_kind() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        symlink("anon_inode:bpf-map", dir.path().join("7")).unwrap();
        symlink("anon_inode:bpf-prog", dir.path().join("8")).unwrap();
        symlink("/dev/null", dir.path().join("9")).unwrap();
        let kernel = LinuxKernel::with_paths(
            PathBuf::from("/nonexistent/possible"),
            dir.path().to_path_buf(),
        );

        assert_eq!(kernel.handle_kind(7).unwrap(), Some(ObjectKind::Map));
        assert_eq!(kernel.handle_kind(8).unwrap(), Some(ObjectKind::Program));
        assert_eq!(kernel.handle_kind(9).unwrap(), Some(ObjectKind::Unknown));
    }
}
