use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use bpfscope_types::{
    InsnKind, MapInfo, MapType, Namespace, ObjectKind, ProgInfo, ProgType, Tag, UpdateMode,
};

use crate::error::{SysError, SysResult};
use crate::traits::{InsnBuffer, Kernel, RawHandle};

/// First handle number handed out, mirroring fds 0-2 being taken.
const FIRST_HANDLE: RawHandle = 3;

/// A failure injected into every matching call from the time it is added.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// `map_lookup` on this key fails, as if the entry vanished mid-walk.
    LookupFails { map: u32, key: Vec<u8>, errno: i32 },
    /// `next_id` starting from `after` fails.
    NextIdFails { ns: Namespace, after: u32, errno: i32 },
    /// `object_info` for this object fails.
    InfoFails { ns: Namespace, id: u32, errno: i32 },
    /// Instruction images grow by `by` bytes between a length probe and the
    /// sized fetch.
    InsnsGrow { prog: u32, by: u32 },
}

#[derive(Clone, Debug)]
struct ProgObject {
    prog_type: ProgType,
    tag: Tag,
    xlated: Vec<u8>,
    jited: Vec<u8>,
}

#[derive(Clone, Debug)]
struct MapObject {
    info: MapInfo,
    /// Values are stored at full buffer width, per-CPU replicas included.
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

#[derive(Debug)]
struct State {
    progs: BTreeMap<u32, ProgObject>,
    maps: BTreeMap<u32, MapObject>,
    next_prog_id: u32,
    next_map_id: u32,
    pins: HashMap<PathBuf, (Namespace, u32)>,
    handles: HashMap<RawHandle, (Namespace, u32)>,
    next_handle: RawHandle,
    faults: Vec<Fault>,
}

/// In-memory model of the kernel's BPF object tables.
///
/// Intended for tests. Ids are assigned from 1 in each namespace, handles
/// from 3. Every open handle is tracked so tests can assert that all of them
/// were released.
pub struct InMemoryKernel {
    state: RwLock<State>,
    cpus: usize,
    bpffs_root: Option<PathBuf>,
    record_handle_kinds: bool,
    prog_record_size: usize,
    map_record_size: usize,
}

impl InMemoryKernel {
    /// A kernel with 4 possible CPUs and a BPF filesystem at `/sys/fs/bpf`.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                progs: BTreeMap::new(),
                maps: BTreeMap::new(),
                next_prog_id: 1,
                next_map_id: 1,
                pins: HashMap::new(),
                handles: HashMap::new(),
                next_handle: FIRST_HANDLE,
                faults: Vec::new(),
            }),
            cpus: 4,
            bpffs_root: Some(PathBuf::from("/sys/fs/bpf")),
            record_handle_kinds: true,
            prog_record_size: ProgInfo::SIZE,
            map_record_size: MapInfo::SIZE,
        }
    }

    pub fn with_cpus(mut self, cpus: usize) -> Self {
        self.cpus = cpus;
        self
    }

    /// Mount point pins must live under; `None` means no BPF filesystem.
    pub fn with_bpffs(mut self, root: Option<PathBuf>) -> Self {
        self.bpffs_root = root;
        self
    }

    /// Stop reporting handle kinds, forcing callers onto record-size
    /// classification.
    pub fn without_handle_kinds(mut self) -> Self {
        self.record_handle_kinds = false;
        self
    }

    /// Pretend the kernel's native info records have these sizes.
    pub fn with_record_sizes(mut self, prog: usize, map: usize) -> Self {
        self.prog_record_size = prog;
        self.map_record_size = map;
        self
    }

    pub fn add_program(&self, prog_type: ProgType, tag: Tag, xlated: &[u8], jited: &[u8]) -> u32 {
        let mut state = self.state.write().expect("lock poisoned");
        let id = state.next_prog_id;
        state.next_prog_id += 1;
        state.progs.insert(
            id,
            ProgObject {
                prog_type,
                tag,
                xlated: xlated.to_vec(),
                jited: jited.to_vec(),
            },
        );
        id
    }

    /// Create a map. Array kinds are pre-populated with zeroed values for
    /// every index below `max_entries`.
    pub fn add_map(
        &self,
        map_type: MapType,
        key_size: u32,
        value_size: u32,
        max_entries: u32,
        map_flags: u32,
    ) -> u32 {
        let mut state = self.state.write().expect("lock poisoned");
        let id = state.next_map_id;
        state.next_map_id += 1;
        let info = MapInfo {
            map_type,
            id,
            key_size,
            value_size,
            max_entries,
            map_flags,
        };
        let mut entries = BTreeMap::new();
        if map_type.is_array() && key_size == 4 {
            let width = self.value_width(&info);
            for index in 0..max_entries {
                entries.insert(index.to_le_bytes().to_vec(), vec![0u8; width]);
            }
        }
        state.maps.insert(id, MapObject { info, entries });
        id
    }

    pub fn remove_program(&self, id: u32) -> bool {
        let mut state = self.state.write().expect("lock poisoned");
        state.progs.remove(&id).is_some()
    }

    pub fn remove_map(&self, id: u32) -> bool {
        let mut state = self.state.write().expect("lock poisoned");
        state.maps.remove(&id).is_some()
    }

    pub fn inject(&self, fault: Fault) {
        self.state.write().expect("lock poisoned").faults.push(fault);
    }

    /// Number of handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.state.read().expect("lock poisoned").handles.len()
    }

    /// Whether something is pinned at `path`.
    pub fn is_pinned(&self, path: &Path) -> bool {
        self.state.read().expect("lock poisoned").pins.contains_key(path)
    }

    /// Current contents of a map, sorted by key.
    pub fn entries(&self, id: u32) -> Vec<(Vec<u8>, Vec<u8>)> {
        let state = self.state.read().expect("lock poisoned");
        state
            .maps
            .get(&id)
            .map(|m| m.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    fn value_width(&self, info: &MapInfo) -> usize {
        if info.map_type.is_per_cpu() {
            info.value_size() * self.cpus
        } else {
            info.value_size()
        }
    }

    fn resolve(state: &State, handle: RawHandle) -> SysResult<(Namespace, u32)> {
        state
            .handles
            .get(&handle)
            .copied()
            .ok_or(SysError::Errno(libc::EBADF))
    }

    fn open(state: &mut State, ns: Namespace, id: u32) -> RawHandle {
        let raw = state.next_handle;
        state.next_handle += 1;
        state.handles.insert(raw, (ns, id));
        raw
    }

    fn map_of<'s>(state: &'s State, handle: RawHandle) -> SysResult<(u32, &'s MapObject)> {
        match Self::resolve(state, handle)? {
            (Namespace::Map, id) => state
                .maps
                .get(&id)
                .map(|m| (id, m))
                .ok_or(SysError::Errno(libc::EBADF)),
            (Namespace::Program, _) => Err(SysError::Errno(libc::EINVAL)),
        }
    }
}

impl Default for InMemoryKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel for InMemoryKernel {
    fn next_id(&self, ns: Namespace, start: u32) -> SysResult<u32> {
        let state = self.state.read().expect("lock poisoned");
        for fault in &state.faults {
            if let Fault::NextIdFails { ns: f_ns, after, errno } = fault {
                if *f_ns == ns && *after == start {
                    return Err(SysError::Errno(*errno));
                }
            }
        }
        let range = (Bound::Excluded(start), Bound::Unbounded);
        let next = match ns {
            Namespace::Program => state.progs.range(range).next().map(|(id, _)| *id),
            Namespace::Map => state.maps.range(range).next().map(|(id, _)| *id),
        };
        next.ok_or(SysError::Errno(libc::ENOENT))
    }

    fn open_by_id(&self, ns: Namespace, id: u32) -> SysResult<RawHandle> {
        let mut state = self.state.write().expect("lock poisoned");
        let exists = match ns {
            Namespace::Program => state.progs.contains_key(&id),
            Namespace::Map => state.maps.contains_key(&id),
        };
        if !exists {
            return Err(SysError::Errno(libc::ENOENT));
        }
        Ok(Self::open(&mut state, ns, id))
    }

    fn open_pinned(&self, path: &Path) -> SysResult<RawHandle> {
        let mut state = self.state.write().expect("lock poisoned");
        let (ns, id) = state
            .pins
            .get(path)
            .copied()
            .ok_or(SysError::Errno(libc::ENOENT))?;
        Ok(Self::open(&mut state, ns, id))
    }

    fn pin(&self, handle: RawHandle, path: &Path) -> SysResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let target = Self::resolve(&state, handle)?;
        let root = self.bpffs_root.as_ref().ok_or(SysError::Errno(libc::ENOENT))?;
        if !path.starts_with(root) || path == root {
            return Err(SysError::Errno(libc::EPERM));
        }
        if state.pins.contains_key(path) {
            return Err(SysError::Errno(libc::EEXIST));
        }
        state.pins.insert(path.to_path_buf(), target);
        Ok(())
    }

    fn close(&self, handle: RawHandle) {
        self.state
            .write()
            .expect("lock poisoned")
            .handles
            .remove(&handle);
    }

    fn handle_kind(&self, handle: RawHandle) -> SysResult<Option<ObjectKind>> {
        let state = self.state.read().expect("lock poisoned");
        let (ns, _) = Self::resolve(&state, handle)?;
        Ok(self.record_handle_kinds.then(|| ns.kind()))
    }

    fn object_info(
        &self,
        handle: RawHandle,
        info: &mut [u8],
        insns: Option<InsnBuffer<'_>>,
    ) -> SysResult<usize> {
        let state = self.state.read().expect("lock poisoned");
        let (ns, id) = Self::resolve(&state, handle)?;
        for fault in &state.faults {
            if let Fault::InfoFails { ns: f_ns, id: f_id, errno } = fault {
                if *f_ns == ns && *f_id == id {
                    return Err(SysError::Errno(*errno));
                }
            }
        }

        let (mut record, native) = match ns {
            Namespace::Program => {
                let prog = state.progs.get(&id).ok_or(SysError::Errno(libc::EBADF))?;
                let grow = state
                    .faults
                    .iter()
                    .find_map(|f| match f {
                        Fault::InsnsGrow { prog, by } if *prog == id => Some(*by),
                        _ => None,
                    })
                    .unwrap_or(0);
                let mut rec = ProgInfo {
                    prog_type: prog.prog_type,
                    id,
                    tag: prog.tag,
                    jited_prog_len: prog.jited.len() as u32,
                    xlated_prog_len: prog.xlated.len() as u32,
                    jited_prog_insns: 0,
                    xlated_prog_insns: 0,
                };
                if let Some(InsnBuffer { kind, buf }) = insns {
                    let image = match kind {
                        InsnKind::Xlated => &prog.xlated,
                        InsnKind::Jited => &prog.jited,
                    };
                    let n = image.len().min(buf.len());
                    buf[..n].copy_from_slice(&image[..n]);
                    match kind {
                        InsnKind::Xlated => rec.xlated_prog_len += grow,
                        InsnKind::Jited => rec.jited_prog_len += grow,
                    }
                }
                (rec.to_bytes().to_vec(), self.prog_record_size)
            }
            Namespace::Map => {
                let map = state.maps.get(&id).ok_or(SysError::Errno(libc::EBADF))?;
                (map.info.to_bytes().to_vec(), self.map_record_size)
            }
        };

        record.resize(native, 0);
        let used = native.min(info.len());
        info[..used].copy_from_slice(&record[..used]);
        Ok(used)
    }

    fn map_lookup(&self, handle: RawHandle, key: &[u8], value: &mut [u8]) -> SysResult<()> {
        let state = self.state.read().expect("lock poisoned");
        let (id, map) = Self::map_of(&state, handle)?;
        for fault in &state.faults {
            if let Fault::LookupFails { map: f_map, key: f_key, errno } = fault {
                if *f_map == id && f_key.as_slice() == key {
                    return Err(SysError::Errno(*errno));
                }
            }
        }
        if key.len() != map.info.key_size() || value.len() != self.value_width(&map.info) {
            return Err(SysError::Errno(libc::EINVAL));
        }
        let stored = map.entries.get(key).ok_or(SysError::Errno(libc::ENOENT))?;
        value.copy_from_slice(stored);
        Ok(())
    }

    fn map_update(
        &self,
        handle: RawHandle,
        key: &[u8],
        value: &[u8],
        mode: UpdateMode,
    ) -> SysResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let (id, map) = Self::map_of(&state, handle)?;
        if key.len() != map.info.key_size() || value.len() != self.value_width(&map.info) {
            return Err(SysError::Errno(libc::EINVAL));
        }
        let exists = map.entries.contains_key(key);
        if map.info.map_type.is_array() && !exists {
            return Err(SysError::Errno(libc::E2BIG));
        }
        match mode {
            UpdateMode::NoExist if exists => return Err(SysError::Errno(libc::EEXIST)),
            UpdateMode::Exist if !exists => return Err(SysError::Errno(libc::ENOENT)),
            _ => {}
        }
        if !exists && map.entries.len() >= map.info.max_entries as usize {
            return Err(SysError::Errno(libc::E2BIG));
        }
        if let Some(map) = state.maps.get_mut(&id) {
            map.entries.insert(key.to_vec(), value.to_vec());
        }
        Ok(())
    }

    fn map_delete(&self, handle: RawHandle, key: &[u8]) -> SysResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let (id, map) = Self::map_of(&state, handle)?;
        if map.info.map_type.is_array() {
            return Err(SysError::Errno(libc::EINVAL));
        }
        if key.len() != map.info.key_size() {
            return Err(SysError::Errno(libc::EINVAL));
        }
        let removed = state
            .maps
            .get_mut(&id)
            .and_then(|m| m.entries.remove(key))
            .is_some();
        if removed {
            Ok(())
        } else {
            Err(SysError::Errno(libc::ENOENT))
        }
    }

    fn map_next_key(
        &self,
        handle: RawHandle,
        key: Option<&[u8]>,
        next: &mut [u8],
    ) -> SysResult<()> {
        let state = self.state.read().expect("lock poisoned");
        let (_, map) = Self::map_of(&state, handle)?;
        if next.len() != map.info.key_size() {
            return Err(SysError::Errno(libc::EINVAL));
        }
        let found = match key {
            Some(prev) if map.entries.contains_key(prev) => map
                .entries
                .range::<[u8], _>((Bound::Excluded(prev), Bound::Unbounded))
                .next(),
            _ => map.entries.iter().next(),
        };
        let (k, _) = found.ok_or(SysError::Errno(libc::ENOENT))?;
        next.copy_from_slice(k);
        Ok(())
    }

    fn possible_cpus(&self) -> SysResult<usize> {
        Ok(self.cpus)
    }
}

impl std::fmt::Debug for InMemoryKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("InMemoryKernel")
            .field("programs", &state.progs.len())
            .field("maps", &state.maps.len())
            .field("open_handles", &state.handles.len())
            .field("cpus", &self.cpus)
            .finish()
    }
}
