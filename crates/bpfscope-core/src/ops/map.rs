use bpfscope_sys::{Handle, Kernel};
use bpfscope_types::{MapInfo, Namespace, UpdateMode};
use tracing::{debug, warn};

use crate::codec::format_hex;
use crate::entry::{parse_entry, EntrySlots};
use crate::error::{OpError, OpResult};
use crate::info::map_info;
use crate::iter::{IdIter, KeyIter};
use crate::layout::{alloc_buffer, ValueLayout};
use crate::ops::{MapDump, Outcome};
use crate::reference::ObjectRef;
use crate::resolve::Resolver;

/// An open map with its metadata and value layout.
struct OpenMap<'k> {
    handle: Handle<'k>,
    info: MapInfo,
    layout: ValueLayout,
}

impl<'k> OpenMap<'k> {
    fn open(kernel: &'k dyn Kernel, reference: &ObjectRef) -> OpResult<Self> {
        let handle = Resolver::new(kernel).resolve_as(reference, Namespace::Map)?;
        let info = map_info(&handle).map_err(|e| OpError::kernel("get map info", e))?;
        let layout =
            ValueLayout::for_map(&info, kernel).map_err(|e| OpError::kernel("count possible CPUs", e))?;
        debug!(%reference, map_type = %info.map_type, value_bytes = layout.buffer_size(), "opened map");
        Ok(Self {
            handle,
            info,
            layout,
        })
    }

    fn key_buffer(&self) -> OpResult<Vec<u8>> {
        alloc_buffer(self.info.key_size(), "key")
    }

    fn value_buffer(&self) -> OpResult<Vec<u8>> {
        alloc_buffer(self.layout.buffer_size(), "value")
    }

    /// Parse a key-only entry specification.
    fn parse_key(&self, tokens: &[String]) -> OpResult<Vec<u8>> {
        let mut key = self.key_buffer()?;
        parse_entry(tokens, EntrySlots::key(&mut key))?;
        Ok(key)
    }
}

/// Info for one map, or for every map when `reference` is `None`.
pub fn show_maps(kernel: &dyn Kernel, reference: Option<&ObjectRef>) -> OpResult<Vec<MapInfo>> {
    if let Some(reference) = reference {
        let handle = Resolver::new(kernel).resolve_as(reference, Namespace::Map)?;
        let info = map_info(&handle).map_err(|e| OpError::kernel("get map info", e))?;
        return Ok(vec![info]);
    }

    let mut maps = Vec::new();
    for id in IdIter::new(kernel, Namespace::Map) {
        let id = id.map_err(|e| OpError::kernel("get next map", e))?;
        let handle =
            Handle::by_id(kernel, Namespace::Map, id).map_err(|e| OpError::kernel("get map by id", e))?;
        maps.push(map_info(&handle).map_err(|e| OpError::kernel("get map info", e))?);
    }
    Ok(maps)
}

/// Read every entry. A key whose value can't be read is recorded as a
/// failure and the walk moves on.
pub fn dump_map(kernel: &dyn Kernel, reference: &ObjectRef) -> OpResult<MapDump> {
    let map = OpenMap::open(kernel, reference)?;
    let mut value = map.value_buffer()?;
    let mut entries = Vec::new();
    let mut failures = Vec::new();

    for key in KeyIter::new(&map.handle, map.info.key_size()) {
        let key = key.map_err(|e| OpError::kernel("get next key", e))?;
        match map.handle.lookup(&key, &mut value) {
            Ok(()) => entries.push((key, value.clone())),
            Err(e) => {
                warn!(error = %e, "can't lookup element with key: {}", format_hex(&key, " "));
                failures.push(key);
            }
        }
    }

    debug!(%reference, elements = entries.len(), failures = failures.len(), "dumped map");
    Ok(MapDump {
        info: map.info,
        layout: map.layout,
        entries,
        failures,
    })
}

/// Insert or replace one entry. Per-CPU maps take a value for every CPU.
pub fn update(kernel: &dyn Kernel, reference: &ObjectRef, tokens: &[String]) -> OpResult<()> {
    let map = OpenMap::open(kernel, reference)?;
    let mut key = map.key_buffer()?;
    let mut value = map.value_buffer()?;
    let mut mode = UpdateMode::default();
    parse_entry(tokens, EntrySlots::update(&mut key, &mut value, &mut mode))?;

    map.handle
        .update(&key, &value, mode)
        .map_err(|source| OpError::UpdateRejected { source })?;
    debug!(%reference, %mode, "updated entry");
    Ok(())
}

/// Read one entry. An absent key is a result, not an error.
pub fn lookup(kernel: &dyn Kernel, reference: &ObjectRef, tokens: &[String]) -> OpResult<Outcome> {
    let map = OpenMap::open(kernel, reference)?;
    let key = map.parse_key(tokens)?;
    let mut value = map.value_buffer()?;

    let value = match map.handle.lookup(&key, &mut value) {
        Ok(()) => Some(value),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(OpError::kernel("lookup", e)),
    };
    Ok(Outcome::Lookup {
        info: map.info,
        layout: map.layout,
        key,
        value,
    })
}

/// The key after the given one, or the first key when none is given.
pub fn get_next(kernel: &dyn Kernel, reference: &ObjectRef, tokens: &[String]) -> OpResult<Outcome> {
    let map = OpenMap::open(kernel, reference)?;
    let key = if tokens.is_empty() {
        None
    } else {
        Some(map.parse_key(tokens)?)
    };

    let mut next = map.key_buffer()?;
    map.handle
        .next_key(key.as_deref(), &mut next)
        .map_err(|e| OpError::kernel("get next key", e))?;
    Ok(Outcome::NextKey {
        info: map.info,
        key,
        next_key: next,
    })
}

pub fn delete(kernel: &dyn Kernel, reference: &ObjectRef, tokens: &[String]) -> OpResult<()> {
    let map = OpenMap::open(kernel, reference)?;
    let key = map.parse_key(tokens)?;
    map.handle
        .delete(&key)
        .map_err(|e| OpError::kernel("delete", e))?;
    debug!(%reference, "deleted entry");
    Ok(())
}
