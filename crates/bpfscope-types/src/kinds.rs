//! Kind codes for programs and maps.
//!
//! The kernel's numbering is an open set that grows with every release, so
//! both types wrap the raw code instead of enumerating it. Names come from an
//! explicit mapping; codes outside it render as `type:<code>`.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw `bpf_prog_type` code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgType(pub u32);

impl ProgType {
    pub const UNSPEC: Self = Self(0);
    pub const SOCKET_FILTER: Self = Self(1);
    pub const KPROBE: Self = Self(2);
    pub const SCHED_CLS: Self = Self(3);
    pub const SCHED_ACT: Self = Self(4);
    pub const TRACEPOINT: Self = Self(5);
    pub const XDP: Self = Self(6);
    pub const PERF_EVENT: Self = Self(7);
    pub const CGROUP_SKB: Self = Self(8);
    pub const CGROUP_SOCK: Self = Self(9);
    pub const LWT_IN: Self = Self(10);
    pub const LWT_OUT: Self = Self(11);
    pub const LWT_XMIT: Self = Self(12);

    /// The known display name, if any.
    pub fn known_name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::UNSPEC => "unspec",
            Self::SOCKET_FILTER => "socket_filter",
            Self::KPROBE => "kprobe",
            Self::SCHED_CLS => "sched_cls",
            Self::SCHED_ACT => "sched_act",
            Self::TRACEPOINT => "tracepoint",
            Self::XDP => "xdp",
            Self::PERF_EVENT => "perf_event",
            Self::CGROUP_SKB => "cgroup_skb",
            Self::CGROUP_SOCK => "cgroup_sock",
            Self::LWT_IN => "lwt_in",
            Self::LWT_OUT => "lwt_out",
            Self::LWT_XMIT => "lwt_xmit",
            _ => return None,
        };
        Some(name)
    }

    pub fn name(&self) -> Cow<'static, str> {
        match self.known_name() {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("type:{}", self.0)),
        }
    }
}

impl fmt::Display for ProgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Raw `bpf_map_type` code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapType(pub u32);

impl MapType {
    pub const UNSPEC: Self = Self(0);
    pub const HASH: Self = Self(1);
    pub const ARRAY: Self = Self(2);
    pub const PROG_ARRAY: Self = Self(3);
    pub const PERF_EVENT_ARRAY: Self = Self(4);
    pub const PERCPU_HASH: Self = Self(5);
    pub const PERCPU_ARRAY: Self = Self(6);
    pub const STACK_TRACE: Self = Self(7);
    pub const CGROUP_ARRAY: Self = Self(8);
    pub const LRU_HASH: Self = Self(9);
    pub const LRU_PERCPU_HASH: Self = Self(10);
    pub const LPM_TRIE: Self = Self(11);
    pub const ARRAY_OF_MAPS: Self = Self(12);
    pub const HASH_OF_MAPS: Self = Self(13);

    pub fn known_name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::UNSPEC => "unspec",
            Self::HASH => "hash",
            Self::ARRAY => "array",
            Self::PROG_ARRAY => "prog_array",
            Self::PERF_EVENT_ARRAY => "perf_event_array",
            Self::PERCPU_HASH => "percpu_hash",
            Self::PERCPU_ARRAY => "percpu_array",
            Self::STACK_TRACE => "stack_trace",
            Self::CGROUP_ARRAY => "cgroup_array",
            Self::LRU_HASH => "lru_hash",
            Self::LRU_PERCPU_HASH => "lru_percpu_hash",
            Self::LPM_TRIE => "lpm_trie",
            Self::ARRAY_OF_MAPS => "array_of_maps",
            Self::HASH_OF_MAPS => "hash_of_maps",
            _ => return None,
        };
        Some(name)
    }

    pub fn name(&self) -> Cow<'static, str> {
        match self.known_name() {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("type:{}", self.0)),
        }
    }

    /// Whether values are stored once per possible CPU.
    ///
    /// This is a closed set: only the three kinds below replicate values.
    pub fn is_per_cpu(&self) -> bool {
        matches!(
            *self,
            Self::PERCPU_HASH | Self::PERCPU_ARRAY | Self::LRU_PERCPU_HASH
        )
    }

    /// Whether every index below `max_entries` always exists.
    pub fn is_array(&self) -> bool {
        matches!(
            *self,
            Self::ARRAY
                | Self::PERCPU_ARRAY
                | Self::PROG_ARRAY
                | Self::PERF_EVENT_ARRAY
                | Self::CGROUP_ARRAY
                | Self::ARRAY_OF_MAPS
        )
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}
