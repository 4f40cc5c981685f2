//! Info records returned by `BPF_OBJ_GET_INFO_BY_FD`.
//!
//! Both records are decoded from the exact byte layout the kernel writes.
//! The kernel copies `min(capacity, native size)` bytes and reports how many
//! it wrote, so a decoder must accept short buffers: any trailing field the
//! kernel did not fill reads as zero.
//!
//! ```text
//! bpf_prog_info (40 bytes)          bpf_map_info (24 bytes)
//!  0  u32 type                       0  u32 type
//!  4  u32 id                         4  u32 id
//!  8  u8  tag[8]                     8  u32 key_size
//! 16  u32 jited_prog_len            12  u32 value_size
//! 20  u32 xlated_prog_len           16  u32 max_entries
//! 24  u64 jited_prog_insns          20  u32 map_flags
//! 32  u64 xlated_prog_insns
//! ```

use serde::{Deserialize, Serialize};

use crate::kinds::{MapType, ProgType};
use crate::object::InsnKind;
use crate::tag::{Tag, TAG_SIZE};

/// Capacity large enough for every record kind this crate knows.
pub const INFO_UNION_SIZE: usize = if ProgInfo::SIZE > MapInfo::SIZE {
    ProgInfo::SIZE
} else {
    MapInfo::SIZE
};

fn read_u32(buf: &[u8], off: usize) -> u32 {
    let mut raw = [0u8; 4];
    if off < buf.len() {
        let n = (buf.len() - off).min(4);
        raw[..n].copy_from_slice(&buf[off..off + n]);
    }
    u32::from_ne_bytes(raw)
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    if off < buf.len() {
        let n = (buf.len() - off).min(8);
        raw[..n].copy_from_slice(&buf[off..off + n]);
    }
    u64::from_ne_bytes(raw)
}

fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_ne_bytes());
}

fn write_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_ne_bytes());
}

/// Metadata snapshot of a loaded program.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgInfo {
    #[serde(rename = "type")]
    pub prog_type: ProgType,
    pub id: u32,
    pub tag: Tag,
    pub jited_prog_len: u32,
    pub xlated_prog_len: u32,
    /// User-space destination for the JIT image; zero means "lengths only".
    #[serde(skip)]
    pub jited_prog_insns: u64,
    #[serde(skip)]
    pub xlated_prog_insns: u64,
}

impl ProgInfo {
    pub const SIZE: usize = 40;

    const OFF_TYPE: usize = 0;
    const OFF_ID: usize = 4;
    const OFF_TAG: usize = 8;
    const OFF_JITED_LEN: usize = 16;
    const OFF_XLATED_LEN: usize = 20;
    pub const OFF_JITED_INSNS: usize = 24;
    pub const OFF_XLATED_INSNS: usize = 32;

    /// Decode from a possibly short record.
    pub fn from_bytes(buf: &[u8]) -> Self {
        let mut tag = [0u8; TAG_SIZE];
        if buf.len() > Self::OFF_TAG {
            let n = (buf.len() - Self::OFF_TAG).min(TAG_SIZE);
            tag[..n].copy_from_slice(&buf[Self::OFF_TAG..Self::OFF_TAG + n]);
        }
        Self {
            prog_type: ProgType(read_u32(buf, Self::OFF_TYPE)),
            id: read_u32(buf, Self::OFF_ID),
            tag: Tag::from_bytes(tag),
            jited_prog_len: read_u32(buf, Self::OFF_JITED_LEN),
            xlated_prog_len: read_u32(buf, Self::OFF_XLATED_LEN),
            jited_prog_insns: read_u64(buf, Self::OFF_JITED_INSNS),
            xlated_prog_insns: read_u64(buf, Self::OFF_XLATED_INSNS),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        write_u32(&mut buf, Self::OFF_TYPE, self.prog_type.0);
        write_u32(&mut buf, Self::OFF_ID, self.id);
        buf[Self::OFF_TAG..Self::OFF_TAG + TAG_SIZE].copy_from_slice(self.tag.as_bytes());
        write_u32(&mut buf, Self::OFF_JITED_LEN, self.jited_prog_len);
        write_u32(&mut buf, Self::OFF_XLATED_LEN, self.xlated_prog_len);
        write_u64(&mut buf, Self::OFF_JITED_INSNS, self.jited_prog_insns);
        write_u64(&mut buf, Self::OFF_XLATED_INSNS, self.xlated_prog_insns);
        buf
    }

    /// Reported length of the given instruction image.
    pub fn insn_len(&self, kind: InsnKind) -> u32 {
        match kind {
            InsnKind::Xlated => self.xlated_prog_len,
            InsnKind::Jited => self.jited_prog_len,
        }
    }

    /// Byte offsets of the (length, pointer) pair for an image.
    pub fn insn_field_offsets(kind: InsnKind) -> (usize, usize) {
        match kind {
            InsnKind::Xlated => (Self::OFF_XLATED_LEN, Self::OFF_XLATED_INSNS),
            InsnKind::Jited => (Self::OFF_JITED_LEN, Self::OFF_JITED_INSNS),
        }
    }
}

/// Metadata snapshot of a map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapInfo {
    #[serde(rename = "type")]
    pub map_type: MapType,
    pub id: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub map_flags: u32,
}

impl MapInfo {
    pub const SIZE: usize = 24;

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            map_type: MapType(read_u32(buf, 0)),
            id: read_u32(buf, 4),
            key_size: read_u32(buf, 8),
            value_size: read_u32(buf, 12),
            max_entries: read_u32(buf, 16),
            map_flags: read_u32(buf, 20),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        write_u32(&mut buf, 0, self.map_type.0);
        write_u32(&mut buf, 4, self.id);
        write_u32(&mut buf, 8, self.key_size);
        write_u32(&mut buf, 12, self.value_size);
        write_u32(&mut buf, 16, self.max_entries);
        write_u32(&mut buf, 20, self.map_flags);
        buf
    }

    pub fn key_size(&self) -> usize {
        self.key_size as usize
    }

    pub fn value_size(&self) -> usize {
        self.value_size as usize
    }
}
