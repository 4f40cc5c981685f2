//! Printing outcomes as text or JSON.

use std::fmt::Write;

use bpfscope_types::{MapInfo, ProgInfo};
use serde_json::{json, Value};

use crate::codec::format_hex;
use crate::layout::{format_entry, is_compact, ValueLayout};
use crate::ops::{MapDump, Outcome};

/// Text for stdout. Empty for outcomes that only report a status.
pub fn render_text(outcome: &Outcome) -> String {
    let mut out = String::new();
    match outcome {
        Outcome::Programs(progs) => {
            for prog in progs {
                let _ = writeln!(out, "{}", prog_line(prog));
            }
        }
        Outcome::Maps(maps) => {
            for map in maps {
                let _ = writeln!(out, "{}", map_line(map));
            }
        }
        Outcome::Dump(dump) => render_dump(&mut out, dump),
        Outcome::Lookup {
            info,
            layout,
            key,
            value,
        } => match value {
            Some(value) => {
                let _ = writeln!(out, "{}", format_entry(info, layout, key, value));
            }
            None => {
                let _ = writeln!(out, "key:\n{}\n\nNot found", format_hex(key, " "));
            }
        },
        Outcome::NextKey { key, next_key, .. } => {
            match key {
                Some(key) => {
                    let _ = writeln!(out, "key:\n{}", format_hex(key, " "));
                }
                None => out.push_str("key: None\n"),
            }
            let _ = writeln!(out, "next key:\n{}", format_hex(next_key, " "));
        }
        Outcome::InsnsWritten { .. }
        | Outcome::NoInsns { .. }
        | Outcome::Updated
        | Outcome::Deleted
        | Outcome::Pinned { .. } => {}
    }
    out
}

/// One-line summary for outcomes that produce no listing.
pub fn status_line(outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::InsnsWritten { path, kind, bytes } => Some(format!(
            "wrote {bytes} bytes of {kind} instructions to {}",
            path.display()
        )),
        Outcome::NoInsns { .. } => Some("no instructions returned".to_string()),
        Outcome::Updated => Some("updated".to_string()),
        Outcome::Deleted => Some("deleted".to_string()),
        Outcome::Pinned { path } => Some(format!("pinned at {}", path.display())),
        _ => None,
    }
}

pub fn prog_line(prog: &ProgInfo) -> String {
    format!(
        "   {}: {}  tag: {}  jited: {}B  xlated: {}B  ",
        prog.id, prog.prog_type, prog.tag, prog.jited_prog_len, prog.xlated_prog_len
    )
}

pub fn map_line(map: &MapInfo) -> String {
    format!(
        "   {}: {}  key:{}B  value:{}B  max_entries:{}  flags:0x{:x}",
        map.id, map.map_type, map.key_size, map.value_size, map.max_entries, map.map_flags
    )
}

fn render_dump(out: &mut String, dump: &MapDump) {
    let spacer = if !dump.layout.is_replicated() && is_compact(&dump.info) {
        "\n"
    } else {
        "\n\n"
    };
    for (key, value) in &dump.entries {
        out.push_str(&format_entry(&dump.info, &dump.layout, key, value));
        out.push_str(spacer);
    }
    let n = dump.entries.len();
    let _ = writeln!(out, "Found {n} element{}", if n == 1 { "" } else { "s" });
}

/// The same outcome as a JSON document.
pub fn render_json(outcome: &Outcome) -> Value {
    match outcome {
        Outcome::Programs(progs) => Value::Array(progs.iter().map(prog_json).collect()),
        Outcome::Maps(maps) => Value::Array(maps.iter().map(map_json).collect()),
        Outcome::Dump(dump) => json!({
            "map": map_json(&dump.info),
            "entries": dump
                .entries
                .iter()
                .map(|(k, v)| entry_json(&dump.layout, k, v))
                .collect::<Vec<_>>(),
            "failures": dump.failures.iter().map(hex::encode).collect::<Vec<_>>(),
            "count": dump.entries.len(),
        }),
        Outcome::Lookup {
            layout, key, value, ..
        } => match value {
            Some(value) => entry_json(layout, key, value),
            None => json!({ "key": hex::encode(key), "found": false }),
        },
        Outcome::NextKey { key, next_key, .. } => json!({
            "key": key.as_ref().map(hex::encode),
            "next_key": hex::encode(next_key),
        }),
        Outcome::InsnsWritten { path, kind, bytes } => json!({
            "status": "written",
            "path": path,
            "kind": kind,
            "bytes": bytes,
        }),
        Outcome::NoInsns { kind } => json!({ "status": "empty", "kind": kind }),
        Outcome::Updated => json!({ "status": "updated" }),
        Outcome::Deleted => json!({ "status": "deleted" }),
        Outcome::Pinned { path } => json!({ "status": "pinned", "path": path }),
    }
}

fn prog_json(prog: &ProgInfo) -> Value {
    json!({
        "id": prog.id,
        "type": prog.prog_type,
        "type_name": prog.prog_type.name(),
        "tag": prog.tag,
        "jited_len": prog.jited_prog_len,
        "xlated_len": prog.xlated_prog_len,
    })
}

fn map_json(map: &MapInfo) -> Value {
    json!({
        "id": map.id,
        "type": map.map_type,
        "type_name": map.map_type.name(),
        "key_size": map.key_size,
        "value_size": map.value_size,
        "max_entries": map.max_entries,
        "flags": map.map_flags,
    })
}

fn entry_json(layout: &ValueLayout, key: &[u8], value: &[u8]) -> Value {
    if layout.is_replicated() {
        json!({
            "key": hex::encode(key),
            "values": layout.chunks(value).map(hex::encode).collect::<Vec<_>>(),
        })
    } else {
        json!({ "key": hex::encode(key), "value": hex::encode(value) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpfscope_types::{InsnKind, MapType, ProgType, Tag};

    fn hash_info(key_size: u32, value_size: u32) -> MapInfo {
        MapInfo {
            map_type: MapType::HASH,
            id: 5,
            key_size,
            value_size,
            max_entries: 64,
            map_flags: 0x10,
        }
    }

    #[test]
    fn show_lines() {
        let prog = ProgInfo {
            prog_type: ProgType::XDP,
            id: 12,
            tag: Tag::from_bytes([0xf0, 0x05, 0x5c, 0x08, 0x99, 0x3f, 0xc5, 0xc3]),
            jited_prog_len: 120,
            xlated_prog_len: 96,
            ..ProgInfo::default()
        };
        assert_eq!(
            prog_line(&prog),
            "   12: xdp  tag: f0:05:5c:08:99:3f:c5:c3  jited: 120B  xlated: 96B  "
        );
        assert_eq!(
            map_line(&hash_info(4, 8)),
            "   5: hash  key:4B  value:8B  max_entries:64  flags:0x10"
        );
        let unknown = ProgInfo {
            prog_type: ProgType(99),
            ..ProgInfo::default()
        };
        assert!(prog_line(&unknown).contains(" type:99  "));
    }

    #[test]
    fn compact_dump() {
        let dump = MapDump {
            info: hash_info(1, 1),
            layout: ValueLayout::single(1),
            entries: vec![(vec![1], vec![2]), (vec![3], vec![4])],
            failures: vec![],
        };
        assert_eq!(
            render_text(&Outcome::Dump(dump)),
            "key: 01  value: 02\nkey: 03  value: 04\nFound 2 elements\n"
        );
    }

    #[test]
    fn wide_dump_separates_entries() {
        let dump = MapDump {
            info: hash_info(20, 1),
            layout: ValueLayout::single(1),
            entries: vec![(vec![0; 20], vec![7])],
            failures: vec![vec![1; 20]],
        };
        let text = render_text(&Outcome::Dump(dump));
        assert!(text.ends_with("\nvalue: 07\n\nFound 1 element\n"));
    }

    #[test]
    fn lookup_miss_text() {
        let outcome = Outcome::Lookup {
            info: hash_info(2, 2),
            layout: ValueLayout::single(2),
            key: vec![0xa, 0xb],
            value: None,
        };
        assert_eq!(render_text(&outcome), "key:\n0a 0b\n\nNot found\n");
        assert_eq!(render_json(&outcome), json!({ "key": "0a0b", "found": false }));
    }

    #[test]
    fn next_key_text() {
        let first = Outcome::NextKey {
            info: hash_info(1, 1),
            key: None,
            next_key: vec![1],
        };
        assert_eq!(render_text(&first), "key: None\nnext key:\n01\n");
        let after = Outcome::NextKey {
            info: hash_info(1, 1),
            key: Some(vec![1]),
            next_key: vec![2],
        };
        assert_eq!(render_text(&after), "key:\n01\nnext key:\n02\n");
    }

    #[test]
    fn per_cpu_json_lists_replicas() {
        let outcome = Outcome::Lookup {
            info: MapInfo {
                map_type: MapType::PERCPU_HASH,
                ..hash_info(1, 2)
            },
            layout: ValueLayout::replicated(2, 2),
            key: vec![1],
            value: Some(vec![1, 2, 3, 4]),
        };
        assert_eq!(
            render_json(&outcome),
            json!({ "key": "01", "values": ["0102", "0304"] })
        );
    }

    #[test]
    fn status_outcomes() {
        assert!(render_text(&Outcome::Updated).is_empty());
        assert_eq!(status_line(&Outcome::Deleted).as_deref(), Some("deleted"));
        assert_eq!(
            status_line(&Outcome::NoInsns { kind: InsnKind::Jited }).as_deref(),
            Some("no instructions returned")
        );
        assert_eq!(status_line(&Outcome::Maps(vec![])), None);
    }
}
