use std::path::Path;
use std::sync::OnceLock;

use crate::error::{SysError, SysResult};

static POSSIBLE_CPUS: OnceLock<usize> = OnceLock::new();

/// Count the CPUs in a kernel CPU list such as `0-3,5,7-8`.
///
/// Returns `None` for empty or malformed lists.
pub fn parse_cpu_list(list: &str) -> Option<usize> {
    let list = list.trim();
    if list.is_empty() {
        return None;
    }
    let mut count = 0usize;
    for part in list.split(',') {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: usize = lo.trim().parse().ok()?;
                let hi: usize = hi.trim().parse().ok()?;
                if hi < lo {
                    return None;
                }
                count = count.checked_add(hi.checked_sub(lo)?.checked_add(1)?)?;
            }
            None => {
                part.trim().parse::<usize>().ok()?;
                count = count.checked_add(1)?;
            }
        }
    }
    Some(count)
}

/// Possible CPU count, read from `path` on first use and then fixed for the
/// life of the process.
pub fn possible_cpus_from(path: &Path) -> SysResult<usize> {
    if let Some(n) = POSSIBLE_CPUS.get() {
        return Ok(*n);
    }
    let text = std::fs::read_to_string(path).map_err(|e| SysError::Host {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let n = match parse_cpu_list(&text) {
        Some(n) if n > 0 => n,
        _ => {
            return Err(SysError::Host {
                path: path.to_path_buf(),
                reason: format!("can't parse possible CPU list {:?}", text.trim()),
            })
        }
    };
    Ok(*POSSIBLE_CPUS.get_or_init(|| n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_range() {
        assert_eq!(parse_cpu_list("0-3\n"), Some(4));
    }

    #[test]
    fn mixed_list() {
        assert_eq!(parse_cpu_list("0-3,5,7-8"), Some(7));
        assert_eq!(parse_cpu_list("0"), Some(1));
    }

    #[test]
    fn malformed_lists() {
        assert_eq!(parse_cpu_list(""), None);
        assert_eq!(parse_cpu_list("a-b"), None);
        assert_eq!(parse_cpu_list("3-1"), None);
        assert_eq!(parse_cpu_list("0,,1"), None);
    }

    #[test]
    fn overflowing_count_is_malformed() {
        assert_eq!(parse_cpu_list("0-18446744073709551615"), None);
        assert_eq!(parse_cpu_list("1-18446744073709551615,0"), None);
    }

    proptest! {
        #[test]
        fn range_count_is_width(lo in 0usize..512, width in 1usize..512) {
            let list = format!("{}-{}", lo, lo + width - 1);
            prop_assert_eq!(parse_cpu_list(&list), Some(width));
        }
    }
}
