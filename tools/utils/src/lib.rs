//! 命令行工具依赖的通用组件.

use std::io;
use std::ops::Range;

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: io::Write>(mut w: W) -> io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 解析切片列表, 例如 `"90..110"`, `"100..200:3"` 或 `"12,40,41"`.
///
/// 各部分以逗号分隔; `a..b` 为左闭右开区间, 可用 `:step` 指定步长.
pub fn parse_slices(s: &str) -> Result<Vec<usize>, String> {
    let mut ans = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (range, step) = match part.split_once(':') {
            Some((r, st)) => (r, parse_index(st)?),
            None => (part, 1),
        };
        if step == 0 {
            return Err(format!("zero step in `{part}`"));
        }
        match range.split_once("..") {
            Some((a, b)) => {
                let Range { start, end } = parse_index(a)?..parse_index(b)?;
                ans.extend((start..end).step_by(step));
            }
            None => ans.push(parse_index(range)?),
        }
    }
    Ok(ans)
}

#[inline]
fn parse_index(s: &str) -> Result<usize, String> {
    s.trim()
        .parse()
        .map_err(|e| format!("invalid slice index `{s}`: {e}"))
}
