//! 运行结果.

use seg_snap::SnapshotOutput;
use std::io::{self, Write};

/// 将生成的文件写进 `w` 中. 主要结果排在最前.
fn describe_into<W: Write>(out: &SnapshotOutput, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    let primary = out.primary();
    writeln!(w, "Snapshot: {}", primary.display())?;
    for p in out.files().into_iter().filter(|&p| p != primary) {
        writeln!(w, "{S4}{}", p.display())?;
    }
    Ok(())
}

/// 打印生成的文件.
pub fn print(out: &SnapshotOutput) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    utils::sep_to(&mut lock)?;
    describe_into(out, &mut lock)?;
    utils::sep_to(&mut lock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let out = SnapshotOutput {
            overlay: "/tmp/s.jpg".into(),
            background: Some("/tmp/s_orig.jpg".into()),
            fusion: Some("/tmp/s_fusion.jpg".into()),
            animation: None,
        };
        let mut buf = Vec::new();
        describe_into(&out, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Snapshot: /tmp/s_fusion.jpg");
        assert_eq!(lines.len(), 3);
    }
}
