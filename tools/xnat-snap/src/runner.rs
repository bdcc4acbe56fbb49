//! 程序运行函数.

use crate::SnapArgs;
use anyhow::{anyhow, bail, Context, Result};
use seg_snap::prelude::*;
use seg_snap::xnat::{BackgroundScan, LocateOptions};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use utils::loader;

/// `xnat` 子命令的参数.
pub struct XnatJob {
    pub experiment: String,
    pub config: Option<PathBuf>,
    pub resource: String,
    pub cache: bool,
    pub dest: Option<PathBuf>,
    pub reg_to_native: bool,
    pub t1_sequence: String,
    pub t2_sequence: String,
    pub t2: bool,
}

/// 拆分 `S=90..110` 形式的逐方向参数. 无 `=` 时返回 `None`.
fn split_axis(s: &str) -> Result<Option<(Axis, &str)>> {
    match s.split_once('=') {
        None => Ok(None),
        Some((a, rest)) => {
            let mut chars = a.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Some((Axis::from_char(c)?, rest))),
                _ => bail!("expected a single axis letter before `=` in `{s}`"),
            }
        }
    }
}

fn slice_selection(args: &[String]) -> Result<SliceSelection> {
    match args {
        [] => Ok(SliceSelection::Auto),
        [one] if !one.contains('=') => Ok(SliceSelection::Same(utils::parse_slices(one).map_err(|e| anyhow!(e))?)),
        _ => {
            let mut map = HashMap::new();
            for s in args {
                let (axis, list) = split_axis(s)?.with_context(|| format!("`{s}` does not name an axis"))?;
                map.insert(axis, utils::parse_slices(list).map_err(|e| anyhow!(e))?);
            }
            Ok(SliceSelection::PerAxis(map))
        }
    }
}

fn row_sizes(args: &[String]) -> Result<RowSizes> {
    match args {
        [] => Ok(RowSizes::Default),
        [one] if !one.contains('=') => Ok(RowSizes::Uniform(one.trim().parse::<usize>()?)),
        _ => {
            let mut map = HashMap::new();
            for s in args {
                let (axis, n) = split_axis(s)?.with_context(|| format!("`{s}` does not name an axis"))?;
                map.insert(axis, n.trim().parse::<usize>()?);
            }
            Ok(RowSizes::PerAxis(map))
        }
    }
}

/// 将命令行参数转换为快照选项.
pub fn snapshot_options(args: SnapArgs) -> Result<SnapshotOptions> {
    Ok(SnapshotOptions {
        savefig: args.output,
        slices: slice_selection(&args.slices).context("invalid --slices")?,
        axes: Axis::parse_many(&args.axes).context("invalid --axes")?,
        raw: !args.no_raw,
        opacity: args.opacity,
        animated: args.animated,
        rowsize: row_sizes(&args.rowsize).context("invalid --rowsize")?,
        figsize: args.figsize,
        dpi: args.dpi,
        width: args.width,
        progress: !args.no_progress,
        contours: args.contours,
        samebox: args.samebox,
    })
}

/// 运行 `xnat` 子命令.
pub fn run_xnat(job: XnatJob, snapshot: SnapshotOptions) -> Result<SnapshotOutput> {
    let options = XnatSnapOptions {
        resource_name: job.resource,
        cache: job.cache,
        dest: Some(job.dest.unwrap_or_else(loader::dest_dir_from_env_or_tmp)),
        locate: LocateOptions {
            t1_sequence: job.t1_sequence,
            t2_sequence: job.t2_sequence,
            background: if job.t2 { BackgroundScan::T2 } else { BackgroundScan::T1 },
            freesurfer_reg_to_native: job.reg_to_native,
        },
        snapshot,
    };

    let config_path = job
        .config
        .or_else(loader::config_path_from_env_or_home)
        .context("cannot determine the XNAT config path")?;
    let client = XnatClient::from_config_file(&config_path)
        .with_context(|| format!("loading XNAT config {}", config_path.display()))?;

    plot_segment(&client, &job.experiment, &options)
        .with_context(|| format!("snapshot of {}/{}", job.experiment, options.resource_name))
}

/// 运行 `files` 子命令.
pub fn run_files(segmentations: &[PathBuf], background: Option<&Path>, snapshot: SnapshotOptions) -> Result<SnapshotOutput> {
    plot_segment_files(segmentations, background, &snapshot).context("snapshot of local files")
}
