//! 分割结果快照命令行工具.
//!
//! ```text
//! xnat-snap xnat BBRCDEV_E00375 --resource CAT12_SEGMENT --animated -o /tmp/snap.gif
//! xnat-snap files c1.nii.gz c2.nii.gz c3.nii.gz --background T1.nii.gz --axes S
//! ```

mod report;
mod runner;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xnat-snap", version)]
#[command(about = "Snapshots of brain segmentations for visual quality control")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a segmentation resource from XNAT and snapshot it
    Xnat {
        /// Experiment ID
        experiment: String,

        /// XNAT JSON config (defaults to $XNAT_CONFIG or ~/.xnat.cfg)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Segmentation resource (SPM12_SEGMENT, CAT12_SEGMENT, ASHS, FREESURFER6...)
        #[arg(short, long, default_value = seg_snap::consts::xnat::DEFAULT_RESOURCE)]
        resource: String,

        /// Only use files already downloaded to the destination directory
        #[arg(long)]
        cache: bool,

        /// Download directory (defaults to $SEG_SNAP_DEST or the system temp dir)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Resample FreeSurfer labels onto the native T1 grid
        #[arg(long)]
        reg_to_native: bool,

        /// Sequence name of the T1 scan
        #[arg(long, default_value = seg_snap::consts::xnat::T1_SEQUENCE)]
        t1_sequence: String,

        /// Sequence name of the T2 scan
        #[arg(long, default_value = seg_snap::consts::xnat::T2_SEQUENCE)]
        t2_sequence: String,

        /// Use the T2 scan registered to T1 space as background
        #[arg(long)]
        t2: bool,

        #[command(flatten)]
        snap: SnapArgs,
    },

    /// Snapshot local segmentation files
    Files {
        /// Segmentation maps, one per channel, or a single 4D/label volume
        #[arg(required = true)]
        segmentations: Vec<PathBuf>,

        /// Background scan
        #[arg(short, long)]
        background: Option<PathBuf>,

        #[command(flatten)]
        snap: SnapArgs,
    },
}

/// 两个子命令共用的快照参数.
#[derive(Args)]
struct SnapArgs {
    /// Output file (a temporary file is created when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Axes to render, in order, e.g. `ACS` or `xyz`
    #[arg(long, default_value = "ACS")]
    axes: String,

    /// Slices, e.g. `90..110`, `100..200:3`, or per axis `S=90..110` (repeatable)
    #[arg(long)]
    slices: Vec<String>,

    /// Do not show the raw scan behind the segmentation
    #[arg(long)]
    no_raw: bool,

    /// Overlay opacity in percent
    #[arg(long, default_value_t = seg_snap::consts::blend::OPACITY)]
    opacity: u8,

    /// Write an animated GIF fading the overlay in and out
    #[arg(long)]
    animated: bool,

    /// Slices per row, e.g. `6` or per axis `S=6` (repeatable)
    #[arg(long)]
    rowsize: Vec<String>,

    /// Panel width in inches for every axis
    #[arg(long)]
    figsize: Option<f32>,

    /// Rendering resolution
    #[arg(long, default_value_t = seg_snap::consts::layout::DPI)]
    dpi: u32,

    /// Width of the final composite in pixels
    #[arg(long, default_value_t = seg_snap::consts::layout::MONTAGE_WIDTH)]
    width: u32,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Draw only the outline of each segmented region
    #[arg(long)]
    contours: bool,

    /// Crop every slice of an axis with the same bounding box
    #[arg(long)]
    samebox: bool,
}

fn main() -> Result<()> {
    SimpleLogger::new().with_level(LevelFilter::Info).env().init()?;

    let cli = Cli::parse();
    let output = match cli.command {
        Commands::Xnat {
            experiment,
            config,
            resource,
            cache,
            dest,
            reg_to_native,
            t1_sequence,
            t2_sequence,
            t2,
            snap,
        } => {
            let job = runner::XnatJob {
                experiment,
                config,
                resource,
                cache,
                dest,
                reg_to_native,
                t1_sequence,
                t2_sequence,
                t2,
            };
            runner::run_xnat(job, runner::snapshot_options(snap)?)?
        }
        Commands::Files {
            segmentations,
            background,
            snap,
        } => runner::run_files(&segmentations, background.as_deref(), runner::snapshot_options(snap)?)?,
    };

    report::print(&output)?;
    Ok(())
}
