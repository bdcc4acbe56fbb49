//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::slice::{Axis, BackgroundSlice, BoundingBox, ImgWriteVis, OverlaySlice, RowSizes, SliceSelection};
pub use crate::data::window::IntensityWindow;
pub use crate::data::{load_channels, SegStack, SegmentationKind, Volume, VolumeShape};

pub use crate::error::{SnapError, SnapResult};

pub use crate::xnat::{Archive, XnatConfig};

#[cfg(feature = "xnat")]
pub use crate::xnat::XnatClient;

pub use crate::snapshot::{plot_segment, plot_segment_files, snap_volumes, SnapshotOptions, SnapshotOutput, XnatSnapOptions};
