//! 二维切片对象: 叠加层切片, 背景切片, 包围盒, 以及切片方向.

mod axis;
mod core;
mod save;

pub use axis::{Axis, RowSizes, SliceSelection};

pub use core::{BackgroundSlice, BoundingBox, OverlaySlice};

pub use save::ImgWriteVis;
