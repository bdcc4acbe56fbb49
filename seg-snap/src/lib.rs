#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 从 XNAT 归档或本地文件读取脑部分割结果, 沿三个解剖方向生成切片快照,
//! 并合成为静态 JPEG 或循环播放的 GIF, 用于分割质量的目视检查.
//!
//! 流水线为 `定位 -> 下载 -> 切片 -> 面板渲染 -> 合成`.
//!
//! # 注意
//!
//! 1. 体数据始终按文件原生体素顺序 `(i, j, k)` 处理, 三个方向分别固定其中一维.
//!   FreeSurfer 的 LIA 体数据在加载时会被重定向到 RAS.
//! 2. 在非期望情况下, 程序返回 [`SnapError`], 而不是静默失败.
//!
//! # 开发计划
//!
//! ### 体数据读取 ✅
//!
//! 支持 NIfTI (`.nii`, `.nii.gz`, 含 4D 多通道) 和 FreeSurfer MGH/MGZ.
//! MGH 支持仿射变换, 最近邻重采样和 RAS 重定向.
//!
//! 实现位于 `seg-snap/src/data`.
//!
//! ### 切片提取与包围盒 ✅
//!
//! 切片取绝对值, 转置并上下翻转. 包围盒只在叠加层上计算,
//! 背景切片使用同一包围盒裁剪.
//!
//! 实现位于 `seg-snap/src/data/slice`.
//!
//! ### 灰度窗口 ✅
//!
//! 背景切片以自身最小/最大值作为窗口上下限.
//!
//! 实现位于 `seg-snap/src/data/window.rs`.
//!
//! ### 面板渲染 ✅
//!
//! 切片按行分组, 每行一个临时 JPEG 面板. 最近邻缩放, 左上角标注切片编号.
//!
//! 实现位于 `seg-snap/src/render`.
//!
//! ### 合成 ✅
//!
//! 纵向拼接, 透明度混合, GIF 动画. 全部在进程内完成, 不依赖外部命令.
//!
//! 实现位于 `seg-snap/src/compose`.
//!
//! ### XNAT 资源定位与下载 ✅
//!
//! 支持 SPM12, CAT12, ASHS, FreeSurfer 6 的资源组织方式, 以及缓存模式.
//!
//! 实现位于 `seg-snap/src/xnat`.
//!
//! ### 轮廓模式与固定包围盒 ✅
//!
//! 以轮廓线而非填充区域显示分割结果; 同一方向上的切片可以共用一个包围盒.
//!
//! 实现位于 `seg-snap/src/data/slice/core.rs` 与 `seg-snap/src/render/panel.rs`.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private
//! API 提供文档.

/// 二维索引 (行, 列).
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也用作体数据形状.
pub type Idx3d = (usize, usize, usize);

/// 体数据与切片.
pub mod data;

pub use data::slice::{Axis, RowSizes, SliceSelection};
pub use data::{IntensityWindow, SegStack, Volume, VolumeShape};

mod error;

pub use error::{SnapError, SnapResult};

pub mod consts;

pub mod render;

pub mod compose;

pub mod xnat;

pub mod snapshot;

pub use snapshot::{plot_segment, plot_segment_files, snap_volumes, SnapshotOptions, SnapshotOutput, XnatSnapOptions};

pub mod prelude;
