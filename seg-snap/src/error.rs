//! 运行时错误.

use crate::{Axis, Idx3d};
use std::path::PathBuf;
use thiserror::Error;

/// 快照流水线 (定位, 下载, 切片, 渲染, 合成) 的运行时错误.
#[derive(Debug, Error)]
pub enum SnapError {
    /// 缓存模式下本地文件不存在. 调用方应关闭缓存后重试.
    #[error("No such file: '{}'. Retry with cache set to False.", .0.display())]
    MissingFile(PathBuf),

    /// 给定序列匹配到的可用扫描数不为 1. 不可恢复, 不会重试.
    #[error("expected exactly one usable `{sequence}` scan in experiment `{experiment}`, found {found}")]
    AmbiguousScan {
        /// 实验 ID.
        experiment: String,
        /// 序列名 (如 `T1_ALFA1`).
        sequence: String,
        /// 实际匹配到的扫描数.
        found: usize,
    },

    /// 资源中没有与模式匹配的文件.
    #[error("no file matching `{pattern}` in resource `{resource}`")]
    NoMatchingFile {
        /// 资源名.
        resource: String,
        /// glob 风格的模式.
        pattern: String,
    },

    /// 无法识别的资源类型.
    #[error("unsupported resource `{0}`")]
    UnsupportedResource(String),

    /// 体数据的空间形状与期望不一致.
    #[error("volume shape {found:?} does not match {expected:?}")]
    ShapeMismatch {
        /// 期望形状.
        expected: Idx3d,
        /// 实际形状.
        found: Idx3d,
    },

    /// 体数据维数不是 3 (或 4, 视调用而定).
    #[error("expected a 3D volume (or a 4D stack), found {0} dimensions")]
    Dimensionality(usize),

    /// 没有给出任何分割通道.
    #[error("no segmentation channel given")]
    NoChannels,

    /// 分割通道过多. 最多支持 3 个.
    #[error("too many segmentation channels: {0} (at most 3)")]
    TooManyChannels(usize),

    /// 切片索引越界.
    #[error("slice {index} out of range for axis {axis} (length {len})")]
    SliceOutOfRange {
        /// 切片方向.
        axis: Axis,
        /// 越界的索引.
        index: usize,
        /// 该方向上的切片总数.
        len: usize,
    },

    /// 无法解析的切片方向字符.
    #[error("invalid axis `{0}` (expected one of S/C/A or x/y/z)")]
    InvalidAxis(char),

    /// 不透明度不在 `0..=100` 内.
    #[error("opacity must be within 0..=100, got {0}")]
    InvalidOpacity(u8),

    /// 没有可合成的图像 (如切片列表为空, 或动画帧序列为空).
    #[error("nothing to compose into `{}`", .0.display())]
    NothingToCompose(PathBuf),

    /// MGH/MGZ 文件格式错误.
    #[error("malformed MGH file: {0}")]
    Mgh(String),

    /// 归档服务返回了无法理解的内容.
    #[error("archive request failed: {0}")]
    Archive(String),

    /// 读取 NIfTI 文件失败.
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    /// 图像编解码失败.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 配置或归档响应的 JSON 解析失败.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// HTTP 请求失败.
    #[cfg(feature = "xnat")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// 快照流水线的运行时结果.
pub type SnapResult<T> = Result<T, SnapError>;
