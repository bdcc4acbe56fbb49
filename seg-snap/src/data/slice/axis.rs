//! 切片方向与切片索引选择.

use crate::consts::layout::*;
use crate::{Idx3d, SnapError, SnapResult};
use std::collections::HashMap;
use std::fmt;

/// 解剖学切片方向.
///
/// 体数据按文件原生体素顺序 `(i, j, k)` 存储, 三个方向分别固定其中一个索引.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Axis {
    /// 矢状面, 固定第 0 维.
    Sagittal,

    /// 冠状面, 固定第 1 维.
    Coronal,

    /// 轴状面, 固定第 2 维.
    Axial,
}

impl Axis {
    /// 全部三个方向, 按轴状面, 冠状面, 矢状面的习惯顺序排列.
    pub const ALL: [Axis; 3] = [Axis::Axial, Axis::Coronal, Axis::Sagittal];

    /// 从单个字符解析方向. 接受 `S`/`C`/`A` (大小写均可) 以及 `x`/`y`/`z`.
    pub fn from_char(c: char) -> SnapResult<Self> {
        match c {
            'S' | 's' | 'x' | 'X' => Ok(Self::Sagittal),
            'C' | 'c' | 'y' | 'Y' => Ok(Self::Coronal),
            'A' | 'a' | 'z' | 'Z' => Ok(Self::Axial),
            other => Err(SnapError::InvalidAxis(other)),
        }
    }

    /// 解析形如 `"xyz"`, `"ACS"` 或 `"A,S"` 的方向序列. 逗号和空白被忽略,
    /// 重复的方向只保留第一次出现.
    pub fn parse_many(s: &str) -> SnapResult<Vec<Self>> {
        let mut ans: Vec<Self> = Vec::with_capacity(3);
        for c in s.chars().filter(|c| !c.is_whitespace() && *c != ',') {
            let axis = Self::from_char(c)?;
            if !ans.contains(&axis) {
                ans.push(axis);
            }
        }
        Ok(ans)
    }

    /// 被固定的体素维度.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Sagittal => 0,
            Self::Coronal => 1,
            Self::Axial => 2,
        }
    }

    /// 文件命名中使用的大写字母.
    #[inline]
    pub const fn letter(self) -> char {
        match self {
            Self::Sagittal => 'S',
            Self::Coronal => 'C',
            Self::Axial => 'A',
        }
    }

    /// 形状为 `shape` 的体数据在该方向上的切片个数.
    #[inline]
    pub const fn len_in(self, shape: Idx3d) -> usize {
        match self {
            Self::Sagittal => shape.0,
            Self::Coronal => shape.1,
            Self::Axial => shape.2,
        }
    }

    /// 默认每行切片数.
    #[inline]
    pub const fn default_row_size(self) -> usize {
        match self {
            Self::Sagittal => ROW_SIZE_SAGITTAL,
            Self::Coronal => ROW_SIZE_CORONAL,
            Self::Axial => ROW_SIZE_AXIAL,
        }
    }

    /// 默认画布宽度, 以英寸为单位.
    #[inline]
    pub const fn default_fig_width(self) -> f32 {
        match self {
            Self::Sagittal => FIG_WIDTH_SAGITTAL,
            Self::Coronal => FIG_WIDTH_CORONAL,
            Self::Axial => FIG_WIDTH_AXIAL,
        }
    }

    /// 按形状 `(X, Y, Z)` 自动选取的切片索引:
    ///
    /// - 轴状面: `100..Z-60`, 步长 3;
    /// - 冠状面: `50..Y-70`, 步长 3;
    /// - 矢状面: `90..X-90`, 步长 1.
    ///
    /// 上界在体数据过小时饱和到 0, 此时结果为空.
    pub fn default_slices(self, (x, y, z): Idx3d) -> Vec<usize> {
        match self {
            Self::Axial => (100..z.saturating_sub(60)).step_by(3).collect(),
            Self::Coronal => (50..y.saturating_sub(70)).step_by(3).collect(),
            Self::Sagittal => (90..x.saturating_sub(90)).collect(),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// 切片索引的选择方式.
#[derive(Clone, Debug, Default)]
pub enum SliceSelection {
    /// 每个方向都使用 [`Axis::default_slices`].
    #[default]
    Auto,

    /// 所有方向共用同一组索引.
    Same(Vec<usize>),

    /// 逐方向指定. 未列出的方向回退到自动选择.
    PerAxis(HashMap<Axis, Vec<usize>>),
}

impl SliceSelection {
    /// 求 `axis` 方向上最终渲染的切片索引.
    ///
    /// 任何索引越界都会返回 [`SnapError::SliceOutOfRange`].
    pub fn resolve(&self, axis: Axis, shape: Idx3d) -> SnapResult<Vec<usize>> {
        let slices = match self {
            Self::Auto => axis.default_slices(shape),
            Self::Same(v) => v.clone(),
            Self::PerAxis(m) => match m.get(&axis) {
                Some(v) => v.clone(),
                None => axis.default_slices(shape),
            },
        };
        let len = axis.len_in(shape);
        match slices.iter().find(|&&i| i >= len) {
            Some(&index) => Err(SnapError::SliceOutOfRange { axis, index, len }),
            None => Ok(slices),
        }
    }
}

/// 每行切片数的设置方式.
#[derive(Clone, Debug, Default)]
pub enum RowSizes {
    /// 使用 [`Axis::default_row_size`].
    #[default]
    Default,

    /// 所有方向相同.
    Uniform(usize),

    /// 逐方向指定. 未列出的方向使用默认值.
    PerAxis(HashMap<Axis, usize>),
}

impl RowSizes {
    /// 求 `axis` 方向上的每行切片数. 结果至少为 1.
    pub fn get(&self, axis: Axis) -> usize {
        let n = match self {
            Self::Default => axis.default_row_size(),
            Self::Uniform(n) => *n,
            Self::PerAxis(m) => m.get(&axis).copied().unwrap_or(axis.default_row_size()),
        };
        n.max(1)
    }
}
