use crate::{Idx2d, IntensityWindow};
use itertools::{Itertools, MinMaxResult};
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3};
use ordered_float::OrderedFloat;

/// 切片中非零区域的包围盒. 上下界均为闭区间.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BoundingBox {
    /// 行范围 `[min, max]`.
    pub rows: (usize, usize),

    /// 列范围 `[min, max]`.
    pub cols: (usize, usize),
}

impl BoundingBox {
    /// 求若干 (行, 列) 位置的包围盒. 位置为空时返回 `None`.
    pub fn from_positions<I: IntoIterator<Item = Idx2d>>(positions: I) -> Option<Self> {
        let positions = positions.into_iter().collect_vec();
        let rows = positions.iter().map(|p| p.0).minmax().into_option()?;
        let cols = positions.iter().map(|p| p.1).minmax().into_option()?;
        Some(Self { rows, cols })
    }

    /// 包围盒高度.
    #[inline]
    pub fn height(&self) -> usize {
        self.rows.1 - self.rows.0 + 1
    }

    /// 包围盒宽度.
    #[inline]
    pub fn width(&self) -> usize {
        self.cols.1 - self.cols.0 + 1
    }

    /// 同时包含 `self` 与 `other` 的最小包围盒.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            rows: (self.rows.0.min(other.rows.0), self.rows.1.max(other.rows.1)),
            cols: (self.cols.0.min(other.cols.0), self.cols.1.max(other.cols.1)),
        }
    }

    /// 将包围盒裁剪到形状为 `(height, width)` 的图像内.
    ///
    /// 若两者没有交集, 返回 `None`.
    pub fn clamp_to(&self, (height, width): Idx2d) -> Option<Self> {
        if self.rows.0 >= height || self.cols.0 >= width {
            return None;
        }
        Some(Self {
            rows: (self.rows.0, self.rows.1.min(height - 1)),
            cols: (self.cols.0, self.cols.1.min(width - 1)),
        })
    }
}

/// 三通道叠加层切片, 形状为 `(行, 列, 3)`, 已转为显示方向.
#[derive(Clone, Debug)]
pub struct OverlaySlice {
    data: Array3<f32>,
}

impl OverlaySlice {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: Array3<f32>) -> Self {
        debug_assert_eq!(data.dim().2, 3);
        Self { data }
    }

    /// 获取切片形状 (行, 列).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        let (h, w, _) = self.data.dim();
        (h, w)
    }

    /// 获得底层数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 任一通道非零 (含 NaN) 的像素的包围盒. 全零切片返回 `None`.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_positions(
            self.data
                .indexed_iter()
                .filter(|(_, &v)| v != 0.0)
                .map(|((h, w, _), _)| (h, w)),
        )
    }

    /// 是否全为零.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }

    /// 只保留各通道的边界像素: 位于切片边缘, 或与同一通道的零值 4-相邻.
    pub fn contours(&self) -> OverlaySlice {
        let (height, width) = self.shape();
        let is_zero = |pos: (usize, usize, usize)| matches!(self.data.get(pos), Some(&v) if v == 0.0);
        let data = Array3::from_shape_fn(self.data.dim(), |(h, w, c)| {
            let v = self.data[(h, w, c)];
            let at_border = h == 0 || h + 1 == height || w == 0 || w + 1 == width;
            if v == 0.0
                || at_border
                || is_zero((h.wrapping_sub(1), w, c))
                || is_zero((h + 1, w, c))
                || is_zero((h, w.wrapping_sub(1), c))
                || is_zero((h, w + 1, c))
            {
                v
            } else {
                0.0
            }
        });
        Self::new(data)
    }

    /// 裁剪到 `bb` (会先限制在切片范围内). 无交集时返回 `None`.
    pub fn crop(&self, bb: &BoundingBox) -> Option<OverlaySlice> {
        let bb = bb.clamp_to(self.shape())?;
        let view = self
            .data
            .slice(s![bb.rows.0..=bb.rows.1, bb.cols.0..=bb.cols.1, ..]);
        Some(Self::new(view.to_owned()))
    }
}

/// 单通道背景切片, 形状为 `(行, 列)`, 已转为显示方向.
#[derive(Clone, Debug)]
pub struct BackgroundSlice {
    data: Array2<f32>,
}

impl BackgroundSlice {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// 获取切片形状 (行, 列).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 获得底层数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// 裁剪到 `bb` (会先限制在切片范围内). 无交集时返回 `None`.
    pub fn crop(&self, bb: &BoundingBox) -> Option<BackgroundSlice> {
        let bb = bb.clamp_to(self.shape())?;
        let view = self
            .data
            .slice(s![bb.rows.0..=bb.rows.1, bb.cols.0..=bb.cols.1]);
        Some(Self::new(view.to_owned()))
    }

    /// 以切片自身有限值的最小/最大值为上下限的灰度窗.
    ///
    /// 无有限值或各值相同时返回 `None`.
    pub fn auto_window(&self) -> Option<IntensityWindow> {
        match self
            .data
            .iter()
            .filter(|v| v.is_finite())
            .map(|&v| OrderedFloat(v))
            .minmax()
        {
            MinMaxResult::MinMax(lo, hi) => IntensityWindow::from_range(lo.0, hi.0),
            _ => None,
        }
    }
}
