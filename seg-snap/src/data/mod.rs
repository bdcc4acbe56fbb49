use std::path::Path;

use ndarray::{s, Array3, Array4, ArrayD, ArrayView3, ArrayView4, Axis as NdAxis, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use num::ToPrimitive;
use once_cell::sync::Lazy;

use crate::{Axis, Idx3d, SnapError, SnapResult};

pub mod mgh;
pub mod slice;
pub mod window;

pub use slice::{BackgroundSlice, BoundingBox, ImgWriteVis, OverlaySlice};
pub use window::IntensityWindow;

/// 单个体数据, 以 `f32` 保存, 维度顺序为文件原生的体素顺序 `(i, j, k)`.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<f32>,
}

/// 体数据空间形状的共用属性.
pub trait VolumeShape {
    /// 获取空间形状 `(i, j, k)`.
    fn shape(&self) -> Idx3d;

    /// 获取 `axis` 方向上的切片个数.
    #[inline]
    fn len_along(&self, axis: Axis) -> usize {
        axis.len_in(self.shape())
    }
}

impl VolumeShape for Volume {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

/// 路径是否指向 FreeSurfer MGH/MGZ 文件.
fn is_mgh(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mgz") || e.eq_ignore_ascii_case("mgh"))
}

/// 将 3D 或 4D 数组拆分为若干 3D 体数据. 4D 数组的最后一维被视为通道/帧.
fn split_frames(arr: ArrayD<f32>) -> SnapResult<Vec<Volume>> {
    match arr.ndim() {
        3 => {
            let data = arr
                .into_dimensionality::<Ix3>()
                .map_err(|_| SnapError::Dimensionality(3))?;
            Ok(vec![Volume::new(data)])
        }
        4 => arr
            .axis_iter(NdAxis(3))
            .map(|frame| {
                frame
                    .as_standard_layout()
                    .into_owned()
                    .into_dimensionality::<Ix3>()
                    .map(Volume::new)
                    .map_err(|_| SnapError::Dimensionality(4))
            })
            .collect(),
        n => Err(SnapError::Dimensionality(n)),
    }
}

/// 打开体数据文件 (NIfTI 或 MGH/MGZ), 返回其中的全部 3D 体.
///
/// 3D 文件返回单个元素; 4D 文件按最后一维拆分, 每帧一个元素.
pub fn load_channels<P: AsRef<Path>>(path: P) -> SnapResult<Vec<Volume>> {
    let path = path.as_ref();
    if is_mgh(path) {
        return Ok(mgh::MghVolume::open(path)?.into_frames());
    }
    let obj = ReaderOptions::new().read_file(path)?;
    let arr = obj.into_volume().into_ndarray::<f32>()?;
    split_frames(arr)
}

impl Volume {
    /// 直接初始化.
    #[inline]
    pub(crate) fn new(data: Array3<f32>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Self { data }
    }

    /// 打开 3D 体数据文件. 支持 `.nii`, `.nii.gz`, `.mgh`, `.mgz`.
    ///
    /// 若文件不是 3D (例如多帧 4D 文件), 返回 [`SnapError::Dimensionality`].
    pub fn open<P: AsRef<Path>>(path: P) -> SnapResult<Self> {
        let mut frames = load_channels(path)?;
        if frames.len() != 1 {
            return Err(SnapError::Dimensionality(4));
        }
        Ok(frames.remove(0))
    }

    /// 从任意数值类型的数组创建体数据. 无法表示为 `f32` 的值记为 0.
    pub fn from_array<T: ToPrimitive + Clone>(data: Array3<T>) -> Self {
        Self::new(data.mapv(|v| v.to_f32().unwrap_or(0.0)))
    }

    /// 创建全零体数据.
    #[inline]
    pub fn zeros(shape: Idx3d) -> Self {
        Self::new(Array3::zeros(shape))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 获取 `axis` 方向上第 `index` 层切片, 已转为显示方向 (上为头侧/前侧).
    ///
    /// 当 `index` 越界时 panic.
    pub fn slice_at(&self, axis: Axis, index: usize) -> BackgroundSlice {
        let view = self.data.index_axis(NdAxis(axis.index()), index);
        let oriented = view.reversed_axes();
        BackgroundSlice::new(oriented.slice(s![..;-1, ..]).mapv(f32::abs))
    }

    /// 体数据是否由非负整数标签构成, 且存在大于 1 的标签.
    ///
    /// 用于区分离散标签图 (如 `aparc+aseg`) 和概率图.
    pub fn is_label_map(&self) -> bool {
        let mut has_large = false;
        for &v in self.data.iter() {
            if !(v.is_finite() && v >= 0.0 && v.fract() == 0.0) {
                return false;
            }
            has_large |= v > 1.0;
        }
        has_large
    }
}

/// 分割图的解释方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SegmentationKind {
    /// 每个文件是一个类别的概率图, 取值 `[0, 1]`, 依次作为红绿蓝通道.
    Probabilities,

    /// 单个离散标签图, 按调色板着色.
    Labels,
}

impl SegmentationKind {
    /// 根据已加载的体数据推断解释方式: 仅当只有一个体数据且其为标签图时视为
    /// [`SegmentationKind::Labels`].
    pub fn detect(volumes: &[Volume]) -> Self {
        match volumes {
            [single] if single.is_label_map() => Self::Labels,
            _ => Self::Probabilities,
        }
    }
}

/// 标签调色板大小.
const PALETTE_LEN: usize = 64;

/// 标签调色板. 相邻色相按黄金角错开, 使相邻标签的颜色区分明显.
static PALETTE: Lazy<Vec<[f32; 3]>> = Lazy::new(|| {
    const GOLDEN: f32 = 0.618_034;
    (0..PALETTE_LEN)
        .map(|i| {
            let hue = (i as f32 * GOLDEN).fract();
            let value = if i % 2 == 0 { 1.0 } else { 0.8 };
            hsv_to_rgb(hue, 0.85, value)
        })
        .collect()
});

/// HSV (均位于 `[0, 1]`) 转 RGB.
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let h6 = h * 6.0;
    let sector = h6.floor() as u32 % 6;
    let f = h6 - h6.floor();
    let (p, q, t) = (v * (1.0 - s), v * (1.0 - s * f), v * (1.0 - s * (1.0 - f)));
    match sector {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// 标签 `label` 的颜色. 标签 0 (背景) 为黑色.
#[inline]
fn label_color(label: f32) -> [f32; 3] {
    let l = label.abs().round() as usize;
    if l == 0 {
        [0.0; 3]
    } else {
        PALETTE[(l - 1) % PALETTE_LEN]
    }
}

/// 叠加层: 三个分割通道沿最后一维堆叠, 形状为 `(i, j, k, 3)`.
///
/// 不足三个的通道以同形状的全零体数据补齐.
#[derive(Debug, Clone)]
pub struct SegStack {
    data: Array4<f32>,
}

impl VolumeShape for SegStack {
    #[inline]
    fn shape(&self) -> Idx3d {
        let (i, j, k, _) = self.data.dim();
        (i, j, k)
    }
}

impl SegStack {
    /// 通道个数. 恒为 3.
    pub const CHANNELS: usize = 3;

    /// 由 1 到 3 个概率图堆叠. 所有通道必须与第一个通道形状相同.
    pub fn from_channels(channels: &[Volume]) -> SnapResult<Self> {
        let first = channels.first().ok_or(SnapError::NoChannels)?;
        if channels.len() > Self::CHANNELS {
            return Err(SnapError::TooManyChannels(channels.len()));
        }
        let (i, j, k) = first.shape();
        if let Some(bad) = channels.iter().find(|c| c.shape() != (i, j, k)) {
            return Err(SnapError::ShapeMismatch {
                expected: (i, j, k),
                found: bad.shape(),
            });
        }

        // 未赋值的通道保持为零.
        let mut data = Array4::zeros((i, j, k, Self::CHANNELS));
        for (c, vol) in channels.iter().enumerate() {
            data.index_axis_mut(NdAxis(3), c).assign(&vol.data);
        }
        Ok(Self { data })
    }

    /// 将离散标签图按调色板转换为三通道颜色.
    pub fn from_labels(labels: &Volume) -> Self {
        let (i, j, k) = labels.shape();
        let mut data = Array4::zeros((i, j, k, Self::CHANNELS));

        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                ndarray::Zip::from(data.lanes_mut(NdAxis(3)))
                    .and(&labels.data)
                    .par_for_each(|mut px, &l| {
                        px.iter_mut().zip(label_color(l)).for_each(|(p, c)| *p = c);
                    });
            } else {
                ndarray::Zip::from(data.lanes_mut(NdAxis(3)))
                    .and(&labels.data)
                    .for_each(|mut px, &l| {
                        px.iter_mut().zip(label_color(l)).for_each(|(p, c)| *p = c);
                    });
            }
        }
        Self { data }
    }

    /// 按解释方式 `kind` 创建叠加层.
    ///
    /// [`SegmentationKind::Labels`] 只接受单个体数据.
    pub fn build(volumes: &[Volume], kind: SegmentationKind) -> SnapResult<Self> {
        match (kind, volumes) {
            (SegmentationKind::Labels, [single]) => Ok(Self::from_labels(single)),
            (SegmentationKind::Labels, []) => Err(SnapError::NoChannels),
            (SegmentationKind::Labels, many) => Err(SnapError::TooManyChannels(many.len())),
            (SegmentationKind::Probabilities, _) => Self::from_channels(volumes),
        }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// 获得第 `c` 个通道.
    ///
    /// 当 `c >= 3` 时 panic.
    #[inline]
    pub fn channel(&self, c: usize) -> ArrayView3<'_, f32> {
        self.data.index_axis(NdAxis(3), c)
    }

    /// 获取 `axis` 方向上第 `index` 层三通道切片, 已转为显示方向.
    ///
    /// 当 `index` 越界时 panic.
    pub fn slice_at(&self, axis: Axis, index: usize) -> OverlaySlice {
        let view = self.data.index_axis(NdAxis(axis.index()), index);
        let oriented = view.permuted_axes([1, 0, 2]);
        OverlaySlice::new(oriented.slice(s![..;-1, .., ..]).mapv(f32::abs))
    }

    /// 检查背景体数据是否与叠加层空间形状一致.
    pub fn check_background(&self, bg: &Volume) -> SnapResult<()> {
        if bg.shape() == self.shape() {
            Ok(())
        } else {
            Err(SnapError::ShapeMismatch {
                expected: self.shape(),
                found: bg.shape(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn ramp(shape: Idx3d) -> Volume {
        Volume::from_array(Array3::from_shape_fn(shape, |(i, j, k)| (i + j + k) as u16))
    }

    #[test]
    fn test_zero_padding() {
        let c1 = ramp((4, 5, 6));
        let stack = SegStack::from_channels(&[c1.clone()]).unwrap();
        assert_eq!(stack.shape(), (4, 5, 6));
        assert_eq!(stack.len_along(Axis::Coronal), 5);
        assert_eq!(stack.data().dim(), (4, 5, 6, 3));
        assert_eq!(stack.channel(0), c1.data());
        for c in 1..3 {
            assert_eq!(stack.channel(c).dim(), (4, 5, 6));
            assert!(stack.channel(c).iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_channel_errors() {
        assert!(matches!(
            SegStack::from_channels(&[]),
            Err(SnapError::NoChannels)
        ));
        let v = Volume::zeros((2, 2, 2));
        assert!(matches!(
            SegStack::from_channels(&[v.clone(), v.clone(), v.clone(), v.clone()]),
            Err(SnapError::TooManyChannels(4))
        ));
        assert!(matches!(
            SegStack::from_channels(&[v, Volume::zeros((2, 3, 2))]),
            Err(SnapError::ShapeMismatch {
                expected: (2, 2, 2),
                found: (2, 3, 2)
            })
        ));
    }

    #[test]
    fn test_slice_orientation() {
        // (i, j, k) = (2, 3, 4)
        let vol = Volume::from_array(Array3::from_shape_fn((2, 3, 4), |(i, j, k)| {
            (i * 100 + j * 10 + k) as f32
        }));
        // 矢状面: 行为 k (倒序), 列为 j.
        let s = vol.slice_at(Axis::Sagittal, 1);
        assert_eq!(s.shape(), (4, 3));
        assert_eq!(s.data()[(0, 0)], 103.0);
        assert_eq!(s.data()[(3, 2)], 120.0);

        // 轴状面: 行为 j (倒序), 列为 i.
        let a = vol.slice_at(Axis::Axial, 2);
        assert_eq!(a.shape(), (3, 2));
        assert_eq!(a.data()[(0, 1)], 122.0);
    }

    #[test]
    fn test_slice_takes_absolute_value() {
        let vol = Volume::from_array(Array3::from_elem((2, 2, 2), -3i8));
        assert!(vol.slice_at(Axis::Coronal, 0).data().iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_label_map() {
        let mut labels = Array3::<u8>::zeros((3, 3, 3));
        labels[(1, 1, 1)] = 17;
        labels[(0, 1, 1)] = 2;
        let vol = Volume::from_array(labels);
        assert!(vol.is_label_map());
        assert_eq!(SegmentationKind::detect(&[vol.clone()]), SegmentationKind::Labels);

        let stack = SegStack::from_labels(&vol);
        let px: Vec<f32> = (0..3).map(|c| stack.channel(c)[(1, 1, 1)]).collect();
        assert!(px.iter().any(|&v| v > 0.0));
        assert!((0..3).all(|c| stack.channel(c)[(0, 0, 0)] == 0.0));
        // 不同标签颜色不同
        let other: Vec<f32> = (0..3).map(|c| stack.channel(c)[(0, 1, 1)]).collect();
        assert_ne!(px, other);

        let prob = Volume::from_array(Array3::from_elem((2, 2, 2), 0.5f32));
        assert!(!prob.is_label_map());
        assert_eq!(
            SegmentationKind::detect(&[prob.clone()]),
            SegmentationKind::Probabilities
        );
    }

    #[test]
    fn test_background_shape_check() {
        let stack = SegStack::from_channels(&[Volume::zeros((4, 4, 4))]).unwrap();
        assert!(stack.check_background(&Volume::zeros((4, 4, 4))).is_ok());
        assert!(stack.check_background(&Volume::zeros((4, 4, 5))).is_err());
    }
}
