//! FreeSurfer MGH/MGZ 体数据的读取, 重采样与重定向.
//!
//! MGH 为大端格式: 284 字节的头部之后紧跟体素数据 (x 变化最快).
//! MGZ 即 gzip 压缩的 MGH.

use super::Volume;
use crate::{Idx3d, SnapError, SnapResult, VolumeShape};
use flate2::read::GzDecoder;
use ndarray::{Array3, Array4, Axis as NdAxis, ShapeBuilder};
use num::ToPrimitive;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// 头部字节数 (含未使用的填充).
const HEADER_LEN: usize = 284;

const MRI_UCHAR: i32 = 0;
const MRI_INT: i32 = 1;
const MRI_FLOAT: i32 = 3;
const MRI_SHORT: i32 = 4;

/// 大端字节流的顺序读取.
struct BeCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BeCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> SnapResult<[u8; N]> {
        let end = self.pos + N;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| SnapError::Mgh(format!("truncated header at byte {}", self.pos)))?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn i32(&mut self) -> SnapResult<i32> {
        self.take().map(i32::from_be_bytes)
    }

    fn i16(&mut self) -> SnapResult<i16> {
        self.take().map(i16::from_be_bytes)
    }

    fn f32(&mut self) -> SnapResult<f32> {
        self.take().map(f32::from_be_bytes)
    }
}

/// 3x4 仿射变换 `p' = m * p + t`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Affine {
    /// 线性部分.
    pub m: [[f64; 3]; 3],

    /// 平移部分.
    pub t: [f64; 3],
}

impl Affine {
    /// 作用于点 `p`.
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let mut out = self.t;
        for (r, o) in out.iter_mut().enumerate() {
            *o += (0..3).map(|c| self.m[r][c] * p[c]).sum::<f64>();
        }
        out
    }

    /// 逆变换. 线性部分奇异时返回 `None`.
    pub fn inverse(&self) -> Option<Affine> {
        let m = &self.m;
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        if det.abs() < f64::EPSILON {
            return None;
        }
        let mut inv = [[0.0; 3]; 3];
        for (r, row) in inv.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                // 伴随矩阵的转置
                let (r1, r2) = ((c + 1) % 3, (c + 2) % 3);
                let (c1, c2) = ((r + 1) % 3, (r + 2) % 3);
                *v = (m[r1][c1] * m[r2][c2] - m[r1][c2] * m[r2][c1]) / det;
            }
        }
        let mut t = [0.0; 3];
        for (r, tv) in t.iter_mut().enumerate() {
            *tv = -(0..3).map(|c| inv[r][c] * self.t[c]).sum::<f64>();
        }
        Some(Affine { m: inv, t })
    }

    /// 先作用 `first`, 再作用 `self`.
    pub fn after(&self, first: &Affine) -> Affine {
        let mut m = [[0.0; 3]; 3];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (0..3).map(|k| self.m[r][k] * first.m[k][c]).sum();
            }
        }
        Affine {
            m,
            t: self.apply(first.t),
        }
    }
}

/// MGH 头部中与空间几何相关的字段.
#[derive(Clone, Debug, PartialEq)]
pub struct MghHeader {
    /// 宽, 高, 深, 帧数.
    pub dims: [usize; 4],

    /// 体素数据类型代码.
    pub dtype: i32,

    /// 体素间距 (mm).
    pub spacing: [f32; 3],

    /// 方向余弦: `mdc[c]` 为第 `c` 个体素轴在 RAS 坐标系中的单位方向.
    pub mdc: [[f32; 3]; 3],

    /// 体数据中心的 RAS 坐标.
    pub c_ras: [f32; 3],
}

impl MghHeader {
    /// FreeSurfer 在 `goodRASflag` 为 0 时采用的 LIA 方向.
    const DEFAULT_MDC: [[f32; 3]; 3] = [[-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];

    fn parse(buf: &[u8]) -> SnapResult<Self> {
        let mut cur = BeCursor::new(buf);
        let version = cur.i32()?;
        if version != 1 {
            return Err(SnapError::Mgh(format!("unsupported version {version}")));
        }
        let mut dims = [0usize; 4];
        for d in dims.iter_mut() {
            let v = cur.i32()?;
            *d = usize::try_from(v)
                .ok()
                .filter(|&v| v > 0)
                .ok_or_else(|| SnapError::Mgh(format!("invalid dimension {v}")))?;
        }
        let dtype = cur.i32()?;
        let _dof = cur.i32()?;
        let good_ras = cur.i16()? > 0;

        let mut spacing = [1.0f32; 3];
        let mut mdc = Self::DEFAULT_MDC;
        let mut c_ras = [0.0f32; 3];
        if good_ras {
            for s in spacing.iter_mut() {
                *s = cur.f32()?;
            }
            for axis in mdc.iter_mut() {
                for v in axis.iter_mut() {
                    *v = cur.f32()?;
                }
            }
            for v in c_ras.iter_mut() {
                *v = cur.f32()?;
            }
        }
        Ok(Self {
            dims,
            dtype,
            spacing,
            mdc,
            c_ras,
        })
    }

    /// 体素数据所占字节数.
    fn payload_len(&self) -> SnapResult<usize> {
        let unit: usize = match self.dtype {
            MRI_UCHAR => 1,
            MRI_SHORT => 2,
            MRI_INT | MRI_FLOAT => 4,
            other => return Err(SnapError::Mgh(format!("unsupported data type {other}"))),
        };
        self.dims
            .iter()
            .try_fold(unit, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| SnapError::Mgh(format!("payload size overflows for dimensions {:?}", self.dims)))
    }

    /// 空间形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        (self.dims[0], self.dims[1], self.dims[2])
    }

    /// 体素坐标到 RAS 坐标的变换.
    pub fn vox2ras(&self) -> Affine {
        let mut m = [[0.0f64; 3]; 3];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = f64::from(self.mdc[c][r]) * f64::from(self.spacing[c]);
            }
        }
        let center = [
            self.dims[0] as f64 / 2.0,
            self.dims[1] as f64 / 2.0,
            self.dims[2] as f64 / 2.0,
        ];
        let mut t = [0.0f64; 3];
        for (r, tv) in t.iter_mut().enumerate() {
            *tv = f64::from(self.c_ras[r]) - (0..3).map(|c| m[r][c] * center[c]).sum::<f64>();
        }
        Affine { m, t }
    }
}

/// 按大端类型 `T` 解码, 并转为 `f32`.
fn decode<const N: usize, T: ToPrimitive>(payload: &[u8], from_be: fn([u8; N]) -> T) -> Vec<f32> {
    payload
        .chunks_exact(N)
        .map(|c| {
            let mut b = [0u8; N];
            b.copy_from_slice(c);
            from_be(b).to_f32().unwrap_or(0.0)
        })
        .collect()
}

/// 带几何信息的 MGH 体数据. 多帧时保存全部帧.
#[derive(Clone, Debug)]
pub struct MghVolume {
    header: MghHeader,
    frames: Vec<Volume>,
}

impl MghVolume {
    /// 打开 `.mgh` 或 `.mgz` 文件. 是否压缩由 gzip 魔数判断.
    pub fn open<P: AsRef<Path>>(path: P) -> SnapResult<Self> {
        let mut raw = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut raw)?;
        if raw.starts_with(&[0x1f, 0x8b]) {
            let mut inflated = Vec::new();
            GzDecoder::new(raw.as_slice()).read_to_end(&mut inflated)?;
            raw = inflated;
        }
        Self::from_bytes(&raw)
    }

    /// 从未压缩的 MGH 字节流解析.
    pub fn from_bytes(buf: &[u8]) -> SnapResult<Self> {
        let header = MghHeader::parse(buf)?;
        let len = header.payload_len()?;
        let payload = buf
            .get(HEADER_LEN..HEADER_LEN + len)
            .ok_or_else(|| SnapError::Mgh(format!("expected {len} bytes of voxel data")))?;
        let values = match header.dtype {
            MRI_UCHAR => decode::<1, u8>(payload, u8::from_be_bytes),
            MRI_SHORT => decode::<2, i16>(payload, i16::from_be_bytes),
            MRI_INT => decode::<4, i32>(payload, i32::from_be_bytes),
            _ => decode::<4, f32>(payload, f32::from_be_bytes),
        };
        let [w, h, d, f] = header.dims;
        let data = Array4::from_shape_vec((w, h, d, f).f(), values)
            .map_err(|e| SnapError::Mgh(e.to_string()))?;
        let frames = data
            .axis_iter(NdAxis(3))
            .map(|frame| Volume::new(frame.to_owned()))
            .collect();
        Ok(Self { header, frames })
    }

    /// 头部信息.
    #[inline]
    pub fn header(&self) -> &MghHeader {
        &self.header
    }

    /// 体素坐标到 RAS 坐标的变换.
    #[inline]
    pub fn vox2ras(&self) -> Affine {
        self.header.vox2ras()
    }

    /// 第一帧.
    #[inline]
    pub fn volume(&self) -> &Volume {
        &self.frames[0]
    }

    /// 拆出全部帧.
    #[inline]
    pub fn into_frames(self) -> Vec<Volume> {
        self.frames
    }

    /// 以最近邻插值将第一帧重采样到 `target` 的体素网格上.
    ///
    /// 落在本体数据之外的体素为 0.
    pub fn resample_like(&self, target: &MghVolume) -> SnapResult<MghVolume> {
        let ras2vox = self
            .vox2ras()
            .inverse()
            .ok_or_else(|| SnapError::Mgh("singular orientation matrix".to_string()))?;
        let tgt2src = ras2vox.after(&target.vox2ras());
        let src = self.volume().data();
        let lookup = |(i, j, k): Idx3d| -> f32 {
            let p = tgt2src.apply([i as f64, j as f64, k as f64]);
            let idx = p.map(|v| v.round());
            if idx.iter().any(|&v| v < 0.0) {
                return 0.0;
            }
            src.get((idx[0] as usize, idx[1] as usize, idx[2] as usize))
                .copied()
                .unwrap_or(0.0)
        };

        let shape = target.header.shape();
        let mut out = Array3::zeros(shape);
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                ndarray::Zip::indexed(&mut out).par_for_each(|pos, v| *v = lookup(pos));
            } else {
                ndarray::Zip::indexed(&mut out).for_each(|pos, v| *v = lookup(pos));
            }
        }

        let mut header = target.header.clone();
        header.dims[3] = 1;
        header.dtype = self.header.dtype;
        Ok(MghVolume {
            header,
            frames: vec![Volume::new(out)],
        })
    }

    /// 重排并翻转体素轴, 使第 0/1/2 维分别最接近 R/A/S 方向.
    ///
    /// 斜切严重以致无法确定对应关系时, 原样返回.
    pub fn to_ras(&self) -> MghVolume {
        let mut perm = [usize::MAX; 3];
        let mut flip = [false; 3];
        for (c, dir) in self.header.mdc.iter().enumerate() {
            let (r, v) = dir
                .iter()
                .enumerate()
                .fold((0, 0.0f32), |best, (r, &v)| if v.abs() > best.1.abs() { (r, v) } else { best });
            if perm[r] != usize::MAX {
                log::warn!("oblique MGH orientation {:?}, keeping voxel order", self.header.mdc);
                return self.clone();
            }
            perm[r] = c;
            flip[r] = v < 0.0;
        }

        let frames = self
            .frames
            .iter()
            .map(|f| {
                let mut data = f.data().to_owned().permuted_axes(perm);
                for (r, &fl) in flip.iter().enumerate() {
                    if fl {
                        data.invert_axis(NdAxis(r));
                    }
                }
                Volume::new(data)
            })
            .collect();

        let mut header = self.header.clone();
        for r in 0..3 {
            let sign = if flip[r] { -1.0 } else { 1.0 };
            header.dims[r] = self.header.dims[perm[r]];
            header.spacing[r] = self.header.spacing[perm[r]];
            header.mdc[r] = self.header.mdc[perm[r]].map(|v| v * sign);
        }
        MghVolume { header, frames }
    }
}

impl VolumeShape for MghVolume {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.header.shape()
    }
}
