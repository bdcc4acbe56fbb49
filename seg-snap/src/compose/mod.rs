//! 图像合成: 纵向拼接, 透明度混合与 GIF 动画.

use crate::consts::blend::OPACITY_STEP;
use crate::{Axis, SnapError, SnapResult};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, Frame, Rgb, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// GIF 调色板量化速度 (1..=30, 越大越快).
const GIF_SPEED: i32 = 10;

/// 将 `inputs` 依次缩放到宽度 `width` (保持宽高比) 后纵向拼接, 黑色背景, 无间隔.
pub fn montage<P: AsRef<Path>>(inputs: &[P], width: u32, output: &Path) -> SnapResult<()> {
    if inputs.is_empty() {
        return Err(SnapError::NothingToCompose(output.to_path_buf()));
    }
    let width = width.max(1);
    let rows = inputs
        .iter()
        .map(|p| {
            let img = image::open(p)?.to_rgb8();
            let (w, h) = img.dimensions();
            let nh = ((h as f64 * width as f64 / w as f64).round() as u32).max(1);
            Ok(imageops::resize(&img, width, nh, FilterType::Triangle))
        })
        .collect::<SnapResult<Vec<_>>>()?;

    let height = rows.iter().map(|r| r.height()).sum();
    let mut canvas = RgbImage::new(width, height);
    let mut y = 0i64;
    for row in rows.iter() {
        imageops::overlay(&mut canvas, row, 0, y);
        y += row.height() as i64;
    }
    canvas.save(output)?;
    log::debug!("montage of {} images -> {}", inputs.len(), output.display());
    Ok(())
}

/// 以 `opacity`% 的不透明度将 `overlay` 叠加在 `background` 上 (居中).
///
/// 输出与背景同尺寸; 叠加图超出背景的部分被裁掉.
pub fn blend(overlay: &Path, background: &Path, opacity: u8, output: &Path) -> SnapResult<()> {
    if opacity > 100 {
        return Err(SnapError::InvalidOpacity(opacity));
    }
    let top = image::open(overlay)?.to_rgb8();
    let mut out = image::open(background)?.to_rgb8();
    dissolve(&mut out, &top, opacity);
    out.save(output)?;
    log::debug!("blend {}% -> {}", opacity, output.display());
    Ok(())
}

/// 就地混合. `opacity` 已校验.
fn dissolve(bottom: &mut RgbImage, top: &RgbImage, opacity: u8) {
    let alpha = f32::from(opacity) / 100.0;
    let (bw, bh) = bottom.dimensions();
    let (tw, th) = top.dimensions();
    let ox = (i64::from(bw) - i64::from(tw)) / 2;
    let oy = (i64::from(bh) - i64::from(th)) / 2;

    for (x, y, px) in top.enumerate_pixels() {
        let (u, v) = (i64::from(x) + ox, i64::from(y) + oy);
        if u < 0 || v < 0 || u >= i64::from(bw) || v >= i64::from(bh) {
            continue;
        }
        let dst = bottom.get_pixel_mut(u as u32, v as u32);
        let mixed: [u8; 3] = std::array::from_fn(|c| {
            (f32::from(px[c]) * alpha + f32::from(dst[c]) * (1.0 - alpha)).round() as u8
        });
        *dst = Rgb(mixed);
    }
}

/// 动画各帧的不透明度: 从 0 以 10 为步长升至 `opacity` (不含), 再从 `opacity` 降回.
///
/// 总帧数为 `2 * ceil(opacity / 10)`. `opacity` 为 0 时结果为空.
pub fn opacity_ramp(opacity: u8) -> SnapResult<Vec<u8>> {
    if opacity > 100 {
        return Err(SnapError::InvalidOpacity(opacity));
    }
    let up: Vec<u8> = (0..opacity).step_by(OPACITY_STEP as usize).collect();
    let down = up.iter().map(|o| opacity - o);
    Ok(up.iter().copied().chain(down).collect())
}

/// 将 `frames` 组装为无限循环, 帧间延迟为 0 的 GIF.
pub fn animate<P: AsRef<Path>>(frames: &[P], output: &Path) -> SnapResult<()> {
    if frames.is_empty() {
        return Err(SnapError::NothingToCompose(output.to_path_buf()));
    }
    let mut encoder = GifEncoder::new_with_speed(BufWriter::new(File::create(output)?), GIF_SPEED);
    encoder.set_repeat(Repeat::Infinite)?;
    for p in frames {
        let img = image::open(p)?.to_rgba8();
        encoder.encode_frame(Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(0, 1)))?;
    }
    log::debug!("{} frames -> {}", frames.len(), output.display());
    Ok(())
}

/// 由用户给出的输出路径派生出的各中间/最终文件名.
///
/// 只改写文件名主干和扩展名, 目录部分保持不变.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputNames {
    dir: PathBuf,
    stem: String,
}

impl OutputNames {
    /// 从输出路径 `out` 创建. 例如 `/tmp/snap.gif` 与 `/tmp/snap.jpg` 结果相同.
    pub fn new(out: &Path) -> Self {
        let dir = out.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = out
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        Self { dir, stem }
    }

    fn with(&self, suffix: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}{suffix}.{ext}", self.stem))
    }

    /// 叠加层总图 `s.jpg`.
    pub fn overlay(&self) -> PathBuf {
        self.with("", "jpg")
    }

    /// 叠加层单方向图 `s_{A}.jpg`.
    pub fn overlay_axis(&self, axis: Axis) -> PathBuf {
        self.with(&format!("_{axis}"), "jpg")
    }

    /// 背景总图 `s_orig.jpg`.
    pub fn background(&self) -> PathBuf {
        self.with("_orig", "jpg")
    }

    /// 背景单方向图 `s_orig_{A}.jpg`.
    pub fn background_axis(&self, axis: Axis) -> PathBuf {
        self.with(&format!("_orig_{axis}"), "jpg")
    }

    /// 混合静态图 `s_fusion.jpg`.
    pub fn fusion(&self) -> PathBuf {
        self.with("_fusion", "jpg")
    }

    /// 第 `i` 个动画帧 `s_fusion_{i:03}.jpg`.
    pub fn fusion_frame(&self, i: usize) -> PathBuf {
        self.with(&format!("_fusion_{i:03}"), "jpg")
    }

    /// 动画 `s.gif`.
    pub fn animation(&self) -> PathBuf {
        self.with("", "gif")
    }
}
