//! 切片的可视化与持久化存储.

use super::{BackgroundSlice, OverlaySlice};
use image::{ImageResult, Rgb, RgbImage};
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式转为图像的切片对象.
///
/// 对于 [`OverlaySlice`], 三个通道被截断到 `[0, 1]` 后线性映射到 `0..=255`;
/// 对于 [`BackgroundSlice`], 使用切片自身最小/最大值作为灰度窗.
pub trait ImgWriteVis {
    /// 按照可视化规则转为 RGB 图像.
    fn to_image(&self) -> RgbImage;

    /// 按照可视化规则将图片保存到 `path` 路径. 格式由扩展名决定.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.to_image().save(path)
    }
}

/// 概率值到 8 位像素值. NaN 视为 0.
#[inline]
fn channel_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

impl ImgWriteVis for OverlaySlice {
    fn to_image(&self) -> RgbImage {
        let (height, width) = self.shape();
        let data = self.data();
        RgbImage::from_fn(width as u32, height as u32, |w, h| {
            let (h, w) = (h as usize, w as usize);
            Rgb([
                channel_u8(data[(h, w, 0)]),
                channel_u8(data[(h, w, 1)]),
                channel_u8(data[(h, w, 2)]),
            ])
        })
    }
}

impl ImgWriteVis for BackgroundSlice {
    /// 灰度图. 各值相同的切片整体为黑色.
    fn to_image(&self) -> RgbImage {
        use crate::consts::gray::BLACK;

        let (height, width) = self.shape();
        let window = self.auto_window();
        let data = self.data();
        RgbImage::from_fn(width as u32, height as u32, |w, h| {
            let v = data[(h as usize, w as usize)];
            let gray = window.and_then(|win| win.eval(v)).unwrap_or(BLACK);
            Rgb([gray; 3])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_overlay_pixels() {
        let mut data = Array3::zeros((2, 3, 3));
        data[(0, 0, 0)] = 1.0;
        data[(0, 1, 1)] = 0.5;
        data[(1, 2, 2)] = 7.0;
        data[(1, 0, 0)] = f32::NAN;
        let img = OverlaySlice::new(data).to_image();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([0, 127, 0]));
        assert_eq!(img.get_pixel(2, 1), &Rgb([0, 0, 255]));
        assert_eq!(img.get_pixel(0, 1), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_background_auto_contrast() {
        let data = Array2::from_shape_vec((1, 3), vec![10.0, 20.0, 30.0]).unwrap();
        let img = BackgroundSlice::new(data).to_image();
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([127, 127, 127]));
        assert_eq!(img.get_pixel(2, 0), &Rgb([255, 255, 255]));

        let flat = BackgroundSlice::new(Array2::from_elem((2, 2), 4.0)).to_image();
        assert!(flat.pixels().all(|p| p == &Rgb([0, 0, 0])));
    }
}
