use super::glyph;
use crate::consts::gray::WHITE;
use crate::consts::layout::{DPI, FIG_HEIGHT, LABEL_FONT_PT};
use crate::data::{BoundingBox, ImgWriteVis, SegStack, Volume};
use crate::{Axis, RowSizes, SnapResult};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use indicatif::ProgressBar;
use std::path::Path;
use tempfile::TempPath;

/// 单个方向上的面板布局及叠加层的绘制方式.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PanelLayout {
    /// 每个面板 (每行) 的切片数, 至少为 1.
    pub row_size: usize,

    /// 面板宽度, 以英寸为单位.
    pub fig_width: f32,

    /// 面板高度, 以英寸为单位.
    pub fig_height: f32,

    /// 渲染分辨率.
    pub dpi: u32,

    /// 只绘制分割区域的轮廓.
    pub contours: bool,

    /// 所有非空切片使用同一个包围盒 (各切片包围盒的并集).
    pub samebox: bool,
}

impl PanelLayout {
    /// 按方向默认值创建布局. `figsize` 若给出则替换所有方向的宽度.
    pub fn for_axis(axis: Axis, rows: &RowSizes, figsize: Option<f32>, dpi: u32) -> Self {
        Self {
            row_size: rows.get(axis),
            fig_width: figsize.unwrap_or(axis.default_fig_width()),
            fig_height: FIG_HEIGHT,
            dpi,
            contours: false,
            samebox: false,
        }
    }

    /// 面板的像素尺寸 `(宽, 高)`, 每个分量至少为 1.
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inch: f32| ((inch * self.dpi as f32).round() as u32).max(1);
        (px(self.fig_width), px(self.fig_height))
    }

    /// `n_slices` 个切片需要的面板数.
    #[inline]
    pub fn panel_count(&self, n_slices: usize) -> usize {
        n_slices.div_ceil(self.row_size.max(1))
    }

    /// 编号字形的放大倍数.
    fn label_scale(&self) -> u32 {
        let px = LABEL_FONT_PT * self.dpi as f32 / 72.0;
        ((px / glyph::GLYPH_H as f32).round() as u32).max(1)
    }
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self::for_axis(Axis::Axial, &RowSizes::Default, None, DPI)
    }
}

/// 单个方向上渲染出的全部面板 (临时 JPEG 文件), 以及每个切片所用的包围盒.
///
/// 面板文件在 drop 时删除.
#[derive(Debug)]
pub struct AxisPanels {
    axis: Axis,
    panels: Vec<TempPath>,
    boxes: Vec<Option<BoundingBox>>,
}

impl AxisPanels {
    /// 切片方向.
    #[inline]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// 面板个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    /// 是否没有任何面板.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// 面板文件路径, 按行顺序.
    pub fn paths(&self) -> Vec<&Path> {
        self.panels.iter().map(|p| p.as_ref()).collect()
    }

    /// 每个切片 (按输入顺序) 的包围盒. 全零切片为 `None`.
    #[inline]
    pub fn boxes(&self) -> &[Option<BoundingBox>] {
        &self.boxes
    }

    /// 立即删除全部面板文件.
    pub fn close(self) -> SnapResult<()> {
        for p in self.panels {
            p.close()?;
        }
        Ok(())
    }
}

/// 等比缩放 `img` 使其恰好放入 `(cell_w, cell_h)`. 最近邻采样.
fn fit_into(img: &RgbImage, (cell_w, cell_h): (u32, u32)) -> RgbImage {
    let (w, h) = img.dimensions();
    let scale = f64::min(cell_w as f64 / w as f64, cell_h as f64 / h as f64);
    let nw = ((w as f64 * scale).round() as u32).clamp(1, cell_w);
    let nh = ((h as f64 * scale).round() as u32).clamp(1, cell_h);
    imageops::resize(img, nw, nh, FilterType::Nearest)
}

/// 将一行切片图像排入面板并写入临时文件 `{axis}{chunk}_*.jpg`.
///
/// `cells` 中为 `None` 的格子保持黑色.
fn compose_row(
    axis: Axis,
    chunk: usize,
    cells: &[Option<(usize, RgbImage)>],
    layout: &PanelLayout,
) -> SnapResult<TempPath> {
    let (fig_w, fig_h) = layout.pixel_size();
    let n = cells.len().max(1) as u32;
    let cell_w = (fig_w / n).max(1);
    let scale = layout.label_scale();
    let margin = scale * 2;

    // 面板恰为各格子的并集
    let mut canvas = RgbImage::new(cell_w * n, fig_h);
    for (c, cell) in cells.iter().enumerate() {
        let Some((index, img)) = cell else {
            continue;
        };
        let fitted = fit_into(img, (cell_w, fig_h));
        let x0 = c as u32 * cell_w;
        let dx = (cell_w - fitted.width()) / 2;
        let dy = (fig_h - fitted.height()) / 2;
        imageops::overlay(&mut canvas, &fitted, (x0 + dx) as i64, dy as i64);
        glyph::draw_number(&mut canvas, *index, (x0 + margin, margin), scale, Rgb([WHITE; 3]));
    }

    let path = tempfile::Builder::new()
        .prefix(&format!("{axis}{chunk}_"))
        .suffix(".jpg")
        .tempfile()?
        .into_temp_path();
    canvas.save(&path)?;
    log::debug!("panel {axis}{chunk} -> {}", path.display());
    Ok(path)
}

/// 各切片的包围盒. `samebox` 时非空切片统一使用全部包围盒的并集.
fn slice_boxes(stack: &SegStack, axis: Axis, slices: &[usize], samebox: bool) -> Vec<Option<BoundingBox>> {
    let mut boxes: Vec<_> = slices
        .iter()
        .map(|&index| stack.slice_at(axis, index).bounding_box())
        .collect();
    if samebox {
        if let Some(shared) = boxes.iter().flatten().copied().reduce(|a, b| a.union(&b)) {
            boxes.iter_mut().flatten().for_each(|bb| *bb = shared);
        }
    }
    boxes
}

/// 渲染叠加层在 `axis` 方向上的面板.
///
/// 每个切片先按包围盒裁剪; 全零切片不绘制.
pub fn render_overlay_panels(
    stack: &SegStack,
    axis: Axis,
    slices: &[usize],
    layout: &PanelLayout,
    progress: &ProgressBar,
) -> SnapResult<AxisPanels> {
    let row_size = layout.row_size.max(1);
    let mut panels = Vec::with_capacity(layout.panel_count(slices.len()));
    let boxes = slice_boxes(stack, axis, slices, layout.samebox);

    for (chunk, (indices, bbs)) in slices.chunks(row_size).zip(boxes.chunks(row_size)).enumerate() {
        let mut cells = Vec::with_capacity(indices.len());
        for (&index, bb) in indices.iter().zip(bbs) {
            let cell = bb
                .as_ref()
                .and_then(|bb| stack.slice_at(axis, index).crop(bb))
                .map(|cropped| if layout.contours { cropped.contours() } else { cropped })
                .map(|cropped| (index, cropped.to_image()));
            if bb.is_none() {
                log::debug!("slice {axis}{index} is empty, skipped");
            }
            cells.push(cell);
            progress.inc(1);
        }
        panels.push(compose_row(axis, chunk, &cells, layout)?);
    }

    Ok(AxisPanels {
        axis,
        panels,
        boxes,
    })
}

/// 以叠加层的分组与包围盒渲染背景在 `axis` 方向上的面板.
///
/// `boxes` 应来自同一组 `slices` 的 [`render_overlay_panels`] 结果,
/// 背景切片不会计算自己的包围盒.
pub fn render_background_panels(
    background: &Volume,
    axis: Axis,
    slices: &[usize],
    boxes: &[Option<BoundingBox>],
    layout: &PanelLayout,
    progress: &ProgressBar,
) -> SnapResult<AxisPanels> {
    debug_assert_eq!(slices.len(), boxes.len());
    let row_size = layout.row_size.max(1);
    let mut panels = Vec::with_capacity(layout.panel_count(slices.len()));

    for (chunk, (indices, bbs)) in slices.chunks(row_size).zip(boxes.chunks(row_size)).enumerate() {
        let cells = indices
            .iter()
            .zip(bbs)
            .map(|(&index, bb)| {
                progress.inc(1);
                bb.as_ref().and_then(|bb| {
                    background
                        .slice_at(axis, index)
                        .crop(bb)
                        .map(|cropped| (index, cropped.to_image()))
                })
            })
            .collect::<Vec<_>>();
        panels.push(compose_row(axis, chunk, &cells, layout)?);
    }

    Ok(AxisPanels {
        axis,
        panels,
        boxes: boxes.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn blob_stack(shape: (usize, usize, usize)) -> SegStack {
        let c1 = Array3::from_shape_fn(shape, |(i, j, k)| {
            if (4..8).contains(&i) && (2..10).contains(&j) && (3..6).contains(&k) {
                0.9f32
            } else {
                0.0
            }
        });
        SegStack::from_channels(&[Volume::from_array(c1)]).unwrap()
    }

    fn small_layout(row_size: usize) -> PanelLayout {
        PanelLayout {
            row_size,
            fig_width: 2.0,
            fig_height: 0.5,
            dpi: 40,
            contours: false,
            samebox: false,
        }
    }

    #[test]
    fn test_layout() {
        let l = PanelLayout::for_axis(Axis::Sagittal, &RowSizes::Default, None, 300);
        assert_eq!(l.row_size, 6);
        assert_eq!(l.pixel_size(), (5400, 900));
        assert_eq!(l.panel_count(20), 4);
        assert_eq!(l.panel_count(0), 0);
        assert_eq!(l.label_scale(), 6);

        let o = PanelLayout::for_axis(Axis::Axial, &RowSizes::Uniform(4), Some(10.0), 100);
        assert_eq!(o.pixel_size(), (1000, 300));
        assert_eq!(o.panel_count(9), 3);
    }

    #[test]
    fn test_panel_counts_and_skips() {
        let stack = blob_stack((12, 12, 8));
        let slices = [2, 4, 5, 7, 9];
        let layout = small_layout(2);
        let pb = ProgressBar::hidden();
        let panels = render_overlay_panels(&stack, Axis::Sagittal, &slices, &layout, &pb).unwrap();
        assert_eq!(panels.len(), 3);
        assert_eq!(pb.position(), 5);

        let present: Vec<bool> = panels.boxes().iter().map(Option::is_some).collect();
        assert_eq!(present, [false, true, true, true, false]);
        assert!(panels.paths().iter().all(|p| p.exists()));

        let img = image::open(panels.paths()[0]).unwrap();
        assert_eq!((img.width(), img.height()), (80, 20));

        let paths: Vec<_> = panels.paths().iter().map(|p| p.to_path_buf()).collect();
        panels.close().unwrap();
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn test_background_shares_boxes() {
        let stack = blob_stack((12, 12, 8));
        let bg = Volume::from_array(Array3::from_shape_fn((12, 12, 8), |(i, j, k)| (i + j + k) as f32));
        let slices = [0, 3, 4];
        let layout = small_layout(3);
        let pb = ProgressBar::hidden();
        let over = render_overlay_panels(&stack, Axis::Axial, &slices, &layout, &pb).unwrap();
        let back = render_background_panels(&bg, Axis::Axial, &slices, over.boxes(), &layout, &pb).unwrap();
        assert_eq!(over.boxes(), back.boxes());
        assert_eq!(over.len(), back.len());
        assert_eq!(pb.position(), 6);

        let a = image::open(over.paths()[0]).unwrap();
        let b = image::open(back.paths()[0]).unwrap();
        assert_eq!((a.width(), a.height()), (b.width(), b.height()));
    }

    #[test]
    fn test_panel_name() {
        let stack = blob_stack((12, 12, 8));
        let pb = ProgressBar::hidden();
        let panels = render_overlay_panels(&stack, Axis::Coronal, &[3, 4], &small_layout(1), &pb).unwrap();
        let name = panels.paths()[1].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("C1_"));
        assert!(name.ends_with(".jpg"));
    }

    /// 红色通道超过一半的像素数.
    fn red_pixels(path: &Path) -> usize {
        image::open(path)
            .unwrap()
            .to_rgb8()
            .pixels()
            .filter(|p| p.0[0] > 128)
            .count()
    }

    #[test]
    fn test_samebox() {
        // 区域随切片变化: 第 k 层的列范围为 2..(4 + k)
        let shape = (12, 12, 6);
        let c1 = Array3::from_shape_fn(shape, |(i, j, k)| {
            if (3..6 + k).contains(&i) && (2..4 + k).contains(&j) && k != 2 {
                1.0f32
            } else {
                0.0
            }
        });
        let stack = SegStack::from_channels(&[Volume::from_array(c1)]).unwrap();
        let slices = [0, 1, 2, 5];
        let pb = ProgressBar::hidden();

        let own = render_overlay_panels(&stack, Axis::Axial, &slices, &small_layout(4), &pb).unwrap();
        assert_ne!(own.boxes()[0], own.boxes()[3]);

        let layout = PanelLayout {
            samebox: true,
            ..small_layout(4)
        };
        let shared = render_overlay_panels(&stack, Axis::Axial, &slices, &layout, &pb).unwrap();
        let expected = own.boxes()[0].unwrap().union(&own.boxes()[3].unwrap());
        assert_eq!(
            shared.boxes(),
            [Some(expected), Some(expected), None, Some(expected)]
        );

        // 背景沿用同一组包围盒
        let bg = Volume::from_array(Array3::from_elem(shape, 1.0f32));
        let back = render_background_panels(&bg, Axis::Axial, &slices, shared.boxes(), &layout, &pb).unwrap();
        assert_eq!(back.boxes(), shared.boxes());
    }

    #[test]
    fn test_contour_panels() {
        let stack = blob_stack((12, 12, 8));
        let pb = ProgressBar::hidden();
        let layout = PanelLayout {
            dpi: 80,
            ..small_layout(1)
        };
        let filled = render_overlay_panels(&stack, Axis::Axial, &[4], &layout, &pb).unwrap();
        let outline = PanelLayout { contours: true, ..layout };
        let edges = render_overlay_panels(&stack, Axis::Axial, &[4], &outline, &pb).unwrap();

        assert_eq!(filled.boxes(), edges.boxes());
        let (a, b) = (red_pixels(filled.paths()[0]), red_pixels(edges.paths()[0]));
        assert!(b > 0);
        assert!(b < a, "{b} >= {a}");
    }
}
