//! 面板渲染: 把一组切片按行排版为临时 JPEG 面板.

mod glyph;
mod panel;

pub use panel::{render_background_panels, render_overlay_panels, AxisPanels, PanelLayout};

use indicatif::{ProgressBar, ProgressStyle};

/// 创建以切片为单位的进度条. `visible` 为 `false` 时返回隐藏的进度条.
pub fn slice_progress(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} slices") {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}
