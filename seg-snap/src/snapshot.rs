//! 流水线入口: 从体数据, 本地文件或 XNAT 归档生成快照.

use crate::compose::{self, OutputNames};
use crate::consts::blend::OPACITY;
use crate::consts::layout::{DPI, MONTAGE_WIDTH};
use crate::data::{SegStack, SegmentationKind, Volume, VolumeShape};
use crate::render::{self, AxisPanels, PanelLayout};
use crate::xnat::{self, Archive, LocateOptions};
use crate::{Axis, RowSizes, SliceSelection, SnapError, SnapResult};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// 快照选项.
#[derive(Clone, Debug)]
pub struct SnapshotOptions {
    /// 输出路径. 为 `None` 时创建一个持久的临时文件.
    pub savefig: Option<PathBuf>,

    /// 切片选择.
    pub slices: SliceSelection,

    /// 渲染的方向及其顺序.
    pub axes: Vec<Axis>,

    /// 是否叠加在原始扫描上.
    pub raw: bool,

    /// 叠加层不透明度 (%).
    pub opacity: u8,

    /// 是否输出 GIF 动画.
    pub animated: bool,

    /// 每行切片数.
    pub rowsize: RowSizes,

    /// 面板宽度 (英寸), 替换所有方向的默认值.
    pub figsize: Option<f32>,

    /// 渲染分辨率.
    pub dpi: u32,

    /// 最终合成图宽度 (像素).
    pub width: u32,

    /// 是否显示进度条.
    pub progress: bool,

    /// 只绘制分割区域的轮廓.
    pub contours: bool,

    /// 同一方向上的非空切片使用相同的包围盒.
    pub samebox: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            savefig: None,
            slices: SliceSelection::Auto,
            axes: Axis::ALL.to_vec(),
            raw: true,
            opacity: OPACITY,
            animated: false,
            rowsize: RowSizes::Default,
            figsize: None,
            dpi: DPI,
            width: MONTAGE_WIDTH,
            progress: true,
            contours: false,
            samebox: false,
        }
    }
}

impl SnapshotOptions {
    /// 是否使用背景. 动画必须有背景, 故 `animated` 时总为 `true`.
    #[inline]
    pub fn uses_background(&self) -> bool {
        self.raw || self.animated
    }

    /// 该方向的面板布局.
    fn layout(&self, axis: Axis) -> PanelLayout {
        PanelLayout {
            contours: self.contours,
            samebox: self.samebox,
            ..PanelLayout::for_axis(axis, &self.rowsize, self.figsize, self.dpi)
        }
    }

    /// 确定输出路径. 未给出时创建后缀为 `.gif` 或 `.jpg` 的持久临时文件.
    fn output_path(&self) -> SnapResult<PathBuf> {
        match &self.savefig {
            Some(p) => Ok(p.clone()),
            None => {
                let suffix = if self.animated { ".gif" } else { ".jpg" };
                let tmp = tempfile::Builder::new().suffix(suffix).tempfile()?;
                tmp.into_temp_path().keep().map_err(|e| SnapError::Io(e.error))
            }
        }
    }
}

/// 生成的文件.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotOutput {
    /// 叠加层总图.
    pub overlay: PathBuf,

    /// 背景总图.
    pub background: Option<PathBuf>,

    /// 混合静态图.
    pub fusion: Option<PathBuf>,

    /// GIF 动画.
    pub animation: Option<PathBuf>,
}

impl SnapshotOutput {
    /// 主要结果: 有动画时为动画, 否则有背景时为混合图, 否则为叠加层总图.
    pub fn primary(&self) -> &Path {
        self.animation
            .as_deref()
            .or(self.fusion.as_deref())
            .unwrap_or(&self.overlay)
    }

    /// 全部生成的文件.
    pub fn files(&self) -> Vec<&Path> {
        std::iter::once(self.overlay.as_path())
            .chain(self.background.as_deref())
            .chain(self.fusion.as_deref())
            .chain(self.animation.as_deref())
            .collect()
    }
}

/// 拼接为 `output` 的中间文件. 在 drop 时删除, 出错提前返回时也不会残留.
fn montage_part<P: AsRef<Path>>(inputs: &[P], width: u32, output: PathBuf) -> SnapResult<TempPath> {
    let part = TempPath::try_from_path(output)?;
    compose::montage(inputs, width, &part)?;
    Ok(part)
}

/// 拼接后删除输入文件.
fn montage_and_remove(inputs: Vec<TempPath>, width: u32, output: &Path) -> SnapResult<()> {
    compose::montage(&inputs, width, output)?;
    for p in inputs {
        p.close()?;
    }
    Ok(())
}

/// 由已加载的叠加层和背景生成快照.
///
/// 背景仅在 [`SnapshotOptions::uses_background`] 时使用; `animated` 而不 `raw`
/// 时记录警告并按 `raw` 处理. 没有切片的方向被跳过.
pub fn snap_volumes(stack: &SegStack, background: Option<&Volume>, options: &SnapshotOptions) -> SnapResult<SnapshotOutput> {
    if options.animated && !options.raw {
        log::warn!("animated cannot be true with raw set to false, switching raw to true");
    }
    let background = background.filter(|_| options.uses_background());
    if let Some(bg) = background {
        stack.check_background(bg)?;
    }
    if options.opacity > 100 {
        return Err(SnapError::InvalidOpacity(options.opacity));
    }
    let ramp = match (options.animated, background) {
        (true, Some(_)) => Some(compose::opacity_ramp(options.opacity)?),
        (true, None) => {
            log::warn!("animation requires a background image, writing a still snapshot");
            None
        }
        _ => None,
    };

    let out = options.output_path()?;
    let names = OutputNames::new(&out);
    let shape = stack.shape();

    let selections = options
        .axes
        .iter()
        .map(|&axis| Ok((axis, options.slices.resolve(axis, shape)?)))
        .collect::<SnapResult<Vec<_>>>()?;
    let total: usize = selections.iter().map(|(_, s)| s.len()).sum();
    let passes = if background.is_some() { 2 } else { 1 };
    let progress = render::slice_progress((total * passes) as u64, options.progress);

    let mut overlay_parts = Vec::new();
    let mut background_parts = Vec::new();
    for (axis, slices) in selections.iter() {
        let (axis, slices) = (*axis, slices.as_slice());
        if slices.is_empty() {
            log::warn!("no slice to render along axis {axis}, skipped");
            continue;
        }
        let layout = options.layout(axis);
        let panels = render::render_overlay_panels(stack, axis, slices, &layout, &progress)?;
        overlay_parts.push(montage_part(&panels.paths(), options.width, names.overlay_axis(axis))?);

        if let Some(bg) = background {
            let bg_panels: AxisPanels =
                render::render_background_panels(bg, axis, slices, panels.boxes(), &layout, &progress)?;
            background_parts.push(montage_part(&bg_panels.paths(), options.width, names.background_axis(axis))?);
            bg_panels.close()?;
        }
        panels.close()?;
    }
    progress.finish_and_clear();

    if overlay_parts.is_empty() {
        return Err(SnapError::NothingToCompose(out));
    }
    let overlay = names.overlay();
    montage_and_remove(overlay_parts, options.width, &overlay)?;

    let mut output = SnapshotOutput {
        overlay,
        background: None,
        fusion: None,
        animation: None,
    };
    if background.is_none() {
        log::info!("Saved in {}", output.primary().display());
        return Ok(output);
    }

    let bg_out = names.background();
    montage_and_remove(background_parts, options.width, &bg_out)?;
    match ramp {
        Some(ramp) => {
            let frames = ramp
                .iter()
                .enumerate()
                .map(|(i, &o)| {
                    let frame = TempPath::try_from_path(names.fusion_frame(i))?;
                    compose::blend(&output.overlay, &bg_out, o, &frame)?;
                    Ok(frame)
                })
                .collect::<SnapResult<Vec<_>>>()?;
            let gif = names.animation();
            compose::animate(&frames, &gif)?;
            for f in frames {
                f.close()?;
            }
            output.animation = Some(gif);
        }
        None => {
            let fusion = names.fusion();
            compose::blend(&output.overlay, &bg_out, options.opacity, &fusion)?;
            output.fusion = Some(fusion);
        }
    }
    output.background = Some(bg_out);
    log::info!("Saved in {}", output.primary().display());
    Ok(output)
}

/// 由本地分割文件 (及可选背景) 生成快照.
///
/// 单个 4D 文件按帧拆分为通道; 单个离散标签图按调色板着色.
pub fn plot_segment_files<P: AsRef<Path>>(
    segmentations: &[P],
    background: Option<&Path>,
    options: &SnapshotOptions,
) -> SnapResult<SnapshotOutput> {
    let volumes = xnat::load_segmentations(segmentations)?;
    let stack = SegStack::build(&volumes, SegmentationKind::detect(&volumes))?;
    let bg = match background {
        Some(p) if options.uses_background() => Some(Volume::open(p)?),
        _ => None,
    };
    snap_volumes(&stack, bg.as_ref(), options)
}

/// XNAT 快照选项.
#[derive(Clone, Debug)]
pub struct XnatSnapOptions {
    /// 分割资源名.
    pub resource_name: String,

    /// 是否只使用本地已下载的文件.
    pub cache: bool,

    /// 下载目录. 为 `None` 时使用系统临时目录.
    pub dest: Option<PathBuf>,

    /// 定位选项 (序列名, 背景扫描, FreeSurfer 原始空间).
    pub locate: LocateOptions,

    /// 快照选项.
    pub snapshot: SnapshotOptions,
}

impl Default for XnatSnapOptions {
    fn default() -> Self {
        Self {
            resource_name: crate::consts::xnat::DEFAULT_RESOURCE.to_string(),
            cache: false,
            dest: None,
            locate: LocateOptions::default(),
            snapshot: SnapshotOptions::default(),
        }
    }
}

/// 从归档下载实验 `experiment` 的分割结果并生成快照.
///
/// `animated` 而不 `raw` 时同样下载背景.
pub fn plot_segment<A: Archive + ?Sized>(archive: &A, experiment: &str, options: &XnatSnapOptions) -> SnapResult<SnapshotOutput> {
    let snapshot = &options.snapshot;
    let dest = options.dest.clone().unwrap_or_else(std::env::temp_dir);
    let plan = xnat::locate(experiment, &options.resource_name, &dest, snapshot.uses_background(), &options.locate)?;
    log::info!(
        "{} file(s) to fetch for {experiment}/{}",
        plan.files().count(),
        options.resource_name
    );
    let fetched = xnat::fetch(archive, &plan, options.cache)?;
    if plan.reg_to_native() {
        log::info!("freesurfer_reg_to_native: true");
    }
    let (stack, background) = fetched.load()?;
    snap_volumes(&stack, background.as_ref(), snapshot)
}
