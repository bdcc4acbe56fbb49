use super::locate::{FetchPlan, PlannedFile, ResourceKind, Source};
use super::{Archive, RemoteFile};
use crate::consts::xnat::{ANTS_RESOURCE, NIFTI_RESOURCE};
use crate::data::mgh::MghVolume;
use crate::data::{load_channels, SegStack, SegmentationKind, Volume};
use crate::{SnapError, SnapResult};
use std::path::{Path, PathBuf};

/// 已下载 (或已在本地缓存) 的文件.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedFiles {
    /// 资源种类.
    pub kind: ResourceKind,

    /// 背景.
    pub background: Option<PathBuf>,

    /// 分割文件, 按通道顺序.
    pub segmentations: Vec<PathBuf>,

    /// FreeSurfer 原始空间的参考网格.
    pub reference: Option<PathBuf>,
}

/// 找到实验中序列为 `sequence` 的唯一有效扫描, 返回其 ID.
fn unique_scan<A: Archive + ?Sized>(archive: &A, experiment: &str, sequence: &str) -> SnapResult<String> {
    let mut found: Vec<String> = archive
        .scans(experiment)?
        .into_iter()
        .filter(|s| s.is_sequence(sequence) && s.is_valid())
        .map(|s| s.id)
        .collect();
    if found.len() != 1 {
        return Err(SnapError::AmbiguousScan {
            experiment: experiment.to_string(),
            sequence: sequence.to_string(),
            found: found.len(),
        });
    }
    Ok(found.remove(0))
}

fn first_match(files: Vec<RemoteFile>, resource: &str, pattern: &str) -> SnapResult<RemoteFile> {
    files.into_iter().next().ok_or_else(|| SnapError::NoMatchingFile {
        resource: resource.to_string(),
        pattern: pattern.to_string(),
    })
}

/// 将计划中的一个来源解析为归档中的具体文件.
pub fn resolve_scan_file<A: Archive + ?Sized>(archive: &A, experiment: &str, source: &Source) -> SnapResult<RemoteFile> {
    match source {
        Source::T1 { sequence } => {
            let scan = unique_scan(archive, experiment, sequence)?;
            let pattern = "*.nii.gz";
            let files = archive.scan_files(experiment, &scan, NIFTI_RESOURCE, pattern)?;
            first_match(files, NIFTI_RESOURCE, pattern)
        }
        Source::T2InT1Space { sequence } => {
            let scan = unique_scan(archive, experiment, sequence)?;
            let pattern = format!("*{scan}*T1space.nii.gz");
            let files = archive.resource_files(experiment, ANTS_RESOURCE, &pattern)?;
            first_match(files, ANTS_RESOURCE, &pattern)
        }
        Source::Resource { resource, pattern } => {
            let files = archive.resource_files(experiment, resource, pattern)?;
            first_match(files, resource, pattern)
        }
    }
}

/// 执行下载计划.
///
/// `cache` 为 `true` 时不访问归档, 只检查每个本地文件都已存在, 否则返回
/// [`SnapError::MissingFile`]. 为 `false` 时解析并下载全部文件.
pub fn fetch<A: Archive + ?Sized>(archive: &A, plan: &FetchPlan, cache: bool) -> SnapResult<FetchedFiles> {
    let get = |f: &PlannedFile| -> SnapResult<PathBuf> {
        if cache {
            if !f.local.is_file() {
                return Err(SnapError::MissingFile(f.local.clone()));
            }
        } else {
            let remote = resolve_scan_file(archive, &plan.experiment, &f.source)?;
            if let Some(parent) = f.local.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            log::info!("Downloading {} -> {}", remote.name, f.local.display());
            archive.download(&remote, &f.local)?;
        }
        Ok(f.local.clone())
    };

    Ok(FetchedFiles {
        kind: plan.kind,
        background: plan.background.as_ref().map(&get).transpose()?,
        segmentations: plan.segmentations.iter().map(&get).collect::<SnapResult<_>>()?,
        reference: plan.reference.as_ref().map(&get).transpose()?,
    })
}

impl FetchedFiles {
    /// 加载为叠加层和背景.
    ///
    /// FreeSurfer 标签在有参考网格时重采样到该网格 (原始空间, 背景为原始扫描),
    /// 否则标签和 `nu.mgz` 背景都被重定向到 RAS.
    pub fn load(&self) -> SnapResult<(SegStack, Option<Volume>)> {
        let background = |p: &PathBuf| Volume::open(p);

        match self.kind {
            ResourceKind::FreeSurfer6 => {
                let labels_path = self
                    .segmentations
                    .first()
                    .ok_or(SnapError::NoChannels)?;
                let labels = MghVolume::open(labels_path)?;
                match &self.reference {
                    Some(reference) => {
                        let grid = MghVolume::open(reference)?;
                        let native = labels.resample_like(&grid)?;
                        let bg = self.background.as_ref().map(background).transpose()?;
                        Ok((SegStack::from_labels(native.volume()), bg))
                    }
                    None => {
                        let bg = match &self.background {
                            Some(p) => Some(MghVolume::open(p)?.to_ras().volume().clone()),
                            None => None,
                        };
                        Ok((SegStack::from_labels(labels.to_ras().volume()), bg))
                    }
                }
            }
            kind => {
                let volumes = load_segmentations(&self.segmentations)?;
                let seg_kind = if kind.is_label_map() {
                    SegmentationKind::Labels
                } else {
                    SegmentationKind::Probabilities
                };
                let stack = SegStack::build(&volumes, seg_kind)?;
                let bg = self.background.as_ref().map(background).transpose()?;
                Ok((stack, bg))
            }
        }
    }
}

/// 加载分割文件. 单个 4D 文件会被拆分为多个通道.
pub(crate) fn load_segmentations<P: AsRef<Path>>(paths: &[P]) -> SnapResult<Vec<Volume>> {
    match paths {
        [single] => load_channels(single),
        many => many.iter().map(Volume::open).collect(),
    }
}
