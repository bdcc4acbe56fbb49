use crate::consts::xnat::{T1_SEQUENCE, T2_SEQUENCE};
use crate::{SnapError, SnapResult};
use std::path::{Path, PathBuf};

/// 分割资源的种类. 由资源名决定.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResourceKind {
    /// SPM12 组织概率图 `c1`/`c2`/`c3`.
    Spm12,

    /// CAT12 组织概率图 `mri/p1`/`p2`/`p3`.
    Cat12,

    /// ASHS 海马亚区标签, 自带 TSE 背景.
    Ashs,

    /// FreeSurfer 6 的 `aparc+aseg` 标签.
    FreeSurfer6,
}

impl ResourceKind {
    /// 由资源名识别种类. 资源名中含 `SPM12`, `CAT12`, `FREESURFER6`
    /// 或等于 `ASHS`.
    pub fn parse(resource: &str) -> SnapResult<Self> {
        if resource.contains("SPM12") {
            Ok(Self::Spm12)
        } else if resource == "ASHS" {
            Ok(Self::Ashs)
        } else if resource.contains("FREESURFER6") {
            Ok(Self::FreeSurfer6)
        } else if resource.contains("CAT12") {
            Ok(Self::Cat12)
        } else {
            Err(SnapError::UnsupportedResource(resource.to_string()))
        }
    }

    /// 该资源的分割是否为离散标签图.
    #[inline]
    pub fn is_label_map(self) -> bool {
        matches!(self, Self::Ashs | Self::FreeSurfer6)
    }
}

/// 作为背景的原始扫描.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BackgroundScan {
    /// T1 扫描.
    #[default]
    T1,

    /// 配准到 T1 空间的 T2 扫描.
    T2,
}

/// 一个待下载文件在归档中的位置.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Source {
    /// 序列 `sequence` 对应的唯一有效扫描, 其 `NIFTI` 资源中第一个 `*.nii.gz`.
    T1 {
        /// 序列名.
        sequence: String,
    },

    /// 序列 `sequence` 对应的唯一有效扫描, 在实验 `ANTS` 资源中配准到 T1
    /// 空间的版本 `*{scan}*T1space.nii.gz`.
    T2InT1Space {
        /// 序列名.
        sequence: String,
    },

    /// 实验级资源 `resource` 中第一个匹配 `pattern` 的文件.
    Resource {
        /// 资源名.
        resource: String,
        /// glob 风格的模式.
        pattern: String,
    },
}

/// 一个计划中的文件: 归档位置与本地路径.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlannedFile {
    /// 归档中的位置.
    pub source: Source,

    /// 本地路径.
    pub local: PathBuf,
}

/// 定位选项.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocateOptions {
    /// T1 序列名.
    pub t1_sequence: String,

    /// T2 序列名.
    pub t2_sequence: String,

    /// 使用哪种原始扫描作为背景.
    pub background: BackgroundScan,

    /// FreeSurfer 标签是否重采样到原始 (native) 空间, 并以原始扫描为背景.
    pub freesurfer_reg_to_native: bool,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            t1_sequence: T1_SEQUENCE.to_string(),
            t2_sequence: T2_SEQUENCE.to_string(),
            background: BackgroundScan::T1,
            freesurfer_reg_to_native: false,
        }
    }
}

/// 某个实验/资源的下载计划. 不涉及任何网络访问.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchPlan {
    /// 实验 ID.
    pub experiment: String,

    /// 资源名.
    pub resource: String,

    /// 资源种类.
    pub kind: ResourceKind,

    /// 背景. 不需要背景时为 `None`.
    pub background: Option<PlannedFile>,

    /// 分割文件, 按通道顺序.
    pub segmentations: Vec<PlannedFile>,

    /// 重采样目标网格 (仅 FreeSurfer 配准到原始空间时存在).
    pub reference: Option<PlannedFile>,
}

impl FetchPlan {
    /// 计划中的全部文件: 背景, 分割, 参考网格.
    pub fn files(&self) -> impl Iterator<Item = &PlannedFile> {
        self.background
            .iter()
            .chain(self.segmentations.iter())
            .chain(self.reference.iter())
    }

    /// FreeSurfer 标签是否需要重采样到参考网格.
    #[inline]
    pub fn reg_to_native(&self) -> bool {
        self.reference.is_some()
    }
}

fn raw_background(experiment: &str, dest: &Path, opts: &LocateOptions) -> PlannedFile {
    match opts.background {
        BackgroundScan::T1 => PlannedFile {
            source: Source::T1 {
                sequence: opts.t1_sequence.clone(),
            },
            local: dest.join(format!("{experiment}_T1.nii.gz")),
        },
        BackgroundScan::T2 => PlannedFile {
            source: Source::T2InT1Space {
                sequence: opts.t2_sequence.clone(),
            },
            local: dest.join(format!("{experiment}_T2.nii.gz")),
        },
    }
}

fn in_resource(resource: &str, pattern: String, local: PathBuf) -> PlannedFile {
    PlannedFile {
        source: Source::Resource {
            resource: resource.to_string(),
            pattern,
        },
        local,
    }
}

/// 为实验 `experiment` 的资源 `resource` 生成下载计划, 本地文件位于 `dest`.
///
/// `raw` 为 `false` 时省略原始扫描背景; ASHS 和 FreeSurfer (非原始空间)
/// 的背景来自资源本身, 不受影响.
pub fn locate(experiment: &str, resource: &str, dest: &Path, raw: bool, opts: &LocateOptions) -> SnapResult<FetchPlan> {
    let kind = ResourceKind::parse(resource)?;
    let raw_bg = || raw.then(|| raw_background(experiment, dest, opts));
    let prefixed = |name: &str| dest.join(format!("{experiment}_{resource}_{name}"));

    let (background, segmentations, reference) = match kind {
        ResourceKind::Spm12 => {
            let channels = if resource == "SPM12_SEGMENT_T2T1" {
                ["c1", "filled_c2", "c3"]
            } else {
                ["c1", "c2", "c3"]
            };
            let segs: Vec<_> = channels
                .iter()
                .map(|c| in_resource(resource, format!("{c}*.nii.gz"), prefixed(&format!("{c}.nii.gz"))))
                .collect();
            (raw_bg(), segs, None)
        }
        ResourceKind::Cat12 => {
            let segs: Vec<_> = ["p1", "p2", "p3"]
                .iter()
                .map(|p| in_resource(resource, format!("mri/{p}*.nii.gz"), prefixed(&format!("{p}.nii.gz"))))
                .collect();
            (raw_bg(), segs, None)
        }
        ResourceKind::Ashs => {
            let file = |name: &str| in_resource(resource, format!("*{name}"), prefixed(name));
            (
                Some(file("tse.nii.gz")),
                vec![file("left_lfseg_corr_nogray.nii.gz")],
                None,
            )
        }
        ResourceKind::FreeSurfer6 => {
            let file = |name: &str| in_resource(resource, format!("*{name}"), dest.join(format!("{experiment}_{name}")));
            let labels = vec![file("aparc+aseg.mgz")];
            if opts.freesurfer_reg_to_native {
                (raw_bg(), labels, Some(file("rawavg.mgz")))
            } else {
                (Some(file("nu.mgz")), labels, None)
            }
        }
    };

    Ok(FetchPlan {
        experiment: experiment.to_string(),
        resource: resource.to_string(),
        kind,
        background,
        segmentations,
        reference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource_of(f: &PlannedFile) -> (&str, &str) {
        match &f.source {
            Source::Resource { resource, pattern } => (resource.as_str(), pattern.as_str()),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_resource_kind() {
        assert_eq!(ResourceKind::parse("SPM12_SEGMENT").unwrap(), ResourceKind::Spm12);
        assert_eq!(ResourceKind::parse("SPM12_SEGMENT_T2T1").unwrap(), ResourceKind::Spm12);
        assert_eq!(ResourceKind::parse("CAT12_SEGMENT").unwrap(), ResourceKind::Cat12);
        assert_eq!(ResourceKind::parse("ASHS").unwrap(), ResourceKind::Ashs);
        assert_eq!(ResourceKind::parse("FREESURFER6_HIRES").unwrap(), ResourceKind::FreeSurfer6);
        assert!(matches!(
            ResourceKind::parse("ASHS_V2"),
            Err(SnapError::UnsupportedResource(_))
        ));
        assert!(ResourceKind::Ashs.is_label_map());
        assert!(!ResourceKind::Cat12.is_label_map());
    }

    #[test]
    fn test_locate_spm12() {
        let dest = Path::new("/tmp/dl");
        let plan = locate("E01", "SPM12_SEGMENT", dest, true, &LocateOptions::default()).unwrap();
        let bg = plan.background.as_ref().unwrap();
        assert_eq!(bg.local, dest.join("E01_T1.nii.gz"));
        assert_eq!(bg.source, Source::T1 { sequence: "T1_ALFA1".to_string() });

        let locals: Vec<_> = plan.segmentations.iter().map(|f| f.local.clone()).collect();
        assert_eq!(
            locals,
            [
                dest.join("E01_SPM12_SEGMENT_c1.nii.gz"),
                dest.join("E01_SPM12_SEGMENT_c2.nii.gz"),
                dest.join("E01_SPM12_SEGMENT_c3.nii.gz"),
            ]
        );
        assert_eq!(resource_of(&plan.segmentations[1]), ("SPM12_SEGMENT", "c2*.nii.gz"));
        assert_eq!(plan.files().count(), 4);

        let t2t1 = locate("E01", "SPM12_SEGMENT_T2T1", dest, false, &LocateOptions::default()).unwrap();
        assert!(t2t1.background.is_none());
        assert_eq!(resource_of(&t2t1.segmentations[1]).1, "filled_c2*.nii.gz");
    }

    #[test]
    fn test_locate_cat12_t2_background() {
        let opts = LocateOptions {
            background: BackgroundScan::T2,
            ..Default::default()
        };
        let plan = locate("E02", "CAT12_SEGMENT", Path::new("d"), true, &opts).unwrap();
        let bg = plan.background.unwrap();
        assert_eq!(bg.local, Path::new("d/E02_T2.nii.gz"));
        assert!(matches!(bg.source, Source::T2InT1Space { .. }));
        assert_eq!(resource_of(&plan.segmentations[2]).1, "mri/p3*.nii.gz");
        assert_eq!(plan.segmentations[0].local, Path::new("d/E02_CAT12_SEGMENT_p1.nii.gz"));
    }

    #[test]
    fn test_locate_ashs_ignores_raw() {
        let plan = locate("E03", "ASHS", Path::new("d"), false, &LocateOptions::default()).unwrap();
        let bg = plan.background.unwrap();
        assert_eq!(resource_of(&bg), ("ASHS", "*tse.nii.gz"));
        assert_eq!(bg.local, Path::new("d/E03_ASHS_tse.nii.gz"));
        assert_eq!(
            plan.segmentations[0].local,
            Path::new("d/E03_ASHS_left_lfseg_corr_nogray.nii.gz")
        );
    }

    #[test]
    fn test_locate_freesurfer() {
        let dest = Path::new("d");
        let plan = locate("E04", "FREESURFER6", dest, true, &LocateOptions::default()).unwrap();
        assert!(!plan.reg_to_native());
        let bg = plan.background.unwrap();
        assert_eq!(resource_of(&bg).1, "*nu.mgz");
        assert_eq!(bg.local, Path::new("d/E04_nu.mgz"));
        assert_eq!(plan.segmentations[0].local, Path::new("d/E04_aparc+aseg.mgz"));

        let opts = LocateOptions {
            freesurfer_reg_to_native: true,
            ..Default::default()
        };
        let native = locate("E04", "FREESURFER6", dest, true, &opts).unwrap();
        assert!(native.reg_to_native());
        assert_eq!(native.background.unwrap().local, Path::new("d/E04_T1.nii.gz"));
        assert_eq!(resource_of(native.reference.as_ref().unwrap()).1, "*rawavg.mgz");

        let no_raw = locate("E04", "FREESURFER6", dest, false, &opts).unwrap();
        assert!(no_raw.background.is_none());
    }

    #[test]
    fn test_locate_unsupported() {
        assert!(matches!(
            locate("E05", "MRTRIX", Path::new("d"), true, &LocateOptions::default()),
            Err(SnapError::UnsupportedResource(r)) if r == "MRTRIX"
        ));
    }
}
