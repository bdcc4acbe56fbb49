//! XNAT 归档访问: 配置, 归档接口, 资源定位与下载.

mod fetch;
mod locate;

#[cfg(feature = "xnat")]
mod client;

pub use fetch::{fetch, resolve_scan_file, FetchedFiles};
pub(crate) use fetch::load_segmentations;
pub use locate::{locate, BackgroundScan, FetchPlan, LocateOptions, PlannedFile, ResourceKind, Source};

#[cfg(feature = "xnat")]
pub use client::XnatClient;

use crate::consts::xnat::{SCAN_DATATYPES, USABLE};
use crate::SnapResult;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// XNAT 连接配置. 文件格式为 JSON, 与 pyxnat 的 `.cfg` 文件相同.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct XnatConfig {
    /// 服务器根地址, 如 `https://xnat.example.org`.
    pub server: String,

    /// 用户名.
    pub user: String,

    /// 密码.
    pub password: String,

    /// 是否校验 TLS 证书.
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_verify() -> bool {
    true
}

impl XnatConfig {
    /// 从 JSON 文件读取.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SnapResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// 默认配置文件 `~/.xnat.cfg`. 无法确定用户主目录时返回 `None`.
pub fn home_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".xnat.cfg"))
}

/// 一个实验中的扫描.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanInfo {
    /// 扫描 ID.
    pub id: String,

    /// 序列名 (扫描类型).
    pub scan_type: String,

    /// 质量标记.
    pub quality: String,

    /// XNAT 数据类型, 如 `xnat:mrScanData`.
    pub datatype: String,
}

impl ScanInfo {
    /// 扫描是否有效: ID 全为数字且不以 0 开头, 质量为 `usable`,
    /// 数据类型为 MR/PET/CT 之一.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && self.id.bytes().all(|b| b.is_ascii_digit())
            && !self.id.starts_with('0')
            && self.quality == USABLE
            && SCAN_DATATYPES.contains(&self.datatype.as_str())
    }

    /// 序列名 (去掉末尾空格后) 是否为 `sequence`.
    #[inline]
    pub fn is_sequence(&self, sequence: &str) -> bool {
        self.scan_type.trim_end_matches(' ') == sequence
    }
}

/// 归档中的一个文件.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFile {
    /// 相对于资源根目录的路径, 如 `mri/p1T1.nii.gz`.
    pub name: String,

    /// 下载地址 (相对于服务器根地址).
    pub uri: String,
}

/// 归档服务. 文件模式为 glob 风格 (`*`, `?`), 匹配 [`RemoteFile::name`].
pub trait Archive {
    /// 列出实验 `experiment` 的全部扫描.
    fn scans(&self, experiment: &str) -> SnapResult<Vec<ScanInfo>>;

    /// 列出扫描 `scan` 的资源 `resource` 中匹配 `pattern` 的文件.
    fn scan_files(&self, experiment: &str, scan: &str, resource: &str, pattern: &str) -> SnapResult<Vec<RemoteFile>>;

    /// 列出实验级资源 `resource` 中匹配 `pattern` 的文件.
    fn resource_files(&self, experiment: &str, resource: &str, pattern: &str) -> SnapResult<Vec<RemoteFile>>;

    /// 下载 `file` 到本地路径 `dest`.
    fn download(&self, file: &RemoteFile, dest: &Path) -> SnapResult<()>;
}

/// glob 风格匹配: `*` 匹配任意长度 (含 `/`), `?` 匹配单个字符.
pub fn fnmatch(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0, 0);
    // 最近一个 `*` 的位置, 以及它当时对应的 name 位置
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ni));
                pi += 1;
            }
            Some(&c) if c == '?' || c == n[ni] => {
                pi += 1;
                ni += 1;
            }
            _ => match star {
                Some((sp, sn)) => {
                    pi = sp + 1;
                    ni = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
