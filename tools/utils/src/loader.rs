//! 对 `seg-snap::xnat` 的更一层封装. 从环境变量获取默认路径.

use seg_snap::xnat::{home_config_path, XnatConfig};
use seg_snap::SnapResult;
use std::env;
use std::path::PathBuf;

/// 获取 XNAT 配置文件路径.
///
/// 1. 若环境变量 `$XNAT_CONFIG` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/.xnat.cfg`.
pub fn config_path_from_env_or_home() -> Option<PathBuf> {
    match env::var("XNAT_CONFIG") {
        Ok(p) if !p.is_empty() => Some(PathBuf::from(p)),
        _ => home_config_path(),
    }
}

/// 从 `$XNAT_CONFIG` 或者 `$HOME/.xnat.cfg` 加载 XNAT 配置.
pub fn config_from_env_or_home() -> Option<SnapResult<XnatConfig>> {
    config_path_from_env_or_home().map(XnatConfig::from_file)
}

/// 获取下载目录.
///
/// 1. 若环境变量 `$SEG_SNAP_DEST` 非空, 则返回其值;
/// 2. 否则, 返回系统临时目录.
pub fn dest_dir_from_env_or_tmp() -> PathBuf {
    match env::var("SEG_SNAP_DEST") {
        Ok(d) if !d.is_empty() => PathBuf::from(d),
        _ => env::temp_dir(),
    }
}
