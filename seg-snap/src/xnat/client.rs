use super::{fnmatch, Archive, RemoteFile, ScanInfo, XnatConfig};
use crate::{SnapError, SnapResult};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// 单次请求的超时时间.
const TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(rename = "ResultSet")]
    result_set: ResultSet<T>,
}

#[derive(Deserialize)]
struct ResultSet<T> {
    #[serde(rename = "Result")]
    result: Vec<T>,
}

#[derive(Deserialize)]
struct ScanRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default, rename = "type")]
    scan_type: String,
    #[serde(default)]
    quality: String,
    #[serde(default, rename = "xsiType")]
    xsi_type: String,
}

#[derive(Deserialize)]
struct FileRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "URI")]
    uri: String,
}

impl FileRow {
    /// 资源内的相对路径: URI 中 `/files/` 之后的部分, 缺失时退化为文件名.
    fn into_remote(self) -> RemoteFile {
        let name = match self.uri.split_once("/files/") {
            Some((_, rel)) => rel.to_string(),
            None => self.name,
        };
        RemoteFile { name, uri: self.uri }
    }
}

/// 基于 XNAT REST API 的阻塞式客户端.
pub struct XnatClient {
    http: Client,
    config: XnatConfig,
}

impl XnatClient {
    /// 由配置创建客户端. `verify` 为 `false` 时不校验证书.
    pub fn new(config: XnatConfig) -> SnapResult<Self> {
        let http = Client::builder()
            .timeout(TIMEOUT)
            .danger_accept_invalid_certs(!config.verify)
            .build()?;
        Ok(Self { http, config })
    }

    /// 从 JSON 配置文件创建客户端.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> SnapResult<Self> {
        Self::new(XnatConfig::from_file(path)?)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.server.trim_end_matches('/'), path);
        self.http
            .get(url)
            .basic_auth(&self.config.user, Some(&self.config.password))
    }

    fn rows<T: DeserializeOwned>(&self, path: &str) -> SnapResult<Vec<T>> {
        let response = self.get(path).query(&[("format", "json")]).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SnapError::Archive(format!("GET {path}: {status}")));
        }
        let envelope: Envelope<T> = response.json()?;
        Ok(envelope.result_set.result)
    }

    fn files(&self, path: &str, pattern: &str) -> SnapResult<Vec<RemoteFile>> {
        Ok(self
            .rows::<FileRow>(path)?
            .into_iter()
            .map(FileRow::into_remote)
            .filter(|f| fnmatch(pattern, &f.name))
            .collect())
    }
}

impl Archive for XnatClient {
    fn scans(&self, experiment: &str) -> SnapResult<Vec<ScanInfo>> {
        let rows: Vec<ScanRow> = self.rows(&format!("/data/experiments/{experiment}/scans"))?;
        Ok(rows
            .into_iter()
            .map(|r| ScanInfo {
                id: r.id,
                scan_type: r.scan_type,
                quality: r.quality,
                datatype: r.xsi_type,
            })
            .collect())
    }

    fn scan_files(&self, experiment: &str, scan: &str, resource: &str, pattern: &str) -> SnapResult<Vec<RemoteFile>> {
        self.files(
            &format!("/data/experiments/{experiment}/scans/{scan}/resources/{resource}/files"),
            pattern,
        )
    }

    fn resource_files(&self, experiment: &str, resource: &str, pattern: &str) -> SnapResult<Vec<RemoteFile>> {
        self.files(
            &format!("/data/experiments/{experiment}/resources/{resource}/files"),
            pattern,
        )
    }

    fn download(&self, file: &RemoteFile, dest: &Path) -> SnapResult<()> {
        let mut response = self.get(&file.uri).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(SnapError::Archive(format!("GET {}: {status}", file.uri)));
        }
        let mut out = BufWriter::new(File::create(dest)?);
        let bytes = response.copy_to(&mut out)?;
        log::debug!("{} bytes -> {}", bytes, dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result_sets() {
        let scans: Envelope<ScanRow> = serde_json::from_str(
            r#"{"ResultSet": {"Result": [
                {"ID": "2", "type": "T1_ALFA1 ", "quality": "usable", "xsiType": "xnat:mrScanData", "note": ""}
            ], "totalRecords": "1"}}"#,
        )
        .unwrap();
        let row = &scans.result_set.result[0];
        assert_eq!(row.id, "2");
        assert_eq!(row.xsi_type, "xnat:mrScanData");

        let files: Envelope<FileRow> = serde_json::from_str(
            r#"{"ResultSet": {"Result": [
                {"Name": "p1T1.nii.gz", "URI": "/data/experiments/E1/resources/CAT12_SEGMENT/files/mri/p1T1.nii.gz", "Size": "12"},
                {"Name": "odd.nii.gz", "URI": "/somewhere/odd.nii.gz"}
            ]}}"#,
        )
        .unwrap();
        let remotes: Vec<RemoteFile> = files.result_set.result.into_iter().map(FileRow::into_remote).collect();
        assert_eq!(remotes[0].name, "mri/p1T1.nii.gz");
        assert_eq!(remotes[1].name, "odd.nii.gz");
    }
}
