// 资产服务数据类型

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::PathBuf;

/// PDF 的内容类型
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// 分片上传地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrl {
    pub href: String,
}

impl From<&str> for UploadUrl {
    fn from(href: &str) -> Self {
        Self {
            href: href.to_string(),
        }
    }
}

/// 服务端资产记录（create_asset 返回）
///
/// 收到后只读，一次上传尝试结束即丢弃
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// 资产 ID
    pub id: String,
    /// 服务端分配的分片大小
    #[serde(rename = "blocksize", alias = "blockSize")]
    pub block_size: u64,
    /// 每个分片的上传地址，按分片序号排列
    #[serde(default)]
    pub upload_urls: Vec<UploadUrl>,

    // === 以下字段服务端可能不返回，由客户端按请求补齐 ===
    #[serde(default)]
    pub target_product: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    /// 内容类型
    #[serde(default, rename = "format")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multifile: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

impl AssetRecord {
    /// 用请求信息补齐服务端未返回的字段
    pub fn fill_from_request(&mut self, request: &CreateAssetRequest) {
        if self.target_product.is_empty() {
            self.target_product = request.target_product.clone();
        }
        if self.name.is_empty() {
            self.name = request.name.clone();
        }
        if self.size == 0 {
            self.size = request.size;
        }
        if self.content_type.is_empty() {
            self.content_type = request.format.clone();
        }
        if self.multifile.is_none() {
            self.multifile = request.multifile;
        }
        if self.workflow_id.is_none() {
            self.workflow_id = request.workflow_id.clone();
        }
    }
}

/// 创建资产请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetRequest {
    pub surface_id: String,
    pub target_product: String,
    pub name: String,
    pub size: u64,
    /// 内容类型
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multifile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

/// 完成资产请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub surface_id: String,
    pub target_product: String,
    pub asset_id: String,
}

/// 资产元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    /// 页数（服务端处理完成后才有）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_pages: Option<u64>,
    /// 其他字段原样保留
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AssetMetadata {
    pub fn with_pages(num_pages: u64) -> Self {
        Self {
            num_pages: Some(num_pages),
            extra: serde_json::Map::new(),
        }
    }
}

/// 待上传的本地文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// 本地路径
    pub path: PathBuf,
    /// 文件名
    pub name: String,
    /// 文件大小
    pub size: u64,
    /// 内容类型
    pub content_type: String,
}

impl FileHandle {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        size: u64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size,
            content_type: content_type.into(),
        }
    }

    /// 是否为 PDF
    pub fn is_pdf(&self) -> bool {
        self.content_type == PDF_CONTENT_TYPE
    }
}

/// 文件内容
///
/// 读取后只读，按字节范围切片（零拷贝）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlob {
    data: Bytes,
    content_type: String,
}

impl ContentBlob {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    /// 内容大小
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// 截取字节范围（越界部分自动截断）
    pub fn slice(&self, range: Range<u64>) -> Bytes {
        let len = self.data.len();
        let start = (range.start as usize).min(len);
        let end = (range.end as usize).clamp(start, len);
        self.data.slice(start..end)
    }
}

/// 重定向元数据里的单个资产摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// 重定向载荷
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectPayload {
    pub language_region: String,
    pub language_code: String,
    pub verb: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_metadata: Option<BTreeMap<String, AssetSummary>>,
    /// 反馈标记：nonpdf / multifile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multifile: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

/// 交给宿主 UI 的重定向参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    pub target_product: String,
    pub payload: RedirectPayload,
}
