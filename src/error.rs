// 错误类型定义
//
// 分三类：
// - ServiceError：资产服务 / 本地内容读取失败（带 HTTP 状态码）
// - TransferError：对象存储分片 PUT 失败
// - ErrorKey / ErrorReport：面向用户的错误提示

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 服务调用错误
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// 服务返回非 2xx 状态
    #[error("服务返回错误状态 {status}: {message}")]
    Status { status: u16, message: String },
    /// 网络错误（连接失败、DNS 等）
    #[error("网络错误: {0}")]
    Network(String),
    /// 请求超时
    #[error("请求超时")]
    Timeout,
    /// 响应解析失败
    #[error("响应解析失败: {0}")]
    Decode(String),
}

impl ServiceError {
    /// 构造带状态码的错误
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        ServiceError::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP 状态码（仅 Status 类错误有）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 服务端返回的原因信息
    pub fn message(&self) -> Option<&str> {
        match self {
            ServiceError::Status { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ServiceError::status(status.as_u16(), e.to_string())
        } else {
            ServiceError::Network(e.to_string())
        }
    }
}

/// 分片传输错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// 对象存储返回非 2xx
    #[error("Failed to upload: {0}")]
    Status(u16),
    /// 网络错误
    #[error("网络错误: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransferError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => TransferError::Status(status.as_u16()),
            None => TransferError::Network(e.to_string()),
        }
    }
}

/// 用户可见的错误提示键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKey {
    #[serde(rename = "verb_upload_error_generic")]
    Generic,
    #[serde(rename = "verb_upload_error_duplicate_asset")]
    DuplicateAsset,
    #[serde(rename = "verb_upload_error_no_storage_provision")]
    NoStorageProvision,
    #[serde(rename = "verb_upload_error_max_quota_exceeded")]
    MaxQuotaExceeded,
    #[serde(rename = "verb_upload_error_max_page_count")]
    MaxPageCount,
}

impl ErrorKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKey::Generic => "verb_upload_error_generic",
            ErrorKey::DuplicateAsset => "verb_upload_error_duplicate_asset",
            ErrorKey::NoStorageProvision => "verb_upload_error_no_storage_provision",
            ErrorKey::MaxQuotaExceeded => "verb_upload_error_max_quota_exceeded",
            ErrorKey::MaxPageCount => "verb_upload_error_max_page_count",
        }
    }
}

impl std::fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 提交给宿主 UI 的错误提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub key: ErrorKey,
    /// HTTP 状态码
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// 诊断信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// 静默：只记录，不弹出提示
    #[serde(default)]
    pub silent: bool,
    /// 强制显示
    #[serde(default)]
    pub force_show: bool,
}

impl ErrorReport {
    pub fn new(key: ErrorKey) -> Self {
        Self {
            key,
            status: None,
            detail: None,
            silent: false,
            force_show: false,
        }
    }

    /// 通用上传错误（状态 500）
    pub fn generic(detail: Option<String>) -> Self {
        Self::new(ErrorKey::Generic)
            .with_status(Some(500))
            .with_detail(detail)
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// 资产创建 / 内容读取错误分类
///
/// - 409：重复资产
/// - 401：`notentitled` 为存储未开通，其余为通用错误（附带原因）
/// - 403：`quotaexceeded` 为空间不足，其余为存储未开通
/// - 其他：通用错误
pub fn classify_upload_error(error: &ServiceError) -> ErrorReport {
    let status = error.status_code();
    let message = error.message().unwrap_or_default();

    let (key, detail) = match status {
        Some(409) => (ErrorKey::DuplicateAsset, None),
        Some(401) if message == "notentitled" => (ErrorKey::NoStorageProvision, None),
        Some(401) => (ErrorKey::Generic, Some(message.to_string())),
        Some(403) if message == "quotaexceeded" => (ErrorKey::MaxQuotaExceeded, None),
        Some(403) => (ErrorKey::NoStorageProvision, None),
        _ => (ErrorKey::Generic, None),
    };

    ErrorReport::new(key).with_status(status).with_detail(detail)
}
