// 本地文件内容读取

use crate::error::ServiceError;
use crate::service::{ContentBlob, FileHandle};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// 文件内容来源
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// 读取整个文件内容，无法访问时返回带状态码的错误
    async fn read_blob(&self, file: &FileHandle) -> Result<ContentBlob, ServiceError>;
}

/// 从本地磁盘读取
#[derive(Debug, Clone, Default)]
pub struct LocalFileSource;

#[async_trait]
impl ContentSource for LocalFileSource {
    async fn read_blob(&self, file: &FileHandle) -> Result<ContentBlob, ServiceError> {
        let data = tokio::fs::read(&file.path)
            .await
            .map_err(|e| io_error_to_service(&file.path, e))?;

        debug!("读取文件内容: {:?}, {} bytes", file.path, data.len());
        Ok(ContentBlob::new(data, file.content_type.clone()))
    }
}

/// I/O 错误映射为状态码：不存在 404，其余（含无权限）500
///
/// 本地读取失败不能落到 401/403/409，那几个状态码对应服务端的权限与冲突提示
fn io_error_to_service(path: &Path, e: std::io::Error) -> ServiceError {
    let status = match e.kind() {
        ErrorKind::NotFound => 404,
        _ => 500,
    };
    ServiceError::status(status, format!("无法读取文件 {:?}: {}", path, e))
}

impl FileHandle {
    /// 根据本地路径构造，读取文件大小并按扩展名推断内容类型
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_error_to_service(path, e))?;

        if !metadata.is_file() {
            return Err(ServiceError::status(400, format!("不是文件: {:?}", path)));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(path, name, metadata.len(), content_type_for(path)))
    }
}

/// 按扩展名推断内容类型
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "rtf" => "application/rtf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}
