// 对象存储分片传输

use crate::error::TransferError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// 对象存储
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 以 PUT 方式上传一段字节到预分配的地址（幂等）
    async fn put(&self, url: &str, content_type: &str, body: Bytes) -> Result<(), TransferError>;
}

/// 基于 HTTP PUT 的对象存储
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: Client,
}

impl HttpObjectStore {
    pub fn new(timeout: Duration) -> Result<Self, TransferError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, url: &str, content_type: &str, body: Bytes) -> Result<(), TransferError> {
        let size = body.len();
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status(status.as_u16()));
        }

        debug!("分片上传成功: {} bytes, status={}", size, status);
        Ok(())
    }
}
