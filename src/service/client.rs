// 资产服务客户端实现

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::service::{AssetMetadata, AssetRecord, CreateAssetRequest, FinalizeRequest};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 资产服务
#[async_trait]
pub trait AssetService: Send + Sync {
    /// 创建资产，返回分片大小与各分片上传地址
    async fn create_asset(&self, request: &CreateAssetRequest) -> Result<AssetRecord, ServiceError>;

    /// 完成资产，成功时服务端返回空对象
    async fn finalize_asset(
        &self,
        request: &FinalizeRequest,
        timeout: Duration,
    ) -> Result<Value, ServiceError>;

    /// 获取资产元数据
    async fn get_metadata(&self, asset_id: &str) -> Result<AssetMetadata, ServiceError>;
}

/// 基于 HTTP 的资产服务客户端
#[derive(Debug, Clone)]
pub struct AssetClient {
    /// HTTP客户端
    client: Client,
    /// 端点配置
    config: ServiceConfig,
}

impl AssetClient {
    /// 创建新的资产服务客户端
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = config.access_token.as_deref() {
            let value = HeaderValue::from_str(token)
                .map_err(|e| ServiceError::Decode(format!("无效的访问令牌: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        info!(
            "初始化资产服务客户端: surface_id={}, 已配置令牌={}",
            config.surface_id,
            config.access_token.is_some()
        );

        Ok(Self { client, config })
    }

    /// 检查响应状态，非 2xx 转换为 ServiceError::Status
    async fn check_status(response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body);
        warn!("资产服务返回错误: status={}, message={}", status, message);
        Err(ServiceError::status(status.as_u16(), message))
    }
}

/// 从错误响应体中提取原因（message / reason 字段），否则返回原文
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "reason"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl AssetService for AssetClient {
    async fn create_asset(&self, request: &CreateAssetRequest) -> Result<AssetRecord, ServiceError> {
        debug!("创建资产: name={}, size={}", request.name, request.size);

        let response = self
            .client
            .post(&self.config.create_asset_url)
            .json(request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let mut record: AssetRecord = response.json().await?;
        record.fill_from_request(request);

        info!(
            "资产创建成功: id={}, blocksize={}, 分片地址数={}",
            record.id,
            record.block_size,
            record.upload_urls.len()
        );
        Ok(record)
    }

    async fn finalize_asset(
        &self,
        request: &FinalizeRequest,
        timeout: Duration,
    ) -> Result<Value, ServiceError> {
        debug!("完成资产: id={}", request.asset_id);

        let response = self
            .client
            .post(&self.config.finalize_asset_url)
            .timeout(timeout)
            .json(request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        // 空响应体视为空对象
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }

    async fn get_metadata(&self, asset_id: &str) -> Result<AssetMetadata, ServiceError> {
        let response = self
            .client
            .get(&self.config.metadata_url)
            .query(&[("id", asset_id)])
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let metadata: AssetMetadata = response.json().await?;
        debug!("资产元数据: id={}, numPages={:?}", asset_id, metadata.num_pages);
        Ok(metadata)
    }
}
