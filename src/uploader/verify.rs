// 上传完成确认
//
// 向服务端发送 finalize 请求，服务端返回空对象表示处理完成；
// 非空响应或任何异常都视为确认失败

use crate::error::ServiceError;
use crate::service::{AssetRecord, AssetService, FinalizeRequest};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// 确认失败原因
#[derive(Debug, Clone, Error)]
pub enum VerifyError {
    /// 服务端返回了非空结果
    #[error("Unexpected response from finalize call: {0}")]
    UnexpectedResponse(Value),
    /// 请求异常（网络、超时、非 2xx）
    #[error("Exception thrown when verifying content: {0}")]
    Request(#[from] ServiceError),
}

/// finalize 客户端
pub struct FinalizeClient<'a> {
    service: &'a dyn AssetService,
    surface_id: &'a str,
    timeout: Duration,
}

impl<'a> FinalizeClient<'a> {
    pub fn new(service: &'a dyn AssetService, surface_id: &'a str, timeout: Duration) -> Self {
        Self {
            service,
            surface_id,
            timeout,
        }
    }

    /// 确认资产处理完成
    pub async fn verify(&self, asset: &AssetRecord) -> Result<(), VerifyError> {
        let request = FinalizeRequest {
            surface_id: self.surface_id.to_string(),
            target_product: asset.target_product.clone(),
            asset_id: asset.id.clone(),
        };

        let response = self
            .service
            .finalize_asset(&request, self.timeout)
            .await
            .map_err(|e| {
                warn!("finalize 请求失败: asset={}, {}", asset.id, e);
                VerifyError::from(e)
            })?;

        if !is_empty_payload(&response) {
            warn!("finalize 返回非空结果: asset={}, {}", asset.id, response);
            return Err(VerifyError::UnexpectedResponse(response));
        }

        info!("资产确认完成: {}", asset.id);
        Ok(())
    }

    /// 多文件模式：只返回是否成功
    pub async fn is_verified(&self, asset: &AssetRecord) -> bool {
        self.verify(asset).await.is_ok()
    }
}

/// 空对象才算成功，null 不算
fn is_empty_payload(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}
