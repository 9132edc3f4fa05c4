// 并发策略
//
// 单文件：只限制分片并发
// 多文件：同时限制文件并发和分片并发

use crate::config::UploadLimits;
use crate::uploader::DeviceTier;
use serde::Serialize;

/// 本次上传使用的并发上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyPolicy {
    /// 最大同时处理文件数（仅多文件）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_files: Option<usize>,
    /// 最大同时上传分片数
    pub max_concurrent_chunks: usize,
}

impl ConcurrencyPolicy {
    /// 根据档位和是否多文件计算并发上限
    pub fn for_tier(limits: &UploadLimits, tier: DeviceTier, multi_file: bool) -> Self {
        let limit = limits.for_tier(tier);
        Self {
            max_concurrent_files: multi_file.then_some(limit.files),
            max_concurrent_chunks: limit.chunks,
        }
    }

    /// 探测设备后计算（每次上传重新探测）
    pub fn detect(limits: &UploadLimits, multi_file: bool) -> Self {
        Self::for_tier(limits, DeviceTier::detect(), multi_file)
    }

    /// 文件并发上限，单文件策略下为 1
    pub fn file_limit(&self) -> usize {
        self.max_concurrent_files.unwrap_or(1)
    }
}
