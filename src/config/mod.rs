// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

use crate::uploader::DeviceTier;

/// 页数上限校验项名称
pub const MAX_NUM_PAGES: &str = "maxNumPages";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 资产服务配置
    #[serde(default)]
    pub service: ServiceConfig,
    /// 工作流配置
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 业务校验配置
    #[serde(default)]
    pub validation: ValidationConfig,
    /// 🔥 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 资产服务配置
///
/// 端点地址由外部解析好后直接写入，这里不做拼接
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// 调用方标识
    #[serde(default = "default_surface_id")]
    pub surface_id: String,
    /// 创建资产接口
    #[serde(default)]
    pub create_asset_url: String,
    /// 完成资产接口
    #[serde(default)]
    pub finalize_asset_url: String,
    /// 资产元数据接口
    #[serde(default)]
    pub metadata_url: String,
    /// 访问令牌（由外部会话提供）
    #[serde(default)]
    pub access_token: Option<String>,
    /// 普通请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_surface_id() -> String {
    "unity".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            surface_id: default_surface_id(),
            create_asset_url: String::new(),
            finalize_asset_url: String::new(),
            metadata_url: String::new(),
            access_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 工作流配置（重定向载荷里用到）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// 目标产品
    #[serde(default = "default_product_name")]
    pub product_name: String,
    #[serde(default = "default_lang_region")]
    pub lang_region: String,
    #[serde(default = "default_lang_code")]
    pub lang_code: String,
    /// 启用的功能（第一个作为 verb）
    #[serde(default = "default_verb")]
    pub verb: String,
}

fn default_product_name() -> String {
    "acrobat".to_string()
}

fn default_lang_region() -> String {
    "us".to_string()
}

fn default_lang_code() -> String {
    "en-us".to_string()
}

fn default_verb() -> String {
    "compress-pdf".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            product_name: default_product_name(),
            lang_region: default_lang_region(),
            lang_code: default_lang_code(),
            verb: default_verb(),
        }
    }
}

/// 单档位的并发上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimit {
    /// 最大同时处理文件数
    pub files: usize,
    /// 最大同时上传分片数
    pub chunks: usize,
}

/// 按设备档位划分的并发上限表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimits {
    pub high_end: TierLimit,
    pub mid_range: TierLimit,
    pub low_end: TierLimit,
}

impl Default for UploadLimits {
    fn default() -> Self {
        // 分片上传受限于网络而非 CPU，高端和中端共用同一上限
        Self {
            high_end: TierLimit { files: 3, chunks: 10 },
            mid_range: TierLimit { files: 3, chunks: 10 },
            low_end: TierLimit { files: 2, chunks: 6 },
        }
    }
}

impl UploadLimits {
    pub fn for_tier(&self, tier: DeviceTier) -> TierLimit {
        match tier {
            DeviceTier::HighEnd => self.high_end,
            DeviceTier::MidRange => self.mid_range,
            DeviceTier::LowEnd => self.low_end,
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 并发上限表
    #[serde(default)]
    pub limits: UploadLimits,
    /// finalize 请求超时（秒）
    #[serde(default = "default_finalize_timeout_secs")]
    pub finalize_timeout_secs: u64,
    /// 访客重定向前的等待（毫秒），留给 UI 展示提示
    #[serde(default = "default_guest_redirect_delay_ms")]
    pub guest_redirect_delay_ms: u64,
}

fn default_finalize_timeout_secs() -> u64 {
    80
}

fn default_guest_redirect_delay_ms() -> u64 {
    3000
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            limits: UploadLimits::default(),
            finalize_timeout_secs: default_finalize_timeout_secs(),
            guest_redirect_delay_ms: default_guest_redirect_delay_ms(),
        }
    }
}

impl UploadConfig {
    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_secs(self.finalize_timeout_secs)
    }

    pub fn guest_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.guest_redirect_delay_ms)
    }
}

/// 业务校验配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// 需要执行的校验项（如 maxNumPages = 10），未知名称忽略
    #[serde(default)]
    pub limits: BTreeMap<String, u64>,
    /// 元数据轮询间隔（毫秒）
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 轮询总时限（毫秒）
    #[serde(default = "default_poll_deadline_ms")]
    pub poll_deadline_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_poll_deadline_ms() -> u64 {
    5000
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            limits: BTreeMap::new(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_deadline_ms: default_poll_deadline_ms(),
        }
    }
}

impl ValidationConfig {
    /// 配置的最大页数
    pub fn max_num_pages(&self) -> Option<u64> {
        self.limits.get(MAX_NUM_PAGES).copied()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_deadline(&self) -> Duration {
        Duration::from_millis(self.poll_deadline_ms)
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("配置校验失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.validate().context("保存配置失败")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        for (name, limit) in [
            ("high_end", self.upload.limits.high_end),
            ("mid_range", self.upload.limits.mid_range),
            ("low_end", self.upload.limits.low_end),
        ] {
            if limit.files == 0 || limit.chunks == 0 {
                anyhow::bail!("并发上限不能为 0: {}", name);
            }
        }

        if self.validation.poll_interval_ms == 0 {
            anyhow::bail!("轮询间隔不能为 0");
        }
        if self.validation.poll_interval_ms >= self.validation.poll_deadline_ms {
            anyhow::bail!(
                "轮询间隔 {}ms 必须小于总时限 {}ms",
                self.validation.poll_interval_ms,
                self.validation.poll_deadline_ms
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.upload.finalize_timeout_secs, 80);
        assert_eq!(config.upload.guest_redirect_delay_ms, 3000);
        assert_eq!(config.validation.poll_interval_ms, 500);
        assert_eq!(config.validation.poll_deadline_ms, 5000);
        assert!(config.validation.max_num_pages().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_limit_table() {
        let limits = UploadLimits::default();
        assert_eq!(limits.for_tier(DeviceTier::HighEnd), TierLimit { files: 3, chunks: 10 });
        assert_eq!(limits.for_tier(DeviceTier::MidRange), TierLimit { files: 3, chunks: 10 });
        assert_eq!(limits.for_tier(DeviceTier::LowEnd), TierLimit { files: 2, chunks: 6 });
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [validation]
            limits = { maxNumPages = 10, futureLimit = 3 }

            [upload.limits]
            high_end = { files = 4, chunks = 12 }
            mid_range = { files = 3, chunks = 10 }
            low_end = { files = 1, chunks = 4 }
            "#,
        )
        .unwrap();

        assert_eq!(config.validation.max_num_pages(), Some(10));
        assert_eq!(config.validation.limits.len(), 2);
        assert_eq!(config.upload.limits.high_end.chunks, 12);
        assert_eq!(config.upload.finalize_timeout_secs, 80);
        assert_eq!(config.workflow.product_name, "acrobat");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.upload.limits.low_end.chunks = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.validation.poll_interval_ms = 6000;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut config = AppConfig::default();
        config
            .validation
            .limits
            .insert(MAX_NUM_PAGES.to_string(), 25);
        config.save_to_file(path).await.unwrap();

        let loaded = AppConfig::load_from_file(path).await.unwrap();
        assert_eq!(loaded.validation.max_num_pages(), Some(25));
        assert_eq!(loaded.upload.limits, config.upload.limits);
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        assert!(AppConfig::load_from_file("/nonexistent/unity-upload.toml")
            .await
            .is_err());
    }
}
