// Unity Upload Library
// 分片上传编排核心库

// 配置管理模块
pub mod config;

// 错误类型
pub mod error;

// 日志系统
pub mod logging;

// 外部协作方（资产服务、内容读取、对象存储、宿主 UI）
pub mod service;

// 上传引擎模块
pub mod uploader;

#[cfg(test)]
mod testing;

// 导出常用类型
pub use config::AppConfig;
pub use error::{classify_upload_error, ErrorKey, ErrorReport, ServiceError, TransferError};
pub use service::{
    AssetClient, AssetRecord, AssetService, ConsoleUi, ContentBlob, ContentSource, FileHandle,
    HostUi, HttpObjectStore, LocalFileSource, ObjectStore,
};
pub use uploader::{
    ConcurrencyPolicy, DeviceTier, FailureReason, SessionOutcome, SessionReport,
    UploadOrchestrator,
};
