use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use unity_upload::{
    logging, AppConfig, AssetClient, ConsoleUi, FileHandle, HttpObjectStore, LocalFileSource,
    UploadOrchestrator,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Chunked upload client for the asset service")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config/app.toml")]
    config: String,

    /// 以访客身份上传（非 PDF 与多文件直接重定向）
    #[arg(long)]
    guest: bool,

    /// 待上传的文件
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // 先加载配置再初始化日志，加载失败的原因在日志就绪后再输出
    let loaded = AppConfig::load_from_file(&args.config).await;
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // 🔥 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&config.log);

    info!("Unity Upload v{} 启动中...", env!("CARGO_PKG_VERSION"));
    match &loaded {
        Ok(_) => info!("配置文件加载成功: {}", args.config),
        Err(e) => warn!("配置文件加载失败，使用默认配置: {:#}", e),
    }

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let file = FileHandle::from_path(path)
            .await
            .with_context(|| format!("无法读取文件: {}", path.display()))?;
        files.push(file);
    }

    let service = AssetClient::new(config.service.clone()).context("创建资产服务客户端失败")?;
    let store = HttpObjectStore::new(config.service.request_timeout())
        .context("创建对象存储客户端失败")?;

    let orchestrator = UploadOrchestrator::new(
        config,
        Arc::new(service),
        Arc::new(LocalFileSource),
        Arc::new(store),
        Arc::new(ConsoleUi),
    );

    let report = match (files.as_slice(), args.guest) {
        ([file], true) => orchestrator.single_file_guest_upload(file).await,
        ([file], false) => orchestrator.single_file_user_upload(file).await,
        (_, true) => orchestrator.multi_file_guest_upload(&files).await,
        (_, false) => orchestrator.multi_file_user_upload(&files).await,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_failure() {
        anyhow::bail!("上传失败: {:?}", report.outcome);
    }

    Ok(())
}
