// 上传会话编排
//
// 单文件 / 多文件两种入口，各有访客与登录用户两个变体：
// - 访客：非 PDF（单文件）或任意多文件直接重定向，不上传
// - 用户：总是上传，非 PDF 只在重定向载荷里带 feedback 标记
//
// 会话结果通过 SessionReport 返回，不在编排器上保留可变状态

use crate::config::AppConfig;
use crate::error::{classify_upload_error, ErrorReport, ServiceError};
use crate::service::{
    AssetRecord, AssetService, AssetSummary, ContentBlob, ContentSource, CreateAssetRequest,
    FileHandle, HostUi, ObjectStore, RedirectOptions, RedirectPayload,
};
use crate::uploader::{
    execute_in_batches, handle_validations, ChunkUploader, ConcurrencyPolicy, DeviceTier,
    FinalizeClient, PreparedFile,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 会话失败的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    /// 读取内容或创建资产失败
    Preparation,
    /// 分片上传失败
    ChunkUpload,
    /// finalize 确认失败
    Verification,
    /// 业务校验过程出现异常
    Validation,
}

/// 会话结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionOutcome {
    /// 全部上传并确认
    Uploaded,
    /// 多文件部分确认成功
    PartiallyUploaded,
    /// 访客流程：直接重定向，未上传
    RedirectedWithoutUpload,
    /// 宿主拒绝重定向，流程静默结束
    RedirectDeclined,
    /// 业务校验未通过（如页数超限）
    ValidationFailed,
    Failed(FailureReason),
}

/// 一次上传会话的汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// 待跟进的操作（单文件为资产 ID，多文件为 workflowId）
    pub operations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    pub files_total: usize,
    pub assets_created: usize,
    /// 分片上传失败的文件（原始文件列表中的位置）
    pub failed_files: Vec<usize>,
    /// 地址数不匹配被跳过的文件（原始文件列表中的位置）
    pub skipped_files: Vec<usize>,
    pub verified: usize,
}

impl SessionReport {
    fn new(files_total: usize) -> Self {
        Self {
            outcome: SessionOutcome::Uploaded,
            operations: Vec::new(),
            workflow_id: None,
            files_total,
            assets_created: 0,
            failed_files: Vec::new(),
            skipped_files: Vec::new(),
            verified: 0,
        }
    }

    fn finish(mut self, outcome: SessionOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, SessionOutcome::Failed(_))
    }
}

/// 上传编排器
pub struct UploadOrchestrator {
    config: AppConfig,
    service: Arc<dyn AssetService>,
    content: Arc<dyn ContentSource>,
    store: Arc<dyn ObjectStore>,
    ui: Arc<dyn HostUi>,
    /// 固定设备档位（不设置时每次上传重新探测）
    device_tier: Option<DeviceTier>,
}

impl UploadOrchestrator {
    pub fn new(
        config: AppConfig,
        service: Arc<dyn AssetService>,
        content: Arc<dyn ContentSource>,
        store: Arc<dyn ObjectStore>,
        ui: Arc<dyn HostUi>,
    ) -> Self {
        Self {
            config,
            service,
            content,
            store,
            ui,
            device_tier: None,
        }
    }

    pub fn with_device_tier(mut self, tier: DeviceTier) -> Self {
        self.device_tier = Some(tier);
        self
    }

    fn policy(&self, multi_file: bool) -> ConcurrencyPolicy {
        let limits = &self.config.upload.limits;
        match self.device_tier {
            Some(tier) => ConcurrencyPolicy::for_tier(limits, tier, multi_file),
            None => ConcurrencyPolicy::detect(limits, multi_file),
        }
    }

    fn guest_redirect(&self, feedback: &str) -> RedirectOptions {
        let workflow = &self.config.workflow;
        RedirectOptions {
            asset_id: None,
            target_product: workflow.product_name.clone(),
            payload: RedirectPayload {
                language_region: workflow.lang_region.clone(),
                language_code: workflow.lang_code.clone(),
                verb: workflow.verb.clone(),
                feedback: Some(feedback.to_string()),
                ..Default::default()
            },
        }
    }

    fn create_request(&self, file: &FileHandle, workflow_id: Option<&str>) -> CreateAssetRequest {
        CreateAssetRequest {
            surface_id: self.config.service.surface_id.clone(),
            target_product: self.config.workflow.product_name.clone(),
            name: file.name.clone(),
            size: file.size,
            format: file.content_type.clone(),
            multifile: workflow_id.map(|_| true),
            workflow_id: workflow_id.map(str::to_string),
        }
    }

    /// 并行读取内容与创建资产
    async fn prepare(
        &self,
        file: &FileHandle,
        workflow_id: Option<&str>,
    ) -> Result<(ContentBlob, AssetRecord), ServiceError> {
        let request = self.create_request(file, workflow_id);
        tokio::try_join!(
            self.content.read_blob(file),
            self.service.create_asset(&request)
        )
    }

    /// 会话级致命错误：清空待跟进操作、关闭遮罩、报通用错误
    async fn dispatch_generic_error(&self, report: &mut SessionReport, detail: Option<String>) {
        report.operations.clear();
        self.ui.show_blocking_screen(false).await;
        self.ui.report_error(&ErrorReport::generic(detail)).await;
    }

    /// 访客单文件上传：非 PDF 等待后直接重定向
    pub async fn single_file_guest_upload(&self, file: &FileHandle) -> SessionReport {
        self.ui.show_blocking_screen(true).await;

        if !file.is_pdf() {
            let report = SessionReport::new(1);
            tokio::time::sleep(self.config.upload.guest_redirect_delay()).await;
            if !self.ui.request_redirect_decision(&self.guest_redirect("nonpdf")).await {
                return report.finish(SessionOutcome::RedirectDeclined);
            }
            info!("访客上传非 PDF 文件，直接重定向: {}", file.name);
            return report.finish(SessionOutcome::RedirectedWithoutUpload);
        }

        self.upload_single_file(file, false).await
    }

    /// 登录用户单文件上传
    pub async fn single_file_user_upload(&self, file: &FileHandle) -> SessionReport {
        self.ui.show_blocking_screen(true).await;
        self.upload_single_file(file, !file.is_pdf()).await
    }

    async fn upload_single_file(&self, file: &FileHandle, non_pdf: bool) -> SessionReport {
        let mut report = SessionReport::new(1);
        let policy = self.policy(false);

        let (blob, asset) = match self.prepare(file, None).await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("准备上传失败: file={}, {}", file.name, e);
                self.ui.show_blocking_screen(false).await;
                self.ui.report_error(&classify_upload_error(&e)).await;
                return report.finish(SessionOutcome::Failed(FailureReason::Preparation));
            }
        };
        report.assets_created = 1;

        let workflow = &self.config.workflow;
        let mut asset_metadata = BTreeMap::new();
        asset_metadata.insert(
            asset.id.clone(),
            AssetSummary {
                name: file.name.clone(),
                size: file.size,
                content_type: file.content_type.clone(),
            },
        );
        let redirect = RedirectOptions {
            asset_id: Some(asset.id.clone()),
            target_product: workflow.product_name.clone(),
            payload: RedirectPayload {
                language_region: workflow.lang_region.clone(),
                language_code: workflow.lang_code.clone(),
                verb: workflow.verb.clone(),
                asset_metadata: Some(asset_metadata),
                feedback: non_pdf.then(|| "nonpdf".to_string()),
                ..Default::default()
            },
        };
        if !self.ui.request_redirect_decision(&redirect).await {
            return report.finish(SessionOutcome::RedirectDeclined);
        }

        self.ui
            .emit_analytics("uploading", serde_json::to_value(&asset).ok());

        let files = [PreparedFile {
            file_index: 0,
            content_type: file.content_type.clone(),
            asset,
            blob,
        }];
        let uploader = ChunkUploader::new(self.store.clone(), self.ui.clone());
        let chunked = uploader
            .upload_files(&files, policy.max_concurrent_chunks)
            .await;
        report.failed_files = chunked.failed.clone();
        report.skipped_files = chunked.skipped.clone();

        if !chunked.is_uploaded(0) {
            self.dispatch_generic_error(&mut report, Some("Error uploading file chunks.".into()))
                .await;
            return report.finish(SessionOutcome::Failed(FailureReason::ChunkUpload));
        }

        let asset = &files[0].asset;
        report.operations.push(asset.id.clone());

        let finalize = FinalizeClient::new(
            self.service.as_ref(),
            &self.config.service.surface_id,
            self.config.upload.finalize_timeout(),
        );
        if let Err(e) = finalize.verify(asset).await {
            report.operations.clear();
            self.ui.show_blocking_screen(false).await;
            self.ui
                .report_error(&ErrorReport::generic(Some(e.to_string())))
                .await;
            return report.finish(SessionOutcome::Failed(FailureReason::Verification));
        }
        report.verified = 1;

        let validation = handle_validations(
            self.service.as_ref(),
            self.ui.as_ref(),
            &self.config.validation,
            asset,
        )
        .await;
        if !validation.validated {
            report.operations.clear();
            return report.finish(SessionOutcome::ValidationFailed);
        }
        if validation.errored {
            report.operations.clear();
            return report.finish(SessionOutcome::Failed(FailureReason::Validation));
        }

        self.ui.emit_analytics("uploaded", None);
        info!("单文件上传完成: asset={}", asset.id);
        report.finish(SessionOutcome::Uploaded)
    }

    /// 访客多文件上传：等待后直接重定向
    pub async fn multi_file_guest_upload(&self, files: &[FileHandle]) -> SessionReport {
        let report = SessionReport::new(files.len());
        self.ui.show_blocking_screen(true).await;
        tokio::time::sleep(self.config.upload.guest_redirect_delay()).await;
        self.ui.update_progress(85);

        if !self
            .ui
            .request_redirect_decision(&self.guest_redirect("multifile"))
            .await
        {
            return report.finish(SessionOutcome::RedirectDeclined);
        }
        info!("访客多文件上传，直接重定向: {} 个文件", files.len());
        report.finish(SessionOutcome::RedirectedWithoutUpload)
    }

    /// 登录用户多文件上传
    pub async fn multi_file_user_upload(&self, files: &[FileHandle]) -> SessionReport {
        self.ui.show_blocking_screen(true).await;
        let report = self.upload_multi_file(files).await;

        if matches!(
            report.outcome,
            SessionOutcome::Uploaded | SessionOutcome::PartiallyUploaded
        ) {
            self.ui.emit_analytics("uploaded", Some(files_summary(files)));
        }
        report
    }

    async fn upload_multi_file(&self, files: &[FileHandle]) -> SessionReport {
        let mut report = SessionReport::new(files.len());
        let policy = self.policy(true);
        let file_limit = policy.file_limit();

        let workflow_id = Uuid::new_v4().to_string();
        report.workflow_id = Some(workflow_id.clone());
        info!(
            "开始多文件上传: {} 个文件, workflow={}, 并发策略={:?}",
            files.len(),
            workflow_id,
            policy
        );

        // 各文件准备失败互不影响
        let prepared = Mutex::new(Vec::with_capacity(files.len()));
        {
            let prepared = &prepared;
            let workflow_id = workflow_id.as_str();
            execute_in_batches(files.iter().enumerate(), file_limit, |(index, file)| async move {
                match self.prepare(file, Some(workflow_id)).await {
                    Ok((blob, asset)) => prepared.lock().push(PreparedFile {
                        file_index: index,
                        content_type: file.content_type.clone(),
                        asset,
                        blob,
                    }),
                    Err(e) => {
                        warn!("文件 #{} 准备失败: {}, {}", index, file.name, e);
                        self.ui.report_error(&classify_upload_error(&e)).await;
                    }
                }
            })
            .await;
        }
        let mut prepared = prepared.into_inner();
        prepared.sort_by_key(|p| p.file_index);
        report.assets_created = prepared.len();

        let Some(first) = prepared.first() else {
            self.dispatch_generic_error(&mut report, None).await;
            return report.finish(SessionOutcome::Failed(FailureReason::Preparation));
        };

        self.ui.update_progress(75);

        let workflow = &self.config.workflow;
        let redirect = RedirectOptions {
            asset_id: Some(first.asset.id.clone()),
            target_product: workflow.product_name.clone(),
            payload: RedirectPayload {
                language_region: workflow.lang_region.clone(),
                language_code: workflow.lang_code.clone(),
                verb: workflow.verb.clone(),
                multifile: Some(true),
                workflow_id: Some(workflow_id.clone()),
                ..Default::default()
            },
        };
        if !self.ui.request_redirect_decision(&redirect).await {
            return report.finish(SessionOutcome::RedirectDeclined);
        }

        self.ui
            .emit_analytics("uploading", Some(files_summary(files)));

        let uploader = ChunkUploader::new(self.store.clone(), self.ui.clone());
        let chunked = uploader
            .upload_files(&prepared, policy.max_concurrent_chunks)
            .await;
        report.failed_files = chunked.failed.iter().map(|&i| prepared[i].file_index).collect();
        report.skipped_files = chunked.skipped.iter().map(|&i| prepared[i].file_index).collect();

        if chunked.unsuccessful() == prepared.len() {
            self.dispatch_generic_error(&mut report, None).await;
            return report.finish(SessionOutcome::Failed(FailureReason::ChunkUpload));
        }
        report.operations.push(workflow_id);

        let uploaded: Vec<&PreparedFile> = prepared
            .iter()
            .enumerate()
            .filter(|(i, _)| chunked.is_uploaded(*i))
            .map(|(_, p)| p)
            .collect();

        let finalize = FinalizeClient::new(
            self.service.as_ref(),
            &self.config.service.surface_id,
            self.config.upload.finalize_timeout(),
        );
        let verified = AtomicUsize::new(0);
        {
            let finalize = &finalize;
            let verified = &verified;
            execute_in_batches(uploaded, file_limit, |file| async move {
                if finalize.is_verified(&file.asset).await {
                    verified.fetch_add(1, Ordering::SeqCst);
                } else {
                    let detail = format!("Verification failed for file: {}", file.asset.id);
                    self.ui
                        .report_error(&ErrorReport::generic(Some(detail)).silent())
                        .await;
                }
            })
            .await;
        }
        report.verified = verified.into_inner();

        if report.verified == 0 {
            self.dispatch_generic_error(&mut report, None).await;
            return report.finish(SessionOutcome::Failed(FailureReason::Verification));
        }

        let outcome = if report.verified != files.len() {
            warn!(
                "多文件部分上传: 确认 {}/{}, workflow={:?}",
                report.verified,
                files.len(),
                report.workflow_id
            );
            SessionOutcome::PartiallyUploaded
        } else {
            SessionOutcome::Uploaded
        };

        self.ui.update_progress(95);
        debug!("多文件上传结束: {:?}", outcome);
        report.finish(outcome)
    }
}

/// 埋点用的文件列表
fn files_summary(files: &[FileHandle]) -> Value {
    let summaries: Vec<AssetSummary> = files
        .iter()
        .map(|f| AssetSummary {
            name: f.name.clone(),
            size: f.size,
            content_type: f.content_type.clone(),
        })
        .collect();
    serde_json::to_value(summaries).unwrap_or(Value::Null)
}
