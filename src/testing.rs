// 测试用的协作方替身：内存资产服务、内存对象存储、内存内容源、记录型 UI

use crate::error::{ErrorReport, ServiceError, TransferError};
use crate::service::{
    AssetMetadata, AssetRecord, AssetService, ContentBlob, ContentSource, CreateAssetRequest,
    FileHandle, FinalizeRequest, HostUi, ObjectStore, RedirectOptions, UploadUrl,
    PDF_CONTENT_TYPE,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// 构造资产记录：`urls` 个上传地址 `https://store/<id>/<i>`
pub fn sample_asset(id: &str, block_size: u64, urls: usize, size: u64) -> AssetRecord {
    AssetRecord {
        id: id.to_string(),
        block_size,
        upload_urls: (0..urls)
            .map(|i| UploadUrl::from(format!("https://store/{}/{}", id, i).as_str()))
            .collect(),
        target_product: "acrobat".into(),
        name: format!("{}.pdf", id),
        size,
        content_type: PDF_CONTENT_TYPE.into(),
        multifile: None,
        workflow_id: None,
    }
}

/// 构造 PDF 文件句柄
pub fn pdf_file(name: &str, size: u64) -> FileHandle {
    FileHandle::new(format!("/tmp/{}", name), name, size, PDF_CONTENT_TYPE)
}

/// 一次元数据请求的脚本化响应
#[derive(Debug, Clone)]
pub struct MetadataScript {
    delay: Duration,
    result: Result<AssetMetadata, ServiceError>,
}

impl MetadataScript {
    pub fn ready(metadata: AssetMetadata) -> Self {
        Self::delayed(metadata, 0)
    }

    pub fn delayed(metadata: AssetMetadata, delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            result: Ok(metadata),
        }
    }

    pub fn error(error: ServiceError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }
}

/// 在途计数，drop 时减一（请求被丢弃也能正确计数）
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 内存资产服务
///
/// create_asset 按请求大小生成地址（默认分片 4 字节），finalize 默认返回空对象，
/// 元数据按脚本依次返回，脚本用完后返回无页数的元数据
pub struct FakeAssetService {
    block_size: AtomicUsize,
    create_failures: Mutex<HashMap<String, ServiceError>>,
    create_overrides: Mutex<HashMap<String, AssetRecord>>,
    create_calls: Mutex<Vec<CreateAssetRequest>>,
    finalize_responses: Mutex<HashMap<String, Result<Value, ServiceError>>>,
    finalize_calls: Mutex<Vec<(FinalizeRequest, Duration)>>,
    metadata_script: Mutex<VecDeque<MetadataScript>>,
    metadata_calls: AtomicUsize,
    metadata_in_flight: AtomicUsize,
    metadata_max_in_flight: AtomicUsize,
}

impl Default for FakeAssetService {
    fn default() -> Self {
        Self {
            block_size: AtomicUsize::new(4),
            create_failures: Mutex::default(),
            create_overrides: Mutex::default(),
            create_calls: Mutex::default(),
            finalize_responses: Mutex::default(),
            finalize_calls: Mutex::default(),
            metadata_script: Mutex::default(),
            metadata_calls: AtomicUsize::new(0),
            metadata_in_flight: AtomicUsize::new(0),
            metadata_max_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FakeAssetService {
    pub fn set_block_size(&self, block_size: u64) {
        self.block_size.store(block_size as usize, Ordering::SeqCst);
    }

    /// 指定文件名的 create_asset 失败
    pub fn fail_create(&self, name: &str, error: ServiceError) {
        self.create_failures.lock().insert(name.to_string(), error);
    }

    /// 指定文件名的 create_asset 返回固定记录
    pub fn override_create(&self, name: &str, record: AssetRecord) {
        self.create_overrides.lock().insert(name.to_string(), record);
    }

    pub fn create_calls(&self) -> Vec<CreateAssetRequest> {
        self.create_calls.lock().clone()
    }

    pub fn set_finalize_response(&self, asset_id: &str, response: Result<Value, ServiceError>) {
        self.finalize_responses
            .lock()
            .insert(asset_id.to_string(), response);
    }

    pub fn finalize_calls(&self) -> Vec<(FinalizeRequest, Duration)> {
        self.finalize_calls.lock().clone()
    }

    pub fn script_metadata(&self, script: Vec<MetadataScript>) {
        self.metadata_script.lock().extend(script);
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_metadata(&self) -> usize {
        self.metadata_max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetService for FakeAssetService {
    async fn create_asset(&self, request: &CreateAssetRequest) -> Result<AssetRecord, ServiceError> {
        self.create_calls.lock().push(request.clone());
        tokio::task::yield_now().await;

        if let Some(error) = self.create_failures.lock().get(&request.name).cloned() {
            return Err(error);
        }

        let mut record = match self.create_overrides.lock().get(&request.name).cloned() {
            Some(record) => record,
            None => {
                let block_size = self.block_size.load(Ordering::SeqCst) as u64;
                let urls = request.size.div_ceil(block_size) as usize;
                let id = format!("asset-{}", request.name);
                let mut record = sample_asset(&id, block_size, urls, request.size);
                record.name.clear();
                record.content_type.clear();
                record
            }
        };
        record.fill_from_request(request);
        Ok(record)
    }

    async fn finalize_asset(
        &self,
        request: &FinalizeRequest,
        timeout: Duration,
    ) -> Result<Value, ServiceError> {
        self.finalize_calls.lock().push((request.clone(), timeout));
        tokio::task::yield_now().await;

        self.finalize_responses
            .lock()
            .get(&request.asset_id)
            .cloned()
            .unwrap_or_else(|| Ok(Value::Object(Default::default())))
    }

    async fn get_metadata(&self, _asset_id: &str) -> Result<AssetMetadata, ServiceError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard::enter(&self.metadata_in_flight, &self.metadata_max_in_flight);

        let step = self
            .metadata_script
            .lock()
            .pop_front()
            .unwrap_or_else(|| MetadataScript::ready(AssetMetadata::default()));

        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.result
    }
}

/// 内存对象存储
///
/// put 先让出一次执行权，保证并发分片能同时在途
#[derive(Default)]
pub struct MemoryStore {
    failures: Mutex<HashMap<String, TransferError>>,
    stored: Mutex<HashMap<String, Bytes>>,
    attempts: Mutex<Vec<String>>,
}

impl MemoryStore {
    /// 指定地址的 PUT 总是失败
    pub fn fail_url(&self, url: &str, error: TransferError) {
        self.failures.lock().insert(url.to_string(), error);
    }

    /// 成功写入的分片数
    pub fn put_count(&self) -> usize {
        self.stored.lock().len()
    }

    pub fn bytes_for(&self, url: &str) -> Option<usize> {
        self.stored.lock().get(url).map(Bytes::len)
    }

    /// 以 `prefix` 开头的地址上发起过的 PUT 次数
    pub fn attempts_for_prefix(&self, prefix: &str) -> usize {
        self.attempts
            .lock()
            .iter()
            .filter(|url| url.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, url: &str, _content_type: &str, body: Bytes) -> Result<(), TransferError> {
        self.attempts.lock().push(url.to_string());
        tokio::task::yield_now().await;

        if let Some(error) = self.failures.lock().get(url).cloned() {
            return Err(error);
        }
        self.stored.lock().insert(url.to_string(), body);
        Ok(())
    }
}

/// 内存内容源：按文件名返回固定大小的内容
#[derive(Default)]
pub struct FakeContentSource {
    failures: Mutex<HashMap<String, ServiceError>>,
}

impl FakeContentSource {
    pub fn fail_read(&self, name: &str, error: ServiceError) {
        self.failures.lock().insert(name.to_string(), error);
    }
}

#[async_trait]
impl ContentSource for FakeContentSource {
    async fn read_blob(&self, file: &FileHandle) -> Result<ContentBlob, ServiceError> {
        tokio::task::yield_now().await;
        if let Some(error) = self.failures.lock().get(&file.name).cloned() {
            return Err(error);
        }
        Ok(ContentBlob::new(
            vec![0u8; file.size as usize],
            file.content_type.clone(),
        ))
    }
}

/// 记录所有 UI 调用
pub struct RecordingUi {
    accept_redirect: AtomicBool,
    redirects: Mutex<Vec<RedirectOptions>>,
    blocking: Mutex<Vec<bool>>,
    errors: Mutex<Vec<ErrorReport>>,
    progress: Mutex<Vec<u8>>,
    analytics: Mutex<Vec<(String, Option<Value>)>>,
}

impl Default for RecordingUi {
    fn default() -> Self {
        Self {
            accept_redirect: AtomicBool::new(true),
            redirects: Mutex::default(),
            blocking: Mutex::default(),
            errors: Mutex::default(),
            progress: Mutex::default(),
            analytics: Mutex::default(),
        }
    }
}

impl RecordingUi {
    pub fn decline_redirects(&self) {
        self.accept_redirect.store(false, Ordering::SeqCst);
    }

    pub fn redirects(&self) -> Vec<RedirectOptions> {
        self.redirects.lock().clone()
    }

    pub fn blocking_screen_calls(&self) -> Vec<bool> {
        self.blocking.lock().clone()
    }

    pub fn errors(&self) -> Vec<ErrorReport> {
        self.errors.lock().clone()
    }

    /// 非静默的错误提示
    pub fn visible_errors(&self) -> Vec<ErrorReport> {
        self.errors.lock().iter().filter(|e| !e.silent).cloned().collect()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.progress.lock().clone()
    }

    pub fn analytics_events(&self) -> Vec<String> {
        self.analytics.lock().iter().map(|(e, _)| e.clone()).collect()
    }
}

#[async_trait]
impl HostUi for RecordingUi {
    async fn request_redirect_decision(&self, options: &RedirectOptions) -> bool {
        self.redirects.lock().push(options.clone());
        self.accept_redirect.load(Ordering::SeqCst)
    }

    async fn show_blocking_screen(&self, active: bool) {
        self.blocking.lock().push(active);
    }

    async fn report_error(&self, report: &ErrorReport) {
        self.errors.lock().push(report.clone());
    }

    fn update_progress(&self, percent: u8) {
        self.progress.lock().push(percent);
    }

    fn emit_analytics(&self, event: &str, payload: Option<Value>) {
        self.analytics.lock().push((event.to_string(), payload));
    }
}
