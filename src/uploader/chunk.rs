// 上传分片规划与上传
//
// 分片规则：
// - 分片大小由服务端在 create_asset 时分配（blocksize）
// - 分片数 = ceil(文件大小 / blocksize)，必须与上传地址数一致，否则整个文件跳过
// - 第 i 个分片上传到 uploadUrls[i]，地址预分配，完成顺序无关
//
// 失败处理：
// - 同一文件任一分片失败即标记该文件失败，尚未开始的同文件分片直接跳过
// - 已经发出的分片请求不会被取消
// - 失败集合按文件位置去重

use crate::error::{ErrorReport, TransferError};
use crate::service::{AssetRecord, ContentBlob, HostUi, ObjectStore};
use crate::uploader::execute_in_batches;
use parking_lot::Mutex;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 计算分片数，blocksize 为 0 时无法分片
pub fn expected_chunk_count(total_size: u64, block_size: u64) -> Option<usize> {
    if block_size == 0 {
        return None;
    }
    Some(total_size.div_ceil(block_size) as usize)
}

/// 计算各分片的字节范围
pub fn calculate_chunks(total_size: u64, block_size: u64) -> Vec<Range<u64>> {
    if block_size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut offset = 0u64;

    while offset < total_size {
        let end = std::cmp::min(offset + block_size, total_size);
        chunks.push(offset..end);
        offset = end;
    }

    chunks
}

/// 待上传的文件（资产 + 内容）
#[derive(Debug, Clone)]
pub struct PreparedFile {
    /// 在原始文件列表中的位置
    pub file_index: usize,
    pub asset: AssetRecord,
    pub blob: ContentBlob,
    pub content_type: String,
}

/// 上传分片
#[derive(Debug, Clone)]
pub struct UploadChunk {
    /// 所属文件（在本次上传文件列表中的位置）
    pub file: usize,
    /// 分片索引
    pub index: usize,
    /// 该文件分片总数
    pub total: usize,
    /// 字节范围
    pub range: Range<u64>,
    /// 上传地址
    pub url: String,
}

impl UploadChunk {
    /// 分片大小
    pub fn size(&self) -> u64 {
        self.range.end - self.range.start
    }
}

/// 为单个文件生成分片，地址数与分片数不一致时返回 None
pub fn plan_file_chunks(file: usize, asset: &AssetRecord, blob_size: u64) -> Option<Vec<UploadChunk>> {
    let total = expected_chunk_count(blob_size, asset.block_size)?;
    if asset.upload_urls.len() != total {
        return None;
    }

    let chunks = calculate_chunks(blob_size, asset.block_size)
        .into_iter()
        .zip(&asset.upload_urls)
        .enumerate()
        .map(|(index, (range, url))| UploadChunk {
            file,
            index,
            total,
            range,
            url: url.href.clone(),
        })
        .collect();

    Some(chunks)
}

/// 失败文件集合（按文件位置去重，保持首次失败顺序）
#[derive(Debug, Default)]
pub struct FailureSet {
    files: Mutex<Vec<usize>>,
}

impl FailureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录失败文件，已存在时返回 false
    pub fn insert(&self, file: usize) -> bool {
        let mut files = self.files.lock();
        if files.contains(&file) {
            return false;
        }
        files.push(file);
        true
    }

    pub fn contains(&self, file: usize) -> bool {
        self.files.lock().contains(&file)
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.files.into_inner()
    }
}

/// 一次分片上传的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkUploadReport {
    /// 至少一个分片失败的文件位置
    pub failed: Vec<usize>,
    /// 地址数不匹配、未生成任何分片的文件位置
    pub skipped: Vec<usize>,
    /// 生成的分片总数
    pub planned_chunks: usize,
}

impl ChunkUploadReport {
    /// 文件是否成功上传（未失败且未跳过）
    pub fn is_uploaded(&self, file: usize) -> bool {
        !self.failed.contains(&file) && !self.skipped.contains(&file)
    }

    /// 未能上传的文件数
    pub fn unsuccessful(&self) -> usize {
        self.failed.len() + self.skipped.len()
    }
}

/// 单次上传过程中的共享状态
struct UploadState<'a> {
    files: &'a [PreparedFile],
    /// 每个文件的失败标记（只会从 false 变为 true）
    file_failed: Vec<AtomicBool>,
    failures: FailureSet,
}

/// 分片上传器
pub struct ChunkUploader {
    store: Arc<dyn ObjectStore>,
    ui: Arc<dyn HostUi>,
}

impl ChunkUploader {
    pub fn new(store: Arc<dyn ObjectStore>, ui: Arc<dyn HostUi>) -> Self {
        Self { store, ui }
    }

    /// 上传所有文件的分片
    ///
    /// 所有文件的分片展平为一个任务列表，按 `max_concurrent_chunks` 并发执行
    pub async fn upload_files(
        &self,
        files: &[PreparedFile],
        max_concurrent_chunks: usize,
    ) -> ChunkUploadReport {
        let mut tasks = Vec::new();
        let mut skipped = Vec::new();

        for (file, prepared) in files.iter().enumerate() {
            match plan_file_chunks(file, &prepared.asset, prepared.blob.size()) {
                Some(chunks) => tasks.extend(chunks),
                None => {
                    warn!(
                        "上传地址数与分片数不一致，跳过文件 #{}: asset={}, size={}, blocksize={}, 地址数={}",
                        file,
                        prepared.asset.id,
                        prepared.blob.size(),
                        prepared.asset.block_size,
                        prepared.asset.upload_urls.len()
                    );
                    skipped.push(file);
                }
            }
        }

        let planned_chunks = tasks.len();
        info!(
            "[并发上传] 开始上传 {} 个文件的 {} 个分片，并发数: {}",
            files.len(),
            planned_chunks,
            max_concurrent_chunks
        );

        let state = UploadState {
            files,
            file_failed: files.iter().map(|_| AtomicBool::new(false)).collect(),
            failures: FailureSet::new(),
        };

        execute_in_batches(tasks, max_concurrent_chunks, |chunk| {
            self.upload_chunk(chunk, &state)
        })
        .await;

        let failed = state.failures.into_vec();
        info!(
            "[并发上传] 完成: 失败文件 {:?}, 跳过文件 {:?}",
            failed, skipped
        );

        ChunkUploadReport {
            failed,
            skipped,
            planned_chunks,
        }
    }

    /// 上传单个分片
    async fn upload_chunk(&self, chunk: UploadChunk, state: &UploadState<'_>) {
        // 同文件已有分片失败，不再发起新请求
        if state.file_failed[chunk.file].load(Ordering::SeqCst) {
            debug!("[文件#{} 分片#{}] 文件已失败，跳过", chunk.file, chunk.index);
            return;
        }

        let prepared = &state.files[chunk.file];
        let body = prepared.blob.slice(chunk.range.clone());

        debug!(
            "[文件#{} 分片#{}] 开始上传 (范围: {}-{}, 大小: {} bytes)",
            chunk.file,
            chunk.index,
            chunk.range.start,
            chunk.range.end.saturating_sub(1),
            chunk.size()
        );

        match self.store.put(&chunk.url, &prepared.content_type, body).await {
            Ok(()) => {
                debug!(
                    "[文件#{} 分片#{}] ✓ 上传成功 ({}/{})",
                    chunk.file,
                    chunk.index + 1,
                    chunk.index + 1,
                    chunk.total
                );
            }
            Err(e) => self.record_failure(&chunk, state, e).await,
        }
    }

    async fn record_failure(&self, chunk: &UploadChunk, state: &UploadState<'_>, e: TransferError) {
        state.file_failed[chunk.file].store(true, Ordering::SeqCst);
        state.failures.insert(chunk.file);

        let asset_id = &state.files[chunk.file].asset.id;
        let detail = format!(
            "Error uploading chunk {}/{} of file {}/{}: {}",
            chunk.index + 1,
            chunk.total,
            chunk.file + 1,
            state.files.len(),
            asset_id
        );
        error!("[文件#{} 分片#{}] 上传失败: {}, {}", chunk.file, chunk.index, e, detail);

        self.ui
            .report_error(&ErrorReport::generic(Some(detail)).silent())
            .await;
    }
}
