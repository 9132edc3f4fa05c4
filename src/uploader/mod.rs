// 上传引擎模块
//
// - 设备档位 + 并发策略：按设备能力决定文件/分片并发上限
// - 有界批量执行：任意任务结束即补位
// - 分片上传：按服务端分片大小切分，失败按文件记录
// - finalize 确认、页数上限轮询
// - 会话编排：单文件 / 多文件，访客 / 用户

pub mod batch;
pub mod chunk;
pub mod device;
pub mod policy;
pub mod session;
pub mod validator;
pub mod verify;

pub use batch::{batch_upload, execute_in_batches};
pub use chunk::{
    calculate_chunks, expected_chunk_count, plan_file_chunks, ChunkUploadReport, ChunkUploader,
    FailureSet, PreparedFile, UploadChunk,
};
pub use device::DeviceTier;
pub use policy::ConcurrencyPolicy;
pub use session::{FailureReason, SessionOutcome, SessionReport, UploadOrchestrator};
pub use validator::{handle_validations, PageLimitPoller, PollOutcome, PollState, ValidationOutcome};
pub use verify::{FinalizeClient, VerifyError};
