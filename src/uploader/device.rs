// 设备档位判定
//
// 根据可用的逻辑核心数粗分三档，用于决定上传并发上限

use serde::{Deserialize, Serialize};

/// 设备档位（从低到高有序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceTier {
    /// <= 3 核
    LowEnd,
    /// 4-6 核，或无法获取核心数
    MidRange,
    /// > 6 核
    HighEnd,
}

impl DeviceTier {
    /// 根据逻辑核心数判定档位
    ///
    /// 核心数未上报（或为 0）时按中端处理
    pub fn classify(cores: Option<usize>) -> Self {
        match cores {
            None | Some(0) => DeviceTier::MidRange,
            Some(n) if n > 6 => DeviceTier::HighEnd,
            Some(n) if n <= 3 => DeviceTier::LowEnd,
            Some(_) => DeviceTier::MidRange,
        }
    }

    /// 探测当前设备档位
    pub fn detect() -> Self {
        let cores = std::thread::available_parallelism()
            .ok()
            .map(|n| n.get());
        let tier = Self::classify(cores);
        tracing::debug!("设备档位: {:?} (逻辑核心数: {:?})", tier, cores);
        tier
    }
}
