// 业务校验
//
// 目前只有页数上限（maxNumPages）：上传完成后轮询资产元数据，
// 拿到页数后与配置比较。未知的校验项名称直接忽略。
//
// 轮询状态机：
//   Polling ──(拿到页数)──> Resolved(exceeded)
//   Polling ──(总时限到)──> TimedOut            => 视为未超限
//   Polling ──(请求异常)──> Failed              => 视为未超限，同时报通用错误
//
// 同一时刻最多一个元数据请求在途；请求未返回时的 tick 直接跳过

use crate::config::{ValidationConfig, MAX_NUM_PAGES};
use crate::error::{ErrorKey, ErrorReport, ServiceError};
use crate::service::{AssetMetadata, AssetRecord, AssetService, HostUi};
use futures::future::{BoxFuture, OptionFuture};
use std::time::Duration;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 轮询周期下限
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// 轮询终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// 拿到页数并完成判断
    Resolved { exceeded: bool },
    /// 总时限内没有拿到页数
    TimedOut,
    /// 轮询过程中请求异常
    Failed,
}

/// 轮询结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub state: PollState,
    /// 实际发出的元数据请求数
    pub requests: usize,
    /// 观察到的页数
    pub num_pages: Option<u64>,
}

impl PollOutcome {
    /// 是否超限（只有 Resolved 且超限才为 true）
    pub fn exceeded(&self) -> bool {
        matches!(self.state, PollState::Resolved { exceeded: true })
    }
}

/// 循环内部的跳出原因
enum PollStep {
    Observed(u64),
    Deadline,
    Error(ServiceError),
}

/// 页数上限轮询器
pub struct PageLimitPoller<'a> {
    service: &'a dyn AssetService,
    ui: &'a dyn HostUi,
    max_pages: u64,
    interval: Duration,
    deadline: Duration,
}

impl<'a> PageLimitPoller<'a> {
    pub fn new(
        service: &'a dyn AssetService,
        ui: &'a dyn HostUi,
        max_pages: u64,
        interval: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            service,
            ui,
            max_pages,
            // interval_at 不接受零周期
            interval: interval.max(MIN_POLL_INTERVAL),
            deadline,
        }
    }

    /// 页数是否超限
    pub async fn is_limit_exceeded(&self, asset: &AssetRecord) -> bool {
        self.poll(asset).await.exceeded()
    }

    /// 轮询元数据直到拿到页数、超时或出错
    pub async fn poll(&self, asset: &AssetRecord) -> PollOutcome {
        let start = Instant::now();
        let mut ticker = interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let deadline = sleep_until(start + self.deadline);
        tokio::pin!(deadline);

        let mut in_flight: Option<BoxFuture<'_, Result<AssetMetadata, ServiceError>>> = None;
        let mut requests = 0usize;

        let step = loop {
            tokio::select! {
                biased;

                result = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                    in_flight = None;
                    match result {
                        Some(Ok(metadata)) => match metadata.num_pages {
                            Some(pages) => break PollStep::Observed(pages),
                            None => debug!("元数据尚无页数: asset={}", asset.id),
                        },
                        Some(Err(e)) => break PollStep::Error(e),
                        None => {}
                    }
                }
                _ = &mut deadline => break PollStep::Deadline,
                _ = ticker.tick() => {
                    if in_flight.is_some() {
                        debug!("上一个元数据请求未返回，跳过本次轮询: asset={}", asset.id);
                    } else {
                        requests += 1;
                        in_flight = Some(self.service.get_metadata(&asset.id));
                    }
                }
            }
        };
        // 离开循环即停止计时；在途请求随之丢弃

        match step {
            PollStep::Observed(pages) => {
                let exceeded = self.evaluate(asset, pages).await;
                PollOutcome {
                    state: PollState::Resolved { exceeded },
                    requests,
                    num_pages: Some(pages),
                }
            }
            PollStep::Deadline => {
                info!(
                    "页数轮询超时 ({:?})，视为未超限: asset={}, 请求数={}",
                    self.deadline, asset.id, requests
                );
                PollOutcome {
                    state: PollState::TimedOut,
                    requests,
                    num_pages: None,
                }
            }
            PollStep::Error(e) => {
                warn!("页数轮询异常: asset={}, {}", asset.id, e);
                self.ui.show_blocking_screen(false).await;
                self.ui
                    .report_error(&ErrorReport::generic(Some(
                        "Exception thrown when verifying PDF page count.".to_string(),
                    )))
                    .await;
                PollOutcome {
                    state: PollState::Failed,
                    requests,
                    num_pages: None,
                }
            }
        }
    }

    /// 判断页数是否超限，超限时提示用户
    async fn evaluate(&self, asset: &AssetRecord, pages: u64) -> bool {
        if pages > self.max_pages {
            info!(
                "页数超限: asset={}, 页数={}, 上限={}",
                asset.id, pages, self.max_pages
            );
            self.ui.show_blocking_screen(false).await;
            self.ui
                .report_error(&ErrorReport::new(ErrorKey::MaxPageCount))
                .await;
            return true;
        }

        debug!("页数校验通过: asset={}, 页数={}", asset.id, pages);
        false
    }
}

/// 校验汇总结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// 全部校验通过
    pub validated: bool,
    /// 校验过程中出现异常（已向用户报告）
    pub errored: bool,
}

/// 执行配置的全部校验项
pub async fn handle_validations(
    service: &dyn AssetService,
    ui: &dyn HostUi,
    config: &ValidationConfig,
    asset: &AssetRecord,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome {
        validated: true,
        errored: false,
    };

    for (name, limit) in &config.limits {
        match name.as_str() {
            MAX_NUM_PAGES => {
                let poller = PageLimitPoller::new(
                    service,
                    ui,
                    *limit,
                    config.poll_interval(),
                    config.poll_deadline(),
                );
                let result = poller.poll(asset).await;
                if result.exceeded() {
                    outcome.validated = false;
                }
                if result.state == PollState::Failed {
                    outcome.errored = true;
                }
            }
            other => debug!("忽略未知校验项: {}", other),
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_asset, FakeAssetService, MetadataScript, RecordingUi};
    use std::collections::BTreeMap;

    fn poller<'a>(service: &'a FakeAssetService, ui: &'a RecordingUi, max: u64) -> PageLimitPoller<'a> {
        PageLimitPoller::new(
            service,
            ui,
            max,
            Duration::from_millis(500),
            Duration::from_millis(5000),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_at_third_tick_exceeds_limit() {
        let service = FakeAssetService::default();
        service.script_metadata(vec![
            MetadataScript::ready(AssetMetadata::default()),
            MetadataScript::ready(AssetMetadata::default()),
            MetadataScript::ready(AssetMetadata::with_pages(12)),
        ]);
        let ui = RecordingUi::default();
        let asset = sample_asset("a", 4, 1, 4);

        let start = Instant::now();
        let outcome = poller(&service, &ui, 10).poll(&asset).await;

        assert_eq!(outcome.state, PollState::Resolved { exceeded: true });
        assert_eq!(outcome.requests, 3);
        assert_eq!(outcome.num_pages, Some(12));
        assert_eq!(start.elapsed().as_millis(), 1500);

        let errors = ui.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, ErrorKey::MaxPageCount);
        assert_eq!(ui.blocking_screen_calls(), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let service = FakeAssetService::default();
        service.script_metadata(vec![
            MetadataScript::ready(AssetMetadata::default()),
            MetadataScript::ready(AssetMetadata::with_pages(12)),
        ]);
        let ui = RecordingUi::default();

        let start = Instant::now();
        let outcome = PageLimitPoller::new(&service, &ui, 10, Duration::ZERO, Duration::from_millis(5000))
            .poll(&sample_asset("a", 4, 1, 4))
            .await;

        assert_eq!(outcome.state, PollState::Resolved { exceeded: true });
        assert_eq!(outcome.requests, 2);
        assert_eq!(start.elapsed().as_millis(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_within_limit_resolves_false() {
        let service = FakeAssetService::default();
        service.script_metadata(vec![MetadataScript::ready(AssetMetadata::with_pages(10))]);
        let ui = RecordingUi::default();

        let outcome = poller(&service, &ui, 10).poll(&sample_asset("a", 4, 1, 4)).await;
        assert_eq!(outcome.state, PollState::Resolved { exceeded: false });
        assert!(!outcome.exceeded());
        assert!(ui.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_page_count_times_out_false() {
        let service = FakeAssetService::default();
        let ui = RecordingUi::default();
        let asset = sample_asset("a", 4, 1, 4);

        let start = Instant::now();
        let exceeded = poller(&service, &ui, 10).is_limit_exceeded(&asset).await;

        assert!(!exceeded);
        assert_eq!(start.elapsed().as_millis(), 5000);
        // 500ms 一次，5000ms 时限内共 9 次（第 10 次与时限同时到达，时限优先）
        assert_eq!(service.metadata_calls(), 9);
        assert!(ui.errors().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_never_overlaps() {
        let service = FakeAssetService::default();
        // 每个请求耗时 1200ms，跨越两个 tick
        service.script_metadata(vec![
            MetadataScript::delayed(AssetMetadata::default(), 1200),
            MetadataScript::delayed(AssetMetadata::default(), 1200),
            MetadataScript::delayed(AssetMetadata::default(), 1200),
        ]);
        let ui = RecordingUi::default();

        let outcome = poller(&service, &ui, 10).poll(&sample_asset("a", 4, 1, 4)).await;

        assert_eq!(outcome.state, PollState::TimedOut);
        assert_eq!(service.max_concurrent_metadata(), 1);
        // 500 发出 -> 1700 返回；2000 发出 -> 3200 返回；3500 发出 -> 4700 返回；5000 时限到
        assert_eq!(outcome.requests, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_error_resolves_false_and_reports() {
        let service = FakeAssetService::default();
        service.script_metadata(vec![MetadataScript::error(ServiceError::status(500, "boom"))]);
        let ui = RecordingUi::default();

        let outcome = poller(&service, &ui, 10).poll(&sample_asset("a", 4, 1, 4)).await;

        assert_eq!(outcome.state, PollState::Failed);
        assert!(!outcome.exceeded());
        let errors = ui.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, ErrorKey::Generic);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_validations_ignores_unknown_limits() {
        let service = FakeAssetService::default();
        let ui = RecordingUi::default();
        let mut limits = BTreeMap::new();
        limits.insert("maxFileSizeMb".to_string(), 100);
        let config = ValidationConfig {
            limits,
            ..Default::default()
        };

        let outcome = handle_validations(&service, &ui, &config, &sample_asset("a", 4, 1, 4)).await;
        assert!(outcome.validated);
        assert!(!outcome.errored);
        assert_eq!(service.metadata_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_validations_page_limit() {
        let service = FakeAssetService::default();
        service.script_metadata(vec![MetadataScript::ready(AssetMetadata::with_pages(30))]);
        let ui = RecordingUi::default();
        let mut limits = BTreeMap::new();
        limits.insert(MAX_NUM_PAGES.to_string(), 20);
        let config = ValidationConfig {
            limits,
            ..Default::default()
        };

        let outcome = handle_validations(&service, &ui, &config, &sample_asset("a", 4, 1, 4)).await;
        assert!(!outcome.validated);
        assert!(!outcome.errored);
    }
}
