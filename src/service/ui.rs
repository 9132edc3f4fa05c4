// 宿主 UI 接口
//
// 核心只通过这组接口与页面交互：重定向确认、阻塞遮罩、错误提示、进度、埋点

use crate::error::ErrorReport;
use crate::service::RedirectOptions;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

/// 宿主 UI
#[async_trait]
pub trait HostUi: Send + Sync {
    /// 请求重定向确认，返回 false 时流程静默终止
    async fn request_redirect_decision(&self, options: &RedirectOptions) -> bool;

    /// 显示 / 关闭阻塞遮罩
    async fn show_blocking_screen(&self, active: bool);

    /// 向用户报告错误
    async fn report_error(&self, report: &ErrorReport);

    /// 更新进度（百分比）
    fn update_progress(&self, percent: u8);

    /// 发送埋点事件
    fn emit_analytics(&self, event: &str, payload: Option<Value>);
}

/// 命令行下的 UI：全部写日志，重定向总是接受
#[derive(Debug, Clone, Default)]
pub struct ConsoleUi;

#[async_trait]
impl HostUi for ConsoleUi {
    async fn request_redirect_decision(&self, options: &RedirectOptions) -> bool {
        info!(
            "重定向: {}",
            serde_json::to_string(options).unwrap_or_default()
        );
        true
    }

    async fn show_blocking_screen(&self, active: bool) {
        info!("遮罩: {}", if active { "显示" } else { "关闭" });
    }

    async fn report_error(&self, report: &ErrorReport) {
        if report.silent {
            warn!(
                "[{}] status={:?} {}",
                report.key,
                report.status,
                report.detail.as_deref().unwrap_or("")
            );
        } else {
            error!(
                "[{}] status={:?} {}",
                report.key,
                report.status,
                report.detail.as_deref().unwrap_or("")
            );
        }
    }

    fn update_progress(&self, percent: u8) {
        info!("进度: {}%", percent);
    }

    fn emit_analytics(&self, event: &str, payload: Option<Value>) {
        let payload = payload.unwrap_or(Value::Null);
        info!("埋点: {} {}", event, payload);
    }
}
