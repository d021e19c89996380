//! 错误恢复引擎
//!
//! 根据 FarmError 类型返回 RecoveryAction，供 Supervisor 决定重连、上报还是忽略。
//! (a) 会话失效与 (b) 远程失败都不致命，一律重连并从检查点遍历的顶部继续。

use crate::core::{FarmError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &FarmError) -> RecoveryAction {
        match err {
            FarmError::SessionInvalid => RecoveryAction::Reconnect,
            FarmError::Remote(_) => RecoveryAction::ReportAndReconnect,
            // 重连过程中的登录失败同样再次重连（由调用方等待后重试）
            FarmError::Login(_) => RecoveryAction::ReportAndReconnect,
            FarmError::PreflightBlocked(_) => RecoveryAction::Report,
            FarmError::Busy(_) => RecoveryAction::Ignore,
        }
    }
}
