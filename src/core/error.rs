//! 刷图核心错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 FarmError 决定 Reconnect / ReportAndReconnect / Report / Ignore。

use thiserror::Error;

use crate::client::traits::ClientError;

/// 核心运行中可能出现的错误；生物消失不是错误，属于正常的遭遇结局
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FarmError {
    /// 会话令牌失效，重连即可恢复
    #[error("Session invalid")]
    SessionInvalid,

    /// 不透明的远程失败；核心无法区分原因，与会话失效走同一恢复路径
    #[error("Remote failure: {0}")]
    Remote(String),

    /// 开局容量检查未通过，会话不启动
    #[error("Preflight blocked: {0}")]
    PreflightBlocked(String),

    /// 命令与当前状态互斥（会话运行中 / 重入）
    #[error("Busy: {0}")]
    Busy(String),

    #[error("Login failed: {0}")]
    Login(String),
}

impl From<ClientError> for FarmError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::SessionInvalid => FarmError::SessionInvalid,
            ClientError::Remote(msg) => FarmError::Remote(msg),
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 重放凭据重建连接，从循环顶部继续
    Reconnect,
    /// 记录日志、写诊断报告，然后重连
    ReportAndReconnect,
    /// 只上报给展示层，会话状态不变
    Report,
    /// 静默忽略（无操作）
    Ignore,
}
