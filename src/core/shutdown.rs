//! 优雅关闭
//!
//! Ctrl+C / SIGTERM 触发同一个 CancellationToken；退出前依次执行清理任务：
//! - 让正在运行的刷图会话走到边界并停止
//! - 等待后台回收与状态刷新退出

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::orchestrator::Command;
use crate::core::state::{SessionPhase, StatusSnapshot};

/// 关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
    /// 命令循环自行结束（Quit 或通道关闭）
    ControllerExited,
}

/// 关闭信号管理器
#[derive(Debug, Clone)]
pub struct ShutdownManager {
    token: CancellationToken,
    reason_tx: broadcast::Sender<ShutdownReason>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (reason_tx, _) = broadcast::channel(1);
        Self {
            token: CancellationToken::new(),
            reason_tx,
        }
    }

    /// 关闭 token；控制器与后台任务以它（或其子 token）为退出条件
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        tracing::info!("Shutting down ({:?})", reason);
        let _ = self.reason_tx.send(reason);
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.reason_tx.subscribe()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// 安装 Ctrl+C 与 SIGTERM 处理
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 关闭时执行的清理任务
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    /// 用于日志
    fn name(&self) -> &'static str;
}

/// 按注册顺序执行清理，每个任务有独立超时
pub struct ShutdownCoordinator {
    cleanup_tasks: Vec<Arc<dyn ShutdownCleanup>>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            cleanup_tasks: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.cleanup_tasks.push(Arc::new(task));
    }

    pub async fn run_cleanup(&self) {
        for task in &self.cleanup_tasks {
            let name = task.name();
            match tokio::time::timeout(self.timeout, task.cleanup()).await {
                Ok(Ok(())) => tracing::info!("Cleanup '{}' done", name),
                Ok(Err(e)) => tracing::warn!("Cleanup '{}' failed: {}", name, e),
                Err(_) => tracing::warn!(
                    "Cleanup '{}' timed out after {}s",
                    name,
                    self.timeout.as_secs()
                ),
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// 停止刷图会话：发 Stop，等状态离开 Running / Recovering
pub struct SessionCleanup {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<StatusSnapshot>,
}

impl SessionCleanup {
    pub fn new(
        cmd_tx: mpsc::UnboundedSender<Command>,
        status_rx: watch::Receiver<StatusSnapshot>,
    ) -> Self {
        Self { cmd_tx, status_rx }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for SessionCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        // 控制器已退出时发送失败，属正常情况
        let _ = self.cmd_tx.send(Command::Stop);
        let mut rx = self.status_rx.clone();
        let stopped = rx
            .wait_for(|s| !matches!(s.phase, SessionPhase::Running | SessionPhase::Recovering))
            .await;
        if stopped.is_err() {
            tracing::debug!("Status feed closed before the session reported stop");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "FarmingSession"
    }
}

/// 运行 app 直到它结束或收到关闭信号，然后执行清理
pub async fn run_with_graceful_shutdown<F, Fut>(
    manager: Arc<ShutdownManager>,
    app: F,
    cleanup: impl FnOnce() -> Fut,
) where
    F: Future<Output = ()>,
    Fut: Future<Output = ()>,
{
    manager.install_signal_handlers();

    tokio::select! {
        _ = app => {
            tracing::info!("Application finished normally");
        }
        _ = manager.wait_for_shutdown() => {
            tracing::info!("Shutdown signal received");
        }
    }

    cleanup().await;
}
