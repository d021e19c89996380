//! 刷图编排器：主控循环
//!
//! 负责：登录、建立 cmd/status/event 三通道、启动后台回收与状态刷新，
//! 并在后台任务中消费展示层命令（Start/Stop/ForceUnban/维护操作/Quit）。
//! 破坏性命令（进化、放生、回收）与运行中的会话互斥。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::traits::Connector;
use crate::client::types::ItemKind;
use crate::config::AppConfig;
use crate::core::state::{StatusPublisher, StatusSnapshot};
use crate::core::{FarmError, SessionSupervisor};
use crate::farming::events::{EventBus, FarmEvent};
use crate::farming::maintenance::{
    dispose_duplicates, evolve_all, force_unban, recycle_items, show_stats, use_consumable,
};
use crate::farming::recycler::BackgroundRecycler;
use crate::farming::session::FarmContext;
use crate::farming::stats::SessionTotals;

/// 从展示层发往核心的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 开始刷图（需通过容量检查）
    Start,
    /// 停止刷图，在下一个边界生效
    Stop,
    /// 停止会话后解除软封禁
    ForceUnban,
    RunEvolution,
    RunDisposal,
    RunRecycle,
    /// 使用熏香
    UseIncense,
    /// 使用幸运蛋
    UseLuckyEgg,
    ShowStats,
    /// 开关后台静默回收
    SetSilentRecycle(bool),
    /// 退出
    Quit,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::ForceUnban => "force_unban",
            Command::RunEvolution => "run_evolution",
            Command::RunDisposal => "run_disposal",
            Command::RunRecycle => "run_recycle",
            Command::UseIncense => "use_incense",
            Command::UseLuckyEgg => "use_lucky_egg",
            Command::ShowStats => "show_stats",
            Command::SetSilentRecycle(_) => "set_silent_recycle",
            Command::Quit => "quit",
        }
    }

    /// 与运行中的会话互斥
    fn is_destructive(&self) -> bool {
        matches!(
            self,
            Command::RunEvolution | Command::RunDisposal | Command::RunRecycle
        )
    }
}

/// 正在运行的会话：停止令牌 + 任务句柄
struct RunningSession {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl RunningSession {
    fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    async fn stop_and_wait(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Session task ended abnormally: {}", e);
        }
    }
}

/// 命令循环的内部状态
struct Controller {
    supervisor: Arc<SessionSupervisor>,
    recycler: BackgroundRecycler,
    running: Option<RunningSession>,
    unbanning: Arc<AtomicBool>,
}

impl Controller {
    fn ctx(&self) -> &Arc<FarmContext> {
        self.supervisor.context()
    }

    fn session_running(&self) -> bool {
        self.running.as_ref().is_some_and(RunningSession::is_running)
    }

    fn reject(&self, command: &Command, reason: &str) {
        tracing::info!("Ignoring {}: {}", command.name(), reason);
        self.ctx().events.emit(FarmEvent::CommandRejected {
            command: command.name().to_string(),
            reason: reason.to_string(),
        });
    }

    fn report(&self, kind: &str, err: &FarmError) {
        tracing::warn!("{} failed: {}", kind, err);
        self.ctx().reporter.create(kind, "Command failed", err);
    }

    /// 处理一条命令；返回 false 表示退出
    async fn handle(&mut self, command: Command) -> bool {
        if command.is_destructive() && self.session_running() {
            self.reject(&command, "farming session is running");
            return true;
        }
        if command.is_destructive() && self.unbanning.load(Ordering::SeqCst) {
            self.reject(&command, "force unban in progress");
            return true;
        }

        match command {
            Command::Start => self.start(&command).await,
            Command::Stop => {
                if let Some(running) = &self.running {
                    tracing::info!("Stopping farming after the current step...");
                    running.stop.cancel();
                }
            }
            Command::ForceUnban => self.force_unban(&command),
            Command::RunEvolution => {
                let mut totals = SessionTotals::default();
                if let Err(e) = evolve_all(self.ctx(), &mut totals).await {
                    self.report("EvolveError", &e);
                }
            }
            Command::RunDisposal => {
                if let Err(e) = dispose_duplicates(self.ctx(), true).await {
                    self.report("TransferError", &e);
                }
            }
            Command::RunRecycle => {
                recycle_items(self.ctx()).await;
            }
            Command::UseIncense => self.consume(ItemKind::IncenseOrdinary).await,
            Command::UseLuckyEgg => self.consume(ItemKind::LuckyEgg).await,
            Command::ShowStats => {
                if let Err(e) = show_stats(self.ctx()).await {
                    self.report("StatsError", &e);
                }
            }
            Command::SetSilentRecycle(enabled) => self.recycler.set_enabled(enabled),
            Command::Quit => return false,
        }
        true
    }

    async fn start(&mut self, command: &Command) {
        if self.session_running() {
            self.reject(command, "farming session is already running");
            return;
        }
        if self.unbanning.load(Ordering::SeqCst) {
            self.reject(command, "force unban in progress");
            return;
        }
        let mut session = match self.supervisor.start().await {
            Ok(session) => session,
            Err(FarmError::PreflightBlocked(_)) => return,
            Err(e) => {
                self.report("StartError", &e);
                return;
            }
        };
        let stop = session.active.clone();
        let supervisor = Arc::clone(&self.supervisor);
        let task = tokio::spawn(async move {
            supervisor.run(&mut session).await;
        });
        self.running = Some(RunningSession { stop, task });
    }

    fn force_unban(&mut self, command: &Command) {
        if self.unbanning.swap(true, Ordering::SeqCst) {
            self.reject(command, "force unban already in progress");
            return;
        }
        let previous = self.running.take();
        let ctx = Arc::clone(self.ctx());
        let unbanning = Arc::clone(&self.unbanning);
        tokio::spawn(async move {
            if let Some(running) = previous {
                running.stop_and_wait().await;
            }
            if let Err(e) = force_unban(&ctx).await {
                tracing::warn!("Force unban failed: {}", e);
                ctx.reporter.create("ForceUnbanError", "Force unban failed", &e);
                ctx.events.emit(FarmEvent::UnbanFinished { success: false });
            }
            unbanning.store(false, Ordering::SeqCst);
        });
    }

    async fn consume(&self, kind: ItemKind) {
        if let Err(e) = use_consumable(self.ctx(), kind).await {
            self.report("ConsumableError", &e);
        }
    }

    async fn shutdown(mut self) {
        if let Some(running) = self.running.take() {
            running.stop_and_wait().await;
        }
    }
}

/// 定时重算速率，直到 shutdown
fn spawn_status_ticker(status: StatusPublisher, every: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => status.refresh_rates(),
            }
        }
    });
}

/// 创建刷图控制器：登录后返回命令发送端、状态接收端、事件接收端；后台任务消费命令。
///
/// Quit 或 shutdown 取消时停止会话与后台任务。
pub async fn create_controller(
    config: AppConfig,
    connector: Arc<dyn Connector>,
    shutdown: CancellationToken,
) -> anyhow::Result<(
    mpsc::UnboundedSender<Command>,
    watch::Receiver<StatusSnapshot>,
    broadcast::Receiver<FarmEvent>,
)> {
    let events = EventBus::default();
    let event_rx = events.subscribe();
    let (status, status_rx) = StatusPublisher::channel();

    let ctx = FarmContext::connect(config, connector, events, status)
        .await
        .context("Failed to log in")?;
    let ctx = Arc::new(ctx);
    ctx.refresh_player().await.context("Failed to load player info")?;

    let background = shutdown.child_token();
    let recycler = BackgroundRecycler::new(ctx.handle.clone(), &ctx.config.recycler);
    recycler.spawn(background.clone());
    spawn_status_ticker(
        ctx.status.clone(),
        Duration::from_secs(ctx.config.farming.status_refresh_secs.max(1)),
        background.clone(),
    );

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let mut controller = Controller {
        supervisor: Arc::new(SessionSupervisor::new(ctx)),
        recycler,
        running: None,
        unbanning: Arc::new(AtomicBool::new(false)),
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if !controller.handle(cmd).await {
                            break;
                        }
                    }
                    None => break, // cmd_tx 已关闭，退出循环
                },
                _ = shutdown.cancelled() => break,
            }
        }
        controller.shutdown().await;
        background.cancel();
        tracing::info!("Farming controller stopped");
    });

    Ok((cmd_tx, status_rx, event_rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destructive_commands() {
        assert!(Command::RunEvolution.is_destructive());
        assert!(Command::RunDisposal.is_destructive());
        assert!(Command::RunRecycle.is_destructive());
        assert!(!Command::UseIncense.is_destructive());
        assert!(!Command::Stop.is_destructive());
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Command::SetSilentRecycle(true).name(), "set_silent_recycle");
        assert_eq!(Command::ForceUnban.name(), "force_unban");
    }
}
