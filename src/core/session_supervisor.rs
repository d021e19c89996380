//! 会话监管：生命周期与故障恢复
//!
//! 状态机 Idle → Running ⇄ Recovering → Stopped，阶段转换只在这里发生。
//! 任何故障都不致命：按 RecoveryEngine 的建议重放凭据重连，然后从检查点遍历的顶部继续。

use std::sync::Arc;
use std::time::Duration;

use crate::core::state::SessionPhase;
use crate::core::{FarmError, RecoveryAction, RecoveryEngine};
use crate::farming::events::FarmEvent;
use crate::farming::guard::{preflight_check, Preflight};
use crate::farming::maintenance::{dispose_duplicates, evolve_all};
use crate::farming::session::{pace, FarmContext, Session};
use crate::farming::traversal::farm_checkpoints;

/// 会话监管者：持有共享上下文与恢复引擎
pub struct SessionSupervisor {
    ctx: Arc<FarmContext>,
    recovery: RecoveryEngine,
}

impl SessionSupervisor {
    pub fn new(ctx: Arc<FarmContext>) -> Self {
        Self {
            ctx,
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn context(&self) -> &Arc<FarmContext> {
        &self.ctx
    }

    /// Idle → Running 的前置：容量检查通过才创建 Session；失败时不改动任何会话状态
    pub async fn start(&self) -> Result<Session, FarmError> {
        let ctx = &self.ctx;
        let snapshot = ctx.refresh_player().await?;
        if let Preflight::Blocked(reason) = preflight_check(&snapshot) {
            tracing::warn!("Cannot start farming: {}", reason);
            ctx.events.emit(FarmEvent::PreflightBlocked {
                reason: reason.clone(),
            });
            return Err(FarmError::PreflightBlocked(reason));
        }
        let session = Session::new(ctx, snapshot.ceilings, snapshot.creature_count);
        ctx.status.mark_started(session.started_at);
        Ok(session)
    }

    /// 主循环：直到 Stop；Stop 只在边界处生效
    pub async fn run(&self, session: &mut Session) {
        let ctx = &self.ctx;
        ctx.status.set_phase(SessionPhase::Running);
        ctx.events.emit(FarmEvent::SessionStarted);
        tracing::info!("Farming session {} started", session.id);

        while session.is_active() {
            if let Err(err) = self.cycle(session).await {
                self.recover(session, err).await;
            }
            tokio::task::yield_now().await;
        }

        ctx.status.set_checkpoint(None);
        ctx.status.set_creature(None);
        session.publish_totals(ctx);
        ctx.status.set_phase(SessionPhase::Stopped);
        ctx.events.emit(FarmEvent::SessionStopped);
        tracing::info!(
            "Farming session {} stopped ({}xp, {} captures)",
            session.id,
            session.totals.experience,
            session.totals.captures
        );
    }

    /// 一轮：遍历检查点，然后按配置进化、放生
    async fn cycle(&self, session: &mut Session) -> Result<(), FarmError> {
        let ctx = &self.ctx;
        farm_checkpoints(ctx, session).await?;

        if session.is_active() && ctx.config.farming.auto_evolve {
            evolve_all(ctx, &mut session.totals).await?;
        }
        if session.is_active() && ctx.config.farming.auto_transfer {
            dispose_duplicates(ctx, true).await?;
            session.creature_count = ctx.refresh_player().await?.creature_count;
        }
        session.publish_totals(ctx);
        Ok(())
    }

    /// Running → Recovering → Running；重连失败时等待后重试，期间收到 Stop 即放弃
    async fn recover(&self, session: &mut Session, err: FarmError) {
        let ctx = &self.ctx;
        let farming = &ctx.config.farming;
        match self.recovery.handle(&err) {
            RecoveryAction::Reconnect => {
                tracing::info!("Session expired, reconnecting...");
            }
            RecoveryAction::ReportAndReconnect => {
                tracing::warn!("Error while farming: {}", err);
                ctx.reporter
                    .create("BotFarming", "General exception while farming", &err);
            }
            RecoveryAction::Report => {
                tracing::warn!("Farming cycle interrupted: {}", err);
                pace(&session.active, Duration::from_secs(farming.reconnect_delay_secs)).await;
                return;
            }
            RecoveryAction::Ignore => return,
        }

        ctx.status.set_phase(SessionPhase::Recovering);
        ctx.status.set_creature(None);
        ctx.events.emit(FarmEvent::Recovering {
            reason: err.to_string(),
        });

        let delay = Duration::from_secs(farming.reconnect_delay_secs);
        loop {
            match ctx.reconnect(&session.credentials).await {
                Ok(account) => {
                    session.ceilings = account.ceilings;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        "Reconnection failed: {}, retrying in {}s",
                        e,
                        delay.as_secs()
                    );
                    if !session.is_active() {
                        return;
                    }
                    pace(&session.active, delay).await;
                }
            }
        }

        ctx.status.set_phase(SessionPhase::Running);
        ctx.events.emit(FarmEvent::Recovered);
        tracing::info!("Reconnected, restarting from the first checkpoint");
    }
}
