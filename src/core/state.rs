//! 状态定义：会话阶段与展示层读取的 StatusSnapshot
//!
//! 展示层只持有 watch::Receiver<StatusSnapshot>；核心通过 StatusPublisher 写入，从不回读展示层。

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;

use crate::farming::player::PlayerInfo;
use crate::farming::stats::SessionTotals;

/// 会话阶段（Supervisor 独占转换）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Running,
    Recovering,
    Stopped,
}

/// 当前检查点进度（index 从 1 开始）
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckpointProgress {
    pub name: String,
    pub index: usize,
    pub total: usize,
}

/// 正在对付的生物
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreatureFocus {
    pub species: String,
    pub capture_probability: f64,
}

/// 展示层看到的状态快照
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub phase: SessionPhase,
    pub checkpoint: Option<CheckpointProgress>,
    pub creature: Option<CreatureFocus>,
    pub experience: u64,
    pub captures: u64,
    pub checkpoints_visited: u64,
    pub elapsed_secs: u64,
    pub experience_per_hour: f64,
    pub captures_per_hour: f64,
    pub player: Option<PlayerInfo>,
    /// 进入 Running 的时刻；恢复时不重置
    #[serde(skip)]
    pub started_at: Option<Instant>,
}

impl StatusSnapshot {
    fn totals(&self) -> SessionTotals {
        SessionTotals {
            experience: self.experience,
            captures: self.captures,
            checkpoints: self.checkpoints_visited,
        }
    }

    fn apply_rates(&mut self, elapsed: Duration) {
        let totals = self.totals();
        self.elapsed_secs = elapsed.as_secs();
        self.experience_per_hour = totals.experience_per_hour(elapsed);
        self.captures_per_hour = totals.captures_per_hour(elapsed);
    }

    fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }
}

/// 状态发布端（watch 发送端）
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    tx: std::sync::Arc<watch::Sender<StatusSnapshot>>,
}

impl StatusPublisher {
    pub fn channel() -> (Self, watch::Receiver<StatusSnapshot>) {
        let (tx, rx) = watch::channel(StatusSnapshot::default());
        (Self { tx: std::sync::Arc::new(tx) }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.tx.borrow().phase
    }

    pub fn set_phase(&self, phase: SessionPhase) {
        self.tx.send_modify(|s| s.phase = phase);
    }

    pub fn set_checkpoint(&self, progress: Option<CheckpointProgress>) {
        self.tx.send_modify(|s| s.checkpoint = progress);
    }

    pub fn set_creature(&self, focus: Option<CreatureFocus>) {
        self.tx.send_modify(|s| s.creature = focus);
    }

    pub fn set_player(&self, player: PlayerInfo) {
        self.tx.send_modify(|s| s.player = Some(player));
    }

    /// 新会话开始：清零累计值并记录开始时间
    pub fn mark_started(&self, started_at: Instant) {
        self.tx.send_modify(|s| {
            s.started_at = Some(started_at);
            s.experience = 0;
            s.captures = 0;
            s.checkpoints_visited = 0;
            s.apply_rates(Duration::ZERO);
        });
    }

    /// 写入最新累计值并重算速率
    pub fn refresh_totals(&self, totals: &SessionTotals) {
        self.tx.send_modify(|s| {
            s.experience = totals.experience;
            s.captures = totals.captures;
            s.checkpoints_visited = totals.checkpoints;
            let elapsed = s.elapsed();
            s.apply_rates(elapsed);
        });
    }

    /// 定时刷新：只重算速率；started_at 为空（未开局）时耗时视为 0
    pub fn refresh_rates(&self) {
        self.tx.send_modify(|s| {
            let elapsed = s.elapsed();
            s.apply_rates(elapsed);
        });
    }
}
