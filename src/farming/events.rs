//! 刷图过程事件：核心单向推送给展示层，核心自身从不读取

use serde::Serialize;
use tokio::sync::broadcast;

use crate::client::types::{ItemKind, ItemStack, PlayerStats};

/// 单个事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FarmEvent {
    SessionStarted,
    SessionStopped,
    /// 开局检查未通过，会话未启动
    PreflightBlocked { reason: String },
    /// 到达检查点（index 从 1 开始）
    CheckpointReached {
        name: String,
        index: usize,
        total: usize,
    },
    Looted {
        checkpoint: String,
        experience: u64,
        gems: u32,
        items: Vec<ItemStack>,
        egg: bool,
    },
    CreatureCaptured {
        species: String,
        combat_power: u32,
        iv: f64,
        experience: u64,
        item: ItemKind,
    },
    CreatureEscaped {
        species: String,
        combat_power: u32,
        iv: f64,
        item: ItemKind,
    },
    CreatureDespawned { species: String },
    Evolved { species: String, experience: u64 },
    EvolveFailed { species: String, reason: String },
    Transferred {
        species: String,
        combat_power: u32,
        iv: f64,
    },
    Kept {
        species: String,
        combat_power: u32,
        iv: f64,
    },
    Recycled { item: ItemKind, count: u32 },
    /// 生物容量压力触发的强制放生
    DisposalForced { creature_count: u32, ceiling: u32 },
    ConsumableUsed { item: ItemKind, remaining: u32 },
    Recovering { reason: String },
    Recovered,
    UnbanFinished { success: bool },
    Stats { stats: PlayerStats },
    /// 命令被拒绝（会话运行中、重入等），不做任何事
    CommandRejected { command: String, reason: String },
}

/// 事件总线：broadcast 发送端；无订阅者时静默丢弃
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FarmEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FarmEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: FarmEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
