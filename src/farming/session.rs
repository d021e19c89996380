//! 刷图上下文与会话
//!
//! FarmContext：进程级共享的协作方（连接器、客户端句柄、事件总线、状态发布、报告器）与配置。
//! Session：一次 Start 到 Stop 之间的可变状态，由 Supervisor 独占推进。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::client::handle::ClientHandle;
use crate::client::traits::{Connection, Connector, Credentials};
use crate::client::types::GeoPoint;
use crate::config::AppConfig;
use crate::core::report::ErrorReporter;
use crate::core::state::StatusPublisher;
use crate::core::FarmError;
use crate::farming::events::EventBus;
use crate::farming::guard::{InventorySnapshot, StorageCeilings};
use crate::farming::player::PlayerInfo;
use crate::farming::stats::SessionTotals;
use crate::farming::walking;

/// 每次登录后推导出的账号信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub player_name: String,
    pub ceilings: StorageCeilings,
}

/// 进程级共享上下文
pub struct FarmContext {
    pub config: AppConfig,
    pub credentials: Credentials,
    pub handle: ClientHandle,
    pub events: EventBus,
    pub status: StatusPublisher,
    pub reporter: ErrorReporter,
    connector: Arc<dyn Connector>,
    account: RwLock<Account>,
    position: RwLock<GeoPoint>,
}

/// 用凭据登录，并计算存储上限、读取玩家名
async fn login(
    connector: &dyn Connector,
    credentials: &Credentials,
) -> Result<(Connection, Account), FarmError> {
    tracing::info!("Trying to login with {:?} credentials...", credentials.method);
    let connection = connector
        .connect(credentials)
        .await
        .map_err(|e| FarmError::Login(e.to_string()))?;
    tracing::info!("Connected! Server is ready.");

    let upgrades = connection.inventory.storage_upgrades().await?;
    let profile = connection.client.get_profile().await?;
    let account = Account {
        player_name: profile.username,
        ceilings: StorageCeilings::from_upgrades(upgrades),
    };
    Ok((connection, account))
}

impl FarmContext {
    /// 首次登录并建立共享句柄
    pub async fn connect(
        config: AppConfig,
        connector: Arc<dyn Connector>,
        events: EventBus,
        status: StatusPublisher,
    ) -> Result<Self, FarmError> {
        let credentials = config.account.credentials();
        let (connection, account) = login(connector.as_ref(), &credentials).await?;
        let start = config.location.point();
        connection
            .client
            .update_location(start, config.location.altitude)
            .await?;
        tracing::info!(
            "Starting in location lat: {} lng: {}",
            start.latitude,
            start.longitude
        );
        let reporter = ErrorReporter::new(config.reports.dir.clone());
        Ok(Self {
            config,
            credentials,
            handle: ClientHandle::new(connection),
            events,
            status,
            reporter,
            connector,
            account: RwLock::new(account),
            position: RwLock::new(start),
        })
    }

    /// 重放凭据重建连接，原地替换共享句柄中的连接
    pub async fn reconnect(&self, credentials: &Credentials) -> Result<Account, FarmError> {
        let (connection, account) = login(self.connector.as_ref(), credentials).await?;
        self.handle.replace(connection).await;
        *self.account.write().await = account.clone();
        Ok(account)
    }

    pub async fn account(&self) -> Account {
        self.account.read().await.clone()
    }

    pub async fn position(&self) -> GeoPoint {
        *self.position.read().await
    }

    pub async fn set_position(&self, position: GeoPoint) {
        *self.position.write().await = position;
    }

    /// 移动到目标点（瞬移或步行，取决于 [walking]）
    pub async fn relocate(&self, to: GeoPoint) -> Result<(), FarmError> {
        let client = self.handle.client().await;
        let from = self.position().await;
        let at = walking::move_to(client.as_ref(), &self.config.walking, from, to).await?;
        self.set_position(at).await;
        Ok(())
    }

    pub async fn inventory_snapshot(&self) -> Result<InventorySnapshot, FarmError> {
        let inventory = self.handle.inventory().await;
        let ceilings = self.account.read().await.ceilings;
        Ok(InventorySnapshot::fetch(inventory.as_ref(), ceilings).await?)
    }

    /// 刷新玩家面板，返回最新背包快照
    pub async fn refresh_player(&self) -> Result<InventorySnapshot, FarmError> {
        let client = self.handle.client().await;
        let stats = client.get_player_stats().await?;
        let snapshot = self.inventory_snapshot().await?;
        let name = self.account.read().await.player_name.clone();
        self.status
            .set_player(PlayerInfo::build(&name, &stats, &snapshot));
        Ok(snapshot)
    }
}

/// 一次刷图会话
#[derive(Debug)]
pub struct Session {
    pub id: uuid::Uuid,
    pub credentials: Credentials,
    pub handle: ClientHandle,
    /// 未取消即 active；Stop 命令取消它，循环只在边界处检查
    pub active: CancellationToken,
    pub started_at: Instant,
    pub totals: SessionTotals,
    pub ceilings: StorageCeilings,
    pub creature_count: u32,
}

impl Session {
    pub fn new(ctx: &FarmContext, ceilings: StorageCeilings, creature_count: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            credentials: ctx.credentials.clone(),
            handle: ctx.handle.clone(),
            active: CancellationToken::new(),
            started_at: Instant::now(),
            totals: SessionTotals::default(),
            ceilings,
            creature_count,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.active.is_cancelled()
    }

    /// 把累计值推给状态面板
    pub fn publish_totals(&self, ctx: &FarmContext) {
        ctx.status.refresh_totals(&self.totals);
    }
}

/// 节奏等待：固定时长，不随负载调整；Stop 到来时提前结束，让循环尽快走到边界检查
pub async fn pace(active: &CancellationToken, delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = active.cancelled() => {}
    }
}
