//! 后台静默回收
//!
//! 独立定时任务，与主循环共享同一 ClientHandle，不加锁，可能与刷图交错。
//! 所有故障都被吞掉，只写 debug 日志，从不打断 Supervisor。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::handle::ClientHandle;
use crate::client::traits::{ClientError, RecyclePolicy};
use crate::config::RecyclerSection;
use crate::farming::session::pace;

/// 后台回收器
#[derive(Debug, Clone)]
pub struct BackgroundRecycler {
    handle: ClientHandle,
    policy: RecyclePolicy,
    interval: Duration,
    item_delay: Duration,
    enabled: Arc<AtomicBool>,
}

impl BackgroundRecycler {
    pub fn new(handle: ClientHandle, cfg: &RecyclerSection) -> Self {
        Self {
            handle,
            policy: cfg.policy(),
            interval: Duration::from_secs(cfg.interval_secs.max(1)),
            item_delay: Duration::from_millis(cfg.item_delay_ms),
            enabled: Arc::new(AtomicBool::new(cfg.enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// 运行时开关（对应 silent-recycle 设置）
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        tracing::info!("Silent recycle {}", if enabled { "enabled" } else { "disabled" });
    }

    /// 启动定时任务，shutdown 取消后退出
    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let recycler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(recycler.interval);
            interval.tick().await; // 跳过启动后立即执行
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if recycler.is_enabled() {
                            let recycled = recycler.recycle_silently(&shutdown).await;
                            tracing::debug!("Silent recycle pass discarded {} items", recycled);
                        }
                    }
                }
            }
        })
    }

    /// 一轮静默回收，返回丢弃的物品数
    pub async fn recycle_silently(&self, shutdown: &CancellationToken) -> u32 {
        match self.try_recycle(shutdown).await {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("Silent recycle skipped: {}", e);
                0
            }
        }
    }

    async fn try_recycle(&self, shutdown: &CancellationToken) -> Result<u32, ClientError> {
        let conn = self.handle.current().await;
        let stacks = conn.inventory.recycle_candidates(&self.policy).await?;
        let mut recycled = 0;
        for stack in stacks {
            if shutdown.is_cancelled() {
                break;
            }
            conn.client.recycle_item(stack.kind, stack.count).await?;
            recycled += stack.count;
            pace(shutdown, self.item_delay).await;
        }
        Ok(recycled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{SimulatedConnector, SimulatedWorld};
    use crate::client::traits::{AuthMethod, Connector, Credentials};
    use crate::client::types::ItemKind;

    async fn handle_for(world: SimulatedWorld) -> (Arc<SimulatedWorld>, ClientHandle) {
        let world = Arc::new(world);
        let connector = SimulatedConnector::new(world.clone());
        let creds = Credentials {
            method: AuthMethod::Ptc,
            username: "u".into(),
            password: "p".into(),
        };
        let conn = connector.connect(&creds).await.unwrap();
        (world, ClientHandle::new(conn))
    }

    fn section(enabled: bool) -> RecyclerSection {
        RecyclerSection {
            enabled,
            interval_secs: 300,
            item_delay_ms: 500,
            ..RecyclerSection::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recycle_silently_discards_excess() {
        let (world, handle) = handle_for(
            SimulatedWorld::new().with_items([(ItemKind::Potion, 30), (ItemKind::Revive, 10)]),
        )
        .await;
        let recycler = BackgroundRecycler::new(handle, &section(true));
        let n = recycler.recycle_silently(&CancellationToken::new()).await;
        assert_eq!(n, 10);
        assert_eq!(world.item_count(ItemKind::Potion).await, 20);
        assert_eq!(world.item_count(ItemKind::Revive).await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recycle_silently_swallows_faults() {
        let (world, handle) =
            handle_for(SimulatedWorld::new().with_items([(ItemKind::Potion, 30)])).await;
        world
            .fail_next("recycle_candidates", ClientError::SessionInvalid)
            .await;
        let recycler = BackgroundRecycler::new(handle, &section(true));
        assert_eq!(recycler.recycle_silently(&CancellationToken::new()).await, 0);
        assert_eq!(world.item_count(ItemKind::Potion).await, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_recycler_runs_on_interval_when_enabled() {
        let (world, handle) =
            handle_for(SimulatedWorld::new().with_items([(ItemKind::Potion, 30)])).await;
        let recycler = BackgroundRecycler::new(handle, &section(false));
        let shutdown = CancellationToken::new();
        let task = recycler.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(world.item_count(ItemKind::Potion).await, 30);

        recycler.set_enabled(true);
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(world.item_count(ItemKind::Potion).await, 20);

        shutdown.cancel();
        task.await.unwrap();
    }
}
