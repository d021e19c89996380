//! 共享客户端句柄
//!
//! 主循环与后台回收共用同一句柄；恢复时由 Supervisor 原地替换连接，持有者在下一次 current() 时拿到新连接。
//! 两条流之间没有锁或事务协调，远程调用允许交错。

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::client::traits::{Connection, InventoryService, SessionClient};

/// 可替换的当前连接；进程是最长寿的持有者
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<RwLock<Connection>>,
}

impl ClientHandle {
    pub fn new(connection: Connection) -> Self {
        Self {
            inner: Arc::new(RwLock::new(connection)),
        }
    }

    /// 当前连接的快照（克隆 Arc）
    pub async fn current(&self) -> Connection {
        self.inner.read().await.clone()
    }

    pub async fn client(&self) -> Arc<dyn SessionClient> {
        self.inner.read().await.client.clone()
    }

    pub async fn inventory(&self) -> Arc<dyn InventoryService> {
        self.inner.read().await.inventory.clone()
    }

    /// 重新登录后替换连接
    pub async fn replace(&self, connection: Connection) {
        *self.inner.write().await = connection;
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientHandle")
    }
}
