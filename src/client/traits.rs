//! 外部协作方抽象
//!
//! SessionClient：带认证的远程调用；InventoryService：背包视图；Connector：用凭据建立连接。
//! 所有调用都可能返回 ClientError::SessionInvalid（会话失效），其余失败一律为不透明的 Remote。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::types::{
    CaptureOutcome, Checkpoint, CheckpointDetails, Encounter, EvolveOutcome, GeoPoint, ItemKind,
    ItemStack, MapObjects, OwnedCreature, PlayerProfile, PlayerStats, SearchOutcome,
    StorageUpgrades, WildCreature,
};

/// 协作方返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// 会话令牌不再被服务端接受，需要重新登录
    #[error("Session invalid")]
    SessionInvalid,

    #[error("Remote call failed: {0}")]
    Remote(String),
}

/// 带认证的远程调用客户端
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn get_map_objects(&self) -> Result<MapObjects, ClientError>;

    async fn get_checkpoint(&self, checkpoint: &Checkpoint)
        -> Result<CheckpointDetails, ClientError>;

    async fn search_checkpoint(&self, checkpoint: &Checkpoint)
        -> Result<SearchOutcome, ClientError>;

    async fn update_location(&self, location: GeoPoint, altitude: f64) -> Result<(), ClientError>;

    async fn encounter_creature(&self, creature: &WildCreature) -> Result<Encounter, ClientError>;

    async fn throw_capture_item(
        &self,
        creature: &WildCreature,
        item: ItemKind,
    ) -> Result<CaptureOutcome, ClientError>;

    /// 对当前遭遇使用辅助道具（树果）
    async fn use_assist_item(
        &self,
        creature: &WildCreature,
        item: ItemKind,
    ) -> Result<(), ClientError>;

    /// 使用全局消耗品（幸运蛋 / 熏香）
    async fn use_consumable(&self, item: ItemKind) -> Result<(), ClientError>;

    async fn evolve_creature(&self, creature_id: u64) -> Result<EvolveOutcome, ClientError>;

    async fn transfer_creature(&self, creature_id: u64) -> Result<(), ClientError>;

    async fn recycle_item(&self, item: ItemKind, count: u32) -> Result<(), ClientError>;

    async fn get_profile(&self) -> Result<PlayerProfile, ClientError>;

    async fn get_player_stats(&self) -> Result<PlayerStats, ClientError>;
}

/// 回收候选策略：每种物品最多保留多少个，超出部分即为候选
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecyclePolicy {
    pub keep: HashMap<ItemKind, u32>,
}

impl RecyclePolicy {
    pub fn new(keep: HashMap<ItemKind, u32>) -> Self {
        Self { keep }
    }

    /// 给定持有量，返回应回收的数量；未配置的物品不回收
    pub fn excess(&self, stack: &ItemStack) -> Option<u32> {
        let limit = *self.keep.get(&stack.kind)?;
        (stack.count > limit).then(|| stack.count - limit)
    }
}

/// 背包视图
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn items(&self) -> Result<Vec<ItemStack>, ClientError>;

    async fn creatures(&self) -> Result<Vec<OwnedCreature>, ClientError>;

    async fn evolution_candidates(&self) -> Result<Vec<OwnedCreature>, ClientError>;

    /// 重复生物候选；keep_evolvable 为 true 时保留可进化的个体
    async fn duplicate_candidates(
        &self,
        keep_evolvable: bool,
    ) -> Result<Vec<OwnedCreature>, ClientError>;

    async fn recycle_candidates(&self, policy: &RecyclePolicy)
        -> Result<Vec<ItemStack>, ClientError>;

    async fn count_of(&self, kind: ItemKind) -> Result<u32, ClientError>;

    async fn storage_upgrades(&self) -> Result<StorageUpgrades, ClientError>;
}

/// 登录方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Ptc,
    Google,
}

/// 登录凭据；恢复时原样重放
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub method: AuthMethod,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("method", &self.method)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 一次登录得到的客户端与背包视图
#[derive(Clone)]
pub struct Connection {
    pub client: Arc<dyn SessionClient>,
    pub inventory: Arc<dyn InventoryService>,
}

/// 凭据 -> 已认证连接
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Connection, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recycle_policy_excess() {
        let policy = RecyclePolicy::new(HashMap::from([(ItemKind::Potion, 20)]));
        assert_eq!(policy.excess(&ItemStack::new(ItemKind::Potion, 25)), Some(5));
        assert_eq!(policy.excess(&ItemStack::new(ItemKind::Potion, 20)), None);
        assert_eq!(policy.excess(&ItemStack::new(ItemKind::Revive, 99)), None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            method: AuthMethod::Ptc,
            username: "ash".into(),
            password: "pikachu".into(),
        };
        let s = format!("{:?}", creds);
        assert!(s.contains("ash"));
        assert!(!s.contains("pikachu"));
    }
}
