//! 背包守卫：开局前的容量检查与运行中的容量压力判断
//!
//! 存储上限由扩容数推导：物品 350 + 50 * 扩容，生物 250 + 50 * 扩容；每次建立连接时计算一次。
//! 生物容量额外预留 9 格给孵化中的蛋。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::client::traits::{ClientError, InventoryService};
use crate::client::types::{ItemKind, StorageUpgrades};

pub const ITEM_CEILING_BASE: u32 = 350;
pub const CREATURE_CEILING_BASE: u32 = 250;
pub const CEILING_PER_UPGRADE: u32 = 50;
/// 孵化中的蛋同样占用生物格
pub const RESERVED_CREATURE_SLOTS: u32 = 9;

/// 物品与生物的存储上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageCeilings {
    pub items: u32,
    pub creatures: u32,
}

impl StorageCeilings {
    pub fn from_upgrades(upgrades: StorageUpgrades) -> Self {
        Self {
            items: ITEM_CEILING_BASE + upgrades.item * CEILING_PER_UPGRADE,
            creatures: CREATURE_CEILING_BASE + upgrades.creature * CEILING_PER_UPGRADE,
        }
    }

    /// 生物数量的实际可用上限（扣除预留格）
    pub fn creature_limit(&self) -> u32 {
        self.creatures.saturating_sub(RESERVED_CREATURE_SLOTS)
    }
}

impl Default for StorageCeilings {
    fn default() -> Self {
        Self::from_upgrades(StorageUpgrades::default())
    }
}

/// 背包快照
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventorySnapshot {
    pub items: BTreeMap<ItemKind, u32>,
    pub creature_count: u32,
    pub ceilings: StorageCeilings,
}

impl InventorySnapshot {
    pub fn total_items(&self) -> u32 {
        self.items.values().sum()
    }

    pub fn count(&self, kind: ItemKind) -> u32 {
        self.items.get(&kind).copied().unwrap_or(0)
    }

    /// 从背包视图拉取当前持有量
    pub async fn fetch(
        inventory: &dyn InventoryService,
        ceilings: StorageCeilings,
    ) -> Result<Self, ClientError> {
        let mut items = BTreeMap::new();
        for stack in inventory.items().await? {
            *items.entry(stack.kind).or_insert(0) += stack.count;
        }
        let creature_count = inventory.creatures().await?.len() as u32;
        Ok(Self {
            items,
            creature_count,
            ceilings,
        })
    }
}

/// 开局检查结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preflight {
    Ok,
    Blocked(String),
}

impl Preflight {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// 开局前容量检查：物品满或生物达到（上限 - 预留）即拒绝
pub fn preflight_check(snapshot: &InventorySnapshot) -> Preflight {
    let total = snapshot.total_items();
    if total >= snapshot.ceilings.items {
        return Preflight::Blocked(format!(
            "no space for items ({}/{})",
            total, snapshot.ceilings.items
        ));
    }
    if snapshot.creature_count >= snapshot.ceilings.creature_limit() {
        return Preflight::Blocked(format!(
            "no space for creatures ({}/{})",
            snapshot.creature_count, snapshot.ceilings.creatures
        ));
    }
    Preflight::Ok
}

/// 运行中：生物数达到（上限 - 预留）需要立即放生
pub fn creature_pressure(creature_count: u32, ceilings: &StorageCeilings) -> bool {
    creature_count >= ceilings.creature_limit()
}
