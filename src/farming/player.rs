//! 玩家面板：名字、等级、本级经验进度与背包计数

use serde::Serialize;

use crate::client::types::{ItemKind, PlayerStats};
use crate::farming::guard::InventorySnapshot;

/// 各等级的经验偏移（1..=40），用于把生涯经验折算为「本级进度」
const LEVEL_XP_OFFSET: [u64; 40] = [
    0, 1000, 2000, 3000, 4000, 5000, 6000, 7000, 8000, 9000, // 1-10
    10000, 10000, 10000, 10000, 15000, 20000, 20000, 20000, 25000, 25000, // 11-20
    50000, 75000, 100000, 125000, 150000, 190000, 200000, 250000, 300000, 350000, // 21-30
    500000, 500000, 750000, 1000000, 1250000, 1500000, 2000000, 2500000, 1000000, 1000000, // 31-40
];

/// 等级对应的经验偏移；超出范围返回 0
pub fn level_xp_offset(level: u32) -> u64 {
    match level {
        1..=40 => LEVEL_XP_OFFSET[(level - 1) as usize],
        _ => 0,
    }
}

/// 本级经验进度 (当前, 所需)
pub fn level_progress(stats: &PlayerStats) -> (u64, u64) {
    let offset = level_xp_offset(stats.level);
    let current = stats
        .experience
        .saturating_sub(stats.prev_level_xp)
        .saturating_sub(offset);
    let needed = stats
        .next_level_xp
        .saturating_sub(stats.prev_level_xp)
        .saturating_sub(offset);
    (current, needed)
}

/// 展示层的玩家面板
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerInfo {
    pub name: String,
    pub level: u32,
    pub level_xp: u64,
    pub level_xp_needed: u64,
    pub items: u32,
    pub item_ceiling: u32,
    pub creatures: u32,
    pub creature_ceiling: u32,
    pub lucky_eggs: u32,
    pub incense: u32,
}

impl PlayerInfo {
    pub fn build(name: &str, stats: &PlayerStats, inventory: &InventorySnapshot) -> Self {
        let (level_xp, level_xp_needed) = level_progress(stats);
        Self {
            name: name.to_string(),
            level: stats.level,
            level_xp,
            level_xp_needed,
            items: inventory.total_items(),
            item_ceiling: inventory.ceilings.items,
            creatures: inventory.creature_count,
            creature_ceiling: inventory.ceilings.creatures,
            lucky_eggs: inventory.count(ItemKind::LuckyEgg),
            incense: inventory.count(ItemKind::IncenseOrdinary),
        }
    }
}
