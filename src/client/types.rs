//! 远端游戏数据模型：检查点、野生生物、遭遇结果、背包物品
//!
//! 只描述核心关心的字段，不对应任何线协议格式。

use serde::{Deserialize, Serialize};

/// 地理坐标（度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// 地球平均半径（米）
const EARTH_RADIUS_M: f64 = 6_371_000.0;

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// 大圆距离（米，haversine）
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// 朝 target 前进 meters 米；剩余距离不足时直接落在 target
    pub fn step_toward(&self, target: &GeoPoint, meters: f64) -> GeoPoint {
        let total = self.distance_to(target);
        if total <= meters || total == 0.0 {
            return *target;
        }
        let f = meters / total;
        GeoPoint::new(
            self.latitude + (target.latitude - self.latitude) * f,
            self.longitude + (target.longitude - self.longitude) * f,
        )
    }
}

/// 物品种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    PokeBall,
    GreatBall,
    UltraBall,
    RazzBerry,
    LuckyEgg,
    IncenseOrdinary,
    Potion,
    SuperPotion,
    HyperPotion,
    Revive,
}

impl ItemKind {
    /// 是否为捕捉道具（三档球）
    pub fn is_capture_item(self) -> bool {
        matches!(self, Self::PokeBall | Self::GreatBall | Self::UltraBall)
    }
}

/// 一摞物品
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKind,
    pub count: u32,
}

impl ItemStack {
    pub fn new(kind: ItemKind, count: u32) -> Self {
        Self { kind, count }
    }
}

/// 检查点（fort 中的 checkpoint 类型）；每次地图查询重新获取，不跨周期缓存
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub id: String,
    pub location: GeoPoint,
    /// 冷却结束时间（Unix 毫秒）
    pub cooldown_expires_ms: i64,
}

impl Checkpoint {
    /// 冷却已结束才可搜索
    pub fn is_eligible(&self, now_ms: i64) -> bool {
        self.cooldown_expires_ms < now_ms
    }
}

/// 检查点详情（仅用于展示）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointDetails {
    pub name: String,
}

/// 搜索检查点的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub experience: u64,
    pub gems: u32,
    pub items: Vec<ItemStack>,
    pub egg: bool,
}

/// 地图上可见的野生生物
#[derive(Debug, Clone, PartialEq)]
pub struct WildCreature {
    pub encounter_id: u64,
    pub spawn_point_id: String,
    pub location: GeoPoint,
    pub species: String,
}

/// 一次地图查询的结果（按服务端返回顺序）
#[derive(Debug, Clone, Default)]
pub struct MapObjects {
    pub checkpoints: Vec<Checkpoint>,
    pub creatures: Vec<WildCreature>,
}

/// 生物快照：种类、战斗力与三项隐藏属性（0..=15）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureSnapshot {
    pub species: String,
    pub combat_power: u32,
    pub individual_attack: u8,
    pub individual_defense: u8,
    pub individual_stamina: u8,
}

/// 隐藏属性单项上限
pub const MAX_INDIVIDUAL_VALUE: u8 = 15;

impl CreatureSnapshot {
    /// 完美度（IV 百分比）：三项隐藏属性之和相对上限
    pub fn perfection(&self) -> f64 {
        let sum = self.individual_attack as f64
            + self.individual_defense as f64
            + self.individual_stamina as f64;
        sum / (3.0 * MAX_INDIVIDUAL_VALUE as f64) * 100.0
    }
}

/// 遭遇状态；`NotFound` 即生物已消失
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncounterStatus {
    Success,
    NotFound,
}

/// 发起遭遇的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Encounter {
    pub status: EncounterStatus,
    /// 首档捕捉概率（0.0..=1.0）
    pub capture_probability: f64,
    pub creature: Option<CreatureSnapshot>,
}

impl Encounter {
    pub fn is_despawned(&self) -> bool {
        self.status == EncounterStatus::NotFound || self.creature.is_none()
    }
}

/// 投掷结果
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Missed,
    Captured { experience: u64 },
    Fled,
}

/// 进化结果
#[derive(Debug, Clone, PartialEq)]
pub enum EvolveOutcome {
    Success { experience: u64 },
    Failed { reason: String },
}

/// 已拥有的生物
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedCreature {
    pub id: u64,
    pub snapshot: CreatureSnapshot,
}

/// 已拥有的储存扩容数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageUpgrades {
    pub item: u32,
    pub creature: u32,
}

/// 玩家资料
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerProfile {
    pub username: String,
}

/// 玩家统计（生涯）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerStats {
    pub level: u32,
    pub experience: u64,
    pub prev_level_xp: u64,
    pub next_level_xp: u64,
    pub checkpoint_visits: u32,
    pub creatures_captured: u32,
    pub creatures_encountered: u32,
    pub capture_items_thrown: u32,
    pub evolutions: u32,
    pub eggs_hatched: u32,
    pub km_walked: f64,
}
