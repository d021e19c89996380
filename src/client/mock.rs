//! 模拟世界（用于测试与本地演示，无需真实服务端）
//!
//! 同时实现 SessionClient 与 InventoryService；支持按操作名注入一次性故障、记录调用顺序、统计登录次数。

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;

use crate::client::traits::{
    ClientError, Connection, Connector, Credentials, InventoryService, RecyclePolicy,
    SessionClient,
};
use crate::client::types::{
    CaptureOutcome, Checkpoint, CheckpointDetails, CreatureSnapshot, Encounter, EncounterStatus,
    EvolveOutcome, GeoPoint, ItemKind, ItemStack, MapObjects, OwnedCreature, PlayerProfile,
    PlayerStats, SearchOutcome, StorageUpgrades, WildCreature,
};

/// 搜索后检查点进入冷却的时长
const CHECKPOINT_COOLDOWN_MS: i64 = 5 * 60 * 1000;
/// 野生生物可见半径（米）
const VISIBLE_RADIUS_M: f64 = 200.0;
/// 默认捕获经验
const DEFAULT_CAPTURE_XP: u64 = 100;
/// 默认进化经验
const DEFAULT_EVOLVE_XP: u64 = 500;

/// 模拟检查点：名称与每次搜索的奖励
#[derive(Debug, Clone)]
pub struct SimCheckpoint {
    pub checkpoint: Checkpoint,
    pub name: String,
    pub reward: SearchOutcome,
}

/// 模拟野生生物；snapshot 为 None 表示遭遇时已消失
#[derive(Debug, Clone)]
pub struct SimSpawn {
    pub creature: WildCreature,
    pub snapshot: Option<CreatureSnapshot>,
    pub capture_probability: f64,
    /// 依次返回的投掷结果；耗尽后视为捕获成功
    pub throws: VecDeque<CaptureOutcome>,
}

impl SimSpawn {
    pub fn new(encounter_id: u64, species: &str, location: GeoPoint, combat_power: u32) -> Self {
        Self {
            creature: WildCreature {
                encounter_id,
                spawn_point_id: format!("sp-{encounter_id}"),
                location,
                species: species.to_string(),
            },
            snapshot: Some(CreatureSnapshot {
                species: species.to_string(),
                combat_power,
                individual_attack: 10,
                individual_defense: 10,
                individual_stamina: 10,
            }),
            capture_probability: 0.5,
            throws: VecDeque::new(),
        }
    }

    pub fn despawned(mut self) -> Self {
        self.snapshot = None;
        self
    }

    pub fn with_probability(mut self, p: f64) -> Self {
        self.capture_probability = p;
        self
    }

    pub fn with_throws(mut self, throws: impl IntoIterator<Item = CaptureOutcome>) -> Self {
        self.throws = throws.into_iter().collect();
        self
    }
}

#[derive(Default)]
struct WorldState {
    location: Option<GeoPoint>,
    checkpoints: Vec<SimCheckpoint>,
    spawns: Vec<SimSpawn>,
    items: BTreeMap<ItemKind, u32>,
    owned: Vec<OwnedCreature>,
    evolvable: HashSet<u64>,
    next_creature_id: u64,
    upgrades: StorageUpgrades,
    username: String,
    stats: PlayerStats,
    /// 剩余的「软封禁」搜索次数：期间搜索不给经验
    soft_ban_searches: u32,
    faults: HashMap<&'static str, VecDeque<Option<ClientError>>>,
    calls: Vec<String>,
}

impl WorldState {
    fn take_fault(&mut self, op: &'static str) -> Result<(), ClientError> {
        match self.faults.get_mut(op).and_then(|q| q.pop_front()) {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }

    /// 记录调用并检查注入的故障
    fn enter(&mut self, op: &'static str, detail: impl std::fmt::Display) -> Result<(), ClientError> {
        self.calls.push(format!("{op}:{detail}"));
        self.take_fault(op)
    }

    fn add_items(&mut self, kind: ItemKind, count: u32) {
        *self.items.entry(kind).or_insert(0) += count;
    }

    fn take_item(&mut self, kind: ItemKind, count: u32) {
        if let Some(held) = self.items.get_mut(&kind) {
            *held = held.saturating_sub(count);
        }
    }

    fn count(&self, kind: ItemKind) -> u32 {
        self.items.get(&kind).copied().unwrap_or(0)
    }

    fn adopt(&mut self, snapshot: CreatureSnapshot) -> u64 {
        self.next_creature_id += 1;
        let id = self.next_creature_id;
        self.owned.push(OwnedCreature { id, snapshot });
        id
    }
}

/// 模拟世界
pub struct SimulatedWorld {
    state: Mutex<WorldState>,
}

impl Default for SimulatedWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedWorld {
    pub fn new() -> Self {
        let mut state = WorldState {
            username: "trainer".to_string(),
            ..WorldState::default()
        };
        state.stats.level = 1;
        state.stats.next_level_xp = 1000;
        Self {
            state: Mutex::new(state),
        }
    }

    /// 在 center 周围随机生成若干检查点与生物（演示用）
    pub fn demo(center: GeoPoint) -> Self {
        let mut rng = rand::thread_rng();
        let species = ["Pidgey", "Rattata", "Zubat", "Weedle", "Eevee", "Dratini"];
        let mut world = Self::new().with_items([
            (ItemKind::PokeBall, 40),
            (ItemKind::GreatBall, 10),
            (ItemKind::UltraBall, 3),
            (ItemKind::RazzBerry, 5),
            (ItemKind::Potion, 30),
            (ItemKind::LuckyEgg, 1),
            (ItemKind::IncenseOrdinary, 1),
        ]);
        for i in 0..6u64 {
            let at = GeoPoint::new(
                center.latitude + rng.gen_range(-0.003..0.003),
                center.longitude + rng.gen_range(-0.003..0.003),
            );
            world = world.with_checkpoint(&format!("stop-{i}"), &format!("Stop #{i}"), at, 50);
            let cp = rng.gen_range(50..1500);
            let kind = species[rng.gen_range(0..species.len())];
            let mut spawn = SimSpawn::new(100 + i, kind, at, cp)
                .with_probability(rng.gen_range(0.1..0.9))
                .with_throws([CaptureOutcome::Missed]);
            if let Some(s) = spawn.snapshot.as_mut() {
                s.individual_attack = rng.gen_range(0..=15);
                s.individual_defense = rng.gen_range(0..=15);
                s.individual_stamina = rng.gen_range(0..=15);
            }
            world = world.with_spawn(spawn);
        }
        world
    }

    pub fn with_items(mut self, items: impl IntoIterator<Item = (ItemKind, u32)>) -> Self {
        let state = self.state.get_mut();
        for (kind, count) in items {
            state.add_items(kind, count);
        }
        self
    }

    pub fn with_checkpoint(mut self, id: &str, name: &str, location: GeoPoint, experience: u64) -> Self {
        self.state.get_mut().checkpoints.push(SimCheckpoint {
            checkpoint: Checkpoint {
                id: id.to_string(),
                location,
                cooldown_expires_ms: 0,
            },
            name: name.to_string(),
            reward: SearchOutcome {
                experience,
                gems: 0,
                items: vec![ItemStack::new(ItemKind::PokeBall, 3)],
                egg: false,
            },
        });
        self
    }

    pub fn with_spawn(mut self, spawn: SimSpawn) -> Self {
        self.state.get_mut().spawns.push(spawn);
        self
    }

    /// 预置已拥有生物；evolvable 表示可进化
    pub fn with_owned(mut self, snapshot: CreatureSnapshot, evolvable: bool) -> Self {
        let state = self.state.get_mut();
        let id = state.adopt(snapshot);
        if evolvable {
            state.evolvable.insert(id);
        }
        self
    }

    pub fn with_upgrades(mut self, upgrades: StorageUpgrades) -> Self {
        self.state.get_mut().upgrades = upgrades;
        self
    }

    pub fn with_soft_ban(mut self, searches: u32) -> Self {
        self.state.get_mut().soft_ban_searches = searches;
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.state.get_mut().location = Some(location);
        self
    }

    /// 下一次调用 op 时返回 err（一次性）
    pub async fn fail_next(&self, op: &'static str, err: ClientError) {
        self.fail_nth(op, 1, err).await;
    }

    /// 从现在起第 n 次（从 1 开始）调用 op 时返回 err，之前的调用照常成功
    pub async fn fail_nth(&self, op: &'static str, n: usize, err: ClientError) {
        let mut state = self.state.lock().await;
        let queue = state.faults.entry(op).or_default();
        queue.extend(std::iter::repeat_with(|| None).take(n.saturating_sub(1)));
        queue.push_back(Some(err));
    }

    /// 已记录的调用（形如 `search_checkpoint:stop-1`）
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    pub async fn item_count(&self, kind: ItemKind) -> u32 {
        self.state.lock().await.count(kind)
    }

    pub async fn owned(&self) -> Vec<OwnedCreature> {
        self.state.lock().await.owned.clone()
    }

    pub async fn location(&self) -> Option<GeoPoint> {
        self.state.lock().await.location
    }
}

#[async_trait]
impl SessionClient for SimulatedWorld {
    async fn get_map_objects(&self) -> Result<MapObjects, ClientError> {
        let mut state = self.state.lock().await;
        state.enter("get_map_objects", "")?;
        let here = state.location;
        let checkpoints = state.checkpoints.iter().map(|c| c.checkpoint.clone()).collect();
        let creatures = state
            .spawns
            .iter()
            .filter(|s| match here {
                Some(p) => p.distance_to(&s.creature.location) <= VISIBLE_RADIUS_M,
                None => false,
            })
            .map(|s| s.creature.clone())
            .collect();
        Ok(MapObjects {
            checkpoints,
            creatures,
        })
    }

    async fn get_checkpoint(&self, checkpoint: &Checkpoint) -> Result<CheckpointDetails, ClientError> {
        let mut state = self.state.lock().await;
        state.enter("get_checkpoint", &checkpoint.id)?;
        let name = state
            .checkpoints
            .iter()
            .find(|c| c.checkpoint.id == checkpoint.id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        Ok(CheckpointDetails { name })
    }

    async fn search_checkpoint(&self, checkpoint: &Checkpoint) -> Result<SearchOutcome, ClientError> {
        let mut state = self.state.lock().await;
        state.enter("search_checkpoint", &checkpoint.id)?;
        let now = chrono::Utc::now().timestamp_millis();
        let Some(sim) = state
            .checkpoints
            .iter_mut()
            .find(|c| c.checkpoint.id == checkpoint.id)
        else {
            return Err(ClientError::Remote(format!("unknown checkpoint {}", checkpoint.id)));
        };
        sim.checkpoint.cooldown_expires_ms = now + CHECKPOINT_COOLDOWN_MS;
        let reward = sim.reward.clone();
        if state.soft_ban_searches > 0 {
            state.soft_ban_searches -= 1;
            return Ok(SearchOutcome::default());
        }
        for stack in &reward.items {
            state.add_items(stack.kind, stack.count);
        }
        state.stats.experience += reward.experience;
        state.stats.checkpoint_visits += 1;
        Ok(reward)
    }

    async fn update_location(&self, location: GeoPoint, _altitude: f64) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.enter(
            "update_location",
            format!("{:.6},{:.6}", location.latitude, location.longitude),
        )?;
        state.location = Some(location);
        Ok(())
    }

    async fn encounter_creature(&self, creature: &WildCreature) -> Result<Encounter, ClientError> {
        let mut state = self.state.lock().await;
        state.enter("encounter_creature", creature.encounter_id)?;
        let idx = state
            .spawns
            .iter()
            .position(|s| s.creature.encounter_id == creature.encounter_id);
        let Some(idx) = idx else {
            return Ok(Encounter {
                status: EncounterStatus::NotFound,
                capture_probability: 0.0,
                creature: None,
            });
        };
        state.stats.creatures_encountered += 1;
        let spawn = &state.spawns[idx];
        if spawn.snapshot.is_none() {
            state.spawns.remove(idx);
            return Ok(Encounter {
                status: EncounterStatus::NotFound,
                capture_probability: 0.0,
                creature: None,
            });
        }
        Ok(Encounter {
            status: EncounterStatus::Success,
            capture_probability: spawn.capture_probability,
            creature: spawn.snapshot.clone(),
        })
    }

    async fn throw_capture_item(
        &self,
        creature: &WildCreature,
        item: ItemKind,
    ) -> Result<CaptureOutcome, ClientError> {
        let mut state = self.state.lock().await;
        state.enter("throw_capture_item", format!("{}:{:?}", creature.encounter_id, item))?;
        state.take_item(item, 1);
        state.stats.capture_items_thrown += 1;
        let Some(idx) = state
            .spawns
            .iter()
            .position(|s| s.creature.encounter_id == creature.encounter_id)
        else {
            return Ok(CaptureOutcome::Fled);
        };
        let outcome = state.spawns[idx]
            .throws
            .pop_front()
            .unwrap_or(CaptureOutcome::Captured {
                experience: DEFAULT_CAPTURE_XP,
            });
        match &outcome {
            CaptureOutcome::Missed => {}
            CaptureOutcome::Captured { experience } => {
                let spawn = state.spawns.remove(idx);
                if let Some(snapshot) = spawn.snapshot {
                    state.adopt(snapshot);
                }
                state.stats.experience += experience;
                state.stats.creatures_captured += 1;
            }
            CaptureOutcome::Fled => {
                state.spawns.remove(idx);
            }
        }
        Ok(outcome)
    }

    async fn use_assist_item(&self, creature: &WildCreature, item: ItemKind) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.enter("use_assist_item", format!("{}:{:?}", creature.encounter_id, item))?;
        state.take_item(item, 1);
        Ok(())
    }

    async fn use_consumable(&self, item: ItemKind) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.enter("use_consumable", format!("{:?}", item))?;
        state.take_item(item, 1);
        Ok(())
    }

    async fn evolve_creature(&self, creature_id: u64) -> Result<EvolveOutcome, ClientError> {
        let mut state = self.state.lock().await;
        state.enter("evolve_creature", creature_id)?;
        if !state.evolvable.remove(&creature_id) {
            return Ok(EvolveOutcome::Failed {
                reason: "insufficient candy".to_string(),
            });
        }
        state.stats.evolutions += 1;
        state.stats.experience += DEFAULT_EVOLVE_XP;
        Ok(EvolveOutcome::Success {
            experience: DEFAULT_EVOLVE_XP,
        })
    }

    async fn transfer_creature(&self, creature_id: u64) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.enter("transfer_creature", creature_id)?;
        state.owned.retain(|c| c.id != creature_id);
        state.evolvable.remove(&creature_id);
        Ok(())
    }

    async fn recycle_item(&self, item: ItemKind, count: u32) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        state.enter("recycle_item", format!("{:?}x{}", item, count))?;
        state.take_item(item, count);
        Ok(())
    }

    async fn get_profile(&self) -> Result<PlayerProfile, ClientError> {
        let mut state = self.state.lock().await;
        state.enter("get_profile", "")?;
        Ok(PlayerProfile {
            username: state.username.clone(),
        })
    }

    async fn get_player_stats(&self) -> Result<PlayerStats, ClientError> {
        let mut state = self.state.lock().await;
        state.enter("get_player_stats", "")?;
        Ok(state.stats.clone())
    }
}

#[async_trait]
impl InventoryService for SimulatedWorld {
    async fn items(&self) -> Result<Vec<ItemStack>, ClientError> {
        let mut state = self.state.lock().await;
        state.take_fault("items")?;
        Ok(state
            .items
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(&kind, &count)| ItemStack::new(kind, count))
            .collect())
    }

    async fn creatures(&self) -> Result<Vec<OwnedCreature>, ClientError> {
        let mut state = self.state.lock().await;
        state.take_fault("creatures")?;
        Ok(state.owned.clone())
    }

    async fn evolution_candidates(&self) -> Result<Vec<OwnedCreature>, ClientError> {
        let mut state = self.state.lock().await;
        state.take_fault("evolution_candidates")?;
        Ok(state
            .owned
            .iter()
            .filter(|c| state.evolvable.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn duplicate_candidates(&self, keep_evolvable: bool) -> Result<Vec<OwnedCreature>, ClientError> {
        let mut state = self.state.lock().await;
        state.take_fault("duplicate_candidates")?;
        let mut by_species: BTreeMap<&str, Vec<&OwnedCreature>> = BTreeMap::new();
        for c in &state.owned {
            by_species.entry(c.snapshot.species.as_str()).or_default().push(c);
        }
        let mut out = Vec::new();
        for (_, mut group) in by_species {
            // 每个种类保留战斗力最高的一只
            group.sort_by(|a, b| b.snapshot.combat_power.cmp(&a.snapshot.combat_power));
            out.extend(
                group
                    .into_iter()
                    .skip(1)
                    .filter(|c| !(keep_evolvable && state.evolvable.contains(&c.id)))
                    .cloned(),
            );
        }
        Ok(out)
    }

    async fn recycle_candidates(&self, policy: &RecyclePolicy) -> Result<Vec<ItemStack>, ClientError> {
        let mut state = self.state.lock().await;
        state.take_fault("recycle_candidates")?;
        Ok(state
            .items
            .iter()
            .filter_map(|(&kind, &count)| {
                policy
                    .excess(&ItemStack::new(kind, count))
                    .map(|n| ItemStack::new(kind, n))
            })
            .collect())
    }

    async fn count_of(&self, kind: ItemKind) -> Result<u32, ClientError> {
        let mut state = self.state.lock().await;
        state.take_fault("count_of")?;
        Ok(state.count(kind))
    }

    async fn storage_upgrades(&self) -> Result<StorageUpgrades, ClientError> {
        let mut state = self.state.lock().await;
        state.take_fault("storage_upgrades")?;
        Ok(state.upgrades)
    }
}

/// 模拟登录：每次返回指向同一世界的连接，并记录登录次数
pub struct SimulatedConnector {
    world: Arc<SimulatedWorld>,
    logins: AtomicU32,
    failing_logins: AtomicU32,
}

impl SimulatedConnector {
    pub fn new(world: Arc<SimulatedWorld>) -> Self {
        Self {
            world,
            logins: AtomicU32::new(0),
            failing_logins: AtomicU32::new(0),
        }
    }

    /// 成功登录次数
    pub fn logins(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    /// 接下来 n 次登录失败
    pub fn fail_next_logins(&self, n: u32) {
        self.failing_logins.store(n, Ordering::SeqCst);
    }

    pub fn world(&self) -> &Arc<SimulatedWorld> {
        &self.world
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Connection, ClientError> {
        let failing = self.failing_logins.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_logins.store(failing - 1, Ordering::SeqCst);
            return Err(ClientError::Remote(format!(
                "login rejected for {}",
                credentials.username
            )));
        }
        self.logins.fetch_add(1, Ordering::SeqCst);
        Ok(Connection {
            client: self.world.clone(),
            inventory: self.world.clone(),
        })
    }
}
