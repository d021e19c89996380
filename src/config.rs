//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `POGO__*` 覆盖（双下划线表示嵌套，如 `POGO__FARMING__MIN_IV=80`）。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::client::traits::{AuthMethod, Credentials, RecyclePolicy};
use crate::client::types::{GeoPoint, ItemKind};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub account: AccountSection,
    pub location: LocationSection,
    pub farming: FarmingSection,
    pub walking: WalkingSection,
    pub recycler: RecyclerSection,
    pub reports: ReportsSection,
}

/// [account] 段：登录方式与凭据
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSection {
    #[serde(default = "default_auth")]
    pub auth: AuthMethod,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_auth() -> AuthMethod {
    AuthMethod::Ptc
}

impl Default for AccountSection {
    fn default() -> Self {
        Self {
            auth: default_auth(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl AccountSection {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            method: self.auth,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// [location] 段：起始位置
#[derive(Debug, Clone, Deserialize)]
pub struct LocationSection {
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    #[serde(default = "default_altitude")]
    pub altitude: f64,
}

fn default_latitude() -> f64 {
    40.7829
}

fn default_longitude() -> f64 {
    -73.9654
}

fn default_altitude() -> f64 {
    10.0
}

impl Default for LocationSection {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
            altitude: default_altitude(),
        }
    }
}

impl LocationSection {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// [farming] 段：自动维护开关、放生阈值、节奏延迟
#[derive(Debug, Clone, Deserialize)]
pub struct FarmingSection {
    #[serde(default)]
    pub auto_evolve: bool,
    #[serde(default)]
    pub auto_transfer: bool,
    /// IV 低于此百分比（且 CP 低于 min_cp）才放生
    #[serde(default = "default_min_iv")]
    pub min_iv: f64,
    #[serde(default = "default_min_cp")]
    pub min_cp: u32,
    /// 捕捉概率低于此百分比时使用树果
    #[serde(default = "default_min_assist_probability")]
    pub min_assist_probability: f64,
    #[serde(default = "default_checkpoint_delay_secs")]
    pub checkpoint_delay_secs: u64,
    #[serde(default = "default_creature_delay_secs")]
    pub creature_delay_secs: u64,
    /// 重连失败后的等待（秒）
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// 未命中重投的安全上限；None 表示不设上限
    #[serde(default)]
    pub max_throw_attempts: Option<u32>,
    /// 状态面板（速率）刷新间隔（秒）
    #[serde(default = "default_status_refresh_secs")]
    pub status_refresh_secs: u64,
}

fn default_min_iv() -> f64 {
    80.0
}

fn default_min_cp() -> u32 {
    1000
}

fn default_min_assist_probability() -> f64 {
    30.0
}

fn default_checkpoint_delay_secs() -> u64 {
    15
}

fn default_creature_delay_secs() -> u64 {
    5
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_status_refresh_secs() -> u64 {
    5
}

impl Default for FarmingSection {
    fn default() -> Self {
        Self {
            auto_evolve: false,
            auto_transfer: false,
            min_iv: default_min_iv(),
            min_cp: default_min_cp(),
            min_assist_probability: default_min_assist_probability(),
            checkpoint_delay_secs: default_checkpoint_delay_secs(),
            creature_delay_secs: default_creature_delay_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            max_throw_attempts: None,
            status_refresh_secs: default_status_refresh_secs(),
        }
    }
}

/// 移动方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkingMode {
    Teleport,
    PacedWalk,
}

/// [walking] 段：瞬移或按速度步行
#[derive(Debug, Clone, Deserialize)]
pub struct WalkingSection {
    #[serde(default = "default_walking_mode")]
    pub mode: WalkingMode,
    #[serde(default = "default_speed_kmh")]
    pub speed_kmh: f64,
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    #[serde(default = "default_arrival_radius_m")]
    pub arrival_radius_m: f64,
}

fn default_walking_mode() -> WalkingMode {
    WalkingMode::Teleport
}

fn default_speed_kmh() -> f64 {
    8.0
}

fn default_step_interval_ms() -> u64 {
    1000
}

fn default_arrival_radius_m() -> f64 {
    5.0
}

impl Default for WalkingSection {
    fn default() -> Self {
        Self {
            mode: default_walking_mode(),
            speed_kmh: default_speed_kmh(),
            step_interval_ms: default_step_interval_ms(),
            arrival_radius_m: default_arrival_radius_m(),
        }
    }
}

/// [recycler] 段：静默回收
#[derive(Debug, Clone, Deserialize)]
pub struct RecyclerSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_recycle_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_recycle_item_delay_ms")]
    pub item_delay_ms: u64,
    /// 每种物品最多保留的数量
    #[serde(default = "default_keep_limits")]
    pub keep: HashMap<ItemKind, u32>,
}

fn default_recycle_interval_secs() -> u64 {
    5 * 60
}

fn default_recycle_item_delay_ms() -> u64 {
    500
}

fn default_keep_limits() -> HashMap<ItemKind, u32> {
    HashMap::from([
        (ItemKind::PokeBall, 100),
        (ItemKind::GreatBall, 100),
        (ItemKind::UltraBall, 100),
        (ItemKind::RazzBerry, 50),
        (ItemKind::Potion, 20),
        (ItemKind::SuperPotion, 20),
        (ItemKind::HyperPotion, 30),
        (ItemKind::Revive, 30),
    ])
}

impl Default for RecyclerSection {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_recycle_interval_secs(),
            item_delay_ms: default_recycle_item_delay_ms(),
            keep: default_keep_limits(),
        }
    }
}

impl RecyclerSection {
    pub fn policy(&self) -> RecyclePolicy {
        RecyclePolicy::new(self.keep.clone())
    }
}

/// [reports] 段：诊断报告目录
#[derive(Debug, Clone, Deserialize)]
pub struct ReportsSection {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for ReportsSection {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 POGO__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 POGO__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("POGO")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
