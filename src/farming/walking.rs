//! 移动：瞬移或按人类步速行走
//!
//! 步行模式每个步长更新一次远端位置，到达后才把控制权交回调用方。

use std::time::Duration;

use rand::Rng;

use crate::client::traits::{ClientError, SessionClient};
use crate::client::types::GeoPoint;
use crate::config::{WalkingMode, WalkingSection};

/// 瞬移时的海拔抖动范围（米）
const ALTITUDE_RANGE: std::ops::Range<f64> = 8.6..11.0;

/// 步长间隔下限（毫秒）；为 0 时每步前进 0 米，永远到不了
const MIN_STEP_INTERVAL_MS: u64 = 100;

/// 随机海拔
pub fn random_altitude() -> f64 {
    rand::thread_rng().gen_range(ALTITUDE_RANGE)
}

fn step_interval_ms(cfg: &WalkingSection) -> u64 {
    cfg.step_interval_ms.max(MIN_STEP_INTERVAL_MS)
}

/// 每步前进的米数
pub fn step_meters(cfg: &WalkingSection) -> f64 {
    let meters_per_sec = cfg.speed_kmh.max(0.1) * 1000.0 / 3600.0;
    meters_per_sec * step_interval_ms(cfg) as f64 / 1000.0
}

/// 从 from 移动到 to，返回最终位置
pub async fn move_to(
    client: &dyn SessionClient,
    cfg: &WalkingSection,
    from: GeoPoint,
    to: GeoPoint,
) -> Result<GeoPoint, ClientError> {
    match cfg.mode {
        WalkingMode::Teleport => {
            client.update_location(to, random_altitude()).await?;
            Ok(to)
        }
        WalkingMode::PacedWalk => walk(client, cfg, from, to).await,
    }
}

async fn walk(
    client: &dyn SessionClient,
    cfg: &WalkingSection,
    from: GeoPoint,
    to: GeoPoint,
) -> Result<GeoPoint, ClientError> {
    let step = step_meters(cfg);
    let interval = Duration::from_millis(step_interval_ms(cfg));
    let arrival_radius = cfg.arrival_radius_m.max(0.0);
    let distance = from.distance_to(&to);
    tracing::debug!(
        "Walking {:.0}m at {:.1} km/h ({} steps)",
        distance,
        cfg.speed_kmh,
        (distance / step).ceil()
    );

    let mut here = from;
    while here.distance_to(&to) > arrival_radius {
        here = here.step_toward(&to, step);
        client.update_location(here, random_altitude()).await?;
        tokio::time::sleep(interval).await;
    }
    if here != to {
        client.update_location(to, random_altitude()).await?;
    }
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::SimulatedWorld;

    fn paced(speed_kmh: f64) -> WalkingSection {
        WalkingSection {
            mode: WalkingMode::PacedWalk,
            speed_kmh,
            step_interval_ms: 1000,
            arrival_radius_m: 5.0,
        }
    }

    #[test]
    fn test_step_meters() {
        let cfg = paced(36.0);
        assert!((step_meters(&cfg) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_random_altitude_range() {
        for _ in 0..100 {
            let a = random_altitude();
            assert!((8.6..11.0).contains(&a));
        }
    }

    #[tokio::test]
    async fn test_teleport_single_update() {
        let world = SimulatedWorld::new();
        let to = GeoPoint::new(1.0, 1.0);
        let cfg = WalkingSection::default();
        let at = move_to(&world, &cfg, GeoPoint::new(0.0, 0.0), to).await.unwrap();
        assert_eq!(at, to);
        let calls = world.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("update_location"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_walk_arrives() {
        let world = SimulatedWorld::new();
        let from = GeoPoint::new(40.0, -73.0);
        let to = GeoPoint::new(40.001, -73.0); // 约 111m
        let start = tokio::time::Instant::now();
        let at = move_to(&world, &paced(36.0), from, to).await.unwrap();
        assert_eq!(at, to);
        assert_eq!(world.location().await, Some(to));
        let updates = world
            .calls()
            .await
            .iter()
            .filter(|c| c.starts_with("update_location"))
            .count();
        assert!(updates >= 10, "expected paced updates, got {updates}");
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[test]
    fn test_step_interval_has_floor() {
        let cfg = WalkingSection {
            step_interval_ms: 0,
            ..paced(36.0)
        };
        assert!((step_meters(&cfg) - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_walk_arrives_with_degenerate_settings() {
        let world = SimulatedWorld::new();
        let from = GeoPoint::new(40.0, -73.0);
        let to = GeoPoint::new(40.001, -73.0);
        let cfg = WalkingSection {
            step_interval_ms: 0,
            arrival_radius_m: -1.0,
            ..paced(36.0)
        };
        let at = tokio::time::timeout(
            Duration::from_secs(600),
            move_to(&world, &cfg, from, to),
        )
        .await
        .expect("walk should arrive")
        .unwrap();
        assert_eq!(at, to);
        assert_eq!(world.location().await, Some(to));
    }
}
