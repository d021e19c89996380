//! 生物遭遇循环
//!
//! 每只生物：移动 → 遭遇 → 选球 → 投掷直到不再 Missed → 记录结果。
//! 终态只有 captured / escaped / despawned；despawned 不是错误。

use std::time::Duration;

use crate::client::types::{CaptureOutcome, CreatureSnapshot, ItemKind, WildCreature};
use crate::core::state::CreatureFocus;
use crate::core::FarmError;
use crate::farming::events::FarmEvent;
use crate::farming::policy::{select_capture_item, should_use_assist_item, CaptureItemCounts};
use crate::farming::session::{pace, FarmContext, Session};

/// 单只生物的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatureResult {
    Captured,
    Escaped,
    Despawned,
}

/// 对当前视野内的所有生物执行遭遇；Stop 后不再处理剩余生物
pub async fn catch_nearby(
    ctx: &FarmContext,
    session: &mut Session,
) -> Result<Vec<CreatureResult>, FarmError> {
    let client = session.handle.client().await;
    let map = client.get_map_objects().await?;
    let mut results = Vec::with_capacity(map.creatures.len());
    if map.creatures.is_empty() {
        return Ok(results);
    }
    tracing::info!("Found {} creatures in the area", map.creatures.len());

    let delay = Duration::from_secs(ctx.config.farming.creature_delay_secs);
    for creature in &map.creatures {
        if !session.is_active() {
            break;
        }
        let result = catch_one(ctx, session, creature).await;
        ctx.status.set_creature(None);
        results.push(result?);

        if !session.is_active() {
            break;
        }
        tracing::info!("Waiting before moving to the next creature.");
        pace(&session.active, delay).await;
    }
    Ok(results)
}

async fn capture_counts(session: &Session) -> Result<CaptureItemCounts, FarmError> {
    let inventory = session.handle.inventory().await;
    Ok(CaptureItemCounts {
        poke: inventory.count_of(ItemKind::PokeBall).await?,
        great: inventory.count_of(ItemKind::GreatBall).await?,
        ultra: inventory.count_of(ItemKind::UltraBall).await?,
    })
}

async fn catch_one(
    ctx: &FarmContext,
    session: &mut Session,
    creature: &WildCreature,
) -> Result<CreatureResult, FarmError> {
    ctx.relocate(creature.location).await?;
    let client = session.handle.client().await;
    let encounter = client.encounter_creature(creature).await?;
    let despawned = encounter.is_despawned();
    let snapshot = match encounter.creature {
        Some(snapshot) if !despawned => snapshot,
        _ => {
            tracing::info!("{} is no longer there", creature.species);
            ctx.events.emit(FarmEvent::CreatureDespawned {
                species: creature.species.clone(),
            });
            return Ok(CreatureResult::Despawned);
        }
    };

    let probability = encounter.capture_probability;
    let item = select_capture_item(snapshot.combat_power, capture_counts(session).await?);
    let iv = snapshot.perfection();
    ctx.status.set_creature(Some(CreatureFocus {
        species: snapshot.species.clone(),
        capture_probability: probability,
    }));
    tracing::info!(
        "Fighting {} (CP {}, IV {:.2}%) with capture probability {:.0}%",
        snapshot.species,
        snapshot.combat_power,
        iv,
        probability * 100.0
    );

    let outcome = throw_until_resolved(ctx, session, creature, item, probability).await?;
    let result = record_outcome(ctx, session, &snapshot, item, outcome);

    let inventory = ctx.refresh_player().await?;
    session.creature_count = inventory.creature_count;
    session.publish_totals(ctx);
    Ok(result)
}

/// 投掷循环：Missed 就再投。默认无上限，max_throw_attempts 设置时到达上限按逃跑处理
async fn throw_until_resolved(
    ctx: &FarmContext,
    session: &Session,
    creature: &WildCreature,
    item: ItemKind,
    probability: f64,
) -> Result<CaptureOutcome, FarmError> {
    let client = session.handle.client().await;
    let inventory = session.handle.inventory().await;
    let use_assist = should_use_assist_item(probability, ctx.config.farming.min_assist_probability);
    let cap = ctx.config.farming.max_throw_attempts;

    let mut attempts = 0u32;
    loop {
        if use_assist && inventory.count_of(ItemKind::RazzBerry).await? > 0 {
            client.use_assist_item(creature, ItemKind::RazzBerry).await?;
            tracing::info!("Used {:?} on {}", ItemKind::RazzBerry, creature.species);
        }
        attempts += 1;
        let outcome = client.throw_capture_item(creature, item).await?;
        if outcome != CaptureOutcome::Missed {
            return Ok(outcome);
        }
        tracing::info!("Missed {} with {:?}, throwing again", creature.species, item);
        if cap.is_some_and(|max| attempts >= max) {
            tracing::warn!(
                "Giving up on {} after {} throws (max_throw_attempts)",
                creature.species,
                attempts
            );
            return Ok(CaptureOutcome::Fled);
        }
    }
}

fn record_outcome(
    ctx: &FarmContext,
    session: &mut Session,
    snapshot: &CreatureSnapshot,
    item: ItemKind,
    outcome: CaptureOutcome,
) -> CreatureResult {
    let iv = snapshot.perfection();
    match outcome {
        CaptureOutcome::Captured { experience } => {
            session.totals.experience += experience;
            session.totals.captures += 1;
            tracing::info!(
                "Caught {} (CP {}, IV {:.2}%) using {:?} for {}xp",
                snapshot.species,
                snapshot.combat_power,
                iv,
                item,
                experience
            );
            ctx.events.emit(FarmEvent::CreatureCaptured {
                species: snapshot.species.clone(),
                combat_power: snapshot.combat_power,
                iv,
                experience,
                item,
            });
            CreatureResult::Captured
        }
        _ => {
            tracing::info!(
                "{} (CP {}, IV {:.2}%) got away using {:?}",
                snapshot.species,
                snapshot.combat_power,
                iv,
                item
            );
            ctx.events.emit(FarmEvent::CreatureEscaped {
                species: snapshot.species.clone(),
                combat_power: snapshot.combat_power,
                iv,
                item,
            });
            CreatureResult::Escaped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{SimSpawn, SimulatedWorld};
    use crate::client::types::GeoPoint;
    use crate::farming::session::testing::{context, fast_config, session};

    fn here() -> GeoPoint {
        fast_config().location.point()
    }

    fn throws_for(calls: &[String]) -> Vec<String> {
        calls
            .iter()
            .filter(|c| c.starts_with("throw_capture_item"))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_capture_after_misses() {
        let world = SimulatedWorld::new()
            .with_items([(ItemKind::PokeBall, 5)])
            .with_spawn(
                SimSpawn::new(7, "Pidgey", here(), 500)
                    .with_throws([CaptureOutcome::Missed, CaptureOutcome::Missed]),
            );
        let (connector, ctx) = context(world, fast_config()).await;
        let mut events = ctx.events.subscribe();
        let mut session = session(&ctx).await;

        let results = catch_nearby(&ctx, &mut session).await.unwrap();
        assert_eq!(results, vec![CreatureResult::Captured]);
        assert_eq!(session.totals.captures, 1);
        assert_eq!(session.totals.experience, 100);
        assert_eq!(session.creature_count, 1);

        let calls = connector.world().calls().await;
        let throws = throws_for(&calls);
        assert_eq!(throws.len(), 3);
        assert!(throws.iter().all(|t| t.ends_with("PokeBall")));

        match events.try_recv().unwrap() {
            FarmEvent::CreatureCaptured { species, item, .. } => {
                assert_eq!(species, "Pidgey");
                assert_eq!(item, ItemKind::PokeBall);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_despawned_creature_skipped_without_throw() {
        let world = SimulatedWorld::new()
            .with_items([(ItemKind::PokeBall, 5)])
            .with_spawn(SimSpawn::new(1, "Zubat", here(), 100).despawned());
        let (connector, ctx) = context(world, fast_config()).await;
        let mut session = session(&ctx).await;

        let results = catch_nearby(&ctx, &mut session).await.unwrap();
        assert_eq!(results, vec![CreatureResult::Despawned]);
        assert!(throws_for(&connector.world().calls().await).is_empty());
        assert_eq!(session.totals.experience, 0);
    }

    #[tokio::test]
    async fn test_fled_creature_gives_no_experience() {
        let world = SimulatedWorld::new()
            .with_items([(ItemKind::GreatBall, 2)])
            .with_spawn(SimSpawn::new(2, "Eevee", here(), 700).with_throws([CaptureOutcome::Fled]));
        let (_connector, ctx) = context(world, fast_config()).await;
        let mut session = session(&ctx).await;

        let results = catch_nearby(&ctx, &mut session).await.unwrap();
        assert_eq!(results, vec![CreatureResult::Escaped]);
        assert_eq!(session.totals.experience, 0);
        assert_eq!(session.totals.captures, 0);
    }

    #[tokio::test]
    async fn test_assist_item_used_below_threshold() {
        let world = SimulatedWorld::new()
            .with_items([(ItemKind::PokeBall, 5), (ItemKind::RazzBerry, 1)])
            .with_spawn(
                SimSpawn::new(3, "Dratini", here(), 300)
                    .with_probability(0.1)
                    .with_throws([CaptureOutcome::Missed]),
            );
        let (connector, ctx) = context(world, fast_config()).await;
        let mut session = session(&ctx).await;

        catch_nearby(&ctx, &mut session).await.unwrap();
        let calls = connector.world().calls().await;
        let berries = calls.iter().filter(|c| c.starts_with("use_assist_item")).count();
        // 只持有一个树果；第二次投掷前数量为 0，跳过
        assert_eq!(berries, 1);
        assert_eq!(connector.world().item_count(ItemKind::RazzBerry).await, 0);
    }

    #[tokio::test]
    async fn test_throw_cap_gives_up() {
        let mut config = fast_config();
        config.farming.max_throw_attempts = Some(2);
        let world = SimulatedWorld::new()
            .with_items([(ItemKind::PokeBall, 5)])
            .with_spawn(SimSpawn::new(4, "Weedle", here(), 100).with_throws([
                CaptureOutcome::Missed,
                CaptureOutcome::Missed,
                CaptureOutcome::Missed,
            ]));
        let (connector, ctx) = context(world, config).await;
        let mut session = session(&ctx).await;

        let results = catch_nearby(&ctx, &mut session).await.unwrap();
        assert_eq!(results, vec![CreatureResult::Escaped]);
        assert_eq!(throws_for(&connector.world().calls().await).len(), 2);
    }

    #[tokio::test]
    async fn test_stopped_session_skips_creatures() {
        let world = SimulatedWorld::new()
            .with_items([(ItemKind::PokeBall, 5)])
            .with_spawn(SimSpawn::new(5, "Rattata", here(), 100))
            .with_spawn(SimSpawn::new(6, "Rattata", here(), 120));
        let (_connector, ctx) = context(world, fast_config()).await;
        let mut session = session(&ctx).await;
        session.active.cancel();

        let results = catch_nearby(&ctx, &mut session).await.unwrap();
        assert!(results.is_empty());
    }
}
