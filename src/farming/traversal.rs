//! 检查点遍历
//!
//! 按地图返回的顺序处理冷却已过的检查点：移动 → 查询 → 搜索 → 抓附近生物 → 容量压力时强制放生 → 等待。
//! 每个检查点结束后检查 Stop。

use std::time::Duration;

use chrono::Utc;

use crate::client::types::Checkpoint;
use crate::core::state::CheckpointProgress;
use crate::core::FarmError;
use crate::farming::encounter::catch_nearby;
use crate::farming::events::FarmEvent;
use crate::farming::guard::creature_pressure;
use crate::farming::maintenance::dispose_duplicates;
use crate::farming::session::{pace, FarmContext, Session};

/// 从地图结果中筛出冷却已过的检查点，保持原顺序
pub fn eligible_checkpoints(checkpoints: Vec<Checkpoint>, now_ms: i64) -> Vec<Checkpoint> {
    checkpoints
        .into_iter()
        .filter(|c| c.is_eligible(now_ms))
        .collect()
}

/// 遍历一轮检查点，返回本轮访问的数量
pub async fn farm_checkpoints(ctx: &FarmContext, session: &mut Session) -> Result<usize, FarmError> {
    let delay = Duration::from_secs(ctx.config.farming.checkpoint_delay_secs);
    let client = session.handle.client().await;
    let map = client.get_map_objects().await?;
    let checkpoints = eligible_checkpoints(map.checkpoints, Utc::now().timestamp_millis());

    if checkpoints.is_empty() {
        tracing::info!("No checkpoints ready nearby, waiting before the next map query.");
        ctx.status.set_checkpoint(None);
        pace(&session.active, delay).await;
        return Ok(0);
    }

    let total = checkpoints.len();
    let mut visited = 0;
    for (i, checkpoint) in checkpoints.iter().enumerate() {
        if !session.is_active() {
            tracing::info!("Stopping checkpoint traversal.");
            break;
        }
        visit(ctx, session, checkpoint, i + 1, total).await?;
        visited += 1;

        if !session.is_active() {
            tracing::info!("Stopping checkpoint traversal.");
            break;
        }

        if creature_pressure(session.creature_count, &session.ceilings) {
            tracing::warn!(
                "Creature storage nearly full ({}/{}), disposing duplicates",
                session.creature_count,
                session.ceilings.creatures
            );
            ctx.events.emit(FarmEvent::DisposalForced {
                creature_count: session.creature_count,
                ceiling: session.ceilings.creatures,
            });
            dispose_duplicates(ctx, true).await?;
            session.creature_count = ctx.refresh_player().await?.creature_count;
        }

        tracing::info!("Waiting before moving to the next checkpoint.");
        pace(&session.active, delay).await;
    }
    ctx.status.set_checkpoint(None);
    Ok(visited)
}

async fn visit(
    ctx: &FarmContext,
    session: &mut Session,
    checkpoint: &Checkpoint,
    index: usize,
    total: usize,
) -> Result<(), FarmError> {
    ctx.relocate(checkpoint.location).await?;
    let client = session.handle.client().await;

    let details = client.get_checkpoint(checkpoint).await?;
    ctx.status.set_checkpoint(Some(CheckpointProgress {
        name: details.name.clone(),
        index,
        total,
    }));
    ctx.events.emit(FarmEvent::CheckpointReached {
        name: details.name.clone(),
        index,
        total,
    });
    tracing::info!("Moving to checkpoint {} ({}/{})", details.name, index, total);

    let loot = client.search_checkpoint(checkpoint).await?;
    let items = loot
        .items
        .iter()
        .map(|s| format!("{}x {:?}", s.count, s.kind))
        .collect::<Vec<_>>()
        .join(", ");
    tracing::info!(
        "Loot -> Gems: {}, Eggs: {}, Items: {} ({}xp)",
        loot.gems,
        loot.egg,
        items,
        loot.experience
    );
    session.totals.experience += loot.experience;
    session.totals.checkpoints += 1;
    ctx.events.emit(FarmEvent::Looted {
        checkpoint: details.name,
        experience: loot.experience,
        gems: loot.gems,
        items: loot.items,
        egg: loot.egg,
    });
    session.creature_count = ctx.refresh_player().await?.creature_count;
    session.publish_totals(ctx);

    tracing::info!("Attempting to capture nearby creatures.");
    catch_nearby(ctx, session).await?;
    Ok(())
}
