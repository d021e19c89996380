//! 维护操作：进化、放生、回收、消耗品、解除软封禁、统计
//!
//! 既被 Supervisor 在每轮之后调用，也被命令循环在会话之外单独调用。

use chrono::Utc;

use crate::client::traits::ClientError;
use crate::client::types::{EvolveOutcome, ItemKind, PlayerStats};
use crate::core::FarmError;
use crate::farming::events::FarmEvent;
use crate::farming::policy::should_dispose;
use crate::farming::session::FarmContext;
use crate::farming::stats::SessionTotals;
use crate::farming::traversal::eligible_checkpoints;

/// 解除软封禁时最多搜索的次数
pub const UNBAN_MAX_SEARCHES: u32 = 50;

/// 一次维护的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub experience: u64,
    pub processed: u32,
    pub skipped: u32,
}

/// 进化所有候选；单个失败只记录，不中断本轮（会话失效除外）
///
/// 每次成功进化的经验立即计入 `totals`，本轮中途失败也不会丢失。
pub async fn evolve_all(
    ctx: &FarmContext,
    totals: &mut SessionTotals,
) -> Result<PassSummary, FarmError> {
    tracing::info!("Selecting creatures available for evolution.");
    let conn = ctx.handle.current().await;
    let candidates = conn.inventory.evolution_candidates().await?;
    let mut summary = PassSummary::default();

    for creature in candidates {
        let species = creature.snapshot.species.clone();
        let outcome = match conn.client.evolve_creature(creature.id).await {
            Ok(outcome) => outcome,
            Err(ClientError::SessionInvalid) => return Err(FarmError::SessionInvalid),
            Err(ClientError::Remote(reason)) => EvolveOutcome::Failed { reason },
        };
        match outcome {
            EvolveOutcome::Success { experience } => {
                tracing::info!("Evolved {} successfully for {}xp", species, experience);
                summary.experience += experience;
                summary.processed += 1;
                totals.experience += experience;
                ctx.events.emit(FarmEvent::Evolved { species, experience });
            }
            EvolveOutcome::Failed { reason } => {
                tracing::warn!("Failed to evolve {}: {}", species, reason);
                summary.skipped += 1;
                ctx.events.emit(FarmEvent::EvolveFailed { species, reason });
            }
        }
        if let Err(e) = ctx.refresh_player().await {
            tracing::warn!("Failed to refresh player info after evolving: {}", e);
        }
    }

    tracing::info!("Finished evolving creatures.");
    Ok(summary)
}

/// 放生重复生物：IV 与 CP 都低于阈值才放生，其余保留
pub async fn dispose_duplicates(
    ctx: &FarmContext,
    keep_evolvable: bool,
) -> Result<PassSummary, FarmError> {
    tracing::info!("Selecting creatures available for transfer.");
    let farming = &ctx.config.farming;
    let conn = ctx.handle.current().await;
    let duplicates = conn.inventory.duplicate_candidates(keep_evolvable).await?;
    let mut summary = PassSummary::default();

    for creature in duplicates {
        let snapshot = creature.snapshot;
        let iv = snapshot.perfection();
        if should_dispose(iv, snapshot.combat_power, farming.min_iv, farming.min_cp) {
            conn.client.transfer_creature(creature.id).await?;
            tracing::info!(
                "Transferred {} with {} CP and an IV of {:.2}%",
                snapshot.species,
                snapshot.combat_power,
                iv
            );
            summary.processed += 1;
            ctx.events.emit(FarmEvent::Transferred {
                species: snapshot.species,
                combat_power: snapshot.combat_power,
                iv,
            });
            ctx.refresh_player().await?;
        } else {
            tracing::info!(
                "Will not transfer {} with {} CP and an IV of {:.2}%",
                snapshot.species,
                snapshot.combat_power,
                iv
            );
            summary.skipped += 1;
            ctx.events.emit(FarmEvent::Kept {
                species: snapshot.species,
                combat_power: snapshot.combat_power,
                iv,
            });
        }
    }

    tracing::info!("Finished transferring creatures.");
    Ok(summary)
}

async fn recycle_once(ctx: &FarmContext) -> Result<PassSummary, FarmError> {
    let conn = ctx.handle.current().await;
    let stacks = conn
        .inventory
        .recycle_candidates(&ctx.config.recycler.policy())
        .await?;
    let mut summary = PassSummary::default();
    for stack in stacks {
        conn.client.recycle_item(stack.kind, stack.count).await?;
        tracing::info!("Recycled {}x {:?}", stack.count, stack.kind);
        summary.processed += stack.count;
        ctx.events.emit(FarmEvent::Recycled {
            item: stack.kind,
            count: stack.count,
        });
    }
    ctx.refresh_player().await?;
    Ok(summary)
}

/// 手动回收：会话失效时重连并重试一次；其它故障写报告后吞掉
pub async fn recycle_items(ctx: &FarmContext) -> PassSummary {
    tracing::info!("Recycling items to free space");
    let result = match recycle_once(ctx).await {
        Err(FarmError::SessionInvalid) => {
            tracing::warn!("Session expired while recycling, reconnecting");
            match ctx.reconnect(&ctx.credentials).await {
                Ok(_) => recycle_once(ctx).await,
                Err(e) => Err(e),
            }
        }
        other => other,
    };
    match result {
        Ok(summary) => {
            tracing::info!("Recycling complete.");
            summary
        }
        Err(e) => {
            tracing::warn!("Unable to complete item recycling: {}", e);
            ctx.reporter
                .create("RecycleError", "Problem during item recycling", &e);
            PassSummary::default()
        }
    }
}

/// 使用一个消耗品；持有量为 0 时什么也不做。返回使用后的剩余数量
pub async fn use_consumable(ctx: &FarmContext, kind: ItemKind) -> Result<u32, FarmError> {
    let conn = ctx.handle.current().await;
    let held = conn.inventory.count_of(kind).await?;
    if held == 0 {
        tracing::info!("No {:?} left to use", kind);
        return Ok(0);
    }
    conn.client.use_consumable(kind).await?;
    let remaining = held - 1;
    tracing::info!("Used {:?}, remaining: {}", kind, remaining);
    ctx.events.emit(FarmEvent::ConsumableUsed {
        item: kind,
        remaining,
    });
    ctx.refresh_player().await?;
    Ok(remaining)
}

/// 解除软封禁：选第一个名称非空的可用检查点，反复搜索直到获得经验
///
/// 调用方负责先停止会话并保证不重入。
pub async fn force_unban(ctx: &FarmContext) -> Result<bool, FarmError> {
    tracing::info!("Starting force unban...");
    let client = ctx.handle.client().await;
    let map = client.get_map_objects().await?;
    let candidates = eligible_checkpoints(map.checkpoints, Utc::now().timestamp_millis());

    let mut done = false;
    for checkpoint in &candidates {
        ctx.relocate(checkpoint.location).await?;
        let details = client.get_checkpoint(checkpoint).await?;
        if details.name.is_empty() {
            continue;
        }
        tracing::info!("Chosen checkpoint {}, starting the process", details.name);
        for _ in 0..UNBAN_MAX_SEARCHES {
            if client.search_checkpoint(checkpoint).await?.experience > 0 {
                done = true;
                break;
            }
        }
        break;
    }

    if done {
        tracing::info!("Soft ban has been removed successfully.");
    } else {
        tracing::warn!("Force unban failed, please try again.");
    }
    ctx.events.emit(FarmEvent::UnbanFinished { success: done });
    Ok(done)
}

/// 读取生涯统计并推送
pub async fn show_stats(ctx: &FarmContext) -> Result<PlayerStats, FarmError> {
    let stats = ctx.handle.client().await.get_player_stats().await?;
    tracing::info!(
        "Level {} ({}xp), {} checkpoints visited, {} creatures captured, {} evolutions, {:.1} km walked",
        stats.level,
        stats.experience,
        stats.checkpoint_visits,
        stats.creatures_captured,
        stats.evolutions,
        stats.km_walked
    );
    ctx.events.emit(FarmEvent::Stats {
        stats: stats.clone(),
    });
    Ok(stats)
}
