//! 刷图会话端到端测试：模拟世界 + 真实 Supervisor / 控制器

use std::sync::Arc;
use std::time::Duration;

use pogo_farm::client::mock::{SimSpawn, SimulatedConnector, SimulatedWorld};
use pogo_farm::client::traits::ClientError;
use pogo_farm::client::types::{CaptureOutcome, CreatureSnapshot, GeoPoint, ItemKind};
use pogo_farm::config::AppConfig;
use pogo_farm::core::{
    create_controller, Command, SessionPhase, SessionSupervisor, StatusPublisher,
};
use pogo_farm::farming::maintenance::dispose_duplicates;
use pogo_farm::farming::{EventBus, FarmContext, FarmEvent, Session};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

fn fast_config(reports: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.farming.checkpoint_delay_secs = 0;
    config.farming.creature_delay_secs = 0;
    config.farming.reconnect_delay_secs = 0;
    config.recycler.item_delay_ms = 0;
    config.reports.dir = reports.to_path_buf();
    config
}

fn start_point() -> GeoPoint {
    AppConfig::default().location.point()
}

async fn wait_for<F>(rx: &mut broadcast::Receiver<FarmEvent>, pred: F) -> FarmEvent
where
    F: Fn(&FarmEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => panic!("event feed closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

struct Harness {
    connector: Arc<SimulatedConnector>,
    supervisor: Arc<SessionSupervisor>,
    events: broadcast::Receiver<FarmEvent>,
    _reports: tempfile::TempDir,
}

async fn harness(world: SimulatedWorld) -> Harness {
    let reports = tempfile::tempdir().unwrap();
    let connector = Arc::new(SimulatedConnector::new(Arc::new(world)));
    let bus = EventBus::default();
    let events = bus.subscribe();
    let (status, _rx) = StatusPublisher::channel();
    let ctx = FarmContext::connect(fast_config(reports.path()), connector.clone(), bus, status)
        .await
        .unwrap();
    Harness {
        connector,
        supervisor: Arc::new(SessionSupervisor::new(Arc::new(ctx))),
        events,
        _reports: reports,
    }
}

fn spawn_run(
    supervisor: &Arc<SessionSupervisor>,
    mut session: Session,
) -> tokio::task::JoinHandle<Session> {
    let supervisor = Arc::clone(supervisor);
    tokio::spawn(async move {
        supervisor.run(&mut session).await;
        session
    })
}

fn calls_with(calls: &[String], prefix: &str) -> Vec<String> {
    calls
        .iter()
        .filter(|c| c.starts_with(prefix))
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_capture_adds_search_and_capture_experience() {
    let here = start_point();
    let world = SimulatedWorld::new()
        .with_items([(ItemKind::PokeBall, 5)])
        .with_checkpoint("stop-1", "Fountain", here, 50)
        .with_spawn(SimSpawn::new(1, "Pidgey", here, 500).with_throws([CaptureOutcome::Missed]));
    let mut h = harness(world).await;

    let session = h.supervisor.start().await.unwrap();
    assert_eq!(session.creature_count, 0);
    assert_eq!(session.ceilings.creatures, 250);
    let stop = session.active.clone();
    let runner = spawn_run(&h.supervisor, session);

    let captured = wait_for(&mut h.events, |e| {
        matches!(e, FarmEvent::CreatureCaptured { .. })
    })
    .await;
    stop.cancel();
    let session = runner.await.unwrap();

    match captured {
        FarmEvent::CreatureCaptured {
            species,
            combat_power,
            item,
            experience,
            ..
        } => {
            assert_eq!(species, "Pidgey");
            assert_eq!(combat_power, 500);
            assert_eq!(item, ItemKind::PokeBall);
            assert_eq!(experience, 100);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(session.totals.experience, 150);
    assert_eq!(session.totals.captures, 1);

    let snapshot = h.supervisor.context().status.snapshot();
    assert_eq!(snapshot.experience, 150);
    assert_eq!(snapshot.captures, 1);
    assert_eq!(snapshot.phase, SessionPhase::Stopped);

    let calls = h.connector.world().calls().await;
    let throws = calls_with(&calls, "throw_capture_item");
    assert_eq!(throws, vec!["throw_capture_item:1:PokeBall"; 2]);
}

#[tokio::test]
async fn test_session_invalid_restarts_from_first_checkpoint() {
    let here = start_point();
    let world = SimulatedWorld::new()
        .with_checkpoint("stop-a", "A", here, 10)
        .with_checkpoint("stop-b", "B", here, 20);
    let mut h = harness(world).await;
    h.connector
        .world()
        .fail_next("search_checkpoint", ClientError::SessionInvalid)
        .await;

    let session = h.supervisor.start().await.unwrap();
    let stop = session.active.clone();
    let runner = spawn_run(&h.supervisor, session);

    wait_for(&mut h.events, |e| matches!(e, FarmEvent::Recovering { .. })).await;
    wait_for(&mut h.events, |e| matches!(e, FarmEvent::Recovered)).await;
    let looted = wait_for(&mut h.events, |e| matches!(e, FarmEvent::Looted { .. })).await;
    stop.cancel();
    let session = runner.await.unwrap();

    assert!(matches!(looted, FarmEvent::Looted { ref checkpoint, .. } if checkpoint == "A"));
    assert_eq!(h.connector.logins(), 2);

    let calls = h.connector.world().calls().await;
    let searches = calls_with(&calls, "search_checkpoint");
    assert_eq!(searches[0], "search_checkpoint:stop-a");
    assert_eq!(searches[1], "search_checkpoint:stop-a");

    // 失败的搜索之后先有一次新的地图查询，才再次访问第一个检查点
    let failed_at = calls
        .iter()
        .position(|c| c == "search_checkpoint:stop-a")
        .unwrap();
    let retried_at = calls
        .iter()
        .rposition(|c| c == "search_checkpoint:stop-a")
        .unwrap();
    assert!(calls[failed_at + 1..retried_at]
        .iter()
        .any(|c| c.starts_with("get_map_objects")));
    assert!(session.totals.experience >= 10);
}

#[tokio::test]
async fn test_disposal_keeps_high_cp_and_transfers_weak_duplicate() {
    let creature = |cp: u32, iv: u8| CreatureSnapshot {
        species: "Eevee".to_string(),
        combat_power: cp,
        individual_attack: iv,
        individual_defense: iv,
        individual_stamina: iv,
    };
    // 9+9+9 = 27/45 → IV 60%
    let world = SimulatedWorld::new()
        .with_owned(creature(2000, 15), false)
        .with_owned(creature(1200, 9), false)
        .with_owned(creature(900, 9), false);
    let reports = tempfile::tempdir().unwrap();
    let mut config = fast_config(reports.path());
    config.farming.min_iv = 70.0;
    config.farming.min_cp = 1000;
    let connector = Arc::new(SimulatedConnector::new(Arc::new(world)));
    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let (status, _rx) = StatusPublisher::channel();
    let ctx = FarmContext::connect(config, connector.clone(), bus, status)
        .await
        .unwrap();

    let summary = dispose_duplicates(&ctx, true).await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);

    let kept = wait_for(&mut events, |e| matches!(e, FarmEvent::Kept { .. })).await;
    assert!(matches!(kept, FarmEvent::Kept { combat_power: 1200, .. }));
    let remaining: Vec<u32> = connector
        .world()
        .owned()
        .await
        .iter()
        .map(|c| c.snapshot.combat_power)
        .collect();
    assert_eq!(remaining, vec![2000, 1200]);
}

#[tokio::test]
async fn test_stop_mid_creature_loop_finishes_current_creature_only() {
    let here = start_point();
    let far = GeoPoint::new(here.latitude + 0.01, here.longitude);
    let world = SimulatedWorld::new()
        .with_items([(ItemKind::PokeBall, 10)])
        .with_checkpoint("stop-a", "A", here, 10)
        .with_checkpoint("stop-b", "B", far, 10)
        .with_spawn(SimSpawn::new(1, "Rattata", here, 100))
        .with_spawn(SimSpawn::new(2, "Zubat", here, 100));
    let mut h = harness(world).await;

    let session = h.supervisor.start().await.unwrap();
    let stop = session.active.clone();
    let runner = spawn_run(&h.supervisor, session);

    wait_for(&mut h.events, |e| {
        matches!(e, FarmEvent::CreatureCaptured { .. })
    })
    .await;
    stop.cancel();
    let session = runner.await.unwrap();

    assert_eq!(session.totals.captures, 1);
    let calls = h.connector.world().calls().await;
    assert_eq!(calls_with(&calls, "encounter_creature"), vec!["encounter_creature:1"]);
    assert_eq!(
        calls_with(&calls, "search_checkpoint"),
        vec!["search_checkpoint:stop-a"]
    );
}

#[tokio::test]
async fn test_controller_preflight_blocks_start() {
    let world = SimulatedWorld::new().with_items([(ItemKind::Potion, 350)]);
    let reports = tempfile::tempdir().unwrap();
    let connector = Arc::new(SimulatedConnector::new(Arc::new(world)));
    let shutdown = CancellationToken::new();
    let (cmd_tx, status_rx, mut events) =
        create_controller(fast_config(reports.path()), connector, shutdown.clone())
            .await
            .unwrap();

    cmd_tx.send(Command::Start).unwrap();
    let blocked = wait_for(&mut events, |e| {
        matches!(e, FarmEvent::PreflightBlocked { .. })
    })
    .await;
    assert!(matches!(blocked, FarmEvent::PreflightBlocked { ref reason } if reason.contains("items")));
    assert_eq!(status_rx.borrow().phase, SessionPhase::Idle);
    shutdown.cancel();
}

#[tokio::test]
async fn test_controller_rejects_destructive_commands_while_running() {
    let here = start_point();
    let world = SimulatedWorld::new().with_checkpoint("stop-a", "A", here, 10);
    let reports = tempfile::tempdir().unwrap();
    let connector = Arc::new(SimulatedConnector::new(Arc::new(world)));
    let shutdown = CancellationToken::new();
    let (cmd_tx, mut status_rx, mut events) =
        create_controller(fast_config(reports.path()), connector, shutdown.clone())
            .await
            .unwrap();

    cmd_tx.send(Command::Start).unwrap();
    wait_for(&mut events, |e| matches!(e, FarmEvent::SessionStarted)).await;

    cmd_tx.send(Command::RunDisposal).unwrap();
    let rejected = wait_for(&mut events, |e| {
        matches!(e, FarmEvent::CommandRejected { .. })
    })
    .await;
    assert!(matches!(rejected, FarmEvent::CommandRejected { ref command, .. } if command == "run_disposal"));

    cmd_tx.send(Command::Stop).unwrap();
    wait_for(&mut events, |e| matches!(e, FarmEvent::SessionStopped)).await;
    status_rx
        .wait_for(|s| s.phase == SessionPhase::Stopped)
        .await
        .unwrap();
    shutdown.cancel();
}

#[tokio::test]
async fn test_controller_force_unban() {
    let here = start_point();
    let world = SimulatedWorld::new()
        .with_checkpoint("stop-a", "Mural", here, 10)
        .with_soft_ban(2);
    let reports = tempfile::tempdir().unwrap();
    let connector = Arc::new(SimulatedConnector::new(Arc::new(world)));
    let shutdown = CancellationToken::new();
    let (cmd_tx, _status_rx, mut events) =
        create_controller(fast_config(reports.path()), connector.clone(), shutdown.clone())
            .await
            .unwrap();

    cmd_tx.send(Command::ForceUnban).unwrap();
    cmd_tx.send(Command::ForceUnban).unwrap();

    let rejected = wait_for(&mut events, |e| {
        matches!(e, FarmEvent::CommandRejected { .. })
    })
    .await;
    assert!(matches!(rejected, FarmEvent::CommandRejected { ref command, .. } if command == "force_unban"));

    let finished = wait_for(&mut events, |e| {
        matches!(e, FarmEvent::UnbanFinished { .. })
    })
    .await;
    assert_eq!(finished, FarmEvent::UnbanFinished { success: true });
    let calls = connector.world().calls().await;
    assert_eq!(calls_with(&calls, "search_checkpoint").len(), 3);
    shutdown.cancel();
}

#[tokio::test]
async fn test_controller_consumables() {
    let world = SimulatedWorld::new().with_items([(ItemKind::LuckyEgg, 1)]);
    let reports = tempfile::tempdir().unwrap();
    let connector = Arc::new(SimulatedConnector::new(Arc::new(world)));
    let shutdown = CancellationToken::new();
    let (cmd_tx, _status_rx, mut events) =
        create_controller(fast_config(reports.path()), connector.clone(), shutdown.clone())
            .await
            .unwrap();

    cmd_tx.send(Command::UseIncense).unwrap();
    cmd_tx.send(Command::UseLuckyEgg).unwrap();
    let used = wait_for(&mut events, |e| {
        matches!(e, FarmEvent::ConsumableUsed { .. })
    })
    .await;
    assert_eq!(
        used,
        FarmEvent::ConsumableUsed {
            item: ItemKind::LuckyEgg,
            remaining: 0
        }
    );
    assert_eq!(connector.world().item_count(ItemKind::LuckyEgg).await, 0);
    shutdown.cancel();
}
