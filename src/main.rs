//! pogo-farm - 自动刷图
//!
//! 入口：初始化日志、加载配置、登录并创建控制器，然后：
//! - 把事件逐行以 JSON 打印到 stdout
//! - 从 stdin 读取命令（start / stop / unban / evolve / transfer / recycle / incense / egg / stats / silent on|off / quit）
//! 直到 Ctrl+C、SIGTERM 或 quit。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use pogo_farm::client::{SimulatedConnector, SimulatedWorld};
use pogo_farm::config::{load_config, AppConfig};
use pogo_farm::core::shutdown::{run_with_graceful_shutdown, SessionCleanup};
use pogo_farm::core::{create_controller, Command, ShutdownCoordinator, ShutdownManager, ShutdownReason};
use pogo_farm::observability;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "unban" => Command::ForceUnban,
        "evolve" => Command::RunEvolution,
        "transfer" => Command::RunDisposal,
        "recycle" => Command::RunRecycle,
        "incense" => Command::UseIncense,
        "egg" => Command::UseLuckyEgg,
        "stats" => Command::ShowStats,
        "silent" => Command::SetSilentRecycle(words.next()? == "on"),
        "quit" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    // 本 crate 不实现线协议，使用模拟世界作为后端
    tracing::warn!("No game server backend is bundled, farming against a simulated world");
    let world = Arc::new(SimulatedWorld::demo(config.location.point()));
    let connector = Arc::new(SimulatedConnector::new(world));

    let shutdown = Arc::new(ShutdownManager::new());
    let (cmd_tx, status_rx, mut event_rx) =
        create_controller(config, connector, shutdown.token())
            .await
            .context("Failed to create farming controller")?;

    let mut coordinator = ShutdownCoordinator::new();
    coordinator.register(SessionCleanup::new(cmd_tx.clone(), status_rx.clone()));

    cmd_tx
        .send(Command::Start)
        .context("Farming controller is not running")?;

    let input_tx = cmd_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(command) => {
                    if input_tx.send(command).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => tracing::warn!("Unknown command: {}", line.trim()),
            }
        }
    });

    let printer = async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!("Failed to encode event: {}", e),
                },
                Err(RecvError::Lagged(n)) => tracing::warn!("Dropped {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    };

    let manager = Arc::clone(&shutdown);
    run_with_graceful_shutdown(shutdown, printer, || async move {
        if !manager.is_shutdown() {
            manager.shutdown(ShutdownReason::ControllerExited);
        }
        coordinator.run_cleanup().await;
    })
    .await;

    Ok(())
}
