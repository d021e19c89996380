//! 核心编排层：错误与恢复、状态投影、会话监管、诊断报告、优雅关闭、主控循环

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod report;
pub mod session_supervisor;
pub mod shutdown;
pub mod state;

pub use error::{FarmError, RecoveryAction};
pub use orchestrator::{create_controller, Command};
pub use recovery::RecoveryEngine;
pub use report::ErrorReporter;
pub use session_supervisor::SessionSupervisor;
pub use shutdown::{ShutdownCoordinator, ShutdownManager, ShutdownReason};
pub use state::{SessionPhase, StatusPublisher, StatusSnapshot};
