//! pogo-farm - 基于位置的游戏自动刷图核心
//!
//! 模块划分：
//! - **client**: 远端协作方抽象（会话客户端、背包服务、登录）、共享句柄、模拟世界
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排、状态、恢复、会话监管、诊断报告、优雅关闭
//! - **farming**: 捕捉策略、容量守卫、遭遇循环、检查点遍历、维护操作、后台回收
//! - **observability**: 日志初始化

pub mod client;
pub mod config;
pub mod core;
pub mod farming;
pub mod observability;

pub use crate::core::{create_controller, Command};
