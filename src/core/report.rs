//! 诊断报告：每次可恢复故障尽力写一份 JSON 报告，写失败只记 warn

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Report<'a> {
    kind: &'a str,
    summary: &'a str,
    error: String,
    created_at: String,
}

/// 报告写入器
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    dir: PathBuf,
}

impl ErrorReporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 写一份报告，返回文件路径；任何失败都被吞掉
    pub fn create(&self, kind: &str, summary: &str, err: &dyn std::fmt::Display) -> Option<PathBuf> {
        let now = Utc::now();
        let report = Report {
            kind,
            summary,
            error: err.to_string(),
            created_at: now.to_rfc3339(),
        };
        let path = self.dir.join(format!(
            "{}-{}-{}.json",
            kind,
            now.format("%Y%m%d%H%M%S"),
            uuid::Uuid::new_v4().simple()
        ));
        let written = std::fs::create_dir_all(&self.dir)
            .and_then(|_| {
                serde_json::to_vec_pretty(&report)
                    .map_err(std::io::Error::other)
            })
            .and_then(|bytes| std::fs::write(&path, bytes));
        match written {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!("Failed to write diagnostic report '{}': {}", kind, e);
                None
            }
        }
    }
}
