//! 会话统计：累计经验 / 捕获数与每小时速率

use std::time::Duration;

/// 每小时速率：(累计 / 秒) * 3600；耗时为 0 时返回 0.0
pub fn per_hour(cumulative: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    cumulative as f64 / secs * 3600.0
}

/// 本次会话的累计计数；恢复（重连）时不清零
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTotals {
    pub experience: u64,
    pub captures: u64,
    pub checkpoints: u64,
}

impl SessionTotals {
    pub fn experience_per_hour(&self, elapsed: Duration) -> f64 {
        per_hour(self.experience, elapsed)
    }

    pub fn captures_per_hour(&self, elapsed: Duration) -> f64 {
        per_hour(self.captures, elapsed)
    }
}
