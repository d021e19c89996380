//! 捕捉策略：纯决策逻辑
//!
//! - 选球：按战斗力与持有量的固定优先级表
//! - 树果：捕捉概率低于阈值时使用
//! - 放生：IV 与 CP 同时低于阈值才放生

use crate::client::types::ItemKind;

/// 三档捕捉道具的持有量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureItemCounts {
    pub poke: u32,
    pub great: u32,
    pub ultra: u32,
}

/// 选择捕捉道具，按顺序首个命中即返回。
///
/// 兜底返回 UltraBall，即使持有量为 0；保留此行为，调用方据此抛出（服务端会拒绝或记为未命中）。
pub fn select_capture_item(combat_power: u32, counts: CaptureItemCounts) -> ItemKind {
    let (poke, great, ultra) = (counts.poke > 0, counts.great > 0, counts.ultra > 0);

    if ultra && combat_power >= 1000 {
        return ItemKind::UltraBall;
    }
    if great && combat_power >= 1000 {
        return ItemKind::GreatBall;
    }
    if ultra && combat_power >= 600 {
        return ItemKind::UltraBall;
    }
    if great && combat_power >= 600 {
        return ItemKind::GreatBall;
    }
    if great && combat_power >= 350 {
        return ItemKind::GreatBall;
    }
    if poke {
        return ItemKind::PokeBall;
    }
    if great {
        return ItemKind::GreatBall;
    }
    ItemKind::UltraBall
}

/// 捕捉概率（0..1）低于阈值（百分比）时使用辅助道具
pub fn should_use_assist_item(capture_probability: f64, threshold_percent: f64) -> bool {
    capture_probability < threshold_percent / 100.0
}

/// 仅当 IV 与 CP 都低于阈值时放生（严格小于）
pub fn should_dispose(iv_percent: f64, combat_power: u32, min_iv: f64, min_cp: u32) -> bool {
    iv_percent < min_iv && combat_power < min_cp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(poke: u32, great: u32, ultra: u32) -> CaptureItemCounts {
        CaptureItemCounts { poke, great, ultra }
    }

    /// 独立写出的参照表，用来对照全组合
    fn expected(cp: u32, poke: bool, great: bool, ultra: bool) -> ItemKind {
        match (cp, poke, great, ultra) {
            (1000.., _, _, true) => ItemKind::UltraBall,
            (1000.., _, true, false) => ItemKind::GreatBall,
            (600..=999, _, _, true) => ItemKind::UltraBall,
            (350..=999, _, true, _) => ItemKind::GreatBall,
            (_, true, _, _) => ItemKind::PokeBall,
            (_, false, true, _) => ItemKind::GreatBall,
            _ => ItemKind::UltraBall,
        }
    }

    #[test]
    fn test_select_capture_item_cross_product() {
        for cp in [200, 400, 700, 1200] {
            for poke in [0, 1] {
                for great in [0, 1] {
                    for ultra in [0, 1] {
                        let got = select_capture_item(cp, counts(poke, great, ultra));
                        let want = expected(cp, poke > 0, great > 0, ultra > 0);
                        assert_eq!(
                            got, want,
                            "cp={cp} poke={poke} great={great} ultra={ultra}"
                        );
                        // 确定性
                        assert_eq!(got, select_capture_item(cp, counts(poke, great, ultra)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_select_capture_item_thresholds() {
        assert_eq!(select_capture_item(1000, counts(1, 1, 1)), ItemKind::UltraBall);
        assert_eq!(select_capture_item(999, counts(1, 1, 1)), ItemKind::UltraBall);
        assert_eq!(select_capture_item(599, counts(1, 1, 1)), ItemKind::GreatBall);
        assert_eq!(select_capture_item(350, counts(1, 1, 0)), ItemKind::GreatBall);
        assert_eq!(select_capture_item(349, counts(1, 1, 1)), ItemKind::PokeBall);
        assert_eq!(select_capture_item(200, counts(0, 1, 1)), ItemKind::GreatBall);
    }

    #[test]
    fn test_select_capture_item_falls_back_to_empty_ultra() {
        // 一个球都没有时仍返回 UltraBall
        assert_eq!(select_capture_item(200, counts(0, 0, 0)), ItemKind::UltraBall);
        assert_eq!(select_capture_item(1200, counts(0, 0, 0)), ItemKind::UltraBall);
    }

    #[test]
    fn test_should_use_assist_item() {
        assert!(should_use_assist_item(0.29, 30.0));
        assert!(!should_use_assist_item(0.30, 30.0));
        assert!(!should_use_assist_item(0.5, 0.0));
    }

    #[test]
    fn test_should_dispose_grid() {
        let (min_iv, min_cp) = (70.0, 1000);
        for iv in [0.0, 69.9, 70.0, 70.1, 100.0] {
            for cp in [0, 999, 1000, 1001, 3000] {
                let want = iv < min_iv && cp < min_cp;
                assert_eq!(should_dispose(iv, cp, min_iv, min_cp), want, "iv={iv} cp={cp}");
            }
        }
        // 边界相等保留
        assert!(!should_dispose(70.0, 10, 70.0, 1000));
        assert!(!should_dispose(10.0, 1000, 70.0, 1000));
        // 任一维度强即保留
        assert!(!should_dispose(60.0, 1200, 70.0, 1000));
        assert!(should_dispose(60.0, 900, 70.0, 1000));
    }
}
