//! 自适应笔的触发检测。

use crate::bar::RawBar;
use crate::config::AdaptiveThresholds;
use crate::indicator::{Atr, Indicator, VolumeMa};

/// 自适应笔的波动与放量检测。
///
/// 真实波幅超过此前 ATR 的 `atr_ratio` 倍，且成交量超过此前均量的
/// `volume_ratio` 倍时触发。两个窗口都填满之前不会触发。
#[derive(Debug, Clone)]
pub struct AdaptiveTrigger {
    enabled: bool,
    thresholds: AdaptiveThresholds,
    atr: Atr,
    volume: VolumeMa,
    fired_total: usize,
}

impl AdaptiveTrigger {
    pub fn new(thresholds: AdaptiveThresholds, enabled: bool) -> Self {
        Self {
            enabled,
            thresholds,
            atr: Atr::new(thresholds.atr_period),
            volume: VolumeMa::new(thresholds.volume_period),
            fired_total: 0,
        }
    }

    pub fn disabled(thresholds: AdaptiveThresholds) -> Self {
        Self::new(thresholds, false)
    }

    /// 先用已有统计判断 `bar`，再把它计入窗口。
    pub fn update(&mut self, bar: &RawBar) -> bool {
        if !self.enabled {
            return false;
        }
        let tr = self.atr.next_true_range(bar);
        let fired = match (self.atr.value(), self.volume.value()) {
            (Some(atr), Some(avg_volume)) => {
                tr > self.thresholds.atr_ratio * atr
                    && bar.volume > self.thresholds.volume_ratio * avg_volume
            }
            _ => false,
        };
        self.atr.update(bar);
        self.volume.update(bar);
        if fired {
            self.fired_total += 1;
        }
        fired
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn thresholds(&self) -> AdaptiveThresholds {
        self.thresholds
    }

    pub fn atr(&self) -> Option<f64> {
        self.atr.value()
    }

    pub fn average_volume(&self) -> Option<f64> {
        self.volume.value()
    }

    pub fn fired_total(&self) -> usize {
        self.fired_total
    }
}
