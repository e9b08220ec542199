use crate::bar::RawBar;

use super::core::{Indicator, RollingMean};

/// 最近 `period` 根 bar 真实波幅的简单平均。
#[derive(Debug, Clone)]
pub struct Atr {
    name: String,
    window: RollingMean,
    prev_close: Option<f64>,
    last_tr: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("atr_{period}"),
            window: RollingMean::new(period),
            prev_close: None,
            last_tr: None,
        }
    }

    /// 以上一根收盘价计算 `bar` 的真实波幅。
    pub fn next_true_range(&self, bar: &RawBar) -> f64 {
        true_range(bar.high_price, bar.low_price, self.prev_close)
    }

    pub fn last_true_range(&self) -> Option<f64> {
        self.last_tr
    }

    pub fn period(&self) -> usize {
        self.window.period()
    }
}

pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    if let Some(prev_close) = prev_close {
        (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs())
    } else {
        high - low
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) {
        self.window.clear();
        self.prev_close = None;
        self.last_tr = None;
    }

    fn update(&mut self, bar: &RawBar) -> Option<f64> {
        let tr = self.next_true_range(bar);
        self.prev_close = Some(bar.close_price);
        self.last_tr = Some(tr);
        self.window.push(tr)
    }

    fn value(&self) -> Option<f64> {
        self.window.mean()
    }
}
