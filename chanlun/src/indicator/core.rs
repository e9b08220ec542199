use std::collections::VecDeque;

use crate::bar::RawBar;

pub trait Indicator: Send {
    fn name(&self) -> &str;
    fn reset(&mut self);
    /// 输入一根 bar，窗口填满后返回指标值。
    fn update(&mut self, bar: &RawBar) -> Option<f64>;
    fn value(&self) -> Option<f64>;

    fn backfill(&mut self, bars: &[RawBar]) -> Vec<Option<f64>> {
        bars.iter().map(|bar| self.update(bar)).collect()
    }
}

/// 固定窗口均值，O(1) 更新。
#[derive(Debug, Clone)]
pub struct RollingMean {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "period must be > 0");
        Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        self.mean()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.is_full() {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.window.len() == self.period
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }
}
