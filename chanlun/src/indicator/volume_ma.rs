use crate::bar::RawBar;

use super::core::{Indicator, RollingMean};

/// 成交量简单移动平均。
#[derive(Debug, Clone)]
pub struct VolumeMa {
    name: String,
    window: RollingMean,
}

impl VolumeMa {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("volume_ma_{period}"),
            window: RollingMean::new(period),
        }
    }

    pub fn period(&self) -> usize {
        self.window.period()
    }
}

impl Indicator for VolumeMa {
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) {
        self.window.clear();
    }

    fn update(&mut self, bar: &RawBar) -> Option<f64> {
        self.window.push(bar.volume)
    }

    fn value(&self) -> Option<f64> {
        self.window.mean()
    }
}
