//! K 线包含处理。
//!
//! 序列由已封存的前缀和一根未完成 K 线组成。
//! 只有未完成的 K 线会吸收后续 bar，已封存的不再改变。

use std::sync::Arc;

use crate::bar::{MergedBar, RawBar, is_inclusive};
use crate::constant::{Const, Direction};
use crate::error::ChanError;
use crate::id_generator::IdGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// 原始 bar 成为新的合并 K 线。
    Appended,
    /// 原始 bar 被未完成的合并 K 线吸收。
    Absorbed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub kind: MergeKind,
    pub bar: MergedBar,
}

#[derive(Debug, Clone)]
pub struct BarMerger {
    sealed: Vec<Arc<MergedBar>>,
    open: Option<MergedBar>,
    /// 最近两根不相包含的合并 K 线之间的方向。
    trend: Option<Direction>,
    id_generator: IdGenerator,
}

impl Default for BarMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl BarMerger {
    pub fn new() -> Self {
        Self {
            sealed: Vec::new(),
            open: None,
            trend: None,
            id_generator: IdGenerator::new(),
        }
    }

    pub fn merge(&mut self, raw: RawBar) -> Result<MergeOutcome, ChanError> {
        if raw.high_price < raw.low_price {
            return Err(ChanError::DataIntegrity(format!(
                "bar {} has high {} below low {}",
                raw.id, raw.high_price, raw.low_price
            )));
        }

        let Some(mut open) = self.open.take() else {
            let bar = MergedBar::from_raw(self.id_generator.get_id(), raw);
            self.open = Some(bar.clone());
            return Ok(MergeOutcome {
                kind: MergeKind::Appended,
                bar,
            });
        };

        if is_inclusive(open.high_price, open.low_price, raw.high_price, raw.low_price) {
            let direction = self.resolve_direction(&open);
            absorb(&mut open, raw, direction);
            self.open = Some(open.clone());
            return Ok(MergeOutcome {
                kind: MergeKind::Absorbed,
                bar: open,
            });
        }

        self.trend = Some(if raw.high_price > open.high_price {
            Direction::Up
        } else {
            Direction::Down
        });
        self.sealed.push(Arc::new(open));
        let bar = MergedBar::from_raw(self.id_generator.get_id(), raw);
        self.open = Some(bar.clone());
        Ok(MergeOutcome {
            kind: MergeKind::Appended,
            bar,
        })
    }

    /// 由未完成 K 线的前一根决定方向；缺失时沿用当前趋势，
    /// 再退回 [`Const::INITIAL_MERGE_DIRECTION`]。
    fn resolve_direction(&self, open: &MergedBar) -> Direction {
        if let Some(prev) = self.sealed.last() {
            if prev.high_price < open.high_price
                || (prev.high_price == open.high_price && prev.low_price < open.low_price)
            {
                return Direction::Up;
            }
            if prev.high_price > open.high_price
                || (prev.high_price == open.high_price && prev.low_price > open.low_price)
            {
                return Direction::Down;
            }
        }
        self.trend.unwrap_or(Const::INITIAL_MERGE_DIRECTION)
    }

    /// 已封存的合并 K 线，按时间先后，不含未完成的一根。
    pub fn history(&self) -> &[Arc<MergedBar>] {
        &self.sealed
    }

    pub fn open_bar(&self) -> Option<&MergedBar> {
        self.open.as_ref()
    }

    pub fn trend(&self) -> Option<Direction> {
        self.trend
    }

    /// 已封存的 K 线，末尾接未完成的一根。
    pub fn all_rows(&self) -> Vec<Arc<MergedBar>> {
        let mut rows = self.sealed.clone();
        if let Some(open) = &self.open {
            rows.push(Arc::new(open.clone()));
        }
        rows
    }

    pub fn len(&self) -> usize {
        self.sealed.len() + usize::from(self.open.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 丢弃 id 小于 `cbar_id` 的已封存 K 线。
    pub fn retain_from(&mut self, cbar_id: u64) -> usize {
        let cut = self.sealed.partition_point(|x| x.id < cbar_id);
        self.sealed.drain(..cut);
        cut
    }
}

fn absorb(open: &mut MergedBar, raw: RawBar, direction: Direction) {
    match direction {
        Direction::Up => {
            if raw.high_price > open.high_price {
                open.datetime = raw.datetime;
            }
            open.high_price = open.high_price.max(raw.high_price);
            open.low_price = open.low_price.max(raw.low_price);
        }
        Direction::Down => {
            if raw.low_price < open.low_price {
                open.datetime = raw.datetime;
            }
            open.high_price = open.high_price.min(raw.high_price);
            open.low_price = open.low_price.min(raw.low_price);
        }
    }
    open.close_price = raw.close_price;
    open.volume += raw.volume;
    open.amount += raw.amount;
    open.merge_direction = Some(direction);
    open.elements.push(raw);
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::constant::Freq;

    fn mk_raw(id: u64, high: f64, low: f64) -> RawBar {
        RawBar {
            symbol: "T".to_string(),
            id,
            datetime: Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap()
                + chrono::Duration::minutes(id as i64),
            freq: Freq::F1,
            open_price: (high + low) / 2.0,
            high_price: high,
            low_price: low,
            close_price: (high + low) / 2.0,
            volume: 1.0,
            amount: 1.0,
        }
    }

    #[test]
    fn first_bars_merge_with_initial_down_bias() {
        let mut merger = BarMerger::new();
        merger.merge(mk_raw(1, 10.0, 1.0)).expect("valid bar");
        let outcome = merger.merge(mk_raw(2, 9.0, 2.0)).expect("valid bar");

        assert_eq!(outcome.kind, MergeKind::Absorbed);
        assert_eq!(merger.len(), 1);
        assert_eq!(outcome.bar.high_price, 9.0);
        assert_eq!(outcome.bar.low_price, 1.0);
        assert_eq!(outcome.bar.merge_direction, Some(Const::INITIAL_MERGE_DIRECTION));
        assert_eq!(outcome.bar.elements.len(), 2);
    }

    #[test]
    fn up_trend_keeps_higher_high_and_higher_low() {
        let mut merger = BarMerger::new();
        merger.merge(mk_raw(1, 10.0, 5.0)).expect("valid bar");
        merger.merge(mk_raw(2, 12.0, 6.0)).expect("valid bar");
        let outcome = merger.merge(mk_raw(3, 11.0, 7.0)).expect("valid bar");

        assert_eq!(outcome.kind, MergeKind::Absorbed);
        assert_eq!(outcome.bar.high_price, 12.0);
        assert_eq!(outcome.bar.low_price, 7.0);
        assert_eq!(outcome.bar.merge_direction, Some(Direction::Up));
        assert_eq!(outcome.bar.raw_start_id(), Some(2));
        assert_eq!(outcome.bar.raw_end_id(), Some(3));
    }

    #[test]
    fn down_trend_keeps_lower_high_and_lower_low() {
        let mut merger = BarMerger::new();
        merger.merge(mk_raw(1, 12.0, 6.0)).expect("valid bar");
        merger.merge(mk_raw(2, 10.0, 4.0)).expect("valid bar");
        let outcome = merger.merge(mk_raw(3, 11.0, 3.0)).expect("valid bar");

        assert_eq!(outcome.kind, MergeKind::Absorbed);
        assert_eq!(outcome.bar.high_price, 10.0);
        assert_eq!(outcome.bar.low_price, 3.0);
        assert_eq!(outcome.bar.merge_direction, Some(Direction::Down));
    }

    #[test]
    fn inverted_bar_is_rejected_without_state_change() {
        let mut merger = BarMerger::new();
        merger.merge(mk_raw(1, 10.0, 5.0)).expect("valid bar");
        let mut bad = mk_raw(2, 7.0, 5.0);
        bad.high_price = 5.0;
        bad.low_price = 7.0;

        assert!(matches!(merger.merge(bad), Err(ChanError::DataIntegrity(_))));
        assert_eq!(merger.len(), 1);
        assert_eq!(merger.open_bar().map(|x| x.elements.len()), Some(1));
    }

    #[test]
    fn retain_from_drops_only_older_sealed_bars() {
        let mut merger = BarMerger::new();
        for (i, (h, l)) in [(10.0, 5.0), (12.0, 6.0), (14.0, 8.0), (16.0, 9.0)]
            .into_iter()
            .enumerate()
        {
            merger.merge(mk_raw(i as u64 + 1, h, l)).expect("valid bar");
        }
        assert_eq!(merger.history().len(), 3);
        assert_eq!(merger.retain_from(3), 2);
        assert_eq!(merger.history().first().map(|x| x.id), Some(3));
        assert_eq!(merger.len(), 2);
    }
}
