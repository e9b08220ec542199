//! 中枢检测。

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constant::Const;
use crate::id_generator::IdGenerator;
use crate::stroke::Stroke;

/// 至少三支连续已封存笔的重叠区间。
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub id: u64,
    pub symbol: String,
    /// 重叠区间上沿。
    pub zg: f64,
    /// 重叠区间下沿。
    pub zd: f64,
    pub gg: f64,
    pub dd: f64,
    pub strokes: Vec<Arc<Stroke>>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub valid: bool,
    pub sealed: bool,
}

impl Pivot {
    fn from_window(id: u64, window: &[Arc<Stroke>]) -> Option<Self> {
        let first = window.first()?;
        let last = window.last()?;
        let zg = window.iter().map(|x| x.high_price).fold(f64::INFINITY, f64::min);
        let zd = window
            .iter()
            .map(|x| x.low_price)
            .fold(f64::NEG_INFINITY, f64::max);
        if zg <= zd {
            return None;
        }
        Some(Self {
            id,
            symbol: first.symbol.clone(),
            zg,
            zd,
            gg: window.iter().map(|x| x.high_price).fold(f64::NEG_INFINITY, f64::max),
            dd: window.iter().map(|x| x.low_price).fold(f64::INFINITY, f64::min),
            strokes: window.to_vec(),
            start_datetime: first.start_datetime(),
            end_datetime: last.end_datetime(),
            valid: true,
            sealed: false,
        })
    }

    pub fn center(&self) -> f64 {
        (self.zg + self.zd) / 2.0
    }

    pub fn height(&self) -> f64 {
        self.zg - self.zd
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    pub fn first_stroke_id(&self) -> Option<u64> {
        self.strokes.first().map(|x| x.id)
    }

    pub fn last_stroke_id(&self) -> Option<u64> {
        self.strokes.last().map(|x| x.id)
    }

    /// `stroke` 仍与区间重叠时返回收窄后的 `(zg, zd)`。
    fn narrowed_by(&self, stroke: &Stroke) -> Option<(f64, f64)> {
        let zg = self.zg.min(stroke.high_price);
        let zd = self.zd.max(stroke.low_price);
        (zg > zd).then_some((zg, zd))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PivotTransition {
    Opened(Pivot),
    Extended(Pivot),
    Sealed(Arc<Pivot>),
    /// 不足三笔即结束，不保留。
    Discarded(Pivot),
}

#[derive(Debug, Clone)]
pub struct PivotDetector {
    max_strokes: usize,
    window: Vec<Arc<Stroke>>,
    open: Option<Pivot>,
    sealed: Vec<Arc<Pivot>>,
    id_generator: IdGenerator,
}

impl PivotDetector {
    pub fn new(max_strokes: usize) -> Self {
        Self {
            max_strokes: max_strokes.max(Const::PIVOT_MIN_STROKES),
            window: Vec::new(),
            open: None,
            sealed: Vec::new(),
            id_generator: IdGenerator::new(),
        }
    }

    /// 处理一支新封存的笔。
    pub fn on_stroke(&mut self, stroke: Arc<Stroke>) -> Vec<PivotTransition> {
        let mut transitions = Vec::new();

        if let Some(mut pivot) = self.open.take() {
            match pivot.narrowed_by(&stroke) {
                Some((zg, zd)) => {
                    pivot.zg = zg;
                    pivot.zd = zd;
                    pivot.gg = pivot.gg.max(stroke.high_price);
                    pivot.dd = pivot.dd.min(stroke.low_price);
                    pivot.end_datetime = stroke.end_datetime();
                    pivot.strokes.push(stroke);
                    transitions.push(PivotTransition::Extended(pivot.clone()));
                    if pivot.strokes.len() >= self.max_strokes {
                        transitions.push(self.seal(pivot));
                    } else {
                        self.open = Some(pivot);
                    }
                }
                None => {
                    transitions.push(self.seal(pivot));
                    self.window.push(stroke);
                }
            }
            return transitions;
        }

        self.window.push(stroke);
        if self.window.len() > Const::PIVOT_MIN_STROKES {
            let excess = self.window.len() - Const::PIVOT_MIN_STROKES;
            self.window.drain(..excess);
        }
        if self.window.len() < Const::PIVOT_MIN_STROKES {
            return transitions;
        }
        let id = self.id_generator.peek();
        if let Some(pivot) = Pivot::from_window(id, &self.window) {
            self.id_generator.get_id();
            self.window.clear();
            transitions.push(PivotTransition::Opened(pivot.clone()));
            if pivot.strokes.len() >= self.max_strokes {
                transitions.push(self.seal(pivot));
            } else {
                self.open = Some(pivot);
            }
        }
        transitions
    }

    fn seal(&mut self, mut pivot: Pivot) -> PivotTransition {
        pivot.sealed = true;
        if pivot.strokes.len() < Const::PIVOT_MIN_STROKES || pivot.zg <= pivot.zd {
            pivot.valid = false;
            return PivotTransition::Discarded(pivot);
        }
        let pivot = Arc::new(pivot);
        self.sealed.push(Arc::clone(&pivot));
        PivotTransition::Sealed(pivot)
    }

    pub fn sealed(&self) -> &[Arc<Pivot>] {
        &self.sealed
    }

    pub fn open_pivot(&self) -> Option<&Pivot> {
        self.open.as_ref()
    }

    /// 释放在 `stroke_id` 之前结束的已封存中枢。
    pub fn release_before(&mut self, stroke_id: u64) -> usize {
        let cut = self
            .sealed
            .partition_point(|x| x.last_stroke_id().is_some_and(|id| id < stroke_id));
        self.sealed.drain(..cut);
        cut
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::bar::{Fractal, MergedBar, RawBar};
    use crate::constant::{Direction, FractalType, Freq};
    use crate::level::Level;

    fn merged(id: u64, high: f64, low: f64) -> Arc<MergedBar> {
        Arc::new(MergedBar::from_raw(
            id,
            RawBar {
                symbol: "T".to_string(),
                id,
                datetime: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(id as i64),
                freq: Freq::F60,
                open_price: low,
                high_price: high,
                low_price: low,
                close_price: high,
                volume: 1.0,
                amount: 1.0,
            },
        ))
    }

    fn terminal(id: u64, fractal_type: FractalType, price: f64) -> Fractal {
        let bar = merged(id, price, price);
        Fractal {
            id,
            symbol: "T".to_string(),
            fractal_type,
            price,
            datetime: bar.datetime,
            left: Arc::clone(&bar),
            middle: Arc::clone(&bar),
            right: bar,
            superseded: false,
            level: Level::default(),
        }
    }

    fn stroke(id: u64, low: f64, high: f64) -> Arc<Stroke> {
        let up = id % 2 == 1;
        let (start, end) = if up {
            (terminal(id * 10, FractalType::Bottom, low), terminal(id * 10 + 5, FractalType::Top, high))
        } else {
            (terminal(id * 10, FractalType::Top, high), terminal(id * 10 + 5, FractalType::Bottom, low))
        };
        Arc::new(Stroke {
            id,
            symbol: "T".to_string(),
            direction: if up { Direction::Up } else { Direction::Down },
            start,
            end,
            high_price: high,
            low_price: low,
            span: 5,
            change_ratio: 0.0,
            bars: Vec::new(),
            fractals: Vec::new(),
            confirmed: true,
            triggered: false,
            level: Level::default(),
        })
    }

    #[test]
    fn three_overlapping_strokes_open_a_pivot() {
        let mut detector = PivotDetector::new(9);
        assert!(detector.on_stroke(stroke(1, 10.0, 20.0)).is_empty());
        assert!(detector.on_stroke(stroke(2, 15.0, 25.0)).is_empty());
        let transitions = detector.on_stroke(stroke(3, 12.0, 22.0));

        let [PivotTransition::Opened(pivot)] = transitions.as_slice() else {
            panic!("expected a single opened pivot, got {transitions:?}");
        };
        assert_eq!(pivot.zg, 20.0);
        assert_eq!(pivot.zd, 15.0);
        assert_eq!(pivot.gg, 25.0);
        assert_eq!(pivot.dd, 10.0);
        assert_eq!(pivot.center(), 17.5);
        assert!(pivot.valid);
    }

    #[test]
    fn breaking_stroke_seals_and_seeds_next_window() {
        let mut detector = PivotDetector::new(9);
        detector.on_stroke(stroke(1, 10.0, 20.0));
        detector.on_stroke(stroke(2, 15.0, 25.0));
        detector.on_stroke(stroke(3, 12.0, 22.0));
        let extended = detector.on_stroke(stroke(4, 16.0, 30.0));
        assert!(matches!(extended.as_slice(), [PivotTransition::Extended(p)] if p.zd == 16.0));

        let transitions = detector.on_stroke(stroke(5, 21.0, 40.0));
        let [PivotTransition::Sealed(pivot)] = transitions.as_slice() else {
            panic!("expected a sealed pivot, got {transitions:?}");
        };
        assert_eq!(pivot.stroke_count(), 4);
        assert!(pivot.sealed);
        assert!(detector.open_pivot().is_none());
        assert_eq!(detector.sealed().len(), 1);
    }

    #[test]
    fn disjoint_strokes_never_open() {
        let mut detector = PivotDetector::new(9);
        for (i, (low, high)) in [(0.0, 10.0), (10.0, 20.0), (20.0, 30.0), (30.0, 40.0)]
            .into_iter()
            .enumerate()
        {
            assert!(detector.on_stroke(stroke(i as u64 + 1, low, high)).is_empty());
        }
        assert!(detector.open_pivot().is_none());
    }

    #[test]
    fn length_cap_seals_pivot() {
        let mut detector = PivotDetector::new(4);
        for i in 1..=3 {
            detector.on_stroke(stroke(i, 10.0, 20.0));
        }
        let transitions = detector.on_stroke(stroke(4, 11.0, 19.0));
        assert!(matches!(
            transitions.as_slice(),
            [PivotTransition::Extended(_), PivotTransition::Sealed(p)] if p.stroke_count() == 4
        ));
    }
}
