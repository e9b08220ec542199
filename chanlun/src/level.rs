//! 分型与笔的级别评估。
//!
//! 默认一级；满足条件时升为二级或三级，并记录各自的原因。
//! 评估发生在笔完成时，结果随笔一起封存，之后不再改写。

use std::fmt;

use crate::bar::Fractal;
use crate::constant::{Const, Direction, FractalType};
use crate::stroke::Stroke;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelReason {
    /// 被反向笔突破。
    BrokenByStroke {
        stroke_id: u64,
        direction: Direction,
        power: f64,
    },
    /// 同时被多笔破坏。
    BrokenByStrokes(usize),
    /// 随后第一个反向分型偏离超过阈值。
    SharpReversal {
        fractal_id: u64,
        fractal_type: FractalType,
    },
    StartFractal(u8),
    EndFractal(u8),
    /// 与前一笔的力度比。
    PowerExpansion(f64),
    /// 内部二级及以上分型的数量。
    InteriorFractals(usize),
}

impl fmt::Display for LevelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrokenByStroke {
                direction, power, ..
            } => write!(f, "被{}笔破坏,力度{:.2}", direction.as_str(), power),
            Self::BrokenByStrokes(count) => write!(f, "被{count}笔连续破坏"),
            Self::SharpReversal { fractal_type, .. } => {
                write!(f, "后续{}分型大幅破坏", fractal_type.as_str())
            }
            Self::StartFractal(level) => write!(f, "起始分型为{}分型", level_name(*level)),
            Self::EndFractal(level) => write!(f, "结束分型为{}分型", level_name(*level)),
            Self::PowerExpansion(ratio) => write!(f, "力度比前笔强{ratio:.2}倍"),
            Self::InteriorFractals(count) => write!(f, "内部有{count}个高级分型"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub level: u8,
    pub level_2_reasons: Vec<LevelReason>,
    pub level_3_reasons: Vec<LevelReason>,
}

impl Default for Level {
    fn default() -> Self {
        Self {
            level: 1,
            level_2_reasons: Vec::new(),
            level_3_reasons: Vec::new(),
        }
    }
}

impl Level {
    fn from_reasons(level_2_reasons: Vec<LevelReason>, level_3_reasons: Vec<LevelReason>) -> Self {
        let level = if !level_3_reasons.is_empty() {
            3
        } else if !level_2_reasons.is_empty() {
            2
        } else {
            1
        };
        Self {
            level,
            level_2_reasons,
            level_3_reasons,
        }
    }

    pub fn name(&self) -> &'static str {
        level_name(self.level)
    }

    pub fn level_2_text(&self) -> String {
        join_reasons(&self.level_2_reasons)
    }

    pub fn level_3_text(&self) -> String {
        join_reasons(&self.level_3_reasons)
    }
}

pub fn level_name(level: u8) -> &'static str {
    match level {
        0 | 1 => "一级",
        2 => "二级",
        _ => "三级",
    }
}

fn join_reasons(reasons: &[LevelReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

/// `related` 为以 `fx` 为端点或内部包含 `fx` 的笔，`later` 为 `fx` 之后的分型。
pub fn grade_fractal(fx: &Fractal, related: &[&Stroke], later: &[Fractal]) -> Level {
    let mut level_2 = Vec::new();
    let mut level_3 = Vec::new();

    let strong: Vec<&&Stroke> = related.iter().filter(|x| x.power() > 0.0).collect();
    for stroke in &strong {
        let broken = match fx.fractal_type {
            FractalType::Top => stroke.direction == Direction::Down && stroke.end.price < fx.price,
            FractalType::Bottom => stroke.direction == Direction::Up && stroke.end.price > fx.price,
        };
        if broken {
            level_2.push(LevelReason::BrokenByStroke {
                stroke_id: stroke.id,
                direction: stroke.direction,
                power: stroke.power(),
            });
        }
    }
    if strong.len() >= 2 {
        level_3.push(LevelReason::BrokenByStrokes(strong.len()));
    }

    let reversal = later
        .iter()
        .take(Const::LEVEL_LOOKAHEAD_FRACTALS)
        .find(|x| x.fractal_type != fx.fractal_type);
    if let Some(first) = reversal {
        let sharp = match fx.fractal_type {
            FractalType::Top => first.price < fx.price * (1.0 - Const::LEVEL_REVERSAL_RATIO),
            FractalType::Bottom => first.price > fx.price * (1.0 + Const::LEVEL_REVERSAL_RATIO),
        };
        if sharp {
            level_2.push(LevelReason::SharpReversal {
                fractal_id: first.id,
                fractal_type: first.fractal_type,
            });
        }
    }

    Level::from_reasons(level_2, level_3)
}

/// 端点与内部分型需已评估。
pub fn grade_stroke(stroke: &Stroke, prev: Option<&Stroke>) -> Level {
    let mut level_2 = Vec::new();
    let mut level_3 = Vec::new();

    let start = stroke.start.level.level;
    let end = stroke.end.level.level;
    if start >= 2 {
        level_2.push(LevelReason::StartFractal(start));
    }
    if end >= 2 {
        level_2.push(LevelReason::EndFractal(end));
    }
    if start >= 3 {
        level_3.push(LevelReason::StartFractal(start));
    }
    if end >= 3 {
        level_3.push(LevelReason::EndFractal(end));
    }

    if let Some(prev) = prev {
        if stroke.power() > 0.0 && prev.power() > 0.0 {
            let ratio = stroke.power() / prev.power();
            if ratio > Const::LEVEL_3_POWER_RATIO {
                level_3.push(LevelReason::PowerExpansion(ratio));
            } else if ratio > Const::LEVEL_2_POWER_RATIO {
                level_2.push(LevelReason::PowerExpansion(ratio));
            }
        }
    }

    if stroke.fractals.len() > Const::LEVEL_INTERIOR_FRACTALS {
        let high = stroke.fractals.iter().filter(|x| x.level.level >= 2).count();
        if high > 0 {
            level_2.push(LevelReason::InteriorFractals(high));
        }
    }

    Level::from_reasons(level_2, level_3)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::bar::{MergedBar, RawBar};
    use crate::constant::Freq;

    fn merged(id: u64, high: f64, low: f64) -> Arc<MergedBar> {
        Arc::new(MergedBar::from_raw(
            id,
            RawBar {
                symbol: "T".to_string(),
                id,
                datetime: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::days(id as i64),
                freq: Freq::D,
                open_price: low,
                high_price: high,
                low_price: low,
                close_price: high,
                volume: 1.0,
                amount: 1.0,
            },
        ))
    }

    fn top(id: u64, price: f64) -> Fractal {
        Fractal::new(
            id,
            merged(id * 10, price - 1.0, price - 3.0),
            merged(id * 10 + 1, price, price - 2.0),
            merged(id * 10 + 2, price - 1.0, price - 3.0),
        )
        .expect("top")
    }

    fn bottom(id: u64, price: f64) -> Fractal {
        Fractal::new(
            id,
            merged(id * 10, price + 3.0, price + 1.0),
            merged(id * 10 + 1, price + 2.0, price),
            merged(id * 10 + 2, price + 3.0, price + 1.0),
        )
        .expect("bottom")
    }

    fn stroke(id: u64, start: Fractal, end: Fractal) -> Stroke {
        let direction = if start.fractal_type == FractalType::Bottom {
            Direction::Up
        } else {
            Direction::Down
        };
        Stroke {
            id,
            symbol: "T".to_string(),
            direction,
            high_price: start.price.max(end.price),
            low_price: start.price.min(end.price),
            span: 5,
            change_ratio: 0.0,
            bars: Vec::new(),
            fractals: Vec::new(),
            confirmed: true,
            triggered: false,
            level: Level::default(),
            start,
            end,
        }
    }

    #[test]
    fn fractal_shared_by_two_strokes_is_level_three() {
        let peak = top(2, 110.0);
        let up = stroke(1, bottom(1, 100.0), peak.clone());
        let down = stroke(2, peak.clone(), bottom(3, 104.0));

        let level = grade_fractal(&peak, &[&up, &down], &[]);
        assert_eq!(level.level, 3);
        assert_eq!(level.level_3_reasons, vec![LevelReason::BrokenByStrokes(2)]);
        assert_eq!(level.level_2_reasons.len(), 1);
        assert_eq!(level.name(), "三级");
    }

    #[test]
    fn sharp_reversal_lifts_lone_fractal() {
        let peak = top(1, 100.0);
        let later = vec![top(2, 99.0), bottom(3, 90.0)];
        let level = grade_fractal(&peak, &[], &later);
        assert_eq!(level.level, 2);
        assert!(matches!(
            level.level_2_reasons.as_slice(),
            [LevelReason::SharpReversal { fractal_id: 3, .. }]
        ));
        assert_eq!(level.level_2_text(), "后续bottom分型大幅破坏");

        let mild = vec![bottom(3, 97.0)];
        assert_eq!(grade_fractal(&peak, &[], &mild).level, 1);
    }

    #[test]
    fn stroke_level_follows_terminals_and_power() {
        let mut start = bottom(1, 100.0);
        start.level = Level::from_reasons(vec![LevelReason::BrokenByStrokes(2)], Vec::new());
        let prev = stroke(1, top(0, 104.0), bottom(1, 100.0));
        let current = stroke(2, start, top(2, 106.0));

        let level = grade_stroke(&current, Some(&prev));
        assert_eq!(level.level, 2);
        // 力度比恰为 1.5，不计入
        assert_eq!(level.level_2_reasons, vec![LevelReason::StartFractal(2)]);

        let surge = stroke(3, bottom(1, 100.0), top(2, 109.0));
        let level = grade_stroke(&surge, Some(&prev));
        assert_eq!(level.level, 3);
        assert!(matches!(level.level_3_reasons.as_slice(), [LevelReason::PowerExpansion(r)] if *r > 2.0));
    }
}
