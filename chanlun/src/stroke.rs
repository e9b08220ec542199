//! 笔的构建。
//!
//! 状态机只保留一支未完成的笔；它在下一支反向笔成立时封存。
//! 封存时按最终的合并 K 线重建笔的区间，并评估端点与内部分型的级别。

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::bar::{Fractal, MergedBar};
use crate::config::PenPolicy;
use crate::constant::{Direction, FractalType};
use crate::error::ChanError;
use crate::fractal::fractals_between;
use crate::id_generator::IdGenerator;
use crate::level::{Level, grade_fractal, grade_stroke};
use crate::utils::pct_change;

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub id: u64,
    pub symbol: String,
    pub direction: Direction,
    pub start: Fractal,
    pub end: Fractal,
    pub high_price: f64,
    pub low_price: f64,
    /// 起点分型左侧 K 线到终点分型右侧 K 线的合并 K 线数，含两端。
    pub span: usize,
    pub change_ratio: f64,
    /// 与 `span` 同一区间的合并 K 线。
    pub bars: Vec<Arc<MergedBar>>,
    /// 两个端点之间的分型，不含端点。
    pub fractals: Vec<Fractal>,
    pub confirmed: bool,
    /// 仅因自适应放宽才成立。
    pub triggered: bool,
    pub level: Level,
}

impl Stroke {
    pub fn distance(&self) -> f64 {
        self.high_price - self.low_price
    }

    pub fn overlap(&self, other: &Stroke) -> bool {
        self.low_price.max(other.low_price) <= self.high_price.min(other.high_price)
    }

    /// 端点间的绝对价差。
    pub fn power(&self) -> f64 {
        (self.end.price - self.start.price).abs()
    }

    pub fn raw_bar_count(&self) -> usize {
        self.bars.iter().map(|x| x.elements.len()).sum()
    }

    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.start.datetime
    }

    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.end.datetime
    }

    pub fn is_up(&self) -> bool {
        self.direction == Direction::Up
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    NoStroke,
    /// 已有起点分型，尚无成立的笔。
    PendingFirstFractal,
    Extending(Direction),
    /// 该方向的笔刚刚封存。
    Confirmed(Direction),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrokeChange {
    Opened(Stroke),
    Extended(Stroke),
    Finalized { sealed: Arc<Stroke>, opened: Stroke },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeUpdate {
    pub change: Option<StrokeChange>,
    /// 本次被移出笔链的分型 id。
    pub superseded: Vec<u64>,
    /// 本次封存时评估过级别的分型。
    pub graded: Vec<(u64, Level)>,
}

#[derive(Debug, Clone)]
pub struct StrokeBuilder {
    policy: PenPolicy,
    sealed: VecDeque<Arc<Stroke>>,
    open: Option<Stroke>,
    /// 尚无笔时的起点分型。
    anchor: Option<Fractal>,
    /// 当前起点之后最极端的反向分型。
    candidate: Option<Fractal>,
    /// 自适应触发所在的合并 K 线 id。
    triggers: VecDeque<u64>,
    state: BuilderState,
    last_cbar_id: Option<u64>,
    finalized_total: usize,
    id_generator: IdGenerator,
}

impl StrokeBuilder {
    pub fn new(policy: PenPolicy) -> Self {
        Self {
            policy,
            sealed: VecDeque::new(),
            open: None,
            anchor: None,
            candidate: None,
            triggers: VecDeque::new(),
            state: BuilderState::NoStroke,
            last_cbar_id: None,
            finalized_total: 0,
            id_generator: IdGenerator::new(),
        }
    }

    pub fn policy(&self) -> PenPolicy {
        self.policy
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn finalized(&self) -> &VecDeque<Arc<Stroke>> {
        &self.sealed
    }

    pub fn open_stroke(&self) -> Option<&Stroke> {
        self.open.as_ref()
    }

    pub fn candidate(&self) -> Option<&Fractal> {
        self.candidate.as_ref()
    }

    /// 累计封存的笔数，不受保留上限影响。
    pub fn finalized_total(&self) -> usize {
        self.finalized_total
    }

    pub fn note_trigger(&mut self, cbar_id: u64) {
        if !self.policy.uses_trigger() {
            return;
        }
        if self.triggers.back() != Some(&cbar_id) {
            self.triggers.push_back(cbar_id);
        }
    }

    /// 分型右侧 K 线封存后，同步各处持有的副本。
    pub fn refresh_fractal(&mut self, fractal: &Fractal) {
        for slot in [self.anchor.as_mut(), self.candidate.as_mut()]
            .into_iter()
            .flatten()
        {
            if slot.id == fractal.id {
                slot.right = Arc::clone(&fractal.right);
            }
        }
        if let Some(open) = self.open.as_mut() {
            for slot in [&mut open.start, &mut open.end] {
                if slot.id == fractal.id {
                    slot.right = Arc::clone(&fractal.right);
                }
            }
            if open.end.id == fractal.id {
                if let Some(last) = open.bars.last_mut() {
                    if last.id == fractal.right.id {
                        *last = Arc::clone(&fractal.right);
                    }
                }
            }
        }
    }

    fn pending_start(&self) -> Option<&Fractal> {
        self.open.as_ref().map(|x| &x.end).or(self.anchor.as_ref())
    }

    /// 输入下一个分型，分型须严格晚于上一个。
    ///
    /// `bars` 为已封存的合并 K 线，`fractals` 为检测器的分型历史，均按 id 排序。
    pub fn on_fractal(
        &mut self,
        fractal: &Fractal,
        bars: &[Arc<MergedBar>],
        fractals: &[Fractal],
    ) -> Result<StrokeUpdate, ChanError> {
        if let Some(last) = self.last_cbar_id {
            if fractal.cbar_id() <= last {
                return Err(ChanError::OutOfOrder(format!(
                    "fractal at merged bar {} after merged bar {}",
                    fractal.cbar_id(),
                    last
                )));
            }
        }
        Ok(self.advance(fractal, bars, fractals))
    }

    /// 调用方保证分型按中间 K 线递增。
    pub(crate) fn advance(
        &mut self,
        fractal: &Fractal,
        bars: &[Arc<MergedBar>],
        fractals: &[Fractal],
    ) -> StrokeUpdate {
        self.last_cbar_id = Some(fractal.cbar_id());

        let mut update = StrokeUpdate::default();
        let Some(start) = self.pending_start().cloned() else {
            self.anchor = Some(fractal.clone());
            self.state = BuilderState::PendingFirstFractal;
            return update;
        };
        while self.triggers.front().is_some_and(|x| *x < start.cbar_id()) {
            self.triggers.pop_front();
        }

        if fractal.fractal_type == start.fractal_type {
            if !fractal.is_more_extreme_than(&start) {
                update.superseded.push(fractal.id);
                return update;
            }
            update.superseded.push(start.id);
            self.candidate = None;
            match self.open.take() {
                Some(open) => {
                    let triggered = open.triggered;
                    let mut stroke = self.build(open.id, open.start, fractal.clone(), bars, fractals);
                    stroke.triggered = triggered && stroke.span < self.policy.min_span();
                    self.state = BuilderState::Extending(stroke.direction);
                    self.open = Some(stroke.clone());
                    update.change = Some(StrokeChange::Extended(stroke));
                }
                None => {
                    self.anchor = Some(fractal.clone());
                }
            }
            return update;
        }

        match &self.candidate {
            Some(candidate) if !fractal.is_at_least_as_extreme_as(candidate) => {
                update.superseded.push(fractal.id);
                return update;
            }
            Some(candidate) => update.superseded.push(candidate.id),
            None => {}
        }
        self.candidate = Some(fractal.clone());

        let Some(triggered) = self.qualifies(&start, fractal) else {
            return update;
        };
        self.candidate = None;
        let id = self.id_generator.get_id();
        let mut stroke = self.build(id, start, fractal.clone(), bars, fractals);
        stroke.triggered = triggered;

        match self.open.take() {
            Some(prev) => {
                let (sealed, graded) = self.seal(prev, &stroke, bars, fractals);
                stroke.start.level = sealed.end.level.clone();
                let sealed = Arc::new(sealed);
                self.sealed.push_back(Arc::clone(&sealed));
                self.finalized_total += 1;
                self.state = BuilderState::Confirmed(sealed.direction);
                self.open = Some(stroke.clone());
                update.graded = graded;
                update.change = Some(StrokeChange::Finalized {
                    sealed,
                    opened: stroke,
                });
            }
            None => {
                self.anchor = None;
                self.state = BuilderState::Extending(stroke.direction);
                self.open = Some(stroke.clone());
                update.change = Some(StrokeChange::Opened(stroke));
            }
        }
        update
    }

    /// 成立时返回 `Some(triggered)`。
    fn qualifies(&self, start: &Fractal, end: &Fractal) -> Option<bool> {
        let ordered = match (start.fractal_type, end.fractal_type) {
            (FractalType::Bottom, FractalType::Top) => end.price > start.price,
            (FractalType::Top, FractalType::Bottom) => end.price < start.price,
            _ => false,
        };
        if !ordered || envelopes_nested(start, end) {
            return None;
        }
        let span = span_between(start, end);
        if span >= self.policy.min_span() {
            return Some(false);
        }
        let relaxed = self.policy.uses_trigger()
            && span >= self.policy.relaxed_min_span()
            && self
                .triggers
                .iter()
                .any(|x| *x >= start.cbar_id() && *x <= end.right.id);
        relaxed.then_some(true)
    }

    /// 按最终 K 线重建 `prev`，评估其分型与笔的级别。`next` 为紧随其后的新笔。
    fn seal(
        &self,
        prev: Stroke,
        next: &Stroke,
        bars: &[Arc<MergedBar>],
        fractals: &[Fractal],
    ) -> (Stroke, Vec<(u64, Level)>) {
        let mut sealed = self.build(prev.id, prev.start, prev.end, bars, fractals);
        sealed.triggered = prev.triggered;
        sealed.confirmed = true;
        let before = self
            .sealed
            .back()
            .filter(|x| x.end.id == sealed.start.id)
            .map(|x| x.as_ref());

        let mut graded = Vec::new();
        for i in 0..sealed.fractals.len() {
            let level = grade_fractal(
                &sealed.fractals[i],
                &[&sealed],
                fractals_after(fractals, &sealed.fractals[i]),
            );
            graded.push((sealed.fractals[i].id, level.clone()));
            sealed.fractals[i].level = level;
        }

        let start_level = {
            let mut related: Vec<&Stroke> = before.into_iter().collect();
            related.push(&sealed);
            grade_fractal(&sealed.start, &related, fractals_after(fractals, &sealed.start))
        };
        let end_level = grade_fractal(
            &sealed.end,
            &[&sealed, next],
            fractals_after(fractals, &sealed.end),
        );
        graded.push((sealed.start.id, start_level.clone()));
        graded.push((sealed.end.id, end_level.clone()));
        sealed.start.level = start_level;
        sealed.end.level = end_level;
        sealed.level = grade_stroke(&sealed, before);

        (sealed, graded)
    }

    fn build(
        &self,
        id: u64,
        start: Fractal,
        end: Fractal,
        bars: &[Arc<MergedBar>],
        fractals: &[Fractal],
    ) -> Stroke {
        let lo = bars.partition_point(|x| x.id < start.left.id);
        let hi = bars.partition_point(|x| x.id <= end.right.id);
        let mut rows = bars[lo..hi.max(lo)].to_vec();
        // 终点分型的右侧 K 线可能尚未封存
        if rows.last().is_none_or(|x| x.id < end.right.id) {
            rows.push(Arc::clone(&end.right));
        }
        let high_price = rows
            .iter()
            .map(|x| x.high_price)
            .fold(start.high().max(end.high()), f64::max);
        let low_price = rows
            .iter()
            .map(|x| x.low_price)
            .fold(start.low().min(end.low()), f64::min);
        let direction = match start.fractal_type {
            FractalType::Bottom => Direction::Up,
            FractalType::Top => Direction::Down,
        };
        Stroke {
            id,
            symbol: start.symbol.clone(),
            direction,
            high_price,
            low_price,
            span: span_between(&start, &end),
            change_ratio: pct_change(start.price, end.price),
            fractals: fractals_between(fractals, start.cbar_id(), end.cbar_id()).to_vec(),
            bars: rows,
            start,
            end,
            confirmed: false,
            triggered: false,
            level: Level::default(),
        }
    }

    /// 丢弃超出 `max_retained` 的最早已封存笔。
    pub fn trim_to(&mut self, max_retained: usize) -> Vec<Arc<Stroke>> {
        let excess = self.sealed.len().saturating_sub(max_retained);
        self.sealed.drain(..excess).collect()
    }
}

fn span_between(start: &Fractal, end: &Fractal) -> usize {
    end.right.id.saturating_sub(start.left.id) as usize + 1
}

fn fractals_after<'a>(rows: &'a [Fractal], fx: &Fractal) -> &'a [Fractal] {
    let cut = rows.partition_point(|x| x.cbar_id() <= fx.cbar_id());
    &rows[cut..]
}

/// 一个分型三根 K 线的区间严格包含另一个。
fn envelopes_nested(a: &Fractal, b: &Fractal) -> bool {
    let (a_low, a_high) = a.envelope();
    let (b_low, b_high) = b.envelope();
    (a_high > b_high && a_low < b_low) || (a_high < b_high && a_low > b_low)
}
