//! 单品种单周期结构分析入口。
//!
//! 串联 `RawBar -> MergedBar -> Fractal -> Stroke -> Pivot`。
//! 每一层都由不再改变的已封存前缀和至多一个未完成的尾部元素组成。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::bar::{Fractal, MergedBar, RawBar};
use crate::bar_merger::{BarMerger, MergeKind};
use crate::config::{AdaptiveThresholds, AnalyzerConfig};
use crate::constant::Freq;
use crate::error::ChanError;
use crate::fractal::FractalDetector;
use crate::pivot::{Pivot, PivotDetector, PivotTransition};
use crate::stroke::{BuilderState, Stroke, StrokeBuilder, StrokeChange};
use crate::trigger::AdaptiveTrigger;
use crate::utils::last_n;

/// 一根 bar 被接受后引起的全部变化。
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralDelta {
    pub bar_id: u64,
    pub merge_kind: MergeKind,
    /// 该 bar 所在合并 K 线的当前状态。
    pub merged_bar: MergedBar,
    pub fractal: Option<Fractal>,
    pub stroke: Option<StrokeChange>,
    pub superseded_fractals: Vec<u64>,
    pub pivots: Vec<PivotTransition>,
    pub triggered: bool,
    /// 因保留上限被释放的已封存笔数。
    pub released_strokes: usize,
}

impl StructuralDelta {
    pub fn finalized_stroke(&self) -> Option<&Arc<Stroke>> {
        match &self.stroke {
            Some(StrokeChange::Finalized { sealed, .. }) => Some(sealed),
            _ => None,
        }
    }
}

/// 某次 `apply` 之后的完整结构只读副本。
#[derive(Debug, Clone, PartialEq)]
pub struct StructureSnapshot {
    pub symbol: Option<String>,
    pub freq: Option<Freq>,
    pub merged_bars: Vec<Arc<MergedBar>>,
    pub fractals: Vec<Fractal>,
    /// 已封存的笔，随后是未完成的笔。
    pub strokes: Vec<Arc<Stroke>>,
    /// 已封存的中枢，随后是未完成的中枢。
    pub pivots: Vec<Arc<Pivot>>,
    pub state: BuilderState,
    pub finalized_total: usize,
}

#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    stream: Option<(String, Freq)>,
    last_bar: Option<(u64, DateTime<Utc>)>,
    merger: BarMerger,
    detector: FractalDetector,
    trigger: AdaptiveTrigger,
    builder: StrokeBuilder,
    pivots: PivotDetector,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self, ChanError> {
        config.validate()?;
        let policy = config.pen_policy();
        let trigger = AdaptiveTrigger::new(config.resolve_thresholds(), policy.uses_trigger());
        Ok(Self {
            stream: None,
            last_bar: None,
            merger: BarMerger::new(),
            detector: FractalDetector::new(),
            trigger,
            builder: StrokeBuilder::new(policy),
            pivots: PivotDetector::new(config.max_pivot_strokes),
            config,
        })
    }

    /// 逐根调用 [`Analyzer::apply`]，遇到第一根被拒绝的 bar 即停止。
    pub fn from_bars(
        config: AnalyzerConfig,
        bars: impl IntoIterator<Item = RawBar>,
    ) -> Result<Self, ChanError> {
        let mut analyzer = Self::new(config)?;
        analyzer.apply_batch(bars)?;
        Ok(analyzer)
    }

    pub fn apply_batch(
        &mut self,
        bars: impl IntoIterator<Item = RawBar>,
    ) -> Result<usize, ChanError> {
        let mut applied = 0;
        for bar in bars {
            self.apply(bar)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// 输入一根 bar；被拒绝的 bar 不改变任何状态。
    pub fn apply(&mut self, bar: RawBar) -> Result<StructuralDelta, ChanError> {
        if let Err(err) = self.check(&bar) {
            warn!(symbol = %bar.symbol, bar_id = bar.id, error = %err, "bar rejected");
            return Err(err);
        }
        let bar_id = bar.id;
        let outcome = self.merger.merge(bar.clone())?;
        if self.stream.is_none() {
            self.stream = Some((bar.symbol.clone(), bar.freq));
        }
        self.last_bar = Some((bar.id, bar.datetime));
        let triggered = self.trigger.update(&bar);
        if triggered {
            debug!(bar_id, cbar_id = outcome.bar.id, "adaptive trigger fired");
            self.builder.note_trigger(outcome.bar.id);
        }

        let mut delta = StructuralDelta {
            bar_id,
            merge_kind: outcome.kind,
            merged_bar: outcome.bar,
            fractal: None,
            stroke: None,
            superseded_fractals: Vec::new(),
            pivots: Vec::new(),
            triggered,
            released_strokes: 0,
        };
        if delta.merge_kind == MergeKind::Absorbed {
            return Ok(delta);
        }
        if let Some(sealed) = self.merger.history().last() {
            if let Some(refreshed) = self.detector.refresh_right(sealed) {
                self.builder.refresh_fractal(&refreshed);
            }
        }

        let Some(fractal) = self
            .detector
            .on_bar_appended(self.merger.history(), &delta.merged_bar)
        else {
            return Ok(delta);
        };
        trace!(
            fractal_id = fractal.id,
            cbar_id = fractal.cbar_id(),
            kind = ?fractal.fractal_type,
            price = fractal.price,
            "fractal detected"
        );

        // 检测器保证分型按中间 K 线递增，这里不会出现乱序
        let update = self
            .builder
            .advance(&fractal, self.merger.history(), self.detector.rows());
        for id in &update.superseded {
            self.detector.mark_superseded(*id);
        }
        for (id, level) in &update.graded {
            self.detector.set_level(*id, level.clone());
        }
        delta.fractal = Some(fractal);
        delta.superseded_fractals = update.superseded;

        if let Some(StrokeChange::Finalized { sealed, .. }) = &update.change {
            debug!(
                stroke_id = sealed.id,
                direction = sealed.direction.as_str(),
                span = sealed.span,
                level = sealed.level.level,
                triggered = sealed.triggered,
                "stroke finalized"
            );
            delta.pivots = self.pivots.on_stroke(Arc::clone(sealed));
            for transition in &delta.pivots {
                match transition {
                    PivotTransition::Opened(p) => {
                        debug!(pivot_id = p.id, zg = p.zg, zd = p.zd, "pivot opened")
                    }
                    PivotTransition::Sealed(p) => {
                        debug!(pivot_id = p.id, strokes = p.stroke_count(), "pivot sealed")
                    }
                    PivotTransition::Discarded(p) => {
                        debug!(pivot_id = p.id, strokes = p.stroke_count(), "pivot discarded")
                    }
                    PivotTransition::Extended(_) => {}
                }
            }
            delta.released_strokes = self.enforce_retention();
        }
        delta.stroke = update.change;
        Ok(delta)
    }

    fn check(&self, bar: &RawBar) -> Result<(), ChanError> {
        bar.validate()?;
        if let Some((symbol, freq)) = &self.stream {
            if *symbol != bar.symbol || *freq != bar.freq {
                return Err(ChanError::DataIntegrity(format!(
                    "bar {} belongs to {}@{}, stream is {}@{}",
                    bar.id,
                    bar.symbol,
                    bar.freq.as_str(),
                    symbol,
                    freq.as_str()
                )));
            }
        }
        if let Some((last_id, last_dt)) = self.last_bar {
            if bar.id <= last_id || bar.datetime <= last_dt {
                return Err(ChanError::OutOfOrder(format!(
                    "bar {} at {} does not follow bar {} at {}",
                    bar.id, bar.datetime, last_id, last_dt
                )));
            }
        }
        Ok(())
    }

    fn enforce_retention(&mut self) -> usize {
        let released = self.builder.trim_to(self.config.max_retained_strokes);
        if released.is_empty() {
            return 0;
        }
        if let Some(first) = self.builder.finalized().front() {
            let bars = self.merger.retain_from(first.start.left.id);
            let fractals = self.detector.retain_from(first.start.cbar_id());
            let pivots = self.pivots.release_before(first.id);
            debug!(
                strokes = released.len(),
                bars,
                fractals,
                pivots,
                "released history beyond retention"
            );
        }
        released.len()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn thresholds(&self) -> AdaptiveThresholds {
        self.trigger.thresholds()
    }

    pub fn symbol(&self) -> Option<&str> {
        self.stream.as_ref().map(|(symbol, _)| symbol.as_str())
    }

    pub fn freq(&self) -> Option<Freq> {
        self.stream.as_ref().map(|(_, freq)| *freq)
    }

    pub fn sealed_bars(&self) -> &[Arc<MergedBar>] {
        self.merger.history()
    }

    pub fn open_bar(&self) -> Option<&MergedBar> {
        self.merger.open_bar()
    }

    pub fn merged_bars(&self) -> Vec<Arc<MergedBar>> {
        self.merger.all_rows()
    }

    pub fn merged_len(&self) -> usize {
        self.merger.len()
    }

    pub fn fractals(&self) -> &[Fractal] {
        self.detector.rows()
    }

    pub fn finalized_strokes(&self) -> Vec<Arc<Stroke>> {
        self.builder.finalized().iter().cloned().collect()
    }

    pub fn open_stroke(&self) -> Option<&Stroke> {
        self.builder.open_stroke()
    }

    pub fn strokes(&self) -> Vec<Arc<Stroke>> {
        let mut rows = self.finalized_strokes();
        if let Some(open) = self.builder.open_stroke() {
            rows.push(Arc::new(open.clone()));
        }
        rows
    }

    /// 最近 `n` 笔，含未完成的笔。
    pub fn recent_strokes(&self, n: usize) -> Vec<Arc<Stroke>> {
        last_n(&self.strokes(), n)
    }

    pub fn last_stroke(&self) -> Option<Stroke> {
        self.builder
            .open_stroke()
            .cloned()
            .or_else(|| self.builder.finalized().back().map(|x| x.as_ref().clone()))
    }

    pub fn sealed_pivots(&self) -> &[Arc<Pivot>] {
        self.pivots.sealed()
    }

    pub fn open_pivot(&self) -> Option<&Pivot> {
        self.pivots.open_pivot()
    }

    pub fn builder_state(&self) -> BuilderState {
        self.builder.state()
    }

    pub fn finalized_total(&self) -> usize {
        self.builder.finalized_total()
    }

    pub fn trigger_fired_total(&self) -> usize {
        self.trigger.fired_total()
    }

    pub fn snapshot(&self) -> StructureSnapshot {
        let mut pivots = self.pivots.sealed().to_vec();
        if let Some(open) = self.pivots.open_pivot() {
            pivots.push(Arc::new(open.clone()));
        }
        StructureSnapshot {
            symbol: self.symbol().map(str::to_string),
            freq: self.freq(),
            merged_bars: self.merged_bars(),
            fractals: self.detector.rows().to_vec(),
            strokes: self.strokes(),
            pivots,
            state: self.builder.state(),
            finalized_total: self.builder.finalized_total(),
        }
    }
}
