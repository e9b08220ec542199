use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::analyzer::{Analyzer, StructuralDelta, StructureSnapshot};
use crate::bar::RawBar;
use crate::config::AnalyzerConfig;
use crate::constant::{EventType, Freq};
use crate::error::ChanError;
use crate::events::{Event, EventBus, Subject, Subscriber, SubscriptionId};
use crate::pivot::PivotTransition;
use crate::stroke::{Stroke, StrokeChange};

/// 读取结构并归纳为具名信号。
pub trait SignalPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, analyzer: &Analyzer) -> BTreeMap<String, String>;
}

/// 分析器及其协作者：信号插件与事件订阅。
pub struct AnalysisEngine {
    analyzer: Analyzer,
    plugins: Vec<Box<dyn SignalPlugin>>,
    events: EventBus,
    signals: BTreeMap<String, String>,
}

impl AnalysisEngine {
    pub fn new(config: AnalyzerConfig) -> Result<Self, ChanError> {
        Ok(Self::with_analyzer(Analyzer::new(config)?))
    }

    pub fn with_analyzer(analyzer: Analyzer) -> Self {
        Self {
            analyzer,
            plugins: Vec::new(),
            events: EventBus::new(),
            signals: BTreeMap::new(),
        }
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn SignalPlugin>) {
        if self.plugins.iter().any(|x| x.name() == plugin.name()) {
            return;
        }
        self.plugins.push(plugin);
    }

    pub fn subscribe(
        &mut self,
        filter: Option<EventType>,
        subscriber: Subscriber,
    ) -> SubscriptionId {
        self.events.subscribe(filter, subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn append(&mut self, bar: RawBar) -> Result<StructuralDelta, ChanError> {
        let freq = bar.freq;
        let bar_id = bar.id;
        let delta = match self.analyzer.apply(bar) {
            Ok(delta) => delta,
            Err(err) => {
                self.events.publish(&Event {
                    freq,
                    kind: EventType::BarRejected,
                    bar_id,
                    subject: Subject::Rejected(err.to_string()),
                });
                return Err(err);
            }
        };
        self.publish(freq, &delta);

        self.signals.clear();
        for plugin in &self.plugins {
            self.signals.extend(plugin.evaluate(&self.analyzer));
        }
        Ok(delta)
    }

    pub fn append_batch(
        &mut self,
        bars: impl IntoIterator<Item = RawBar>,
    ) -> Result<usize, ChanError> {
        let mut applied = 0;
        for bar in bars {
            self.append(bar)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn publish(&self, freq: Freq, delta: &StructuralDelta) {
        let emit = |kind: EventType, subject: Subject| {
            self.events.publish(&Event {
                freq,
                kind,
                bar_id: delta.bar_id,
                subject,
            });
        };
        let stroke = |x: &Stroke| Subject::Stroke {
            id: x.id,
            direction: x.direction,
            level: x.level.level,
        };

        emit(EventType::BarMerged, Subject::MergedBar(delta.merged_bar.id));
        if let Some(fractal) = &delta.fractal {
            emit(
                EventType::FractalDetected,
                Subject::Fractal {
                    id: fractal.id,
                    fractal_type: fractal.fractal_type,
                },
            );
        }
        match &delta.stroke {
            Some(StrokeChange::Opened(x)) => emit(EventType::StrokeOpened, stroke(x)),
            Some(StrokeChange::Extended(x)) => emit(EventType::StrokeExtended, stroke(x)),
            Some(StrokeChange::Finalized { sealed, opened }) => {
                emit(EventType::StrokeFinalized, stroke(sealed.as_ref()));
                emit(EventType::StrokeOpened, stroke(opened));
            }
            None => {}
        }
        for transition in &delta.pivots {
            let (kind, id) = match transition {
                PivotTransition::Opened(p) => (EventType::PivotOpened, p.id),
                PivotTransition::Extended(p) => (EventType::PivotExtended, p.id),
                PivotTransition::Sealed(p) => (EventType::PivotSealed, p.id),
                PivotTransition::Discarded(p) => (EventType::PivotDiscarded, p.id),
            };
            emit(kind, Subject::Pivot(id));
        }
    }

    /// 最近一根被接受的 bar 产生的信号，汇总各插件。
    pub fn signals(&self) -> &BTreeMap<String, String> {
        &self.signals
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn snapshot(&self) -> StructureSnapshot {
        self.analyzer.snapshot()
    }

    pub fn into_analyzer(self) -> Analyzer {
        self.analyzer
    }
}

/// 单写多读地共享一个分析器。
#[derive(Debug, Clone)]
pub struct SharedAnalyzer {
    inner: Arc<RwLock<Analyzer>>,
}

impl SharedAnalyzer {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            inner: Arc::new(RwLock::new(analyzer)),
        }
    }

    pub fn apply(&self, bar: RawBar) -> Result<StructuralDelta, ChanError> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.apply(bar)
    }

    pub fn snapshot(&self) -> StructureSnapshot {
        self.read(Analyzer::snapshot)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Analyzer) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}
