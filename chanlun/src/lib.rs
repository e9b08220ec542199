pub mod analyzer;
pub mod bar;
pub mod bar_merger;
pub mod config;
pub mod constant;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod fractal;
pub mod frame;
pub mod id_generator;
pub mod indicator;
pub mod level;
pub mod logging;
pub mod pivot;
pub mod receiver;
pub mod stroke;
pub mod trigger;
pub mod utils;

pub use analyzer::{Analyzer, StructuralDelta, StructureSnapshot};
pub use bar::{Fractal, MergedBar, RawBar};
pub use bar_merger::{BarMerger, MergeKind, MergeOutcome};
pub use config::{AdaptiveThresholds, AnalyzerConfig, AnalyzerConfigPatch, PenPolicy};
pub use constant::{
	Const, Direction, EventType, FractalType, Freq, MarketProfile, PenMode,
	ThresholdProfile,
};
pub use engine::{AnalysisEngine, SharedAnalyzer, SignalPlugin};
pub use error::ChanError;
pub use events::{Event, EventBus, Subject, Subscriber, SubscriptionId};
pub use fractal::FractalDetector;
pub use id_generator::IdGenerator;
pub use level::{Level, LevelReason, grade_fractal, grade_stroke, level_name};
pub use logging::{init_logging, init_logging_with_level};
pub use pivot::{Pivot, PivotDetector, PivotTransition};
pub use receiver::{DataReceiver, parse_datetime, read_bars, read_bars_csv};
pub use stroke::{BuilderState, Stroke, StrokeBuilder, StrokeChange, StrokeUpdate};
pub use trigger::AdaptiveTrigger;
