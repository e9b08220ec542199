use serde::Deserialize;

use crate::constant::{Const, MarketProfile, PenMode, ThresholdProfile};
use crate::error::ChanError;

/// 分析器配置，创建后不再改变。
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub pen_mode: PenMode,
    pub market_profile: MarketProfile,
    pub threshold_profile: ThresholdProfile,
    /// 设置后覆盖市场档案中的成交量倍数。
    pub adaptive_volume_ratio: Option<f64>,
    /// 设置后覆盖市场档案中的 ATR 倍数。
    pub adaptive_atr_ratio: Option<f64>,
    pub atr_period: usize,
    pub volume_period: usize,
    pub max_retained_strokes: usize,
    pub max_pivot_strokes: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzerConfigPatch {
    pub pen_mode: Option<String>,
    pub market_profile: Option<String>,
    pub threshold_profile: Option<String>,
    pub adaptive_volume_ratio: Option<f64>,
    pub adaptive_atr_ratio: Option<f64>,
    pub atr_period: Option<usize>,
    pub volume_period: Option<usize>,
    pub max_retained_strokes: Option<usize>,
    pub max_pivot_strokes: Option<usize>,
}

/// 按市场档案解析后的触发阈值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveThresholds {
    pub volume_ratio: f64,
    pub atr_ratio: f64,
    pub atr_period: usize,
    pub volume_period: usize,
}

/// 由 `pen_mode` 一次性确定的笔长度规则。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenPolicy {
    Standard { min_span: usize },
    Flexible { min_span: usize },
    Adaptive { min_span: usize, relaxed_min_span: usize },
}

impl PenPolicy {
    pub fn from_mode(mode: PenMode) -> Self {
        match mode {
            PenMode::Standard => Self::Standard {
                min_span: Const::STANDARD_MIN_SPAN,
            },
            PenMode::Flexible => Self::Flexible {
                min_span: Const::FLEXIBLE_MIN_SPAN,
            },
            PenMode::Adaptive => Self::Adaptive {
                min_span: Const::STANDARD_MIN_SPAN,
                relaxed_min_span: Const::FLEXIBLE_MIN_SPAN,
            },
        }
    }

    pub fn min_span(self) -> usize {
        match self {
            Self::Standard { min_span }
            | Self::Flexible { min_span }
            | Self::Adaptive { min_span, .. } => min_span,
        }
    }

    /// 笔内出现自适应触发时的最小跨度。
    pub fn relaxed_min_span(self) -> usize {
        match self {
            Self::Adaptive {
                relaxed_min_span, ..
            } => relaxed_min_span,
            other => other.min_span(),
        }
    }

    pub fn uses_trigger(self) -> bool {
        matches!(self, Self::Adaptive { .. })
    }

    pub fn mode(self) -> PenMode {
        match self {
            Self::Standard { .. } => PenMode::Standard,
            Self::Flexible { .. } => PenMode::Flexible,
            Self::Adaptive { .. } => PenMode::Adaptive,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            pen_mode: PenMode::Standard,
            market_profile: MarketProfile::Equity,
            threshold_profile: ThresholdProfile::Moderate,
            adaptive_volume_ratio: None,
            adaptive_atr_ratio: None,
            atr_period: Const::DEFAULT_ATR_PERIOD,
            volume_period: Const::DEFAULT_VOLUME_PERIOD,
            max_retained_strokes: Const::DEFAULT_MAX_RETAINED_STROKES,
            max_pivot_strokes: Const::DEFAULT_MAX_PIVOT_STROKES,
        }
    }
}

impl AnalyzerConfig {
    pub fn with_pen_mode(mut self, pen_mode: PenMode) -> Self {
        self.pen_mode = pen_mode;
        self
    }

    pub fn validate(&self) -> Result<(), ChanError> {
        for (name, value) in [
            ("adaptive_volume_ratio", self.adaptive_volume_ratio),
            ("adaptive_atr_ratio", self.adaptive_atr_ratio),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(ChanError::ConfigInvalid(format!(
                        "{name} must be positive, got {v}"
                    )));
                }
            }
        }
        if self.atr_period == 0 || self.volume_period == 0 {
            return Err(ChanError::ConfigInvalid(
                "atr_period and volume_period must be > 0".to_string(),
            ));
        }
        if self.max_retained_strokes == 0 {
            return Err(ChanError::ConfigInvalid(
                "max_retained_strokes must be > 0".to_string(),
            ));
        }
        if self.max_pivot_strokes < Const::PIVOT_MIN_STROKES {
            return Err(ChanError::ConfigInvalid(format!(
                "max_pivot_strokes must be >= {}, got {}",
                Const::PIVOT_MIN_STROKES,
                self.max_pivot_strokes
            )));
        }
        Ok(())
    }

    pub fn pen_policy(&self) -> PenPolicy {
        PenPolicy::from_mode(self.pen_mode)
    }

    pub fn resolve_thresholds(&self) -> AdaptiveThresholds {
        let (volume_ratio, atr_ratio) = self.market_profile.base_ratios();
        let scale = self.threshold_profile.scale();
        AdaptiveThresholds {
            volume_ratio: self.adaptive_volume_ratio.unwrap_or(volume_ratio * scale),
            atr_ratio: self.adaptive_atr_ratio.unwrap_or(atr_ratio * scale),
            atr_period: self.atr_period,
            volume_period: self.volume_period,
        }
    }

    pub fn apply_patch(mut self, patch: AnalyzerConfigPatch) -> Result<Self, ChanError> {
        if let Some(v) = patch.pen_mode {
            self.pen_mode = PenMode::parse(&v)?;
        }
        if let Some(v) = patch.market_profile {
            self.market_profile = MarketProfile::parse(&v)?;
        }
        if let Some(v) = patch.threshold_profile {
            self.threshold_profile = ThresholdProfile::parse(&v)?;
        }
        if let Some(v) = patch.adaptive_volume_ratio {
            self.adaptive_volume_ratio = Some(v);
        }
        if let Some(v) = patch.adaptive_atr_ratio {
            self.adaptive_atr_ratio = Some(v);
        }
        if let Some(v) = patch.atr_period {
            self.atr_period = v;
        }
        if let Some(v) = patch.volume_period {
            self.volume_period = v;
        }
        if let Some(v) = patch.max_retained_strokes {
            self.max_retained_strokes = v;
        }
        if let Some(v) = patch.max_pivot_strokes {
            self.max_pivot_strokes = v;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ChanError> {
        let patch: AnalyzerConfigPatch = serde_yaml::from_str(yaml)?;
        Self::default().apply_patch(patch)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ChanError> {
        let patch: AnalyzerConfigPatch = serde_json::from_str(json)?;
        Self::default().apply_patch(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_scaling_applies_to_both_ratios() {
        let config = AnalyzerConfig {
            market_profile: MarketProfile::Futures,
            threshold_profile: ThresholdProfile::Conservative,
            ..AnalyzerConfig::default()
        };
        let t = config.resolve_thresholds();
        assert!((t.volume_ratio - 2.25).abs() < 1e-12);
        assert!((t.atr_ratio - 1.75).abs() < 1e-12);
    }

    #[test]
    fn adaptive_policy_relaxes_to_flexible_span() {
        let policy = PenPolicy::from_mode(PenMode::Adaptive);
        assert_eq!(policy.min_span(), 5);
        assert_eq!(policy.relaxed_min_span(), 3);
        assert!(policy.uses_trigger());
        assert_eq!(PenPolicy::from_mode(PenMode::Standard).relaxed_min_span(), 5);
    }
}
