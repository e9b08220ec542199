use crate::error::ChanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FractalType {
    Top,
    Bottom,
}

impl FractalType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// K 线周期。低周期合成高周期在上游完成，这里只做标记和校验。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freq {
    F1,
    F5,
    F15,
    F30,
    F60,
    D,
    W,
    M,
}

impl Freq {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::F1 => "1m",
            Self::F5 => "5m",
            Self::F15 => "15m",
            Self::F30 => "30m",
            Self::F60 => "60m",
            Self::D => "1d",
            Self::W => "1w",
            Self::M => "1M",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ChanError> {
        match value.trim() {
            "1M" | "month" | "monthly" => return Ok(Self::M),
            _ => {}
        }
        match value.trim().to_ascii_lowercase().as_str() {
            "1m" | "1min" => Ok(Self::F1),
            "5m" | "5min" => Ok(Self::F5),
            "15m" | "15min" => Ok(Self::F15),
            "30m" | "30min" => Ok(Self::F30),
            "60m" | "60min" | "1h" => Ok(Self::F60),
            "1d" | "d" | "daily" => Ok(Self::D),
            "1w" | "w" | "weekly" => Ok(Self::W),
            _ => Err(ChanError::InvalidFreq(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PenMode {
    Standard,
    Flexible,
    Adaptive,
}

impl PenMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Flexible => "flexible",
            Self::Adaptive => "adaptive",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ChanError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "flexible" => Ok(Self::Flexible),
            "adaptive" => Ok(Self::Adaptive),
            _ => Err(ChanError::ConfigInvalid(format!("unknown pen_mode: {value}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketProfile {
    Equity,
    Futures,
    Crypto,
}

impl MarketProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Futures => "futures",
            Self::Crypto => "crypto",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ChanError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "equity" | "stock" => Ok(Self::Equity),
            "futures" => Ok(Self::Futures),
            "crypto" => Ok(Self::Crypto),
            _ => Err(ChanError::ConfigInvalid(format!(
                "unknown market_profile: {value}"
            ))),
        }
    }

    /// 阈值缩放前的默认 `(volume_ratio, atr_ratio)`。
    pub fn base_ratios(self) -> (f64, f64) {
        match self {
            Self::Equity => (2.0, 1.5),
            Self::Futures => (1.8, 1.4),
            Self::Crypto => (2.5, 1.8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdProfile {
    Conservative,
    Moderate,
    Aggressive,
}

impl ThresholdProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ChanError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "moderate" => Ok(Self::Moderate),
            "aggressive" => Ok(Self::Aggressive),
            _ => Err(ChanError::ConfigInvalid(format!(
                "unknown threshold_profile: {value}"
            ))),
        }
    }

    pub fn scale(self) -> f64 {
        match self {
            Self::Conservative => 1.25,
            Self::Moderate => 1.0,
            Self::Aggressive => 0.8,
        }
    }
}

pub struct Const;

impl Const {
    /// 尚无两根合并 K 线之间的趋势时使用的包含方向。
    pub const INITIAL_MERGE_DIRECTION: Direction = Direction::Down;
    pub const STANDARD_MIN_SPAN: usize = 5;
    pub const FLEXIBLE_MIN_SPAN: usize = 3;
    pub const PIVOT_MIN_STROKES: usize = 3;
    pub const DEFAULT_MAX_PIVOT_STROKES: usize = 9;
    pub const DEFAULT_MAX_RETAINED_STROKES: usize = 50;
    pub const DEFAULT_ATR_PERIOD: usize = 14;
    pub const DEFAULT_VOLUME_PERIOD: usize = 20;
    /// 分型级别：考察其后的分型数量。
    pub const LEVEL_LOOKAHEAD_FRACTALS: usize = 5;
    /// 分型级别：反向分型偏离幅度。
    pub const LEVEL_REVERSAL_RATIO: f64 = 0.05;
    pub const LEVEL_2_POWER_RATIO: f64 = 1.5;
    pub const LEVEL_3_POWER_RATIO: f64 = 2.0;
    /// 笔内部分型超过该数量才考察内部高级分型。
    pub const LEVEL_INTERIOR_FRACTALS: usize = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    BarMerged,
    FractalDetected,
    StrokeOpened,
    StrokeExtended,
    StrokeFinalized,
    PivotOpened,
    PivotExtended,
    PivotSealed,
    PivotDiscarded,
    BarRejected,
}
