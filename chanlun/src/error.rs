use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ChanError {
    DataIntegrity(String),
    OutOfOrder(String),
    ConfigInvalid(String),
    InvalidFreq(String),
    InvalidDatetime(String),
    Io(std::io::Error),
    Csv(csv::Error),
    Yaml(serde_yaml::Error),
    Json(serde_json::Error),
    Polars(polars::error::PolarsError),
}

impl ChanError {
    /// 单根 bar 被拒绝，分析器仍可继续使用。
    pub fn is_bar_rejection(&self) -> bool {
        matches!(self, Self::DataIntegrity(_) | Self::OutOfOrder(_))
    }
}

impl Display for ChanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataIntegrity(v) => write!(f, "data integrity: {v}"),
            Self::OutOfOrder(v) => write!(f, "out of order: {v}"),
            Self::ConfigInvalid(v) => write!(f, "invalid config: {v}"),
            Self::InvalidFreq(v) => write!(f, "invalid freq: {v}"),
            Self::InvalidDatetime(v) => write!(f, "invalid datetime: {v}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Csv(e) => write!(f, "csv error: {e}"),
            Self::Yaml(e) => write!(f, "yaml error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Polars(e) => write!(f, "polars error: {e}"),
        }
    }
}

impl std::error::Error for ChanError {}

impl From<std::io::Error> for ChanError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for ChanError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<serde_yaml::Error> for ChanError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

impl From<serde_json::Error> for ChanError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<polars::error::PolarsError> for ChanError {
    fn from(value: polars::error::PolarsError) -> Self {
        Self::Polars(value)
    }
}
