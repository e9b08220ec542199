use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constant::{Direction, FractalType, Freq};
use crate::error::ChanError;
use crate::level::Level;

/// 数据源送来的原始 bar。
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub symbol: String,
    pub id: u64,
    pub datetime: DateTime<Utc>,
    pub freq: Freq,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume: f64,
    pub amount: f64,
}

impl RawBar {
    pub fn body(&self) -> f64 {
        (self.close_price - self.open_price).abs()
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high_price - self.close_price.max(self.open_price)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.close_price.min(self.open_price) - self.low_price
    }

    pub fn total_range(&self) -> f64 {
        self.high_price - self.low_price
    }

    pub fn validate(&self) -> Result<(), ChanError> {
        let prices = [
            self.open_price,
            self.high_price,
            self.low_price,
            self.close_price,
        ];
        if prices.iter().any(|x| !x.is_finite()) {
            return Err(ChanError::DataIntegrity(format!(
                "bar {} has non-finite prices",
                self.id
            )));
        }
        if self.high_price < self.low_price {
            return Err(ChanError::DataIntegrity(format!(
                "bar {} has high {} below low {}",
                self.id, self.high_price, self.low_price
            )));
        }
        if self.high_price < self.open_price.max(self.close_price)
            || self.low_price > self.open_price.min(self.close_price)
        {
            return Err(ChanError::DataIntegrity(format!(
                "bar {} open/close outside [{}, {}]",
                self.id, self.low_price, self.high_price
            )));
        }
        if !self.volume.is_finite() || self.volume <= 0.0 {
            return Err(ChanError::DataIntegrity(format!(
                "bar {} has non-positive volume {}",
                self.id, self.volume
            )));
        }
        Ok(())
    }
}

/// 去包含后的 K 线，按到达顺序持有被吸收的原始 bar。
#[derive(Debug, Clone, PartialEq)]
pub struct MergedBar {
    pub id: u64,
    pub symbol: String,
    pub freq: Freq,
    pub datetime: DateTime<Utc>,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    pub volume: f64,
    pub amount: f64,
    /// 最近一次包含处理采用的方向，未合并过时为 `None`。
    pub merge_direction: Option<Direction>,
    pub elements: Vec<RawBar>,
}

impl MergedBar {
    pub fn from_raw(id: u64, raw: RawBar) -> Self {
        Self {
            id,
            symbol: raw.symbol.clone(),
            freq: raw.freq,
            datetime: raw.datetime,
            open_price: raw.open_price,
            high_price: raw.high_price,
            low_price: raw.low_price,
            close_price: raw.close_price,
            volume: raw.volume,
            amount: raw.amount,
            merge_direction: None,
            elements: vec![raw],
        }
    }

    pub fn is_inclusive(&self, other: &Self) -> bool {
        is_inclusive(self.high_price, self.low_price, other.high_price, other.low_price)
    }

    pub fn raw_start_id(&self) -> Option<u64> {
        self.elements.first().map(|x| x.id)
    }

    pub fn raw_end_id(&self) -> Option<u64> {
        self.elements.last().map(|x| x.id)
    }

    pub fn last_raw_datetime(&self) -> Option<DateTime<Utc>> {
        self.elements.last().map(|x| x.datetime)
    }
}

pub(crate) fn is_inclusive(a_high: f64, a_low: f64, b_high: f64, b_low: f64) -> bool {
    (a_high >= b_high && a_low <= b_low) || (a_high <= b_high && a_low >= b_low)
}

/// 中间 K 线为严格局部极值的三根合并 K 线。
#[derive(Debug, Clone, PartialEq)]
pub struct Fractal {
    pub id: u64,
    pub symbol: String,
    pub fractal_type: FractalType,
    /// 顶分型取中间 K 线最高价，底分型取最低价。
    pub price: f64,
    pub datetime: DateTime<Utc>,
    pub left: Arc<MergedBar>,
    pub middle: Arc<MergedBar>,
    /// 检测时右侧 K 线仍可能吸收新 bar，封存后由检测器替换为最终形态。
    pub right: Arc<MergedBar>,
    pub superseded: bool,
    /// 所属笔完成时评估的级别。
    pub level: Level,
}

impl Fractal {
    /// 相等不算分型。
    pub fn verify(left: &MergedBar, middle: &MergedBar, right: &MergedBar) -> Option<FractalType> {
        if middle.high_price > left.high_price && middle.high_price > right.high_price {
            return Some(FractalType::Top);
        }
        if middle.low_price < left.low_price && middle.low_price < right.low_price {
            return Some(FractalType::Bottom);
        }
        None
    }

    pub fn new(
        id: u64,
        left: Arc<MergedBar>,
        middle: Arc<MergedBar>,
        right: Arc<MergedBar>,
    ) -> Option<Self> {
        let fractal_type = Self::verify(&left, &middle, &right)?;
        let price = match fractal_type {
            FractalType::Top => middle.high_price,
            FractalType::Bottom => middle.low_price,
        };
        Some(Self {
            id,
            symbol: middle.symbol.clone(),
            fractal_type,
            price,
            datetime: middle.datetime,
            left,
            middle,
            right,
            superseded: false,
            level: Level::default(),
        })
    }

    /// 中间 K 线的 id，即分型在合并序列中的位置。
    pub fn cbar_id(&self) -> u64 {
        self.middle.id
    }

    pub fn high(&self) -> f64 {
        self.middle.high_price
    }

    pub fn low(&self) -> f64 {
        self.middle.low_price
    }

    /// 三根 K 线的整体区间 `(low, high)`。
    pub fn envelope(&self) -> (f64, f64) {
        let high = self
            .left
            .high_price
            .max(self.middle.high_price)
            .max(self.right.high_price);
        let low = self
            .left
            .low_price
            .min(self.middle.low_price)
            .min(self.right.low_price);
        (low, high)
    }

    /// 同类型且顶更高或底更低。
    pub fn is_more_extreme_than(&self, other: &Fractal) -> bool {
        if self.fractal_type != other.fractal_type {
            return false;
        }
        match self.fractal_type {
            FractalType::Top => self.price > other.price,
            FractalType::Bottom => self.price < other.price,
        }
    }

    pub fn is_at_least_as_extreme_as(&self, other: &Fractal) -> bool {
        if self.fractal_type != other.fractal_type {
            return false;
        }
        match self.fractal_type {
            FractalType::Top => self.price >= other.price,
            FractalType::Bottom => self.price <= other.price,
        }
    }
}
