use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::analyzer::StructuralDelta;
use crate::bar::RawBar;
use crate::constant::Freq;
use crate::engine::AnalysisEngine;
use crate::error::ChanError;

#[derive(Debug, Deserialize)]
struct CsvBarRow {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(alias = "dt")]
    datetime: String,
    #[serde(alias = "open")]
    open_price: f64,
    #[serde(alias = "high")]
    high_price: f64,
    #[serde(alias = "low")]
    low_price: f64,
    #[serde(alias = "close")]
    close_price: f64,
    #[serde(alias = "vol")]
    volume: f64,
    #[serde(default, alias = "turnover", alias = "money")]
    amount: f64,
}

/// 从 CSV 文本解析 bar。缺少 `id` 列时从 1 编号，缺少 `symbol` 列时取 `symbol`。
pub fn read_bars<R: Read>(
    reader: R,
    symbol: impl Into<String>,
    freq: Freq,
) -> Result<Vec<RawBar>, ChanError> {
    let symbol = symbol.into();
    let mut reader = csv::Reader::from_reader(reader);
    let mut out = Vec::new();

    for (index, row) in reader.deserialize::<CsvBarRow>().enumerate() {
        let row = row?;
        out.push(RawBar {
            symbol: row.symbol.unwrap_or_else(|| symbol.clone()),
            id: row.id.unwrap_or(index as u64 + 1),
            datetime: parse_datetime(&row.datetime)?,
            freq,
            open_price: row.open_price,
            high_price: row.high_price,
            low_price: row.low_price,
            close_price: row.close_price,
            volume: row.volume,
            amount: row.amount,
        });
    }

    Ok(out)
}

pub fn read_bars_csv(
    file_path: impl AsRef<Path>,
    symbol: impl Into<String>,
    freq: Freq,
) -> Result<Vec<RawBar>, ChanError> {
    let file = std::fs::File::open(file_path)?;
    read_bars(file, symbol, freq)
}

pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, ChanError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let patterns = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S%.f",
        "%Y%m%d%H%M%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    for pattern in patterns {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, pattern) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        }
    }

    Err(ChanError::InvalidDatetime(value.to_string()))
}

/// 把存量 bar 回放给引擎。
pub struct DataReceiver {
    engine: AnalysisEngine,
    rejected: usize,
}

impl DataReceiver {
    pub fn new(engine: AnalysisEngine) -> Self {
        Self { engine, rejected: 0 }
    }

    pub fn ingest_bar(&mut self, bar: RawBar) -> Result<StructuralDelta, ChanError> {
        let result = self.engine.append(bar);
        if result.is_err() {
            self.rejected += 1;
        }
        result
    }

    /// 逐根输入，跳过被拒绝的 bar，返回接受的数量。
    pub fn ingest_batch(&mut self, bars: impl IntoIterator<Item = RawBar>) -> usize {
        let mut accepted = 0;
        for bar in bars {
            if self.ingest_bar(bar).is_ok() {
                accepted += 1;
            }
        }
        accepted
    }

    pub fn ingest_csv(
        &mut self,
        file_path: impl AsRef<Path>,
        symbol: impl Into<String>,
        freq: Freq,
    ) -> Result<usize, ChanError> {
        let bars = read_bars_csv(file_path, symbol, freq)?;
        Ok(self.ingest_batch(bars))
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn engine(&self) -> &AnalysisEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AnalysisEngine {
        &mut self.engine
    }
}
