//! 分型与笔的组件明细导出（CSV）。

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::analyzer::StructureSnapshot;
use crate::bar::Fractal;
use crate::error::ChanError;
use crate::level::Level;
use crate::stroke::Stroke;

#[derive(Debug, Serialize)]
struct ComponentRow {
    #[serde(rename = "type")]
    kind: &'static str,
    symbol: String,
    freq: &'static str,
    #[serde(skip)]
    sort_key: DateTime<Utc>,
    dt: String,
    mark: String,
    price: String,
    high: f64,
    low: f64,
    direction: &'static str,
    bar_count: usize,
    raw_data: String,
    level: u8,
    level_description: String,
    level_2_reasons: String,
    level_3_reasons: String,
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn level_columns(level: &Level, noun: &str) -> (u8, String, String, String) {
    (
        level.level,
        format!("{}{noun}", level.name()),
        level.level_2_text(),
        level.level_3_text(),
    )
}

impl ComponentRow {
    fn fractal(freq: &'static str, fx: &Fractal) -> Self {
        let (level, level_description, level_2_reasons, level_3_reasons) =
            level_columns(&fx.level, "分型");
        let (low, high) = fx.envelope();
        Self {
            kind: "FX",
            symbol: fx.symbol.clone(),
            freq,
            sort_key: fx.datetime,
            dt: timestamp(fx.datetime),
            mark: fx.fractal_type.as_str().to_string(),
            price: fx.price.to_string(),
            high,
            low,
            direction: fx.fractal_type.as_str(),
            bar_count: fx.left.elements.len() + fx.middle.elements.len() + fx.right.elements.len(),
            raw_data: format!(
                "{}-{}",
                timestamp(fx.left.datetime),
                timestamp(fx.right.datetime)
            ),
            level,
            level_description,
            level_2_reasons,
            level_3_reasons,
        }
    }

    fn stroke(freq: &'static str, stroke: &Stroke) -> Self {
        let (level, level_description, level_2_reasons, level_3_reasons) =
            level_columns(&stroke.level, "笔");
        Self {
            kind: "BI",
            symbol: stroke.symbol.clone(),
            freq,
            sort_key: stroke.start.datetime,
            dt: timestamp(stroke.start.datetime),
            mark: format!(
                "{}-{}",
                stroke.start.fractal_type.as_str(),
                stroke.end.fractal_type.as_str()
            ),
            price: format!("{}-{}", stroke.start.price, stroke.end.price),
            high: stroke.start.price.max(stroke.end.price),
            low: stroke.start.price.min(stroke.end.price),
            direction: stroke.direction.as_str(),
            bar_count: stroke.raw_bar_count(),
            raw_data: format!(
                "{}-{}",
                timestamp(stroke.start.datetime),
                timestamp(stroke.end.datetime)
            ),
            level,
            level_description,
            level_2_reasons,
            level_3_reasons,
        }
    }
}

impl StructureSnapshot {
    fn component_rows(&self) -> Vec<ComponentRow> {
        let freq = self.freq.map_or("", |x| x.as_str());
        let mut rows: Vec<ComponentRow> = self
            .fractals
            .iter()
            .filter(|x| !x.superseded)
            .map(|x| ComponentRow::fractal(freq, x))
            .collect();
        rows.extend(
            self.strokes
                .iter()
                .filter(|x| x.confirmed)
                .map(|x| ComponentRow::stroke(freq, x)),
        );
        // 稳定排序：同一时间分型在前
        rows.sort_by_key(|x| x.sort_key);
        rows
    }

    /// 写出未被替换的分型与已封存的笔，按时间排序，返回行数。
    pub fn write_components_csv<W: Write>(&self, writer: W) -> Result<usize, ChanError> {
        let rows = self.component_rows();
        let mut writer = csv::Writer::from_writer(writer);
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(rows.len())
    }

    pub fn save_components_csv(&self, path: impl AsRef<Path>) -> Result<usize, ChanError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|x| !x.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let count = self.write_components_csv(File::create(path)?)?;
        info!(path = %path.display(), rows = count, "components saved");
        Ok(count)
    }
}
