//! 结构快照转换为 polars DataFrame。

use polars::df;
use polars::prelude::DataFrame;

use crate::analyzer::StructureSnapshot;
use crate::constant::{Direction, FractalType};
use crate::error::ChanError;

/// 上 1，下 -1。
fn direction_code(direction: Direction) -> i8 {
    match direction {
        Direction::Up => 1,
        Direction::Down => -1,
    }
}

impl StructureSnapshot {
    pub fn merged_bar_frame(&self) -> Result<DataFrame, ChanError> {
        let rows = &self.merged_bars;
        let id: Vec<u64> = rows.iter().map(|x| x.id).collect();
        let datetime: Vec<i64> = rows.iter().map(|x| x.datetime.timestamp_millis()).collect();
        let open_price: Vec<f64> = rows.iter().map(|x| x.open_price).collect();
        let high_price: Vec<f64> = rows.iter().map(|x| x.high_price).collect();
        let low_price: Vec<f64> = rows.iter().map(|x| x.low_price).collect();
        let close_price: Vec<f64> = rows.iter().map(|x| x.close_price).collect();
        let volume: Vec<f64> = rows.iter().map(|x| x.volume).collect();
        let amount: Vec<f64> = rows.iter().map(|x| x.amount).collect();
        let merge_direction: Vec<i8> = rows
            .iter()
            .map(|x| x.merge_direction.map_or(0, direction_code))
            .collect();
        let raw_count: Vec<u32> = rows.iter().map(|x| x.elements.len() as u32).collect();

        Ok(df!(
            "id" => id,
            "datetime" => datetime,
            "open_price" => open_price,
            "high_price" => high_price,
            "low_price" => low_price,
            "close_price" => close_price,
            "volume" => volume,
            "amount" => amount,
            "merge_direction" => merge_direction,
            "raw_count" => raw_count
        )?)
    }

    pub fn fractal_frame(&self) -> Result<DataFrame, ChanError> {
        let rows = &self.fractals;
        let id: Vec<u64> = rows.iter().map(|x| x.id).collect();
        let cbar_id: Vec<u64> = rows.iter().map(|x| x.cbar_id()).collect();
        let kind: Vec<i8> = rows
            .iter()
            .map(|x| match x.fractal_type {
                FractalType::Top => 1,
                FractalType::Bottom => -1,
            })
            .collect();
        let price: Vec<f64> = rows.iter().map(|x| x.price).collect();
        let datetime: Vec<i64> = rows.iter().map(|x| x.datetime.timestamp_millis()).collect();
        let superseded: Vec<bool> = rows.iter().map(|x| x.superseded).collect();
        let level: Vec<u32> = rows.iter().map(|x| x.level.level as u32).collect();

        Ok(df!(
            "id" => id,
            "cbar_id" => cbar_id,
            "kind" => kind,
            "price" => price,
            "datetime" => datetime,
            "superseded" => superseded,
            "level" => level
        )?)
    }

    pub fn stroke_frame(&self) -> Result<DataFrame, ChanError> {
        let rows = &self.strokes;
        let id: Vec<u64> = rows.iter().map(|x| x.id).collect();
        let direction: Vec<i8> = rows.iter().map(|x| direction_code(x.direction)).collect();
        let start_cbar_id: Vec<u64> = rows.iter().map(|x| x.start.cbar_id()).collect();
        let end_cbar_id: Vec<u64> = rows.iter().map(|x| x.end.cbar_id()).collect();
        let start_price: Vec<f64> = rows.iter().map(|x| x.start.price).collect();
        let end_price: Vec<f64> = rows.iter().map(|x| x.end.price).collect();
        let high_price: Vec<f64> = rows.iter().map(|x| x.high_price).collect();
        let low_price: Vec<f64> = rows.iter().map(|x| x.low_price).collect();
        let span: Vec<u32> = rows.iter().map(|x| x.span as u32).collect();
        let change_ratio: Vec<f64> = rows.iter().map(|x| x.change_ratio).collect();
        let confirmed: Vec<bool> = rows.iter().map(|x| x.confirmed).collect();
        let triggered: Vec<bool> = rows.iter().map(|x| x.triggered).collect();
        let level: Vec<u32> = rows.iter().map(|x| x.level.level as u32).collect();

        Ok(df!(
            "id" => id,
            "direction" => direction,
            "start_cbar_id" => start_cbar_id,
            "end_cbar_id" => end_cbar_id,
            "start_price" => start_price,
            "end_price" => end_price,
            "high_price" => high_price,
            "low_price" => low_price,
            "span" => span,
            "change_ratio" => change_ratio,
            "confirmed" => confirmed,
            "triggered" => triggered,
            "level" => level
        )?)
    }

    pub fn pivot_frame(&self) -> Result<DataFrame, ChanError> {
        let rows = &self.pivots;
        let id: Vec<u64> = rows.iter().map(|x| x.id).collect();
        let zg: Vec<f64> = rows.iter().map(|x| x.zg).collect();
        let zd: Vec<f64> = rows.iter().map(|x| x.zd).collect();
        let gg: Vec<f64> = rows.iter().map(|x| x.gg).collect();
        let dd: Vec<f64> = rows.iter().map(|x| x.dd).collect();
        let stroke_count: Vec<u32> = rows.iter().map(|x| x.stroke_count() as u32).collect();
        let start_datetime: Vec<i64> = rows
            .iter()
            .map(|x| x.start_datetime.timestamp_millis())
            .collect();
        let end_datetime: Vec<i64> = rows
            .iter()
            .map(|x| x.end_datetime.timestamp_millis())
            .collect();
        let sealed: Vec<bool> = rows.iter().map(|x| x.sealed).collect();

        Ok(df!(
            "id" => id,
            "zg" => zg,
            "zd" => zd,
            "gg" => gg,
            "dd" => dd,
            "stroke_count" => stroke_count,
            "start_datetime" => start_datetime,
            "end_datetime" => end_datetime,
            "sealed" => sealed
        )?)
    }
}
