use std::collections::HashMap;

use chrono::{TimeZone, Utc};

use chanlun::{Analyzer, AnalyzerConfig, Fractal, FractalType, Freq, MergedBar, RawBar};

fn expected_fractals(bars: &[std::sync::Arc<MergedBar>]) -> HashMap<u64, FractalType> {
    let mut out = HashMap::new();
    for i in 1..bars.len().saturating_sub(1) {
        if let Some(kind) = Fractal::verify(&bars[i - 1], &bars[i], &bars[i + 1]) {
            out.insert(bars[i].id, kind);
        }
    }
    out
}

fn detected_fractals(analyzer: &Analyzer) -> HashMap<u64, FractalType> {
    analyzer
        .fractals()
        .iter()
        .map(|x| (x.cbar_id(), x.fractal_type))
        .collect()
}

#[test]
fn fractal_labels_match_local_three_bar_rule() {
    let analyzer =
        Analyzer::from_bars(AnalyzerConfig::default(), sample_bars(160)).expect("replay");

    let merged = analyzer.merged_bars();
    assert!(merged.len() > 20, "need enough merged bars for fractal validation");
    assert_eq!(detected_fractals(&analyzer), expected_fractals(&merged));
}

#[test]
fn incremental_append_never_uses_future_information() {
    let mut analyzer = Analyzer::new(AnalyzerConfig::default()).expect("config");

    for bar in sample_bars(120) {
        let delta = analyzer.apply(bar).expect("valid bar");
        if let Some(fractal) = &delta.fractal {
            // the right bar is the one just appended
            assert_eq!(fractal.right.id, delta.merged_bar.id);
        }
        let merged = analyzer.merged_bars();
        assert_eq!(
            detected_fractals(&analyzer),
            expected_fractals(&merged),
            "mismatch after bar {}",
            delta.bar_id
        );
    }
}

#[test]
fn first_and_last_merged_bars_are_never_fractals() {
    let analyzer = Analyzer::from_bars(AnalyzerConfig::default(), sample_bars(90)).expect("replay");
    let merged = analyzer.merged_bars();
    let detected = detected_fractals(&analyzer);

    assert!(!detected.contains_key(&merged[0].id));
    assert!(!detected.contains_key(&merged[merged.len() - 1].id));
}

fn sample_bars(count: usize) -> Vec<RawBar> {
    let mut bars = Vec::with_capacity(count);
    let base_dt = Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap();

    let mut price = 100.0_f64;
    let cycle = [0.0_f64, 3.1, -2.9, 4.2, -3.3, 2.0, -1.7, 3.5, -2.6, 1.4];
    for i in 0..count {
        let open = price;
        let drift = (i as f64) * 0.02;
        let close = (100.0 + drift + cycle[i % cycle.len()]).max(1.0);
        let high = open.max(close) + 0.9;
        let low = open.min(close) - 0.9;
        let volume = 100.0 + (i as f64 * 1.5);
        price = close;

        bars.push(RawBar {
            symbol: "I8888".to_string(),
            id: i as u64 + 1,
            datetime: base_dt + chrono::Duration::minutes(15 * i as i64),
            freq: Freq::F15,
            open_price: open,
            high_price: high,
            low_price: low,
            close_price: close,
            volume,
            amount: volume * close,
        });
    }
    bars
}
