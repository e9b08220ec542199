use chanlun::{
    Analyzer, AnalyzerConfig, ChanError, MarketProfile, PenMode, PenPolicy, ThresholdProfile,
};

#[test]
fn defaults_resolve_to_equity_moderate() {
    let config = AnalyzerConfig::default();
    assert_eq!(config.pen_mode, PenMode::Standard);
    assert_eq!(config.atr_period, 14);
    assert_eq!(config.volume_period, 20);
    assert_eq!(config.max_retained_strokes, 50);

    let thresholds = config.resolve_thresholds();
    assert!((thresholds.volume_ratio - 2.0).abs() < 1e-12);
    assert!((thresholds.atr_ratio - 1.5).abs() < 1e-12);
}

#[test]
fn yaml_patch_selects_profiles() {
    let yaml = r#"
pen_mode: adaptive
market_profile: crypto
threshold_profile: aggressive
max_retained_strokes: 200
"#;
    let config = AnalyzerConfig::from_yaml_str(yaml).expect("valid yaml");
    assert_eq!(config.pen_mode, PenMode::Adaptive);
    assert_eq!(config.market_profile, MarketProfile::Crypto);
    assert_eq!(config.threshold_profile, ThresholdProfile::Aggressive);
    assert_eq!(config.max_retained_strokes, 200);
    assert_eq!(
        config.pen_policy(),
        PenPolicy::Adaptive {
            min_span: 5,
            relaxed_min_span: 3
        }
    );

    let thresholds = config.resolve_thresholds();
    assert!((thresholds.volume_ratio - 2.0).abs() < 1e-12);
    assert!((thresholds.atr_ratio - 1.44).abs() < 1e-12);
}

#[test]
fn explicit_ratios_override_profiles() {
    let json = r#"{"market_profile": "futures", "adaptive_volume_ratio": 3.0, "adaptive_atr_ratio": 0.9}"#;
    let config = AnalyzerConfig::from_json_str(json).expect("valid json");
    let thresholds = config.resolve_thresholds();
    assert_eq!(thresholds.volume_ratio, 3.0);
    assert_eq!(thresholds.atr_ratio, 0.9);
}

#[test]
fn unknown_names_are_config_errors() {
    assert!(matches!(
        AnalyzerConfig::from_yaml_str("pen_mode: turbo"),
        Err(ChanError::ConfigInvalid(_))
    ));
    assert!(matches!(
        AnalyzerConfig::from_yaml_str("market_profile: forex"),
        Err(ChanError::ConfigInvalid(_))
    ));
    assert!(matches!(
        AnalyzerConfig::from_json_str(r#"{"threshold_profile": "reckless"}"#),
        Err(ChanError::ConfigInvalid(_))
    ));
}

#[test]
fn malformed_text_surfaces_parser_errors() {
    assert!(matches!(
        AnalyzerConfig::from_json_str("{not json"),
        Err(ChanError::Json(_))
    ));
    assert!(matches!(
        AnalyzerConfig::from_yaml_str("atr_period: [1, 2"),
        Err(ChanError::Yaml(_))
    ));
}

#[test]
fn analyzer_refuses_invalid_numbers() {
    let bad_ratio = AnalyzerConfig {
        adaptive_atr_ratio: Some(-1.0),
        ..AnalyzerConfig::default()
    };
    assert!(matches!(Analyzer::new(bad_ratio), Err(ChanError::ConfigInvalid(_))));

    let nan_ratio = AnalyzerConfig {
        adaptive_volume_ratio: Some(f64::NAN),
        ..AnalyzerConfig::default()
    };
    assert!(matches!(Analyzer::new(nan_ratio), Err(ChanError::ConfigInvalid(_))));

    let no_retention = AnalyzerConfig {
        max_retained_strokes: 0,
        ..AnalyzerConfig::default()
    };
    assert!(matches!(Analyzer::new(no_retention), Err(ChanError::ConfigInvalid(_))));

    let tiny_pivot = AnalyzerConfig {
        max_pivot_strokes: 2,
        ..AnalyzerConfig::default()
    };
    assert!(matches!(Analyzer::new(tiny_pivot), Err(ChanError::ConfigInvalid(_))));

    assert!(matches!(
        AnalyzerConfig::from_yaml_str("atr_period: 0"),
        Err(ChanError::ConfigInvalid(_))
    ));
}

#[test]
fn mode_names_round_trip() {
    for mode in [PenMode::Standard, PenMode::Flexible, PenMode::Adaptive] {
        assert_eq!(PenMode::parse(mode.as_str()).expect("known mode"), mode);
    }
    assert_eq!(MarketProfile::parse("Stock").expect("alias"), MarketProfile::Equity);
}
