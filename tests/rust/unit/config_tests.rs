use query_analyzer::config::{AnalyzerConfig, CliConfig};

#[test]
fn default_max_analysis_iters_matches_documented_cap() {
    let config = AnalyzerConfig::default();
    assert_eq!(config.max_analysis_iters, 1000);
}

#[test]
fn cli_foreign_key_depth_override_is_validated() {
    let cli = CliConfig {
        foreign_key_max_depth: Some(2000),
        ..Default::default()
    };
    let err = AnalyzerConfig::from_cli(cli).unwrap_err();
    assert!(err.to_string().contains("validation error"));
}

#[test]
fn cli_leaves_unset_fields_at_their_default() {
    let config = AnalyzerConfig::from_cli(CliConfig::default()).unwrap();
    assert_eq!(config.parallelism, 1);
    assert!(!config.debug);
}
