//! Analyzer configuration (spec.md §10.3), grounded on the teacher's
//! `ServerConfig`/`CliConfig`/`from_env` pattern: a validated struct with
//! environment-variable and CLI constructors that can be merged (CLI
//! overrides environment).

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// A named rule add/remove override for one batch, applied on top of the
/// analyzer's built-in phase lists (spec.md §10.3 "per-phase rule
/// add/remove lists").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuleOverrides {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

/// Validated analyzer configuration (spec.md §10.3). Unlike the teacher's
/// `ServerConfig`, there is no network surface here — every field governs
/// the analyzer's own behavior (iteration caps, FK recursion depth,
/// prepared-statement support, per-phase rule overrides).
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Enables verbose per-rule trace logging (spec.md §10.1).
    pub debug: bool,

    /// Upper bound on rule-application parallelism within a batch. Kept at
    /// 1 today (rules mutate a single tree in place); reserved for a future
    /// independent-subtree parallel rewrite.
    #[validate(range(min = 1, max = 1024, message = "parallelism must be between 1 and 1024"))]
    pub parallelism: usize,

    /// Disables prepared-statement analysis entirely (`analyze_prepared`
    /// always errors) when set via `DISABLE_PREPARED_STATEMENTS`.
    pub prepared_statements_disabled: bool,

    /// Fixed-point batch iteration cap (spec.md §11 open question: default
    /// 1000, matching the source's own default before it errors out rather
    /// than looping forever on a buggy rule interaction).
    #[validate(range(min = 1, message = "max_analysis_iters must be at least 1"))]
    pub max_analysis_iters: usize,

    /// Recursion/depth cap for foreign-key chain planning (spec.md §4.6.1).
    #[validate(range(min = 1, max = 1000, message = "foreign_key_max_depth must be between 1 and 1000"))]
    pub foreign_key_max_depth: usize,

    /// Per-phase rule add/remove overrides, keyed by batch name.
    pub rule_overrides: std::collections::HashMap<String, RuleOverrides>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            parallelism: 1,
            prepared_statements_disabled: false,
            max_analysis_iters: 1000,
            foreign_key_max_depth: 15,
            rule_overrides: std::collections::HashMap::new(),
        }
    }
}

impl AnalyzerConfig {
    /// Build from environment variables, falling back to defaults
    /// (spec.md §10.3).
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            debug: parse_env_var("QUERY_ANALYZER_DEBUG", "false")?,
            parallelism: parse_env_var("QUERY_ANALYZER_PARALLELISM", "1")?,
            prepared_statements_disabled: parse_env_var("DISABLE_PREPARED_STATEMENTS", "false")?,
            max_analysis_iters: parse_env_var("QUERY_ANALYZER_MAX_ITERS", "1000")?,
            foreign_key_max_depth: parse_env_var("QUERY_ANALYZER_FK_MAX_DEPTH", "15")?,
            rule_overrides: std::collections::HashMap::new(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build from CLI arguments (spec.md §10.5), merged over a base loaded
    /// from the environment so CLI flags override env vars.
    pub fn from_cli(cli: CliConfig) -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        if cli.debug {
            config.debug = true;
        }
        if let Some(p) = cli.parallelism {
            config.parallelism = p;
        }
        if cli.disable_prepared_statements {
            config.prepared_statements_disabled = true;
        }
        if let Some(m) = cli.max_analysis_iters {
            config.max_analysis_iters = m;
        }
        if let Some(d) = cli.foreign_key_max_depth {
            config.foreign_key_max_depth = d;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn rules_for_batch(&self, batch_name: &str) -> Option<&RuleOverrides> {
        self.rule_overrides.get(batch_name)
    }
}

/// CLI-parsed overrides (spec.md §10.5); `None` fields mean "inherit from
/// the environment-sourced base".
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub debug: bool,
    pub parallelism: Option<usize>,
    pub disable_prepared_statements: bool,
    pub max_analysis_iters: Option<usize>,
    pub foreign_key_max_depth: Option<usize>,
}

fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
