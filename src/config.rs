//! Engine configuration.
//!
//! ```toml
//! failure_policy = "keep_last_good"   # or "invalidate"
//! parallel = true
//! parallel_threshold = 32
//! validate_on_save = true
//!
//! [locale]
//! thousands_separator = ","
//! decimal_point = "."
//! date_format = "%Y-%m-%d"
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::render::LocaleFormat;

/// What a cascade does with an artifact whose recompile fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep serving the previous code, flagged stale with the diagnostic.
    #[default]
    KeepLastGood,
    /// Remove the artifact.
    Invalidate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub failure_policy: FailurePolicy,
    /// Compile cascade targets on the rayon pool.
    pub parallel: bool,
    /// Minimum number of targets before a cascade goes parallel.
    pub parallel_threshold: usize,
    /// Run a validation compile before persisting a template edit.
    pub validate_on_save: bool,
    pub locale: LocaleFormat,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            parallel: true,
            parallel_threshold: 32,
            validate_on_save: true,
            locale: LocaleFormat::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallel_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "parallel_threshold",
                message: "must be at least 1".into(),
            });
        }
        if self.locale.decimal_point.is_empty() {
            return Err(ConfigError::Invalid {
                field: "locale.decimal_point",
                message: "must not be empty".into(),
            });
        }
        self.locale.validate().map_err(|error| ConfigError::Invalid {
            field: "locale",
            message: error.to_string(),
        })
    }

    /// Whether a cascade of `targets` compiles in parallel.
    pub fn runs_parallel(&self, targets: usize) -> bool {
        self.parallel && targets >= self.parallel_threshold
    }
}
