//! Interceptor options, partial updates and TOML loading.
//!
//! ```text
//! options file (TOML)
//!     → from_toml_str (deserialize, defaults for missing keys)
//!     → validate (every problem reported, not just the first)
//!     → InterceptorOptions
//!
//! panel update
//!     → OptionsPatch
//!     → merged + validated before the interceptor applies it
//! ```

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::core::stats::DEFAULT_STATS_WINDOW;

/// Failure to load, parse or validate options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The options file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for these options.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Every validation problem found.
    #[error("Validation failed: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

/// Recognized interceptor options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptorOptions {
    /// Install interception when true.
    pub enabled: bool,

    /// Endpoint hints; a URL containing one is treated as GraphQL.
    pub endpoints: Vec<String>,

    /// Use the URL/body heuristic detector.
    pub auto_detect_endpoints: bool,

    /// Eviction bound for the operation store.
    pub max_operation_history: usize,

    /// Trailing window for statistics, in seconds.
    pub stats_window_secs: u64,
}

impl Default for InterceptorOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoints: Vec::new(),
            auto_detect_endpoints: true,
            max_operation_history: 100,
            stats_window_secs: DEFAULT_STATS_WINDOW.as_secs(),
        }
    }
}

impl InterceptorOptions {
    /// Parses and validates options from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Reports all problems at once rather than the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.max_operation_history == 0 {
            problems.push("max_operation_history must be at least 1".to_string());
        }
        if self.stats_window_secs == 0 {
            problems.push("stats_window_secs must be at least 1".to_string());
        }
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if endpoint.trim().is_empty() {
                problems.push(format!("endpoints[{i}] is blank"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// `stats_window_secs` as a [`Duration`].
    pub fn stats_window(&self) -> Duration {
        Duration::from_secs(self.stats_window_secs)
    }

    /// True when `url` contains one of the endpoint hints.
    pub fn matches_endpoint(&self, url: &str) -> bool {
        self.endpoints.iter().any(|e| url.contains(e.as_str()))
    }

    /// Returns a copy with every `Some` field of `patch` applied.
    pub fn merged(&self, patch: &OptionsPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.enabled {
            next.enabled = v;
        }
        if let Some(v) = &patch.endpoints {
            next.endpoints = v.clone();
        }
        if let Some(v) = patch.auto_detect_endpoints {
            next.auto_detect_endpoints = v;
        }
        if let Some(v) = patch.max_operation_history {
            next.max_operation_history = v;
        }
        if let Some(v) = patch.stats_window_secs {
            next.stats_window_secs = v;
        }
        next
    }
}

/// Sparse options update where each `Some` field overwrites the current value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsPatch {
    /// Replaces `enabled`.
    pub enabled: Option<bool>,
    /// Replaces the whole endpoint list.
    pub endpoints: Option<Vec<String>>,
    /// Replaces `auto_detect_endpoints`.
    pub auto_detect_endpoints: Option<bool>,
    /// Replaces the history bound.
    pub max_operation_history: Option<usize>,
    /// Replaces the stats window.
    pub stats_window_secs: Option<u64>,
}

impl OptionsPatch {
    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Load and validate options from a TOML file.
pub fn load_options(path: &Path) -> Result<InterceptorOptions, ConfigError> {
    let content = fs::read_to_string(path)?;
    InterceptorOptions::from_toml_str(&content)
}
