//! Evaluation job configuration.

use crate::{EvalError, IcMethod, Result, metrics::quantiles::check_n_quantiles};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of a single-factor evaluation run.
///
/// Every field has a default, so a JSON config only needs the keys it
/// overrides:
///
/// ```
/// use bagelfactor::{IcMethod, JobConfig};
///
/// let config = JobConfig::from_json(r#"{"factor_column": "mom_12_1", "horizons": [1, 5]}"#).unwrap();
/// assert_eq!(config.factor_column, "mom_12_1");
/// assert_eq!(config.horizons, vec![1, 5]);
/// assert_eq!(config.n_quantiles, 5);
/// assert_eq!(config.ic_method, IcMethod::Spearman);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Column holding the date key in the raw table (default: "date")
    pub date_column: String,
    /// Column holding the asset key in the raw table (default: "asset")
    pub asset_column: String,
    /// Factor to evaluate (default: "factor")
    pub factor_column: String,
    /// Price used to build forward returns (default: "close")
    pub price_column: String,
    /// Forward-return horizons in periods (default: [1])
    pub horizons: Vec<usize>,
    /// Number of quantile buckets (default: 5)
    pub n_quantiles: usize,
    /// Correlation used for the IC (default: spearman)
    pub ic_method: IcMethod,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            asset_column: "asset".to_string(),
            factor_column: "factor".to_string(),
            price_column: "close".to_string(),
            horizons: vec![1],
            n_quantiles: 5,
            ic_method: IcMethod::default(),
        }
    }
}

impl JobConfig {
    /// Config for `factor` priced by `price`, other fields defaulted.
    pub fn new(factor_column: impl Into<String>, price_column: impl Into<String>) -> Self {
        Self {
            factor_column: factor_column.into(),
            price_column: price_column.into(),
            ..Self::default()
        }
    }

    /// Set the raw key column names.
    pub fn with_keys(mut self, date_column: impl Into<String>, asset_column: impl Into<String>) -> Self {
        self.date_column = date_column.into();
        self.asset_column = asset_column.into();
        self
    }

    /// Set the forward-return horizons.
    pub fn with_horizons(mut self, horizons: impl Into<Vec<usize>>) -> Self {
        self.horizons = horizons.into();
        self
    }

    /// Set the number of quantile buckets.
    pub const fn with_n_quantiles(mut self, n_quantiles: usize) -> Self {
        self.n_quantiles = n_quantiles;
        self
    }

    /// Set the IC correlation method.
    pub const fn with_ic_method(mut self, ic_method: IcMethod) -> Self {
        self.ic_method = ic_method;
        self
    }

    /// Parse a config from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON config file.
    ///
    /// # Errors
    ///
    /// [`EvalError::Io`] if the file cannot be read and [`EvalError::Config`]
    /// if it is not a valid config.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check parameter domains before any computation.
    ///
    /// # Errors
    ///
    /// [`EvalError::InvalidParameter`] when `horizons` is empty or contains 0,
    /// or when `n_quantiles < 2`.
    pub fn validate(&self) -> Result<()> {
        if self.horizons.is_empty() {
            return Err(EvalError::parameter("horizons", "at least one horizon is required"));
        }
        if self.horizons.contains(&0) {
            return Err(EvalError::parameter("horizons", "horizon must be at least 1, got 0"));
        }
        check_n_quantiles(self.n_quantiles)
    }

    /// Horizons in ascending order without duplicates.
    pub(crate) fn unique_horizons(&self) -> Vec<usize> {
        let mut horizons = self.horizons.clone();
        horizons.sort_unstable();
        horizons.dedup();
        horizons
    }
}
