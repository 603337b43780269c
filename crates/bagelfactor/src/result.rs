//! Evaluation output.
//!
//! [`EvaluationResult`] is built once by the job and only exposes read
//! access afterwards.

use crate::{
    JobConfig, Result,
    cross_section::float_values,
    metrics::{IC, LONG_SHORT, TURNOVER, ic::icir_from_values},
    stats::{mean, std_dev},
};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Metrics for a single forward-return horizon.
#[derive(Debug, Clone)]
pub struct HorizonResult {
    horizon: usize,
    ic: DataFrame,
    icir: Option<f64>,
    quantile_returns: DataFrame,
    long_short: DataFrame,
    turnover: DataFrame,
}

impl HorizonResult {
    pub(crate) const fn new(
        horizon: usize,
        ic: DataFrame,
        icir: Option<f64>,
        quantile_returns: DataFrame,
        long_short: DataFrame,
        turnover: DataFrame,
    ) -> Self {
        Self {
            horizon,
            ic,
            icir,
            quantile_returns,
            long_short,
            turnover,
        }
    }

    /// Horizon in periods.
    pub const fn horizon(&self) -> usize {
        self.horizon
    }

    /// IC per date: columns `date`, `ic`.
    pub const fn ic(&self) -> &DataFrame {
        &self.ic
    }

    /// Mean IC over its sample standard deviation.
    pub const fn icir(&self) -> Option<f64> {
        self.icir
    }

    /// Mean label per date and bucket: columns `date`, `q1`, `q2`, ...
    pub const fn quantile_returns(&self) -> &DataFrame {
        &self.quantile_returns
    }

    /// Top minus bottom bucket per date: columns `date`, `long_short`.
    pub const fn long_short(&self) -> &DataFrame {
        &self.long_short
    }

    /// Bucket turnover: columns `date`, `quantile`, `turnover`.
    ///
    /// Bucketing does not depend on the horizon, so every horizon carries the
    /// same table.
    pub const fn turnover(&self) -> &DataFrame {
        &self.turnover
    }

    /// Scalar summary of this horizon.
    pub fn summary(&self) -> Result<HorizonSummary> {
        let ic: Vec<f64> = float_values(&self.ic, IC)?.into_iter().flatten().collect();
        let long_short: Vec<f64> = float_values(&self.long_short, LONG_SHORT)?
            .into_iter()
            .flatten()
            .collect();
        let turnover: Vec<f64> = float_values(&self.turnover, TURNOVER)?
            .into_iter()
            .flatten()
            .collect();

        let hit_rate = (!ic.is_empty())
            .then(|| ic.iter().filter(|&&v| v > 0.0).count() as f64 / ic.len() as f64);

        Ok(HorizonSummary {
            horizon: self.horizon,
            ic_mean: mean(&ic),
            ic_std: std_dev(&ic, 1),
            icir: icir_from_values(&ic),
            ic_hit_rate: hit_rate,
            long_short_mean: mean(&long_short),
            turnover_mean: mean(&turnover),
        })
    }
}

/// Per-horizon scalars, one row of [`EvaluationResult::summary`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HorizonSummary {
    /// Horizon in periods
    pub horizon: usize,
    /// Mean of the non-missing IC values
    pub ic_mean: Option<f64>,
    /// Sample standard deviation of the IC
    pub ic_std: Option<f64>,
    /// `ic_mean / ic_std`
    pub icir: Option<f64>,
    /// Share of dates with a positive IC
    pub ic_hit_rate: Option<f64>,
    /// Mean long-short spread
    pub long_short_mean: Option<f64>,
    /// Mean turnover over all dates and buckets
    pub turnover_mean: Option<f64>,
}

/// Output of one evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    config: JobConfig,
    coverage: DataFrame,
    quantiles: DataFrame,
    horizons: BTreeMap<usize, HorizonResult>,
}

impl EvaluationResult {
    pub(crate) const fn new(
        config: JobConfig,
        coverage: DataFrame,
        quantiles: DataFrame,
        horizons: BTreeMap<usize, HorizonResult>,
    ) -> Self {
        Self {
            config,
            coverage,
            quantiles,
            horizons,
        }
    }

    /// Configuration the run used.
    pub const fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Factor coverage per date, shared by all horizons.
    pub const fn coverage(&self) -> &DataFrame {
        &self.coverage
    }

    /// Quantile assignment per (date, asset), shared by all horizons.
    pub const fn quantiles(&self) -> &DataFrame {
        &self.quantiles
    }

    /// Metrics for `horizon`, if it was evaluated.
    pub fn horizon(&self, horizon: usize) -> Option<&HorizonResult> {
        self.horizons.get(&horizon)
    }

    /// Evaluated horizons, ascending.
    pub fn horizons(&self) -> impl Iterator<Item = usize> + '_ {
        self.horizons.keys().copied()
    }

    /// Per-horizon results, ascending by horizon.
    pub fn iter(&self) -> impl Iterator<Item = &HorizonResult> + '_ {
        self.horizons.values()
    }

    /// One [`HorizonSummary`] per horizon, ascending.
    pub fn summaries(&self) -> Result<Vec<HorizonSummary>> {
        self.iter().map(HorizonResult::summary).collect()
    }

    /// Summary table with one row per horizon.
    ///
    /// Columns: `horizon`, `ic_mean`, `ic_std`, `icir`, `ic_hit_rate`,
    /// `long_short_mean`, `turnover_mean`.
    pub fn summary(&self) -> Result<DataFrame> {
        let rows = self.summaries()?;
        let field = |f: fn(&HorizonSummary) -> Option<f64>| -> Vec<Option<f64>> {
            rows.iter().map(f).collect()
        };

        Ok(DataFrame::new(vec![
            Column::new(
                "horizon".into(),
                rows.iter().map(|r| r.horizon as u32).collect::<Vec<_>>(),
            ),
            Column::new("ic_mean".into(), field(|r| r.ic_mean)),
            Column::new("ic_std".into(), field(|r| r.ic_std)),
            Column::new("icir".into(), field(|r| r.icir)),
            Column::new("ic_hit_rate".into(), field(|r| r.ic_hit_rate)),
            Column::new("long_short_mean".into(), field(|r| r.long_short_mean)),
            Column::new("turnover_mean".into(), field(|r| r.turnover_mean)),
        ])?)
    }
}
