//! Single-factor evaluation job.
//!
//! The job composes the panel model, the optional universe filter and
//! preprocessing pipeline, forward-return labels and every metric into one
//! [`EvaluationResult`]. A failing step aborts the whole run; no partial
//! result is ever returned.

use crate::{
    JobConfig, Panel, Pipeline, Result, Universe,
    metrics::{
        IC, assign_quantiles, coverage_by_date, ic_series, icir, long_short, quantile_returns,
        quantile_turnover,
    },
    panel::{add_forward_returns, ensure_panel_index, forward_return_column},
    result::{EvaluationResult, HorizonResult},
};
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use tracing::{debug, info, info_span, warn};

/// Evaluates one factor against forward returns over one or more horizons.
#[derive(Debug, Clone, Default)]
pub struct SingleFactorJob {
    config: JobConfig,
}

impl SingleFactorJob {
    /// Create a job from a configuration.
    pub const fn new(config: JobConfig) -> Self {
        Self { config }
    }

    /// Job configuration.
    pub const fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Run the evaluation on a raw table.
    ///
    /// Steps, in order:
    ///
    /// 1. normalize `table` into a panel keyed by the configured columns;
    /// 2. keep only rows in `universe`, when given;
    /// 3. apply `preprocess`, when given;
    /// 4. add a `ret_fwd_{h}` label for every horizon;
    /// 5. compute coverage, the quantile assignment and turnover once;
    /// 6. per horizon, compute the IC series, ICIR, quantile returns and the
    ///    long-short spread.
    ///
    /// The input table is never modified. Rows must already be sorted by date
    /// within each asset; see [`crate::sort_index`].
    ///
    /// # Errors
    ///
    /// Any parameter or structural error from the steps above. Statistical
    /// degeneracy is reported as missing values in the result instead.
    pub fn run(
        &self,
        table: &DataFrame,
        universe: Option<&Universe>,
        preprocess: Option<&Pipeline>,
    ) -> Result<EvaluationResult> {
        let config = &self.config;
        let _span = info_span!("evaluate", factor = %config.factor_column).entered();
        config.validate()?;

        let mut panel = ensure_panel_index(table, &config.date_column, &config.asset_column)?;
        panel.require_column(&config.factor_column)?;
        panel.require_column(&config.price_column)?;
        debug!(rows = panel.height(), "normalized panel");

        if let Some(universe) = universe {
            panel = universe.apply(&panel)?;
            debug!(rows = panel.height(), members = universe.len(), "applied universe");
        }
        if let Some(pipeline) = preprocess {
            panel = pipeline.transform(&panel)?;
            debug!(rows = panel.height(), steps = pipeline.len(), "applied preprocessing");
        }

        let horizons = config.unique_horizons();
        let panel = add_forward_returns(&panel, &config.price_column, &horizons)?;

        let coverage = coverage_by_date(&panel, &config.factor_column)?;
        let quantiles = assign_quantiles(&panel, &config.factor_column, config.n_quantiles)?;
        let turnover = quantile_turnover(&quantiles, config.n_quantiles)?;
        debug!(dates = coverage.height(), "computed coverage, quantiles and turnover");

        let mut results = BTreeMap::new();
        for &horizon in &horizons {
            let result = self.evaluate_horizon(&panel, &quantiles, &turnover, horizon)?;
            results.insert(horizon, result);
        }

        info!(
            horizons = ?horizons,
            dates = coverage.height(),
            "evaluation complete"
        );
        Ok(EvaluationResult::new(
            config.clone(),
            coverage,
            quantiles,
            results,
        ))
    }

    fn evaluate_horizon(
        &self,
        panel: &Panel,
        quantiles: &DataFrame,
        turnover: &DataFrame,
        horizon: usize,
    ) -> Result<HorizonResult> {
        let config = &self.config;
        let label = forward_return_column(horizon);

        let ic = ic_series(panel, &config.factor_column, &label, config.ic_method)?;
        let ir = icir(&ic)?;
        if ic.column(IC)?.null_count() == ic.height() {
            warn!(horizon, "IC is missing on every date");
        }

        let returns = quantile_returns(panel, quantiles, &label)?;
        let spread = long_short(&returns, config.n_quantiles)?;
        debug!(horizon, icir = ?ir, "evaluated horizon");

        Ok(HorizonResult::new(
            horizon,
            ic,
            ir,
            returns,
            spread,
            turnover.clone(),
        ))
    }
}

/// Evaluate `table` with `config`. Shorthand for [`SingleFactorJob::run`].
pub fn run(
    table: &DataFrame,
    config: &JobConfig,
    universe: Option<&Universe>,
    preprocess: Option<&Pipeline>,
) -> Result<EvaluationResult> {
    SingleFactorJob::new(config.clone()).run(table, universe, preprocess)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvalError, IcMethod, Rank, cross_section::float_values};
    use approx::assert_relative_eq;
    use polars::prelude::*;

    fn table() -> DataFrame {
        df![
            "date" => ["2020-01-01", "2020-01-01", "2020-01-01", "2020-01-02", "2020-01-02", "2020-01-02", "2020-01-03", "2020-01-03", "2020-01-03"],
            "asset" => ["A", "B", "C", "A", "B", "C", "A", "B", "C"],
            "factor" => [1.0, 2.0, 3.0, 3.0, 2.0, 1.0, 1.0, 3.0, 2.0],
            "close" => [100.0, 100.0, 100.0, 101.0, 103.0, 99.0, 102.0, 102.0, 99.0],
        ]
        .unwrap()
        .sort(["asset", "date"], SortMultipleOptions::default())
        .unwrap()
    }

    #[test]
    fn test_run_produces_every_horizon() {
        let config = JobConfig::default()
            .with_horizons([2, 1])
            .with_n_quantiles(3);
        let result = run(&table(), &config, None, None).unwrap();

        assert_eq!(result.horizons().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(result.coverage().height(), 3);
        assert_eq!(result.quantiles().height(), 9);

        let h1 = result.horizon(1).unwrap();
        assert_eq!(h1.ic().height(), 3);
        assert_eq!(h1.quantile_returns().width(), 4);
        assert_eq!(h1.turnover().height(), 6);
        // No labels exist on the last date.
        assert_eq!(float_values(h1.ic(), IC).unwrap()[2], None);

        let h2 = result.horizon(2).unwrap();
        let ic2 = float_values(h2.ic(), IC).unwrap();
        assert!(ic2[0].is_some());
        assert!(ic2[1..].iter().all(Option::is_none));
        assert!(h2.icir().is_none());
    }

    #[test]
    fn test_run_pearson_matches_metric() {
        let config = JobConfig::default()
            .with_ic_method(IcMethod::Pearson)
            .with_n_quantiles(2);
        let result = run(&table(), &config, None, None).unwrap();
        let ic = float_values(result.horizon(1).unwrap().ic(), IC).unwrap();

        // Date 1: factor (1, 2, 3) against returns (0.01, 0.03, -0.01).
        assert_relative_eq!(ic[0].unwrap(), -0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_run_with_preprocessing() {
        let pipeline = Pipeline::new([Rank::pct("factor")]);
        let job = SingleFactorJob::new(JobConfig::default().with_n_quantiles(3));
        let ranked = job.run(&table(), None, Some(&pipeline)).unwrap();
        let raw = job.run(&table(), None, None).unwrap();

        // Spearman IC is invariant under a monotone transform of the factor.
        assert!(
            ranked
                .horizon(1)
                .unwrap()
                .ic()
                .equals_missing(raw.horizon(1).unwrap().ic())
        );
    }

    #[test]
    fn test_run_is_all_or_nothing() {
        let missing_price = JobConfig::new("factor", "open");
        assert!(matches!(
            run(&table(), &missing_price, None, None),
            Err(EvalError::MissingColumn(name)) if name == "open"
        ));

        let bad_quantiles = JobConfig::default().with_n_quantiles(1);
        assert!(matches!(
            run(&table(), &bad_quantiles, None, None),
            Err(EvalError::InvalidParameter { name: "n_quantiles", .. })
        ));

        let bad_keys = JobConfig::default().with_keys("day", "asset");
        assert!(matches!(
            run(&table(), &bad_keys, None, None),
            Err(EvalError::MissingColumn(_))
        ));
    }
}
