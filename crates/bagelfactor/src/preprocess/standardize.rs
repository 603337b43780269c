//! Cross-sectional z-score standardization.
//!
//! Standardizing per date makes factor values comparable across dates with
//! different dispersion.

use crate::{Panel, Result, cross_section::require_column, panel::DATE};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-date z-score: `(x - mean) / std` with the population standard deviation.
///
/// A date whose valid values have zero or undefined variance (including a
/// single observation) yields missing for every row, rather than zeros that
/// would look like a neutral signal. Constant dates are detected by exact
/// equality of the smallest and largest value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZScore {
    /// Column to standardize
    pub column: String,
}

impl ZScore {
    /// Standardize `column`.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    /// Apply the standardization to `panel`.
    pub fn transform(&self, panel: &Panel) -> Result<Panel> {
        let name = self.column.as_str();
        require_column(panel.frame(), name)?;

        let value = col(name)
            .strict_cast(DataType::Float64)
            .fill_nan(lit(NULL));
        let frame = panel
            .lazy()
            .with_column(value.alias(name))
            .with_columns([
                col(name).mean().over([col(DATE)]).alias("_mean"),
                col(name).std(0).over([col(DATE)]).alias("_std"),
                col(name).min().over([col(DATE)]).alias("_min"),
                col(name).max().over([col(DATE)]).alias("_max"),
            ])
            .with_column(
                when(
                    col("_min")
                        .eq(col("_max"))
                        .or(col("_std").eq(lit(0.0)))
                        .or(col("_std").is_null()),
                )
                .then(lit(NULL).cast(DataType::Float64))
                .otherwise((col(name) - col("_mean")) / col("_std"))
                .alias(name),
            )
            .drop(["_mean", "_std", "_min", "_max"])
            .collect()?;
        Ok(Panel::from_validated(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvalError, cross_section::float_values, ensure_panel_index};
    use approx::assert_relative_eq;

    #[test]
    fn test_zscore_population_std() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-01", "2020-01-01", "2020-01-01"],
            "asset" => ["A", "B", "C", "D"],
            "factor" => [Some(1.0), Some(2.0), Some(3.0), None],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let out = ZScore::new("factor").transform(&panel).unwrap();
        let z = float_values(out.frame(), "factor").unwrap();

        // Mean 2, population std sqrt(2/3).
        let sd = (2.0_f64 / 3.0).sqrt();
        assert_relative_eq!(z[0].unwrap(), -1.0 / sd, epsilon = 1e-12);
        assert_relative_eq!(z[1].unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(z[2].unwrap(), 1.0 / sd, epsilon = 1e-12);
        assert_eq!(z[3], None);
    }

    #[test]
    fn test_zscore_degenerate_dates_are_missing() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-01", "2020-01-02", "2020-01-03", "2020-01-03"],
            "asset" => ["A", "B", "A", "A", "B"],
            "factor" => [0.1, 0.1, 5.0, 1.0, 3.0],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let out = ZScore::new("factor").transform(&panel).unwrap();
        let z = float_values(out.frame(), "factor").unwrap();

        assert_eq!(&z[..3], &[None, None, None]);
        assert_relative_eq!(z[3].unwrap(), -1.0, epsilon = 1e-12);
        assert_relative_eq!(z[4].unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zscore_interleaved_integer_column() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-02", "2020-01-01", "2020-01-02"],
            "asset" => ["A", "A", "B", "B"],
            "factor" => [1i64, 10, 3, 20],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let out = ZScore::new("factor").transform(&panel).unwrap();

        let z = float_values(out.frame(), "factor").unwrap();
        for (value, expected) in z.iter().zip([-1.0, -1.0, 1.0, 1.0]) {
            assert_relative_eq!(value.unwrap(), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zscore_missing_column() {
        let table = df![
            "date" => ["2020-01-01"],
            "asset" => ["A"],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        assert!(matches!(
            ZScore::new("factor").transform(&panel),
            Err(EvalError::MissingColumn(_))
        ));
    }
}
