//! Quantile bucketing, quantile returns and the long-short spread.

use crate::{
    EvalError, Panel, Result,
    cross_section::{
        CrossSections, date_column, date_days, float_values, optional_float_values, require_column,
    },
    panel::{ASSET, DATE},
    stats::{TieBreak, rank},
};
use polars::prelude::*;

/// Name of the bucket column of a quantile assignment.
pub const QUANTILE: &str = "quantile";

/// Name of the long-short column.
pub const LONG_SHORT: &str = "long_short";

/// Column name of bucket `q` in a quantile-return table.
pub fn quantile_column(q: usize) -> String {
    format!("q{q}")
}

pub(crate) fn check_n_quantiles(n_quantiles: usize) -> Result<()> {
    if n_quantiles < 2 {
        return Err(EvalError::parameter(
            "n_quantiles",
            format!("need at least 2 quantiles, got {n_quantiles}"),
        ));
    }
    Ok(())
}

/// Equal-frequency bucket of the `position`-th (1-based) of `valid` ranked values.
///
/// Ranks are split at the `i / n` quantiles of `1..=valid`; bucket `i` holds
/// the ranks in `(edge[i-1], edge[i]]`, with the lowest rank always in bucket
/// 1. When `valid < n` some buckets stay empty.
fn bucket(position: usize, valid: usize, n_quantiles: usize) -> u32 {
    if valid < 2 {
        return 1;
    }
    let scaled = (position - 1) * n_quantiles;
    scaled.div_ceil(valid - 1).max(1) as u32
}

/// Assign each row to a factor quantile within its date.
///
/// Non-missing factor values are ranked per date with ties broken by row
/// order, then split into `n_quantiles` equal-frequency buckets numbered
/// `1..=n_quantiles` (1 = lowest factor). Rows with a missing factor get a
/// missing bucket.
///
/// Returns a frame with columns `date`, `asset` and `quantile`, row-aligned
/// with the panel.
///
/// # Errors
///
/// [`EvalError::InvalidParameter`] if `n_quantiles < 2`, and
/// [`EvalError::MissingColumn`] if `factor` is absent.
pub fn assign_quantiles(panel: &Panel, factor: &str, n_quantiles: usize) -> Result<DataFrame> {
    check_n_quantiles(n_quantiles)?;
    let values = float_values(panel.frame(), factor)?;
    let sections = CrossSections::from_frame(panel.frame())?;

    let mut buckets: Vec<Option<u32>> = vec![None; panel.height()];
    for (_, rows) in sections.iter() {
        let (valid_rows, valid_values): (Vec<usize>, Vec<f64>) = rows
            .iter()
            .filter_map(|&row| values[row].map(|v| (row, v)))
            .unzip();
        let ranks = rank(&valid_values, TieBreak::First);
        for (&row, &r) in valid_rows.iter().zip(&ranks) {
            buckets[row] = Some(bucket(r as usize, valid_rows.len(), n_quantiles));
        }
    }

    let mut assignment = panel.frame().select([DATE, ASSET])?;
    assignment.with_column(Series::new(QUANTILE.into(), buckets))?;
    Ok(assignment)
}

fn bucket_values(assignment: &DataFrame) -> Result<Vec<Option<u32>>> {
    let buckets = require_column(assignment, QUANTILE)?.cast(&DataType::UInt32)?;
    Ok(buckets.u32()?.into_iter().collect())
}

/// Mean `label` per date and bucket.
///
/// `assignment` must be row-aligned with `panel`, as produced by
/// [`assign_quantiles`]. The result has a `date` column and one column per
/// bucket (`q1`, `q2`, ...) up to the highest bucket assigned. A cell is
/// missing when the bucket was not realized that date or none of its members
/// has a label. Dates without any assigned bucket are left out.
pub fn quantile_returns(panel: &Panel, assignment: &DataFrame, label: &str) -> Result<DataFrame> {
    if assignment.height() != panel.height() {
        return Err(EvalError::ShapeMismatch {
            expected: panel.height(),
            actual: assignment.height(),
        });
    }
    let labels = float_values(panel.frame(), label)?;
    let buckets = bucket_values(assignment)?;
    let n_buckets = buckets.iter().flatten().copied().max().unwrap_or(0) as usize;
    let sections = CrossSections::from_days(&date_days(panel.frame())?);

    let mut days = Vec::new();
    let mut means: Vec<Vec<Option<f64>>> = vec![Vec::new(); n_buckets];
    for (day, rows) in sections.iter() {
        let mut sums = vec![0.0; n_buckets];
        let mut counts = vec![0usize; n_buckets];
        let mut realized = false;
        for &row in rows {
            let Some(q) = buckets[row].filter(|&q| q >= 1) else {
                continue;
            };
            realized = true;
            if let Some(value) = labels[row] {
                sums[q as usize - 1] += value;
                counts[q as usize - 1] += 1;
            }
        }
        if !realized {
            continue;
        }
        days.push(day);
        for (q, column) in means.iter_mut().enumerate() {
            column.push((counts[q] > 0).then(|| sums[q] / counts[q] as f64));
        }
    }

    let mut columns = vec![date_column(days)?];
    columns.extend(
        means
            .into_iter()
            .enumerate()
            .map(|(q, values)| Column::new(quantile_column(q + 1).into(), values)),
    );
    Ok(DataFrame::new(columns)?)
}

/// Top-bucket mean minus bottom-bucket mean per date.
///
/// Missing on dates where either `q{n}` or `q1` is missing, including when
/// the table has no column for the top bucket at all.
pub fn long_short(quantile_returns: &DataFrame, n_quantiles: usize) -> Result<DataFrame> {
    check_n_quantiles(n_quantiles)?;
    let dates = require_column(quantile_returns, DATE)?.clone();
    let top = optional_float_values(quantile_returns, &quantile_column(n_quantiles))?;
    let bottom = optional_float_values(quantile_returns, &quantile_column(1))?;

    let spread: Vec<Option<f64>> = top
        .into_iter()
        .zip(bottom)
        .map(|(t, b)| Some(t? - b?))
        .collect();

    Ok(DataFrame::new(vec![
        dates,
        Column::new(LONG_SHORT.into(), spread),
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensure_panel_index;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn buckets_of(assignment: &DataFrame) -> Vec<Option<u32>> {
        bucket_values(assignment).unwrap()
    }

    #[test]
    fn test_bucket_edges() {
        // Ten values into five buckets: two per bucket.
        let buckets: Vec<u32> = (1..=10).map(|r| bucket(r, 10, 5)).collect();
        assert_eq!(buckets, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5]);
        // Two values into five buckets: only the outer buckets are realized.
        assert_eq!((bucket(1, 2, 5), bucket(2, 2, 5)), (1, 5));
        assert_eq!(bucket(1, 1, 5), 1);
    }

    #[test]
    fn test_assign_quantiles_ties_follow_row_order() {
        // A binary flag factor: ties must split by row order, not by averaging.
        let table = df![
            "date" => vec!["2020-01-01"; 4],
            "asset" => ["A", "B", "C", "D"],
            "flag" => [1.0, 1.0, 0.0, 0.0],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let assignment = assign_quantiles(&panel, "flag", 2).unwrap();

        assert_eq!(
            buckets_of(&assignment),
            vec![Some(2), Some(2), Some(1), Some(1)]
        );
        let again = assign_quantiles(&panel, "flag", 2).unwrap();
        assert!(again.equals_missing(&assignment));
    }

    #[test]
    fn test_assign_quantiles_partitions_valid_assets() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-01", "2020-01-01", "2020-01-01", "2020-01-01", "2020-01-02", "2020-01-02"],
            "asset" => ["A", "B", "C", "D", "E", "A", "B"],
            "factor" => [Some(0.3), None, Some(0.1), Some(0.9), Some(0.5), Some(2.0), Some(1.0)],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let assignment = assign_quantiles(&panel, "factor", 3).unwrap();
        let buckets = buckets_of(&assignment);

        assert_eq!(assignment.height(), panel.height());
        assert_eq!(buckets[1], None);
        // Date 1 ranks: C=1, A=2, E=3, D=4; edges at ranks 2, 3 and 4.
        assert_eq!(&buckets[..5], &[Some(1), None, Some(1), Some(3), Some(2)]);
        assert_eq!(&buckets[5..], &[Some(3), Some(1)]);

        let valid: HashSet<usize> = (0..7).filter(|&i| i != 1).collect();
        let bucketed: HashSet<usize> = (0..7).filter(|&i| buckets[i].is_some()).collect();
        assert_eq!(valid, bucketed);
    }

    #[test]
    fn test_assign_quantiles_rejects_single_bucket() {
        let table = df![
            "date" => ["2020-01-01"],
            "asset" => ["A"],
            "factor" => [1.0],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        assert!(matches!(
            assign_quantiles(&panel, "factor", 1),
            Err(EvalError::InvalidParameter { name: "n_quantiles", .. })
        ));
    }

    #[test]
    fn test_quantile_returns_and_long_short() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-01", "2020-01-01", "2020-01-01", "2020-01-02", "2020-01-02", "2020-01-03"],
            "asset" => ["A", "B", "C", "D", "A", "B", "A"],
            "factor" => [Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(1.0), Some(2.0), None],
            "label" => [Some(0.01), Some(0.03), Some(0.05), None, Some(-0.02), None, Some(0.1)],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let assignment = assign_quantiles(&panel, "factor", 2).unwrap();
        let table = quantile_returns(&panel, &assignment, "label").unwrap();

        // The third date has no bucketed asset and is dropped.
        assert_eq!(table.height(), 2);
        let q1 = float_values(&table, "q1").unwrap();
        let q2 = float_values(&table, "q2").unwrap();
        assert_relative_eq!(q1[0].unwrap(), 0.02, epsilon = 1e-12);
        assert_relative_eq!(q2[0].unwrap(), 0.05, epsilon = 1e-12);
        assert_relative_eq!(q1[1].unwrap(), -0.02, epsilon = 1e-12);
        assert_eq!(q2[1], None);

        let spread = long_short(&table, 2).unwrap();
        let spread = float_values(&spread, LONG_SHORT).unwrap();
        assert_relative_eq!(spread[0].unwrap(), 0.03, epsilon = 1e-12);
        assert_eq!(spread[1], None);
    }

    #[test]
    fn test_long_short_missing_top_bucket() {
        let mut table = df![
            "q1" => [Some(0.01)],
        ]
        .unwrap();
        table.with_column(date_column(vec![18262]).unwrap()).unwrap();

        let spread = long_short(&table, 5).unwrap();
        assert_eq!(float_values(&spread, LONG_SHORT).unwrap(), vec![None]);
    }

    #[test]
    fn test_quantile_returns_shape_mismatch() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-01"],
            "asset" => ["A", "B"],
            "factor" => [1.0, 2.0],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let assignment = assign_quantiles(&panel, "factor", 2).unwrap().head(Some(1));
        assert!(matches!(
            quantile_returns(&panel, &assignment, "factor"),
            Err(EvalError::ShapeMismatch { expected: 2, actual: 1 })
        ));
    }
}
