//! Quantile membership turnover.

use crate::{
    Result,
    cross_section::{CrossSections, asset_ids, date_column, date_days, require_column},
    metrics::quantiles::{QUANTILE, check_n_quantiles},
    panel::validate_panel,
};
use polars::prelude::*;
use std::collections::HashSet;

/// Name of the turnover column.
pub const TURNOVER: &str = "turnover";

/// Jaccard distance between each bucket's members on consecutive dates.
///
/// For every date after the first and every bucket `q` in `1..=n_quantiles`,
/// turnover is `1 - |M(t, q) ∩ M(t-1, q)| / |M(t, q) ∪ M(t-1, q)|`: 0 when the
/// membership is unchanged, 1 when it is fully replaced. Buckets empty on both
/// dates are omitted. "Previous" means the previous distinct date present in
/// the assignment.
///
/// Returns a frame with columns `date`, `quantile` and `turnover`; empty when
/// the assignment spans fewer than two dates.
///
/// # Errors
///
/// [`crate::EvalError::InvalidPanel`] if `assignment` is not keyed by
/// `date`/`asset`.
pub fn quantile_turnover(assignment: &DataFrame, n_quantiles: usize) -> Result<DataFrame> {
    check_n_quantiles(n_quantiles)?;
    validate_panel(assignment)?;
    let buckets: Vec<Option<u32>> = require_column(assignment, QUANTILE)?
        .cast(&DataType::UInt32)?
        .u32()?
        .into_iter()
        .collect();
    let assets = asset_ids(assignment)?;
    let sections = CrossSections::from_days(&date_days(assignment)?);

    let mut days = Vec::new();
    let mut quantiles: Vec<u32> = Vec::new();
    let mut turnover = Vec::new();
    let mut previous: Option<Vec<HashSet<&str>>> = None;
    for (day, rows) in sections.iter() {
        let mut members: Vec<HashSet<&str>> = vec![HashSet::new(); n_quantiles];
        for &row in rows {
            if let Some(q) = buckets[row].filter(|&q| q >= 1 && q as usize <= n_quantiles) {
                members[q as usize - 1].insert(assets[row].as_str());
            }
        }

        if let Some(prev) = &previous {
            for (q, (now, before)) in members.iter().zip(prev).enumerate() {
                let union = now.union(before).count();
                if union == 0 {
                    continue;
                }
                let kept = now.intersection(before).count();
                days.push(day);
                quantiles.push(q as u32 + 1);
                turnover.push(1.0 - kept as f64 / union as f64);
            }
        }
        previous = Some(members);
    }

    Ok(DataFrame::new(vec![
        date_column(days)?,
        Column::new(QUANTILE.into(), quantiles),
        Column::new(TURNOVER.into(), turnover),
    ])?)
}
