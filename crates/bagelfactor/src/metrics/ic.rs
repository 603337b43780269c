//! Information coefficient.
//!
//! The IC of a date is the cross-sectional correlation between the factor and
//! the forward return label across the assets where both are observed. ICIR
//! summarizes an IC series as mean over sample standard deviation.

use crate::{
    EvalError, Panel, Result,
    cross_section::{CrossSections, date_column, float_values},
    stats::{TieBreak, is_constant, mean, pearson, rank, std_dev},
};
use derive_more::Display;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Name of the IC column.
pub const IC: &str = "ic";

/// Correlation used for the information coefficient.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcMethod {
    /// Linear correlation of raw values
    #[display("pearson")]
    Pearson,
    /// Pearson correlation of within-date ranks (rank IC)
    #[default]
    #[display("spearman")]
    Spearman,
}

impl FromStr for IcMethod {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pearson" => Ok(Self::Pearson),
            "spearman" => Ok(Self::Spearman),
            other => Err(EvalError::parameter(
                "ic_method",
                format!("unknown method `{other}` (expected pearson or spearman)"),
            )),
        }
    }
}

/// Per-date correlation between `factor` and `label`.
///
/// Only rows where both values are present take part. With
/// [`IcMethod::Spearman`] both sides are ranked within the date first, ties
/// ordered by row order, so the result is reproducible for tied labels. Dates
/// with fewer than two valid pairs, or with a constant side, get a missing IC.
///
/// Returns a frame with columns `date` and `ic`, dates ascending.
pub fn ic_series(panel: &Panel, factor: &str, label: &str, method: IcMethod) -> Result<DataFrame> {
    let factor_values = float_values(panel.frame(), factor)?;
    let label_values = float_values(panel.frame(), label)?;
    let sections = CrossSections::from_frame(panel.frame())?;

    let mut days = Vec::with_capacity(sections.len());
    let mut ics = Vec::with_capacity(sections.len());
    for (day, rows) in sections.iter() {
        let (x, y): (Vec<f64>, Vec<f64>) = rows
            .iter()
            .filter_map(|&row| factor_values[row].zip(label_values[row]))
            .unzip();

        let ic = match method {
            IcMethod::Pearson => pearson(&x, &y),
            IcMethod::Spearman => pearson(&rank(&x, TieBreak::First), &rank(&y, TieBreak::First)),
        };
        days.push(day);
        ics.push(ic);
    }

    Ok(DataFrame::new(vec![date_column(days)?, Column::new(IC.into(), ics)])?)
}

/// Mean IC divided by its sample standard deviation (n - 1).
///
/// Missing entries are ignored. Returns `None` when fewer than two values
/// remain or when they are all identical.
pub fn icir(ic: &DataFrame) -> Result<Option<f64>> {
    let values: Vec<f64> = float_values(ic, IC)?.into_iter().flatten().collect();
    Ok(icir_from_values(&values))
}

pub(crate) fn icir_from_values(values: &[f64]) -> Option<f64> {
    if is_constant(values) {
        return None;
    }
    let sd = std_dev(values, 1)?;
    if sd == 0.0 || !sd.is_finite() {
        return None;
    }
    Some(mean(values)? / sd)
}
