//! Factor coverage per date.

use crate::{
    Panel, Result,
    cross_section::{CrossSections, date_column, present_mask},
};
use polars::prelude::*;

/// Name of the coverage column.
pub const COVERAGE: &str = "coverage";

/// Fraction of rows with a non-missing `column` value, per date.
///
/// Returns a frame with columns `date` and `coverage`, dates ascending. Every
/// value lies in `[0, 1]` and equals 1 exactly when no value is missing that
/// date. Any column type works: null counts as missing, and so does NaN in a
/// float column.
///
/// # Errors
///
/// [`crate::EvalError::MissingColumn`] if `column` is absent.
pub fn coverage_by_date(panel: &Panel, column: &str) -> Result<DataFrame> {
    let present = present_mask(panel.frame(), column)?;
    let sections = CrossSections::from_frame(panel.frame())?;

    let mut days = Vec::with_capacity(sections.len());
    let mut coverage = Vec::with_capacity(sections.len());
    for (day, rows) in sections.iter() {
        let valid = rows.iter().filter(|&&row| present[row]).count();
        days.push(day);
        coverage.push((!rows.is_empty()).then(|| valid as f64 / rows.len() as f64));
    }

    Ok(DataFrame::new(vec![
        date_column(days)?,
        Column::new(COVERAGE.into(), coverage),
    ])?)
}
