//! Column extraction and per-date grouping shared by the metrics.
//!
//! Metrics read the panel into plain vectors once and then work on one
//! date-slice at a time. Row order inside a slice is the panel's row order,
//! which is what the deterministic tie-breaks rely on.

use crate::{
    EvalError, Result,
    panel::{ASSET, DATE},
};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Days between 0001-01-01 (CE) and 1970-01-01, the polars `Date` epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub(crate) fn day_to_date(day: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(day + UNIX_EPOCH_DAYS_FROM_CE)
}

pub(crate) fn date_to_day(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn require_column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Column> {
    frame
        .column(name)
        .map_err(|_| EvalError::MissingColumn(name.to_string()))
}

/// Physical day numbers of the `date` key column.
pub(crate) fn date_days(frame: &DataFrame) -> Result<Vec<i32>> {
    let dates = require_column(frame, DATE)?.cast(&DataType::Int32)?;
    dates
        .i32()?
        .into_iter()
        .map(|day| day.ok_or_else(|| EvalError::InvalidPanel("null date in key".to_string())))
        .collect()
}

pub(crate) fn asset_ids(frame: &DataFrame) -> Result<Vec<String>> {
    let assets = require_column(frame, ASSET)?.cast(&DataType::String)?;
    assets
        .str()?
        .into_iter()
        .map(|asset| {
            asset
                .map(str::to_string)
                .ok_or_else(|| EvalError::InvalidPanel("null asset in key".to_string()))
        })
        .collect()
}

/// Numeric column as `f64`, with both null and NaN mapped to `None`.
pub(crate) fn float_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let values = require_column(frame, name)?
        .as_materialized_series()
        .strict_cast(&DataType::Float64)?;
    Ok(values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Per-row presence of any column: not null, and not NaN for float columns.
pub(crate) fn present_mask(frame: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let column = require_column(frame, name)?;
    if column.dtype().is_float() {
        let values = column.cast(&DataType::Float64)?;
        return Ok(values
            .f64()?
            .into_iter()
            .map(|v| v.is_some_and(|x| !x.is_nan()))
            .collect());
    }
    Ok(column
        .as_materialized_series()
        .is_not_null()
        .into_iter()
        .map(|v| v.unwrap_or(false))
        .collect())
}

/// Like [`float_values`], but an absent column reads as all-missing.
pub(crate) fn optional_float_values(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    if frame.get_column_index(name).is_some() {
        float_values(frame, name)
    } else {
        Ok(vec![None; frame.height()])
    }
}

/// Build a `Date` column from physical day numbers.
pub(crate) fn date_column(days: Vec<i32>) -> Result<Column> {
    let series = Series::new(DATE.into(), days).cast(&DataType::Date)?;
    Ok(Column::from(series))
}

/// Row indices of a frame grouped by date, dates ascending.
#[derive(Debug, Clone)]
pub(crate) struct CrossSections {
    days: Vec<i32>,
    rows: Vec<Vec<usize>>,
}

impl CrossSections {
    pub(crate) fn from_days(days: &[i32]) -> Self {
        let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (row, &day) in days.iter().enumerate() {
            groups.entry(day).or_default().push(row);
        }
        let (days, rows) = groups.into_iter().unzip();
        Self { days, rows }
    }

    pub(crate) fn from_frame(frame: &DataFrame) -> Result<Self> {
        Ok(Self::from_days(&date_days(frame)?))
    }

    pub(crate) fn len(&self) -> usize {
        self.days.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (i32, &[usize])> + '_ {
        self.days
            .iter()
            .copied()
            .zip(self.rows.iter().map(Vec::as_slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_round_trip() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        assert_eq!(date_to_day(date), 18263);
        assert_eq!(day_to_date(18263), Some(date));
        assert_eq!(day_to_date(0), NaiveDate::from_ymd_opt(1970, 1, 1));
    }

    #[test]
    fn test_cross_sections_keep_row_order() {
        let sections = CrossSections::from_days(&[5, 3, 5, 3, 4]);
        let groups: Vec<(i32, Vec<usize>)> = sections
            .iter()
            .map(|(day, rows)| (day, rows.to_vec()))
            .collect();

        assert_eq!(sections.len(), 3);
        assert_eq!(
            groups,
            vec![(3, vec![1, 3]), (4, vec![4]), (5, vec![0, 2])]
        );
    }

    #[test]
    fn test_float_values_treat_nan_as_missing() {
        let df = df![
            "x" => [Some(1.0), None, Some(f64::NAN)]
        ]
        .unwrap();

        assert_eq!(float_values(&df, "x").unwrap(), vec![Some(1.0), None, None]);
        assert!(matches!(
            float_values(&df, "y"),
            Err(EvalError::MissingColumn(name)) if name == "y"
        ));
    }

    #[test]
    fn test_present_mask_any_dtype() {
        let df = df![
            "x" => [Some(1.0), None, Some(f64::NAN)],
            "sector" => [Some("tech"), None, Some("energy")],
            "n" => [Some(1i64), Some(2), None],
        ]
        .unwrap();

        assert_eq!(present_mask(&df, "x").unwrap(), vec![true, false, false]);
        assert_eq!(present_mask(&df, "sector").unwrap(), vec![true, false, true]);
        assert_eq!(present_mask(&df, "n").unwrap(), vec![true, true, false]);
    }
}
