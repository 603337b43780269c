//! Optional data-quality report for a panel.
//!
//! Nothing here is enforced by the metrics. The report surfaces the problems
//! that make them silently wrong (unsorted rows, duplicate keys) and the ones
//! that make them thin (heavy missingness, calendar gaps).

use crate::{
    cross_section::{asset_ids, date_days, day_to_date},
    panel::{ASSET, DATE, validate_panel},
};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt,
};

/// Columns missing more than this share of values get a warning.
const MISSING_WARN_SHARE: f64 = 0.5;

/// Columns missing more than this share are flagged in the report.
const MISSING_FLAG_SHARE: f64 = 0.1;

/// Gap, in days, that counts as a hole in daily data.
const MAX_DAILY_GAP: i32 = 7;

/// Structure and quality summary of a panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelDiagnostics {
    /// Keys are `date` (Date) and `asset` (String) without nulls
    pub is_valid_index: bool,
    /// Rows are in ascending (date, asset) order
    pub is_sorted: bool,
    /// Number of rows repeating an earlier (date, asset) pair
    pub n_duplicates: usize,
    /// Distinct dates
    pub n_dates: usize,
    /// Distinct assets
    pub n_assets: usize,
    /// Rows
    pub n_rows: usize,
    /// First and last date
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Rows per distinct date
    pub avg_assets_per_date: f64,
    /// Share of missing values per numeric column
    pub missing_share: BTreeMap<String, f64>,
    /// Human-readable findings
    pub warnings: Vec<String>,
}

impl PanelDiagnostics {
    /// Whether any (date, asset) pair occurs more than once.
    pub const fn has_duplicates(&self) -> bool {
        self.n_duplicates > 0
    }
}

/// Inspect `table` for the usual panel mistakes.
///
/// Never fails: a table without valid keys yields a report with
/// `is_valid_index == false` and zero counts.
pub fn diagnose_panel(table: &DataFrame) -> PanelDiagnostics {
    let mut warnings = Vec::new();
    let n_rows = table.height();

    let keys = validate_panel(table)
        .ok()
        .and_then(|()| Some((date_days(table).ok()?, asset_ids(table).ok()?)));
    if keys.is_none() {
        warnings.push(format!(
            "table must be keyed by `{DATE}` (Date) and `{ASSET}` (String)"
        ));
    }

    let mut is_sorted = true;
    let mut n_duplicates = 0;
    let mut n_dates = 0;
    let mut n_assets = 0;
    let mut date_range = None;
    let mut avg_assets_per_date = 0.0;
    if let Some((days, assets)) = &keys {
        is_sorted = days
            .iter()
            .zip(assets)
            .collect::<Vec<_>>()
            .windows(2)
            .all(|w| w[0] <= w[1]);
        if !is_sorted {
            warnings.push("panel is not sorted by (date, asset); call sort_index first".to_string());
        }

        let mut seen = HashSet::with_capacity(n_rows);
        n_duplicates = days
            .iter()
            .zip(assets)
            .filter(|&key| !seen.insert(key))
            .count();
        if n_duplicates > 0 {
            warnings.push(format!("found {n_duplicates} duplicate (date, asset) pairs"));
        }

        let unique_days: BTreeSet<i32> = days.iter().copied().collect();
        n_dates = unique_days.len();
        n_assets = assets.iter().collect::<HashSet<_>>().len();
        if let (Some(&first), Some(&last)) = (unique_days.first(), unique_days.last()) {
            date_range = day_to_date(first).zip(day_to_date(last));
            avg_assets_per_date = n_rows as f64 / n_dates as f64;
        }

        let gaps = daily_gaps(&unique_days.into_iter().collect::<Vec<_>>());
        if gaps > 0 {
            warnings.push(format!(
                "found {gaps} gaps over {MAX_DAILY_GAP} days in what looks like daily data"
            ));
        }
    }

    let mut missing_share = BTreeMap::new();
    for column in table.get_columns() {
        let name = column.name().as_str();
        let numeric = column.dtype().is_float() || column.dtype().is_integer();
        if name == DATE || name == ASSET || !numeric {
            continue;
        }
        let share = if n_rows == 0 {
            0.0
        } else {
            missing_count(column) as f64 / n_rows as f64
        };
        if share > MISSING_WARN_SHARE {
            warnings.push(format!(
                "column `{name}` is {:.1}% missing",
                share * 100.0
            ));
        }
        missing_share.insert(name.to_string(), share);
    }

    PanelDiagnostics {
        is_valid_index: keys.is_some(),
        is_sorted,
        n_duplicates,
        n_dates,
        n_assets,
        n_rows,
        date_range,
        avg_assets_per_date,
        missing_share,
        warnings,
    }
}

fn missing_count(column: &Column) -> usize {
    let nan = match column.dtype() {
        DataType::Float32 | DataType::Float64 => column
            .as_materialized_series()
            .cast(&DataType::Float64)
            .ok()
            .and_then(|s| {
                s.f64()
                    .ok()
                    .map(|ca| ca.into_iter().filter(|v| v.is_some_and(f64::is_nan)).count())
            }),
        _ => None,
    };
    column.null_count() + nan.unwrap_or(0)
}

/// Number of gaps longer than a week, counted only when the median step
/// between dates is about one day.
fn daily_gaps(days: &[i32]) -> usize {
    let mut diffs: Vec<i32> = days.windows(2).map(|w| w[1] - w[0]).collect();
    if diffs.is_empty() {
        return 0;
    }
    diffs.sort_unstable();
    let mid = diffs.len() / 2;
    let median = if diffs.len() % 2 == 0 {
        f64::from(diffs[mid - 1] + diffs[mid]) / 2.0
    } else {
        f64::from(diffs[mid])
    };
    if !(0.8..1.5).contains(&median) {
        return 0;
    }
    diffs.iter().filter(|&&d| d > MAX_DAILY_GAP).count()
}

const fn mark(ok: bool) -> &'static str {
    if ok { "ok" } else { "FAIL" }
}

impl fmt::Display for PanelDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Panel diagnostics")?;
        writeln!(f, "{}", "=".repeat(40))?;
        writeln!(f, "[{}] index structure", mark(self.is_valid_index))?;
        writeln!(f, "[{}] sorted by (date, asset)", mark(self.is_sorted))?;
        writeln!(
            f,
            "[{}] duplicate keys: {}",
            mark(!self.has_duplicates()),
            self.n_duplicates
        )?;
        writeln!(
            f,
            "  shape: {} rows ({} dates x {} assets)",
            self.n_rows, self.n_dates, self.n_assets
        )?;
        match self.date_range {
            Some((first, last)) => writeln!(f, "  date range: {first} to {last}")?,
            None => writeln!(f, "  date range: n/a")?,
        }
        write!(f, "  avg assets/date: {:.1}", self.avg_assets_per_date)?;

        if !self.missing_share.is_empty() {
            write!(f, "\n\n  missing by column:")?;
            for (name, share) in &self.missing_share {
                let flag = if *share > MISSING_FLAG_SHARE { "!" } else { " " };
                write!(f, "\n  {flag} {name}: {:.1}%", share * 100.0)?;
            }
        }
        if !self.warnings.is_empty() {
            write!(f, "\n\nwarnings:")?;
            for warning in &self.warnings {
                write!(f, "\n  - {warning}")?;
            }
        }
        Ok(())
    }
}
