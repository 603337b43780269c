//! Calendar alignment and point-in-time lagging.
//!
//! Forward-filling carries the last known value into later dates. A value
//! that was only published after its row's date must be lagged with
//! [`lag_by_asset`] before it is aligned, or the fill leaks it backwards in
//! time.

use crate::{
    EvalError, Panel, Result,
    cross_section::{asset_ids, date_column, date_days, date_to_day},
    panel::{ASSET, DATE, validate_panel},
};
use chrono::NaiveDate;
use derive_more::Display;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How gaps introduced by calendar alignment are filled.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignMethod {
    /// Leave gaps missing
    #[default]
    #[display("raw")]
    Raw,
    /// Carry each asset's last known value forward
    #[display("ffill")]
    Ffill,
}

/// Reindex `panel` to every (calendar date, asset) pair.
///
/// The calendar is sorted and deduplicated first. Assets keep their order of
/// first appearance in the panel. Rows on dates outside the calendar are
/// dropped; pairs the panel lacks are added with missing values, which
/// [`AlignMethod::Ffill`] fills from the same asset's previous calendar date.
///
/// # Errors
///
/// [`EvalError::InvalidPanel`] if the panel is malformed or holds duplicate
/// (date, asset) pairs.
pub fn align_to_calendar(
    panel: &Panel,
    calendar: &[NaiveDate],
    method: AlignMethod,
) -> Result<Panel> {
    validate_panel(panel.frame())?;
    let mut days: Vec<i32> = calendar.iter().copied().map(date_to_day).collect();
    days.sort_unstable();
    days.dedup();

    let row_days = date_days(panel.frame())?;
    let row_assets = asset_ids(panel.frame())?;
    let mut assets: Vec<&str> = Vec::new();
    let mut asset_pos: HashMap<&str, usize> = HashMap::new();
    let mut source: HashMap<(i32, usize), IdxSize> = HashMap::new();
    for (row, (&day, asset)) in row_days.iter().zip(&row_assets).enumerate() {
        let pos = *asset_pos.entry(asset.as_str()).or_insert_with(|| {
            assets.push(asset.as_str());
            assets.len() - 1
        });
        if source.insert((day, pos), row as IdxSize).is_some() {
            return Err(EvalError::InvalidPanel(format!(
                "duplicate (date, asset) pair for asset `{asset}`"
            )));
        }
    }

    let n_assets = assets.len();
    let take: IdxCa = days
        .iter()
        .flat_map(|&day| (0..n_assets).map(move |pos| (day, pos)))
        .map(|key| source.get(&key).copied())
        .collect();
    let mut frame = panel.frame().take(&take)?;

    let target_days: Vec<i32> = days
        .iter()
        .flat_map(|&day| std::iter::repeat_n(day, n_assets))
        .collect();
    let target_assets: Vec<&str> = (0..days.len()).flat_map(|_| assets.iter().copied()).collect();
    frame.with_column(date_column(target_days)?)?;
    frame.with_column(Column::new(ASSET.into(), target_assets))?;

    if method == AlignMethod::Ffill {
        forward_fill(&mut frame, days.len(), n_assets)?;
    }
    Ok(Panel::from_validated(frame))
}

/// Fill nulls of every value column from the same asset's previous row.
///
/// Rows are laid out date-major, so asset `a` on date `d` is row
/// `d * n_assets + a`.
fn forward_fill(frame: &mut DataFrame, n_days: usize, n_assets: usize) -> Result<()> {
    let value_columns: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != DATE && name.as_str() != ASSET)
        .map(|name| name.to_string())
        .collect();

    for name in value_columns {
        let series = frame.column(&name)?.as_materialized_series().clone();
        let valid = series.is_not_null();
        let mut source: Vec<Option<IdxSize>> = vec![None; n_days * n_assets];
        for asset in 0..n_assets {
            let mut last = None;
            for day in 0..n_days {
                let row = day * n_assets + asset;
                if valid.get(row) == Some(true) {
                    last = Some(row as IdxSize);
                }
                source[row] = last;
            }
        }
        let filled = series.take(&source.into_iter().collect::<IdxCa>())?;
        frame.with_column(filled)?;
    }
    Ok(())
}

/// Shift `columns` by `periods` rows within each asset.
///
/// Positive periods move values to later rows (a lag), so a value observed on
/// row `t` becomes visible on row `t + periods`. The panel must be sorted by
/// date within each asset.
///
/// # Errors
///
/// [`EvalError::MissingColumn`] naming every absent column.
pub fn lag_by_asset(panel: &Panel, columns: &[&str], periods: i64) -> Result<Panel> {
    validate_panel(panel.frame())?;
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|name| !panel.has_column(name))
        .collect();
    if !missing.is_empty() {
        return Err(EvalError::MissingColumn(missing.join(", ")));
    }

    let shifted: Vec<Expr> = columns
        .iter()
        .map(|&name| col(name).shift(lit(periods)).over([col(ASSET)]))
        .collect();
    let frame = panel.lazy().with_columns(shifted).collect()?;
    Ok(Panel::from_validated(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cross_section::float_values, ensure_panel_index};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn panel() -> Panel {
        let table = df![
            "date" => ["2020-01-02", "2020-01-02", "2020-01-03", "2020-01-06"],
            "asset" => ["B", "A", "B", "A"],
            "value" => [Some(1.0), Some(10.0), None, Some(30.0)],
        ]
        .unwrap();
        ensure_panel_index(&table, "date", "asset").unwrap()
    }

    #[test]
    fn test_align_raw_reindexes() {
        let calendar = [date(6), date(2), date(3), date(2)];
        let aligned = align_to_calendar(&panel(), &calendar, AlignMethod::Raw).unwrap();

        assert_eq!(aligned.height(), 6);
        assert_eq!(
            asset_ids(aligned.frame()).unwrap(),
            vec!["B", "A", "B", "A", "B", "A"]
        );
        assert_eq!(
            float_values(aligned.frame(), "value").unwrap(),
            vec![Some(1.0), Some(10.0), None, None, None, Some(30.0)]
        );
        assert_eq!(
            date_days(aligned.frame()).unwrap(),
            vec![18263, 18263, 18264, 18264, 18267, 18267]
        );
    }

    #[test]
    fn test_align_ffill_stays_within_asset() {
        let calendar = [date(1), date(2), date(3), date(6)];
        let aligned = align_to_calendar(&panel(), &calendar, AlignMethod::Ffill).unwrap();

        // Nothing to carry into the first calendar date.
        assert_eq!(
            float_values(aligned.frame(), "value").unwrap(),
            vec![None, None, Some(1.0), Some(10.0), Some(1.0), Some(10.0), Some(1.0), Some(30.0)]
        );
    }

    #[test]
    fn test_align_rejects_duplicates() {
        let table = df![
            "date" => ["2020-01-02", "2020-01-02"],
            "asset" => ["A", "A"],
            "value" => [1.0, 2.0],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        assert!(matches!(
            align_to_calendar(&panel, &[date(2)], AlignMethod::Raw),
            Err(EvalError::InvalidPanel(_))
        ));
    }

    #[test]
    fn test_lag_by_asset() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-02", "2020-01-03", "2020-01-01", "2020-01-02"],
            "asset" => ["A", "A", "A", "B", "B"],
            "eps" => [1.0, 2.0, 3.0, 7.0, 8.0],
            "close" => [10.0, 11.0, 12.0, 70.0, 80.0],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let lagged = lag_by_asset(&panel, &["eps"], 1).unwrap();

        assert_eq!(
            float_values(lagged.frame(), "eps").unwrap(),
            vec![None, Some(1.0), Some(2.0), None, Some(7.0)]
        );
        assert_eq!(
            float_values(lagged.frame(), "close").unwrap(),
            float_values(panel.frame(), "close").unwrap()
        );

        assert!(matches!(
            lag_by_asset(&panel, &["eps", "bvps", "sales"], 1),
            Err(EvalError::MissingColumn(name)) if name == "bvps, sales"
        ));
    }
}
