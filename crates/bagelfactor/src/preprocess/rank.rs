//! Cross-sectional ranking.

use crate::{Panel, Result, cross_section::require_column, panel::DATE, stats::TieBreak};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Replace a column by its per-date rank.
///
/// Ranks start at 1. With `pct` they are divided by the number of valid
/// values that date (by the highest rank for [`TieBreak::Dense`]), landing in
/// `(0, 1]`. Missing values stay missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    /// Column to rank
    pub column: String,
    /// Scale ranks to `(0, 1]`
    #[serde(default)]
    pub pct: bool,
    /// How ties are ranked
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Rank {
    /// Rank `column` with the given scaling and tie-break.
    pub fn new(column: impl Into<String>, pct: bool, tie_break: TieBreak) -> Self {
        Self {
            column: column.into(),
            pct,
            tie_break,
        }
    }

    /// Percentile ranks with row-order tie-break.
    pub fn pct(column: impl Into<String>) -> Self {
        Self::new(column, true, TieBreak::First)
    }

    /// Apply the ranking to `panel`.
    pub fn transform(&self, panel: &Panel) -> Result<Panel> {
        let name = self.column.as_str();
        require_column(panel.frame(), name)?;

        let options = RankOptions {
            method: rank_method(self.tie_break),
            descending: false,
        };
        let ranked = col(name)
            .strict_cast(DataType::Float64)
            .fill_nan(lit(NULL))
            .rank(options, None)
            .over([col(DATE)])
            .cast(DataType::Float64);
        let mut frame = panel.lazy().with_column(ranked.alias(name));
        if self.pct {
            // Ranks are null exactly where the value is missing.
            let scale = match self.tie_break {
                TieBreak::Dense => col(name).max().over([col(DATE)]),
                _ => col(name).count().over([col(DATE)]),
            };
            frame = frame.with_column((col(name) / scale.cast(DataType::Float64)).alias(name));
        }
        let frame = frame.collect()?;
        Ok(Panel::from_validated(frame))
    }
}

const fn rank_method(tie_break: TieBreak) -> RankMethod {
    match tie_break {
        TieBreak::First => RankMethod::Ordinal,
        TieBreak::Average => RankMethod::Average,
        TieBreak::Min => RankMethod::Min,
        TieBreak::Max => RankMethod::Max,
        TieBreak::Dense => RankMethod::Dense,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cross_section::float_values, ensure_panel_index};

    fn panel() -> Panel {
        let table = df![
            "date" => ["2020-01-01", "2020-01-01", "2020-01-01", "2020-01-01", "2020-01-02", "2020-01-02"],
            "asset" => ["A", "B", "C", "D", "A", "B"],
            "factor" => [Some(0.3), Some(0.1), None, Some(0.3), Some(7.0), Some(-7.0)],
        ]
        .unwrap();
        ensure_panel_index(&table, "date", "asset").unwrap()
    }

    #[test]
    fn test_rank_raw() {
        let out = Rank::new("factor", false, TieBreak::Average)
            .transform(&panel())
            .unwrap();
        assert_eq!(
            float_values(out.frame(), "factor").unwrap(),
            vec![Some(2.5), Some(1.0), None, Some(2.5), Some(2.0), Some(1.0)]
        );
    }

    #[test]
    fn test_rank_pct() {
        let out = Rank::pct("factor").transform(&panel()).unwrap();
        let r = float_values(out.frame(), "factor").unwrap();
        assert_eq!(r[0], Some(2.0 / 3.0));
        assert_eq!(r[1], Some(1.0 / 3.0));
        assert_eq!(r[2], None);
        assert_eq!(r[3], Some(1.0));
        assert_eq!(&r[4..], &[Some(1.0), Some(0.5)]);
    }

    #[test]
    fn test_rank_dense_pct() {
        let out = Rank::new("factor", true, TieBreak::Dense)
            .transform(&panel())
            .unwrap();
        let r = float_values(out.frame(), "factor").unwrap();
        assert_eq!(&r[..4], &[Some(1.0), Some(0.5), None, Some(1.0)]);
    }

    #[test]
    fn test_rank_interleaved_dates() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-02", "2020-01-01", "2020-01-02", "2020-01-01"],
            "asset" => ["A", "A", "B", "B", "C"],
            "factor" => [Some(5i64), Some(1), Some(3), None, Some(4)],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let out = Rank::new("factor", false, TieBreak::First)
            .transform(&panel)
            .unwrap();

        assert_eq!(
            float_values(out.frame(), "factor").unwrap(),
            vec![Some(3.0), Some(1.0), Some(1.0), None, Some(2.0)]
        );
    }
}
