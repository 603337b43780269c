//! Bounding values to a fixed range.

use crate::{EvalError, Panel, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Clip a column to `[lower, upper]`; either bound may be left open.
///
/// Missing values stay missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Column to clip
    pub column: String,
    /// Lower bound, open if `None`
    pub lower: Option<f64>,
    /// Upper bound, open if `None`
    pub upper: Option<f64>,
}

impl Clip {
    /// Clip `column` to `[lower, upper]`.
    pub fn new(column: impl Into<String>, lower: Option<f64>, upper: Option<f64>) -> Self {
        Self {
            column: column.into(),
            lower,
            upper,
        }
    }

    /// Apply the clip to `panel`.
    pub fn transform(&self, panel: &Panel) -> Result<Panel> {
        panel.require_column(&self.column)?;
        if let (Some(lo), Some(hi)) = (self.lower, self.upper)
            && lo > hi
        {
            return Err(EvalError::parameter(
                "lower",
                format!("lower bound {lo} exceeds upper bound {hi}"),
            ));
        }

        let value = col(self.column.as_str()).cast(DataType::Float64);
        let clipped = match (self.lower, self.upper) {
            (Some(lo), Some(hi)) => when(value.clone().lt(lit(lo)))
                .then(lit(lo))
                .when(value.clone().gt(lit(hi)))
                .then(lit(hi))
                .otherwise(value),
            (Some(lo), None) => when(value.clone().lt(lit(lo)))
                .then(lit(lo))
                .otherwise(value),
            (None, Some(hi)) => when(value.clone().gt(lit(hi)))
                .then(lit(hi))
                .otherwise(value),
            (None, None) => value,
        };

        let frame = panel
            .lazy()
            .with_column(clipped.alias(self.column.as_str()))
            .collect()?;
        Ok(Panel::from_validated(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cross_section::float_values, ensure_panel_index};

    fn panel() -> Panel {
        let table = df![
            "date" => ["2020-01-01", "2020-01-01", "2020-01-01", "2020-01-01"],
            "asset" => ["A", "B", "C", "D"],
            "factor" => [Some(-5.0), Some(0.5), None, Some(9.0)],
        ]
        .unwrap();
        ensure_panel_index(&table, "date", "asset").unwrap()
    }

    #[test]
    fn test_clip_both_bounds() {
        let out = Clip::new("factor", Some(-1.0), Some(1.0))
            .transform(&panel())
            .unwrap();
        assert_eq!(
            float_values(out.frame(), "factor").unwrap(),
            vec![Some(-1.0), Some(0.5), None, Some(1.0)]
        );
    }

    #[test]
    fn test_clip_open_bound() {
        let out = Clip::new("factor", None, Some(1.0)).transform(&panel()).unwrap();
        assert_eq!(
            float_values(out.frame(), "factor").unwrap(),
            vec![Some(-5.0), Some(0.5), None, Some(1.0)]
        );
    }

    #[test]
    fn test_clip_rejects_inverted_bounds() {
        assert!(matches!(
            Clip::new("factor", Some(2.0), Some(1.0)).transform(&panel()),
            Err(EvalError::InvalidParameter { .. })
        ));
    }
}
