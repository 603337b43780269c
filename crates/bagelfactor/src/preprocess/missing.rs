//! Dropping rows with missing values.

use crate::{Panel, Result, cross_section::require_column};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Remove rows where `column` is null, or NaN for a float column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropNa {
    /// Column that must be present
    pub column: String,
}

impl DropNa {
    /// Drop rows with a missing `column`.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    /// Apply the filter to `panel`.
    pub fn transform(&self, panel: &Panel) -> Result<Panel> {
        let value = col(self.column.as_str());
        let present = if require_column(panel.frame(), &self.column)?.dtype().is_float() {
            value.clone().is_not_null().and(value.is_not_nan())
        } else {
            value.is_not_null()
        };
        let frame = panel.lazy().filter(present).collect()?;
        Ok(Panel::from_validated(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EvalError, ensure_panel_index};

    #[test]
    fn test_drop_na() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-01", "2020-01-02"],
            "asset" => ["A", "B", "A"],
            "factor" => [Some(1.0), None, Some(f64::NAN)],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let out = DropNa::new("factor").transform(&panel).unwrap();
        assert_eq!(out.height(), 1);

        assert!(matches!(
            DropNa::new("label").transform(&panel),
            Err(EvalError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_drop_na_text_column() {
        let table = df![
            "date" => ["2020-01-01", "2020-01-01", "2020-01-02"],
            "asset" => ["A", "B", "A"],
            "sector" => [Some("tech"), None, Some("energy")],
        ]
        .unwrap();
        let panel = ensure_panel_index(&table, "date", "asset").unwrap();
        let out = DropNa::new("sector").transform(&panel).unwrap();

        assert_eq!(out.height(), 2);
        let kept: Vec<Option<&str>> = out
            .frame()
            .column("sector")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(kept, vec![Some("tech"), Some("energy")]);
    }
}
