//! Universe masks.
//!
//! A universe says which (date, asset) pairs are eligible. Pairs the mask does
//! not mention are excluded, never included.

use crate::{
    Panel, Result,
    cross_section::{asset_ids, date_days, date_to_day, require_column},
    panel::validate_panel,
};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};

/// Default name of the boolean membership column in a mask frame.
pub const IN_UNIVERSE: &str = "in_universe";

/// Set of eligible (date, asset) pairs.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    members: HashMap<String, HashSet<i32>>,
}

impl Universe {
    /// Build from a `date`/`asset`-keyed mask frame with a boolean `column`.
    ///
    /// Rows whose flag is false or null are not members.
    pub fn from_frame(mask: &DataFrame, column: &str) -> Result<Self> {
        validate_panel(mask)?;
        let flags = require_column(mask, column)?.cast(&DataType::Boolean)?;
        let days = date_days(mask)?;
        let assets = asset_ids(mask)?;

        let mut universe = Self::default();
        for ((day, asset), flag) in days.into_iter().zip(assets).zip(flags.bool()?) {
            if flag == Some(true) {
                universe.members.entry(asset).or_default().insert(day);
            }
        }
        Ok(universe)
    }

    /// Build from an explicit list of eligible pairs.
    pub fn from_members<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, S)>,
        S: Into<String>,
    {
        let mut universe = Self::default();
        for (date, asset) in members {
            universe
                .members
                .entry(asset.into())
                .or_default()
                .insert(date_to_day(date));
        }
        universe
    }

    /// Whether `asset` is eligible on `date`.
    pub fn contains(&self, date: NaiveDate, asset: &str) -> bool {
        self.contains_day(date_to_day(date), asset)
    }

    fn contains_day(&self, day: i32, asset: &str) -> bool {
        self.members
            .get(asset)
            .is_some_and(|days| days.contains(&day))
    }

    /// Number of eligible pairs.
    pub fn len(&self) -> usize {
        self.members.values().map(HashSet::len).sum()
    }

    /// Whether no pair is eligible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keep only the panel rows that are members of the universe.
    pub fn apply(&self, panel: &Panel) -> Result<Panel> {
        let days = date_days(panel.frame())?;
        let assets = asset_ids(panel.frame())?;
        let keep: Vec<bool> = days
            .iter()
            .zip(&assets)
            .map(|(&day, asset)| self.contains_day(day, asset))
            .collect();

        let mask = BooleanChunked::from_slice(IN_UNIVERSE.into(), &keep);
        Ok(Panel::from_validated(panel.frame().filter(&mask)?))
    }
}
