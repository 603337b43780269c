//! Canonical (date, asset) panel.
//!
//! Every metric consumes a [`Panel`]: a polars `DataFrame` whose key columns
//! are `date` (polars `Date`) and `asset` (polars `String`), plus any number
//! of value columns. Keys are expected to be unique and rows sorted by
//! `(date, asset)`, but neither is enforced. Unsorted input makes the
//! "previous row" computations ([`add_forward_returns`], [`add_returns`],
//! turnover) silently wrong; call [`sort_index`] first when in doubt, or run
//! [`crate::diagnose_panel`] to check.

use crate::{
    EvalError, Result,
    cross_section::{date_to_day, require_column},
};
use chrono::NaiveDate;
use polars::prelude::*;

/// Name of the date key column.
pub const DATE: &str = "date";

/// Name of the asset key column.
pub const ASSET: &str = "asset";

/// Name of the trailing return column added by [`add_returns`].
pub const RETURN: &str = "ret";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Column name of the forward return label for `horizon`.
pub fn forward_return_column(horizon: usize) -> String {
    format!("ret_fwd_{horizon}")
}

/// A validated (date, asset)-keyed table.
#[derive(Debug, Clone)]
pub struct Panel {
    frame: DataFrame,
}

impl Panel {
    /// Wrap a frame that is already keyed by `date`/`asset`.
    pub fn new(frame: DataFrame) -> Result<Self> {
        validate_panel(&frame)?;
        Ok(Self { frame })
    }

    /// Wrap a frame derived from a valid panel without re-checking the keys.
    pub(crate) const fn from_validated(frame: DataFrame) -> Self {
        Self { frame }
    }

    /// Underlying frame.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Consume the panel, returning the underlying frame.
    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Whether the panel has a column called `name`.
    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    pub(crate) fn require_column(&self, name: &str) -> Result<()> {
        require_column(&self.frame, name).map(|_| ())
    }

    pub(crate) fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }
}

/// Normalize an arbitrary table into a [`Panel`].
///
/// Renames `date_column`/`asset_column` to `date`/`asset`, parses dates
/// (`Date`, `Datetime`, or `YYYY-MM-DD`-style strings) to `Date`, casts the
/// asset identifier to a string and moves both keys to the front. NaN in any
/// float column becomes null; the column keeps its dtype. A table that
/// is already keyed passes through unchanged. Rows are not sorted.
///
/// # Errors
///
/// [`EvalError::MissingColumn`] if either key column is absent, and
/// [`EvalError::InvalidPanel`] if a key contains nulls, a date fails to parse,
/// or a renamed key would collide with an existing column.
pub fn ensure_panel_index(
    table: &DataFrame,
    date_column: &str,
    asset_column: &str,
) -> Result<Panel> {
    if date_column == asset_column {
        return Err(EvalError::parameter(
            "asset_column",
            "date and asset keys must be different columns",
        ));
    }
    require_column(table, date_column)?;
    require_column(table, asset_column)?;

    let mut frame = table.clone();
    rename_key(&mut frame, date_column, DATE)?;
    rename_key(&mut frame, asset_column, ASSET)?;

    let dates = parse_dates(require_column(&frame, DATE)?)?;
    frame.with_column(dates)?;
    let assets = require_column(&frame, ASSET)?.cast(&DataType::String)?;
    frame.with_column(assets)?;

    let nan_to_null: Vec<Expr> = float_column_names(&frame)
        .into_iter()
        .map(|name| col(name.as_str()).fill_nan(lit(NULL)))
        .collect();
    let frame = frame.lazy().with_columns(nan_to_null).collect()?;

    let mut order: Vec<PlSmallStr> = vec![DATE.into(), ASSET.into()];
    order.extend(
        frame
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != DATE && name.as_str() != ASSET)
            .cloned(),
    );
    let frame = frame.select(order)?;

    Panel::new(frame)
}

fn rename_key(frame: &mut DataFrame, from: &str, to: &str) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if frame.get_column_index(to).is_some() {
        return Err(EvalError::InvalidPanel(format!(
            "cannot use `{from}` as the {to} key: a `{to}` column already exists"
        )));
    }
    frame.rename(from, to.into())?;
    Ok(())
}

fn parse_dates(column: &Column) -> Result<Column> {
    match column.dtype() {
        DataType::Date => Ok(column.clone()),
        DataType::Datetime(_, _) => Ok(column.cast(&DataType::Date)?),
        DataType::String => {
            let days = column
                .str()?
                .into_iter()
                .map(|raw| {
                    let raw = raw.ok_or_else(|| {
                        EvalError::InvalidPanel("null value in date key".to_string())
                    })?;
                    parse_date(raw).map(date_to_day)
                })
                .collect::<Result<Vec<i32>>>()?;
            Ok(Column::from(
                Series::new(DATE.into(), days).cast(&DataType::Date)?,
            ))
        }
        other => Err(EvalError::InvalidPanel(format!(
            "date key has unsupported type {other}"
        ))),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    // Accept a trailing time component, e.g. "2020-01-02 00:00:00".
    let day_part = trimmed.split([' ', 'T']).next().unwrap_or(trimmed);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day_part, fmt).ok())
        .ok_or_else(|| EvalError::InvalidPanel(format!("cannot parse `{raw}` as a date")))
}

fn float_column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::Float64 | DataType::Float32))
        .map(|c| c.name().to_string())
        .collect()
}

/// Check that `table` is keyed by `date` (Date) and `asset` (String) with no
/// null keys.
///
/// This is a shape check only: unsorted or duplicated keys pass.
pub fn validate_panel(table: &DataFrame) -> Result<()> {
    check_key(table, DATE, &DataType::Date)?;
    check_key(table, ASSET, &DataType::String)
}

fn check_key(table: &DataFrame, name: &str, dtype: &DataType) -> Result<()> {
    let column = table.column(name).map_err(|_| {
        EvalError::InvalidPanel(format!(
            "expected key columns [{DATE}, {ASSET}], found {:?}",
            table.get_column_names()
        ))
    })?;
    if column.dtype() != dtype {
        return Err(EvalError::InvalidPanel(format!(
            "key `{name}` must be {dtype}, found {}",
            column.dtype()
        )));
    }
    if column.null_count() > 0 {
        return Err(EvalError::InvalidPanel(format!(
            "key `{name}` contains {} null values",
            column.null_count()
        )));
    }
    Ok(())
}

/// Stable sort by `(date, asset)`.
pub fn sort_index(panel: &Panel) -> Result<Panel> {
    let sorted = panel.frame().sort(
        [DATE, ASSET],
        SortMultipleOptions::default().with_maintain_order(true),
    )?;
    Ok(Panel::from_validated(sorted))
}

/// Add `ret_fwd_{h}` = price(t + h) / price(t) - 1 for every horizon.
///
/// The shift runs within each asset's own rows, so the panel must already be
/// sorted by date within asset. The last `h` rows of each asset are missing.
pub fn add_forward_returns(panel: &Panel, price_column: &str, horizons: &[usize]) -> Result<Panel> {
    panel.require_column(price_column)?;
    if let Some(&bad) = horizons.iter().find(|&&h| h == 0) {
        return Err(EvalError::parameter(
            "horizons",
            format!("horizon must be at least 1, got {bad}"),
        ));
    }

    let price = col(price_column).cast(DataType::Float64);
    let labels: Vec<Expr> = horizons
        .iter()
        .map(|&h| {
            (price.clone().shift(lit(-(h as i64))).over([col(ASSET)]) / price.clone() - lit(1.0))
                .alias(forward_return_column(h))
        })
        .collect();

    let frame = panel.lazy().with_columns(labels).collect()?;
    Ok(Panel::from_validated(frame))
}

/// Add the single-period trailing return `ret` = price(t) / price(t - 1) - 1.
///
/// The first row of each asset is missing.
pub fn add_returns(panel: &Panel, price_column: &str) -> Result<Panel> {
    panel.require_column(price_column)?;

    let price = col(price_column).cast(DataType::Float64);
    let frame = panel
        .lazy()
        .with_column(
            (price.clone() / price.shift(lit(1)).over([col(ASSET)]) - lit(1.0)).alias(RETURN),
        )
        .collect()?;
    Ok(Panel::from_validated(frame))
}
