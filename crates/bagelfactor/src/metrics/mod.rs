//! Single-factor evaluation metrics.
//!
//! Each metric is a pure function of a panel (or of a previous metric's
//! output) and returns a freshly allocated frame keyed by `date`. Degenerate
//! cross-sections produce missing values, never errors.

pub mod coverage;
pub mod ic;
pub mod quantiles;
pub mod turnover;

pub use coverage::{COVERAGE, coverage_by_date};
pub use ic::{IC, IcMethod, ic_series, icir};
pub use quantiles::{LONG_SHORT, QUANTILE, assign_quantiles, long_short, quantile_column, quantile_returns};
pub use turnover::{TURNOVER, quantile_turnover};
