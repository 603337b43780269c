#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/bagelfactor/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod align;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod job;
pub mod metrics;
pub mod panel;
pub mod preprocess;
pub mod result;
pub mod universe;

mod cross_section;
mod stats;

// Re-export core types
pub use align::{AlignMethod, align_to_calendar, lag_by_asset};
pub use config::JobConfig;
pub use diagnostics::{PanelDiagnostics, diagnose_panel};
pub use error::{EvalError, Result};
pub use job::{SingleFactorJob, run};
pub use metrics::{
    IcMethod, assign_quantiles, coverage_by_date, ic_series, icir, long_short, quantile_returns,
    quantile_turnover,
};
pub use panel::{
    Panel, add_forward_returns, add_returns, ensure_panel_index, forward_return_column,
    sort_index, validate_panel,
};
pub use preprocess::{Clip, DropNa, Pipeline, Rank, Transform, ZScore};
pub use result::{EvaluationResult, HorizonResult, HorizonSummary};
pub use stats::TieBreak;
pub use universe::Universe;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
