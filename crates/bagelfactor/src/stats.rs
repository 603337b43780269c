//! Small numeric kernels: ranking, moments and correlation.

use crate::EvalError;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How equal values are ranked within a cross-section.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Ties ordered by row order; every rank is distinct
    #[default]
    #[display("first")]
    First,
    /// Ties share the mean of the ranks they span
    #[display("average")]
    Average,
    /// Ties share the lowest rank they span
    #[display("min")]
    Min,
    /// Ties share the highest rank they span
    #[display("max")]
    Max,
    /// Like `Min`, but ranks increase by one between groups
    #[display("dense")]
    Dense,
}

impl FromStr for TieBreak {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first" => Ok(Self::First),
            "average" => Ok(Self::Average),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "dense" => Ok(Self::Dense),
            other => Err(EvalError::parameter(
                "tie_break",
                format!("unknown tie-break `{other}` (expected first, average, min, max or dense)"),
            )),
        }
    }
}

/// 1-based ranks of `values`. The sort is stable, so `First` follows input order.
pub(crate) fn rank(values: &[f64], tie_break: TieBreak) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; n];
    if tie_break == TieBreak::First {
        for (pos, &idx) in order.iter().enumerate() {
            ranks[idx] = (pos + 1) as f64;
        }
        return ranks;
    }

    let mut dense = 0usize;
    let mut start = 0usize;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        dense += 1;
        let shared = match tie_break {
            TieBreak::Average => (start + 1 + end) as f64 / 2.0,
            TieBreak::Min => (start + 1) as f64,
            TieBreak::Max => end as f64,
            TieBreak::Dense | TieBreak::First => dense as f64,
        };
        for &idx in &order[start..end] {
            ranks[idx] = shared;
        }
        start = end;
    }
    ranks
}

/// True when every value equals the first one (vacuously for empty input).
pub(crate) fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub(crate) fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (values.len() - ddof) as f64).sqrt())
}

/// Pearson correlation; `None` below two points or when either side is constant.
pub(crate) fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    debug_assert_eq!(x.len(), y.len());
    if x.len() < 2 || is_constant(x) || is_constant(y) {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    Some(sxy / (sxx * syy).sqrt())
}
