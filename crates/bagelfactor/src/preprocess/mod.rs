//! Cross-sectional preprocessing applied to the factor before evaluation.
//!
//! A [`Pipeline`] is an ordered list of [`Transform`]s. Each step reads one
//! panel and returns a new one; steps run strictly in declaration order.

pub mod clip;
pub mod missing;
pub mod rank;
pub mod standardize;

pub use clip::Clip;
pub use missing::DropNa;
pub use rank::Rank;
pub use standardize::ZScore;

use crate::{Panel, Result};
use derive_more::From;
use serde::{Deserialize, Serialize};

/// One preprocessing step.
#[derive(Debug, Clone, PartialEq, From, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    /// Bound values to a range
    Clip(Clip),
    /// Per-date z-score
    ZScore(ZScore),
    /// Per-date rank
    Rank(Rank),
    /// Drop rows with a missing value
    DropNa(DropNa),
}

impl Transform {
    /// Column the step reads and writes.
    pub fn column(&self) -> &str {
        match self {
            Self::Clip(step) => &step.column,
            Self::ZScore(step) => &step.column,
            Self::Rank(step) => &step.column,
            Self::DropNa(step) => &step.column,
        }
    }

    /// Learn state from `panel` before transforming.
    ///
    /// Every current step is stateless, so fitting only checks that the
    /// column exists.
    pub fn fit(&mut self, panel: &Panel) -> Result<()> {
        panel.require_column(self.column())
    }

    /// Apply the step to `panel`.
    pub fn transform(&self, panel: &Panel) -> Result<Panel> {
        match self {
            Self::Clip(step) => step.transform(panel),
            Self::ZScore(step) => step.transform(panel),
            Self::Rank(step) => step.transform(panel),
            Self::DropNa(step) => step.transform(panel),
        }
    }
}

/// Ordered sequence of preprocessing steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline {
    steps: Vec<Transform>,
}

impl Pipeline {
    /// Build a pipeline from steps in execution order.
    pub fn new<I, T>(steps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Transform>,
    {
        Self {
            steps: steps.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a step.
    pub fn with_step(mut self, step: impl Into<Transform>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[Transform] {
        &self.steps
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Fit every step on the output of the steps before it.
    pub fn fit(&mut self, panel: &Panel) -> Result<()> {
        self.fit_transform(panel).map(|_| ())
    }

    /// Fit every step, then return the fully transformed panel.
    pub fn fit_transform(&mut self, panel: &Panel) -> Result<Panel> {
        let mut out = panel.clone();
        for step in &mut self.steps {
            step.fit(&out)?;
            out = step.transform(&out)?;
        }
        Ok(out)
    }

    /// Run every step in order.
    pub fn transform(&self, panel: &Panel) -> Result<Panel> {
        self.steps
            .iter()
            .try_fold(panel.clone(), |out, step| step.transform(&out))
    }
}
