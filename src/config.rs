//! Analysis settings (spec.md §6, SPEC_FULL §4.M): the knobs that control
//! what [`crate::analysis::AnalysisFacade`] computes and how thoroughly.

use crate::error::ScramError;
use serde::{Deserialize, Serialize};

/// How the top-event probability is derived from enumerated cut sets
/// (spec.md §9 Design Notes: BDD/ZBDD is out of scope, so the façade only
/// ever offers these two closed-form approximations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApproximationMode {
    /// Sum of cut-set probabilities; a conservative over-estimate, exact in
    /// the limit of small probabilities.
    RareEvent,
    /// `1 - prod(1 - P(cutset))`, the min-cut-upper-bound approximation.
    Mcub,
}

impl Default for ApproximationMode {
    fn default() -> Self {
        ApproximationMode::RareEvent
    }
}

/// Settings governing one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisSettings {
    pub probability_analysis: bool,
    pub importance_analysis: bool,
    pub uncertainty_analysis: bool,
    pub sil_analysis: bool,
    pub mission_time_hours: f64,
    pub number_of_trials: usize,
    pub cut_set_order: usize,
    pub approximation: ApproximationMode,
    pub seed: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            probability_analysis: true,
            importance_analysis: false,
            uncertainty_analysis: false,
            sil_analysis: false,
            mission_time_hours: 8760.0,
            number_of_trials: 1_000,
            cut_set_order: 4,
            approximation: ApproximationMode::RareEvent,
            seed: 1,
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> Result<(), ScramError> {
        if self.mission_time_hours < 0.0 {
            return Err(ScramError::Settings("mission-time-hours must be non-negative".into()));
        }
        if self.number_of_trials == 0 {
            return Err(ScramError::Settings("number-of-trials must be at least 1".into()));
        }
        if self.cut_set_order == 0 {
            return Err(ScramError::Settings("cut-set-order must be at least 1".into()));
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ScramError> {
        toml::from_str(s).map_err(|e| ScramError::Settings(e.to_string()))
    }
}
