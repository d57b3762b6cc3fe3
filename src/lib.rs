//! SCRAM: a probabilistic risk / safety analysis engine (spec.md §1).
//!
//! The crate is organized bottom-up: [`error`] and [`model`] define the
//! in-memory Model of Events, Formulae, Expressions, and CCF groups;
//! [`validator`] checks a model's referential and structural integrity;
//! [`analysis`] is the read-only façade that turns a validated model into
//! probabilities, importance factors, uncertainty bounds, and SIL figures;
//! [`mef`] reads and writes the Model Exchange Format XML documents that
//! carry models and reports between runs; [`config`] holds the settings
//! that steer an analysis; and [`cli`] is the `scram` binary's command
//! surface.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod mef;
pub mod model;
pub mod validator;

pub use analysis::{AnalysisFacade, Importance, SilBand, UncertaintyResult};
pub use cli::{Cli, CliError, CliRunner, Commands};
pub use config::AnalysisSettings;
pub use error::{ScramError, SourceSpan};
pub use model::Model;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mef::read_model_str;

    const MINIMAL_AND_GATE: &str = r#"
        <opsa-mef>
          <define-fault-tree name="Example">
            <define-gate name="Top">
              <and>
                <basic-event name="A"/>
                <basic-event name="B"/>
              </and>
            </define-gate>
            <define-basic-event name="A">
              <float value="0.1"/>
            </define-basic-event>
            <define-basic-event name="B">
              <float value="0.2"/>
            </define-basic-event>
          </define-fault-tree>
        </opsa-mef>
    "#;

    #[test]
    fn reads_validates_and_analyzes_a_minimal_model() {
        let mut model = read_model_str(MINIMAL_AND_GATE, None).unwrap();
        model.recompute_orphans();
        validator::validate(&model, SourceSpan::unknown()).unwrap();

        let tree = &model.fault_trees[0];
        let top = &tree.top_gates()[0];

        let facade = AnalysisFacade::new(&model, AnalysisSettings::default()).unwrap();
        let probability = facade.probability_at(top, 8760.0).unwrap();
        assert!((probability - 0.02).abs() < 1e-9);
    }
}
