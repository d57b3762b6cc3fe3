//! Subcommand bodies for the `scram` binary (spec.md §6, SPEC_FULL §4.L).

use crate::analysis::{AnalysisFacade, Importance};
use crate::config::AnalysisSettings;
use crate::error::{ScramError, SourceSpan};
use crate::mef::{AnalysisReport, FaultTreeReport, ReportWriter};
use crate::model::event::Gate;
use crate::model::formula::{Formula, FormulaArg};
use crate::model::Model;
use crate::validator;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::rc::Rc;

use super::Cli;

pub struct CliRunner {
    verbose: bool,
    config_path: Option<PathBuf>,
}

impl CliRunner {
    pub fn new(cli: &Cli) -> Self {
        init_logging(cli.verbose);
        Self {
            verbose: cli.verbose,
            config_path: cli.config.clone(),
        }
    }

    pub fn run(&self, command: super::Commands) -> Result<(), CliError> {
        match command {
            super::Commands::Validate { input } => self.run_validate(input),
            super::Commands::Analyze {
                input,
                report,
                mission_time,
                trials,
                sil,
            } => self.run_analyze(input, report, mission_time, trials, sil),
            super::Commands::Explain { input, event_id } => self.run_explain(input, event_id),
        }
    }

    fn run_validate(&self, inputs: Vec<PathBuf>) -> Result<(), CliError> {
        tracing::info!(files = inputs.len(), "validating model");
        let model = self.load_and_prepare(&inputs)?;
        println!(
            "OK: {} fault tree(s), {} basic event(s), {} CCF group(s)",
            model.fault_trees.len(),
            model.basic_events().count(),
            model.ccf_groups.len()
        );
        Ok(())
    }

    fn run_analyze(
        &self,
        inputs: Vec<PathBuf>,
        report_path: Option<PathBuf>,
        mission_time: Option<f64>,
        trials: Option<usize>,
        sil: bool,
    ) -> Result<(), CliError> {
        tracing::info!(files = inputs.len(), "analyzing model");
        let model = self.load_and_prepare(&inputs)?;

        let mut settings = self.settings()?;
        if let Some(hours) = mission_time {
            settings.mission_time_hours = hours;
        }
        if let Some(n) = trials {
            settings.number_of_trials = n;
        }
        if sil {
            settings.sil_analysis = true;
        }
        settings.validate().map_err(CliError::Scram)?;

        let facade = AnalysisFacade::new(&model, settings.clone()).map_err(CliError::Scram)?;
        let mut report = AnalysisReport {
            mission_time_hours: settings.mission_time_hours,
            trees: Vec::new(),
        };

        for tree in &model.fault_trees {
            for gate in tree.top_gates() {
                self.log(&format!("analyzing top gate {}", gate.id()));
                report.trees.push(self.analyze_gate(&facade, gate, &settings)?);
            }
        }

        let writer = ReportWriter::new();
        match report_path {
            Some(path) => {
                writer.write_to_file(&path, &report).map_err(CliError::Scram)?;
                println!("wrote report to {}", path.display());
            }
            None => print!("{}", writer.write_to_string(&report).map_err(CliError::Scram)?),
        }
        Ok(())
    }

    fn analyze_gate(
        &self,
        facade: &AnalysisFacade<'_>,
        gate: &Rc<Gate>,
        settings: &AnalysisSettings,
    ) -> Result<FaultTreeReport, CliError> {
        let top_probability = facade
            .probability_at(gate, settings.mission_time_hours)
            .map_err(CliError::Scram)?;

        let basic_ids = gate_basic_ids(gate);
        let products = crate::analysis::minimal_cut_sets(&gate.formula(), &basic_ids, settings.cut_set_order);

        let importance = if settings.importance_analysis {
            self.importance_for_each(facade, gate, &basic_ids, settings.mission_time_hours)?
        } else {
            Vec::new()
        };

        let uncertainty = if settings.uncertainty_analysis {
            Some(self.uncertainty_with_progress(facade, gate, settings)?)
        } else {
            None
        };

        let (pfd_avg, pfh, sil_band) = if settings.sil_analysis {
            let pfd_avg = facade
                .pfd_avg(gate, settings.mission_time_hours, 50)
                .map_err(CliError::Scram)?;
            let pfh = facade.pfh(gate, settings.mission_time_hours).map_err(CliError::Scram)?;
            (
                Some(pfd_avg),
                Some(pfh),
                Some(crate::analysis::sil_band_low_demand(pfd_avg)),
            )
        } else {
            (None, None, None)
        };

        Ok(FaultTreeReport {
            name: gate.name().to_string(),
            top_probability,
            products,
            importance,
            uncertainty,
            pfd_avg,
            pfh,
            sil_band,
        })
    }

    fn importance_for_each(
        &self,
        facade: &AnalysisFacade<'_>,
        gate: &Rc<Gate>,
        basic_ids: &[String],
        hours: f64,
    ) -> Result<Vec<(String, Importance)>, CliError> {
        let mut out = Vec::with_capacity(basic_ids.len());
        for id in basic_ids {
            let importance = facade.importance(gate, id, hours).map_err(CliError::Scram)?;
            out.push((id.clone(), importance));
        }
        Ok(out)
    }

    fn uncertainty_with_progress(
        &self,
        facade: &AnalysisFacade<'_>,
        gate: &Rc<Gate>,
        settings: &AnalysisSettings,
    ) -> Result<crate::analysis::UncertaintyResult, CliError> {
        let bar = ProgressBar::new(settings.number_of_trials as u64);
        bar.set_style(
            ProgressStyle::with_template("{wide_bar} {pos}/{len} trials, elapsed: {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.tick();
        let result = facade
            .uncertainty(gate, settings.mission_time_hours, settings.number_of_trials)
            .map_err(CliError::Scram)?;
        bar.finish_and_clear();
        Ok(result)
    }

    fn run_explain(&self, input: PathBuf, event_id: String) -> Result<(), CliError> {
        let model = self.load_and_prepare(&[input])?;
        let settings = self.settings()?;
        let facade = AnalysisFacade::new(&model, settings.clone()).map_err(CliError::Scram)?;

        if model.basic_event(&event_id).is_none() {
            return Err(CliError::Scram(ScramError::UndefinedElement {
                id: event_id,
                span: SourceSpan::unknown(),
            }));
        }

        let mut found = false;
        for tree in &model.fault_trees {
            for gate in tree.top_gates() {
                if !gate_basic_ids(gate).iter().any(|id| id == &event_id) {
                    continue;
                }
                found = true;
                let importance = facade
                    .importance(gate, &event_id, settings.mission_time_hours)
                    .map_err(CliError::Scram)?;
                println!(
                    "{} / {}: fussell-vesely={:.6} birnbaum={:.6} raw={:.6} rrw={:.6}",
                    gate.name(),
                    event_id,
                    importance.fussell_vesely,
                    importance.birnbaum,
                    importance.raw,
                    importance.rrw
                );
            }
        }

        if !found {
            return Err(CliError::Scram(ScramError::UndefinedElement {
                id: event_id,
                span: SourceSpan::unknown(),
            }));
        }
        Ok(())
    }

    fn load_and_prepare(&self, inputs: &[PathBuf]) -> Result<Model, CliError> {
        let mut model = load_model(inputs).map_err(CliError::Scram)?;
        model.expand_ccf_groups(SourceSpan::unknown()).map_err(CliError::Scram)?;
        model.recompute_orphans();
        validator::validate(&model, SourceSpan::unknown()).map_err(CliError::Scram)?;
        Ok(model)
    }

    fn settings(&self) -> Result<AnalysisSettings, CliError> {
        match &self.config_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                AnalysisSettings::from_toml_str(&text).map_err(CliError::Scram)
            }
            None => Ok(AnalysisSettings::default()),
        }
    }

    fn log(&self, message: &str) {
        if self.verbose {
            tracing::debug!("{}", message);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "scram=debug,info" } else { "scram=info,warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_model(inputs: &[PathBuf]) -> Result<Model, ScramError> {
    let mut model: Option<Model> = None;
    for path in inputs {
        let parsed = crate::mef::read_model_file(path)?;
        match model.as_mut() {
            None => model = Some(parsed),
            Some(existing) => merge_into(existing, parsed),
        }
    }
    model.ok_or_else(|| ScramError::invalid_argument("no input files given", SourceSpan::unknown()))
}

/// Folds `source` into `target`: every fault tree, parameter, and CCF
/// group becomes part of one combined model, the way a multi-file MEF
/// input set is treated as a single document (spec.md §6).
fn merge_into(target: &mut Model, source: Model) {
    for parameter in source.parameters.iter() {
        target.parameters.add(parameter.clone());
    }
    target.ccf_groups.extend(source.ccf_groups);
    for tree in source.fault_trees {
        target.add_fault_tree(tree);
    }
}

fn gate_basic_ids(gate: &Rc<Gate>) -> Vec<String> {
    let mut ids = Vec::new();
    collect_basic_ids(&gate.formula(), &mut ids);
    ids
}

fn collect_basic_ids(formula: &Formula, ids: &mut Vec<String>) {
    for arg in formula.args() {
        match arg {
            FormulaArg::Basic(b) => match b.ccf_gate() {
                Some(gate) => collect_basic_ids(&gate.formula(), ids),
                None => {
                    let id = b.id().to_string();
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            },
            FormulaArg::Gate(g) => collect_basic_ids(&g.formula(), ids),
            FormulaArg::Nested(f) => collect_basic_ids(f, ids),
            FormulaArg::House(_) => {}
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Scram(#[from] ScramError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Io(_) => 2,
            CliError::Scram(e) => e.exit_code(),
        }
    }
}
