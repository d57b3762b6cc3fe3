//! Analysis façade (spec.md §4.I): the single entry point callers use to
//! drive probability, importance, and SIL evaluation over a validated
//! [`Model`]. Owns the sampling-cycle lifecycle so `Sample()`/`Reset()`
//! coherence (spec.md §3 invariant 3) is never left to the caller.

use crate::config::{ApproximationMode, AnalysisSettings};
use crate::error::ScramError;
use crate::model::event::Gate;
use crate::model::formula::{Formula, FormulaArg};
use crate::model::Model;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// IEC 61508 Safety Integrity Level bands (spec.md §3, Table 3 of the
/// standard). `None` covers anything worse than SIL 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilBand {
    None,
    Sil1,
    Sil2,
    Sil3,
    Sil4,
}

/// Low-demand-mode PFDavg bands (IEC 61508-1 Table 2).
pub fn sil_band_low_demand(pfd_avg: f64) -> SilBand {
    if pfd_avg < 1e-4 {
        SilBand::Sil4
    } else if pfd_avg < 1e-3 {
        SilBand::Sil3
    } else if pfd_avg < 1e-2 {
        SilBand::Sil2
    } else if pfd_avg < 1e-1 {
        SilBand::Sil1
    } else {
        SilBand::None
    }
}

/// High-demand/continuous-mode PFH bands (IEC 61508-1 Table 3), units of
/// per hour.
pub fn sil_band_high_demand(pfh: f64) -> SilBand {
    if pfh < 1e-8 {
        SilBand::Sil4
    } else if pfh < 1e-7 {
        SilBand::Sil3
    } else if pfh < 1e-6 {
        SilBand::Sil2
    } else if pfh < 1e-5 {
        SilBand::Sil1
    } else {
        SilBand::None
    }
}

/// The Fussell-Vesely, Birnbaum, RAW, and RRW importance measures of
/// spec.md §4.I, computed for one basic event against one top gate.
#[derive(Debug, Clone, Copy)]
pub struct Importance {
    pub fussell_vesely: f64,
    pub birnbaum: f64,
    pub raw: f64,
    pub rrw: f64,
}

pub struct AnalysisFacade<'a> {
    model: &'a Model,
    settings: AnalysisSettings,
    rng: RefCell<Option<StdRng>>,
}

impl<'a> AnalysisFacade<'a> {
    pub fn new(model: &'a Model, settings: AnalysisSettings) -> Result<Self, ScramError> {
        settings.validate()?;
        Ok(Self {
            model,
            settings,
            rng: RefCell::new(None),
        })
    }

    /// Clears every memoised sample and parameter mean across the model
    /// (spec.md §4.I `Reset()`).
    pub fn reset(&self) {
        self.model.reset_all();
    }

    /// Begins a Monte-Carlo sampling cycle: seeds the façade's RNG so every
    /// draw within the cycle is reproducible, then resets caches so the
    /// first `Sample()` of the cycle draws fresh values (spec.md §4.I,
    /// §5).
    pub fn begin_sampling_cycle(&self, cycle_index: u64) {
        self.reset();
        *self.rng.borrow_mut() = Some(StdRng::seed_from_u64(self.settings.seed.wrapping_add(cycle_index)));
    }

    /// Ends the current sampling cycle, clearing the caches so the next
    /// `BeginSamplingCycle` starts clean (spec.md §4.I).
    pub fn end_sampling_cycle(&self) {
        self.reset();
        *self.rng.borrow_mut() = None;
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> Option<T> {
        self.rng.borrow_mut().as_mut().map(f)
    }

    /// Draws one Monte-Carlo sample of `gate`'s top state, true/false,
    /// using the façade's current sampling-cycle RNG. Returns `None` if
    /// called outside a sampling cycle.
    pub fn sample_top_event(&self, gate: &Rc<Gate>) -> Option<bool> {
        self.with_rng(|rng| {
            let mut drawn = HashSet::new();
            for event in self.model.basic_events() {
                if let Ok(p) = event.sample(rng) {
                    if rand::Rng::gen_bool(rng, p.clamp(0.0, 1.0)) {
                        drawn.insert(event.id().to_string());
                    }
                }
            }
            evaluate_gate(gate, &drawn)
        })
    }

    /// Sets mission time to `hours`, invalidating every parameter's mean
    /// cache (spec.md §4.I: a mission-time change invalidates any
    /// downstream cached mean), then returns the top-event probability of
    /// `gate` via the configured cut-set approximation.
    pub fn probability_at(&self, gate: &Rc<Gate>, hours: f64) -> Result<f64, ScramError> {
        self.model.mission_time.set(hours);
        for parameter in self.model.parameters.iter() {
            parameter.invalidate_mean_cache();
        }
        top_event_probability(
            &gate.formula(),
            self.basic_event_ids(gate),
            self.settings.cut_set_order,
            self.settings.approximation,
        )
    }

    fn basic_event_ids(&self, gate: &Rc<Gate>) -> Vec<String> {
        let mut ids = HashSet::new();
        collect_basic_ids(&gate.formula(), &mut ids);
        ids.into_iter().collect()
    }

    /// Average probability of failure on demand over `[0, mission_time]`
    /// via trapezoidal integration (spec.md §4.I, IEC 61508 PFDavg).
    pub fn pfd_avg(&self, gate: &Rc<Gate>, mission_time: f64, steps: usize) -> Result<f64, ScramError> {
        let steps = steps.max(1);
        let dt = mission_time / steps as f64;
        let mut acc = 0.0;
        let mut previous = self.probability_at(gate, 0.0)?;
        for i in 1..=steps {
            let t = dt * i as f64;
            let current = self.probability_at(gate, t)?;
            acc += (previous + current) / 2.0 * dt;
            previous = current;
        }
        Ok(if mission_time > 0.0 { acc / mission_time } else { 0.0 })
    }

    /// Average failure frequency in continuous/high-demand mode: the
    /// top-event probability at the mission-time boundary divided by the
    /// mission time (spec.md §4.I, IEC 61508 PFH).
    pub fn pfh(&self, gate: &Rc<Gate>, mission_time: f64) -> Result<f64, ScramError> {
        if mission_time <= 0.0 {
            return Ok(0.0);
        }
        Ok(self.probability_at(gate, mission_time)? / mission_time)
    }

    /// Fussell-Vesely, Birnbaum, RAW, and RRW for `basic_event_id` against
    /// `gate`'s probability at `hours` (spec.md §4.I).
    pub fn importance(&self, gate: &Rc<Gate>, basic_event_id: &str, hours: f64) -> Result<Importance, ScramError> {
        let baseline = self.probability_at(gate, hours)?;

        let event = self
            .model
            .basic_event(basic_event_id)
            .ok_or_else(|| ScramError::UndefinedElement {
                id: basic_event_id.to_string(),
                span: crate::error::SourceSpan::unknown(),
            })?
            .clone();

        let original = event.swap_expression(crate::model::expression::Expression::constant(1.0));
        let at_one = self.probability_at(gate, hours)?;

        event.swap_expression(crate::model::expression::Expression::constant(0.0));
        let at_zero = self.probability_at(gate, hours)?;

        if let Some(original) = original {
            event.swap_expression(original);
        }
        // recompute any downstream parameter means left stale by the probes
        for parameter in self.model.parameters.iter() {
            parameter.invalidate_mean_cache();
        }

        let birnbaum = at_one - at_zero;
        let fussell_vesely = if baseline > 0.0 {
            (baseline - at_zero) / baseline
        } else {
            0.0
        };
        let raw = if baseline > 0.0 { at_one / baseline } else { 0.0 };
        let rrw = if at_zero > 0.0 { baseline / at_zero } else { f64::INFINITY };

        Ok(Importance {
            fussell_vesely,
            birnbaum,
            raw,
            rrw,
        })
    }

    /// Monte-Carlo uncertainty analysis (spec.md §6 "uncertainty bounds and
    /// histogram"): each of `trials` independent cycles draws a fresh
    /// sample from every basic event's distribution, substitutes it as a
    /// constant, and records the resulting top-event probability. The
    /// spread of these `trials` point estimates is the uncertainty bound.
    pub fn uncertainty(&self, gate: &Rc<Gate>, hours: f64, trials: usize) -> Result<UncertaintyResult, ScramError> {
        self.model.mission_time.set(hours);
        let basic_ids = self.basic_event_ids(gate);
        let trials = trials.max(1);
        let mut points = Vec::with_capacity(trials);

        for cycle in 0..trials as u64 {
            self.begin_sampling_cycle(cycle);
            let drawn = self
                .with_rng(|rng| {
                    let mut drawn = Vec::new();
                    for event in self.model.basic_events() {
                        if let Ok(p) = event.sample(rng) {
                            if let Some(original) =
                                event.swap_expression(crate::model::expression::Expression::constant(p))
                            {
                                drawn.push((event.clone(), original));
                            }
                        }
                    }
                    drawn
                })
                .unwrap_or_default();

            for parameter in self.model.parameters.iter() {
                parameter.invalidate_mean_cache();
            }
            points.push(top_event_probability(
                &gate.formula(),
                basic_ids.clone(),
                self.settings.cut_set_order,
                self.settings.approximation,
            )?);

            for (event, original) in drawn {
                event.swap_expression(original);
            }
            self.end_sampling_cycle();
        }

        Ok(summarize(points))
    }
}

/// Mean, standard deviation, and a fixed-width histogram of the point
/// estimates gathered by [`AnalysisFacade::uncertainty`].
#[derive(Debug, Clone)]
pub struct UncertaintyResult {
    pub mean: f64,
    pub std_dev: f64,
    /// `(bin_lower, bin_upper, count)`, ten equal-width bins spanning the
    /// observed range.
    pub histogram: Vec<(f64, f64, usize)>,
}

const UNCERTAINTY_HISTOGRAM_BINS: usize = 10;

fn summarize(points: Vec<f64>) -> UncertaintyResult {
    let n = points.len().max(1) as f64;
    let mean = points.iter().sum::<f64>() / n;
    let variance = points.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let lo = points.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = points.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let width = if hi > lo { (hi - lo) / UNCERTAINTY_HISTOGRAM_BINS as f64 } else { 0.0 };

    let mut counts = vec![0usize; UNCERTAINTY_HISTOGRAM_BINS];
    for &p in &points {
        let idx = if width > 0.0 {
            (((p - lo) / width) as usize).min(UNCERTAINTY_HISTOGRAM_BINS - 1)
        } else {
            0
        };
        counts[idx] += 1;
    }

    let histogram = (0..UNCERTAINTY_HISTOGRAM_BINS)
        .map(|i| {
            let bin_lo = if width > 0.0 { lo + width * i as f64 } else { lo };
            let bin_hi = if width > 0.0 { lo + width * (i + 1) as f64 } else { hi };
            (bin_lo, bin_hi, counts[i])
        })
        .collect();

    UncertaintyResult { mean, std_dev, histogram }
}

fn collect_basic_ids(formula: &Formula, ids: &mut HashSet<String>) {
    for arg in formula.args() {
        match arg {
            FormulaArg::Basic(b) => match b.ccf_gate() {
                Some(gate) => collect_basic_ids(&gate.formula(), ids),
                None => {
                    ids.insert(b.id().to_string());
                }
            },
            FormulaArg::Gate(g) => collect_basic_ids(&g.formula(), ids),
            FormulaArg::Nested(f) => collect_basic_ids(f, ids),
            FormulaArg::House(_) => {}
        }
    }
}

fn evaluate_gate(gate: &Rc<Gate>, drawn: &HashSet<String>) -> bool {
    gate.formula().evaluate(&|id| drawn.contains(id))
}

/// Enumerates cut sets up to `max_order` by brute-force subset search over
/// `basic_ids`, then approximates the top-event probability from them
/// (spec.md §9 Design Notes: BDD/ZBDD minimisation is out of scope, so cut
/// sets are found by direct enumeration rather than a canonical algorithm,
/// and probability is an approximation rather than the exact value).
fn top_event_probability(
    formula: &Formula,
    basic_ids: Vec<String>,
    max_order: usize,
    mode: ApproximationMode,
) -> Result<f64, ScramError> {
    let cut_sets = minimal_cut_sets(formula, &basic_ids, max_order);
    Ok(cut_set_probability(formula, &cut_sets, mode))
}

fn cut_set_probability(formula: &Formula, cut_sets: &[Vec<String>], mode: ApproximationMode) -> f64 {
    let cut_probabilities: Vec<f64> = cut_sets
        .iter()
        .map(|cut| cut.iter().map(|id| probability_of(formula, id)).product::<f64>())
        .collect();
    match mode {
        ApproximationMode::RareEvent => cut_probabilities.iter().sum::<f64>().min(1.0),
        ApproximationMode::Mcub => {
            1.0 - cut_probabilities.iter().map(|p| 1.0 - p).product::<f64>()
        }
    }
}

fn probability_of(formula: &Formula, id: &str) -> f64 {
    find_basic(formula, id).map(|e| e.probability().unwrap_or(0.0)).unwrap_or(0.0)
}

fn find_basic(formula: &Formula, id: &str) -> Option<Rc<crate::model::event::BasicEvent>> {
    for arg in formula.args() {
        match arg {
            FormulaArg::Basic(b) => match b.ccf_gate() {
                Some(gate) => {
                    if let Some(found) = find_basic(&gate.formula(), id) {
                        return Some(found);
                    }
                }
                None if b.id() == id => return Some(b.clone()),
                None => {}
            },
            FormulaArg::Gate(g) => {
                if let Some(found) = find_basic(&g.formula(), id) {
                    return Some(found);
                }
            }
            FormulaArg::Nested(f) => {
                if let Some(found) = find_basic(f, id) {
                    return Some(found);
                }
            }
            FormulaArg::House(_) => {}
        }
    }
    None
}

/// Brute-force minimal cut-set enumeration, bounded to `max_order`
/// (spec.md §4.I). A cut is minimal iff no already-found smaller cut is a
/// subset of it.
pub fn minimal_cut_sets(formula: &Formula, basic_ids: &[String], max_order: usize) -> Vec<Vec<String>> {
    let n = basic_ids.len();
    let bound = max_order.min(n);
    let mut cuts: Vec<Vec<String>> = Vec::new();

    for order in 1..=bound {
        for combo in combinations(basic_ids, order) {
            if cuts.iter().any(|c| c.iter().all(|id| combo.contains(id))) {
                continue;
            }
            let set: HashSet<&str> = combo.iter().map(String::as_str).collect();
            if formula.evaluate(&|id| set.contains(id)) {
                cuts.push(combo);
            }
        }
    }
    cuts
}

fn combinations(items: &[String], k: usize) -> Vec<Vec<String>> {
    let n = items.len();
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        result.push(indices.iter().map(|&i| items[i].clone()).collect());
        let mut i = k;
        loop {
            if i == 0 {
                return result;
            }
            i -= 1;
            if indices[i] != i + n - k {
                break;
            }
        }
        indices[i] += 1;
        for j in i + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceSpan;
    use crate::model::event::BasicEvent;
    use crate::model::expression::Expression;
    use crate::model::formula::Operator;

    fn basic(name: &str, p: f64) -> Rc<BasicEvent> {
        let be = BasicEvent::new(name);
        be.assign_expression(Expression::constant(p)).unwrap();
        be
    }

    #[test]
    fn or_gate_cut_sets_are_singletons() {
        let a = basic("A", 0.1);
        let b = basic("B", 0.2);
        let formula = Formula::new(
            Operator::Or,
            vec![FormulaArg::Basic(a.clone()), FormulaArg::Basic(b.clone())],
            SourceSpan::unknown(),
        )
        .unwrap();
        let ids = vec![a.id().to_string(), b.id().to_string()];
        let cuts = minimal_cut_sets(&formula, &ids, 4);
        assert_eq!(cuts.len(), 2);
        assert!(cuts.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn and_gate_cut_set_is_the_pair() {
        let a = basic("A", 0.1);
        let b = basic("B", 0.2);
        let formula = Formula::new(
            Operator::And,
            vec![FormulaArg::Basic(a.clone()), FormulaArg::Basic(b.clone())],
            SourceSpan::unknown(),
        )
        .unwrap();
        let ids = vec![a.id().to_string(), b.id().to_string()];
        let cuts = minimal_cut_sets(&formula, &ids, 4);
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].len(), 2);
    }

    #[test]
    fn ccf_substitution_is_picked_up_by_cut_set_analysis() {
        let a = basic("A", 0.1);
        let b = basic("B", 0.1);
        let formula = Formula::new(
            Operator::Or,
            vec![FormulaArg::Basic(a.clone()), FormulaArg::Basic(b.clone())],
            SourceSpan::unknown(),
        )
        .unwrap();

        let group = crate::model::ccf::CcfGroup::new(
            "G",
            vec![a.clone(), b.clone()],
            crate::model::ccf::CcfModel::BetaFactor { beta: 0.5 },
            SourceSpan::unknown(),
        )
        .unwrap();
        group.expand(SourceSpan::unknown()).unwrap();

        let mut resolved = HashSet::new();
        collect_basic_ids(&formula, &mut resolved);
        assert!(resolved.iter().all(|id| id.starts_with("g-[")));
        assert!(!resolved.contains(&a.id().to_string()));

        let p = top_event_probability(
            &formula,
            resolved.into_iter().collect(),
            4,
            ApproximationMode::RareEvent,
        )
        .unwrap();
        // Independent-failure OR would give 0.1 + 0.1 = 0.2; with beta=0.5
        // the group's mass is split into two 0.05 singles and one shared
        // 0.05 double event, all three of which are minimal cuts of the OR.
        assert!((p - 0.15).abs() < 1e-9);
    }

    #[test]
    fn rare_event_approximation_matches_or_gate_union_bound() {
        let a = basic("A", 0.1);
        let b = basic("B", 0.2);
        let formula = Formula::new(
            Operator::Or,
            vec![FormulaArg::Basic(a.clone()), FormulaArg::Basic(b.clone())],
            SourceSpan::unknown(),
        )
        .unwrap();
        let ids = vec![a.id().to_string(), b.id().to_string()];
        let cuts = minimal_cut_sets(&formula, &ids, 4);
        let p = cut_set_probability(&formula, &cuts, ApproximationMode::RareEvent);
        assert!((p - 0.3).abs() < 1e-9);
    }

    #[test]
    fn uncertainty_mean_tracks_the_point_estimate() {
        let a = basic("A", 0.1);
        let formula = Formula::new(Operator::Null, vec![FormulaArg::Basic(a.clone())], SourceSpan::unknown()).unwrap();
        let gate = crate::model::event::Gate::new("Top", formula);

        let mut model = Model::new();
        let mut tree = crate::model::fault_tree::FaultTree::new("Example");
        tree.add_top_gate(gate.clone());
        tree.add_basic_event(a);
        model.add_fault_tree(tree);

        let facade = AnalysisFacade::new(&model, AnalysisSettings::default()).unwrap();
        let result = facade.uncertainty(&gate, 8760.0, 200).unwrap();
        assert_eq!(result.histogram.iter().map(|(_, _, c)| c).sum::<usize>(), 200);
        assert!(result.mean >= 0.0 && result.mean <= 1.0);
        assert!(result.std_dev >= 0.0);
    }

    #[test]
    fn sil_bands_follow_iec61508_table_2() {
        assert!(matches!(sil_band_low_demand(1e-5), SilBand::Sil4));
        assert!(matches!(sil_band_low_demand(5e-2), SilBand::Sil1));
        assert!(matches!(sil_band_low_demand(0.5), SilBand::None));
    }
}
