//! Model validator: the six-step sequence of spec.md §4.H, run in full
//! every time (validation is idempotent — re-running against an unchanged
//! model always yields the same verdict).

use crate::error::{ScramError, SourceSpan};
use crate::model::ccf::CcfModel;
use crate::model::formula::FormulaArg;
use crate::model::graph::detect_cycle;
use crate::model::Model;
use std::collections::HashMap;

/// Runs every validation step against `model`, returning the first failure
/// encountered. Steps run in the fixed order of spec.md §4.H since later
/// steps (e.g. formula validation) assume earlier ones (referential
/// integrity) already hold.
pub fn validate(model: &Model, span: SourceSpan) -> Result<(), ScramError> {
    referential_integrity(model, span.clone())?;
    gate_graph_acyclic(model, span.clone())?;
    model.parameters.validate(span.clone())?;
    formulae_valid(model, span.clone())?;
    probability_ranges(model, span.clone())?;
    ccf_groups_consistent(model, span)?;
    Ok(())
}

/// Step 1: every formula argument resolves to a live event (spec.md §4.H).
/// Gate/house/basic references are constructed from `Rc` handles already
/// resident in the model, so the only way this fails is a basic event with
/// no expression assigned where one is required by its role.
fn referential_integrity(model: &Model, span: SourceSpan) -> Result<(), ScramError> {
    for tree in &model.fault_trees {
        for gate in tree.gates() {
            check_args(gate.formula().args(), span.clone())?;
        }
    }
    Ok(())
}

fn check_args(args: &[FormulaArg], span: SourceSpan) -> Result<(), ScramError> {
    for arg in args {
        match arg {
            FormulaArg::Basic(b) => {
                if !b.has_expression() {
                    return Err(ScramError::UndefinedElement {
                        id: b.name().to_string(),
                        span: span.clone(),
                    });
                }
            }
            FormulaArg::Gate(g) => check_args(g.formula().args(), span.clone())?,
            FormulaArg::Nested(f) => check_args(f.args(), span.clone())?,
            FormulaArg::House(_) => {}
        }
    }
    Ok(())
}

/// Step 2: the gate dependency graph (a gate depends on every gate it
/// references, directly or through a nested formula) must be acyclic
/// (spec.md §4.H, §9 Design Notes).
fn gate_graph_acyclic(model: &Model, span: SourceSpan) -> Result<(), ScramError> {
    let mut ids = Vec::new();
    let mut edges: HashMap<String, Vec<String>> = HashMap::new();
    for tree in &model.fault_trees {
        for gate in tree.gates() {
            ids.push(gate.id().to_string());
            edges.insert(gate.id().to_string(), gate_dependencies(gate.formula().args()));
        }
    }
    if let Some(cycle) = detect_cycle(&ids, |id| edges.get(id).cloned().unwrap_or_default()) {
        return Err(ScramError::Cycle { cycle, span });
    }
    Ok(())
}

fn gate_dependencies(args: &[FormulaArg]) -> Vec<String> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            FormulaArg::Gate(g) => out.push(g.id().to_string()),
            FormulaArg::Nested(f) => out.extend(gate_dependencies(f.args())),
            FormulaArg::House(_) | FormulaArg::Basic(_) => {}
        }
    }
    out
}

/// Step 4: every gate's formula satisfies its own arity/uniqueness
/// invariants (spec.md §4.E). Formulae are validated eagerly at
/// construction, so this step re-checks in case a formula was mutated via
/// `Gate::set_formula` after construction.
fn formulae_valid(model: &Model, span: SourceSpan) -> Result<(), ScramError> {
    for tree in &model.fault_trees {
        for gate in tree.gates() {
            gate.formula().validate(span.clone())?;
        }
    }
    Ok(())
}

/// Step 5: every basic/house event probability lies in `[0, 1]` (spec.md
/// §4.H). Expressions that are not constant are accepted regardless of
/// `mean()` at validation time, since mission-time-dependent means are only
/// meaningful once a mission time is set; only constant-valued expressions
/// are range-checked here.
fn probability_ranges(model: &Model, span: SourceSpan) -> Result<(), ScramError> {
    for event in model.basic_events() {
        if event.has_expression() {
            let p = event.probability()?;
            if event.is_constant_expression() && !(0.0..=1.0).contains(&p) {
                return Err(ScramError::validation(
                    format!("basic event '{}' probability {} out of [0, 1]", event.name(), p),
                    span.clone(),
                ));
            }
        }
    }
    Ok(())
}

/// Step 6: every CCF group's model invariants hold (spec.md §4.G): at
/// least two members, and for a phi-factor group the factors still sum to
/// 1 within tolerance.
fn ccf_groups_consistent(model: &Model, span: SourceSpan) -> Result<(), ScramError> {
    for group in &model.ccf_groups {
        if group.members().len() < 2 {
            return Err(ScramError::validation(
                format!("CCF group '{}' has fewer than two members", group.name()),
                span.clone(),
            ));
        }
        if let CcfModel::PhiFactor { phi } = group.model() {
            let sum: f64 = phi.iter().sum();
            if (sum - 1.0).abs() > 1e-4 {
                return Err(ScramError::validation(
                    format!("CCF group '{}' phi-factors no longer sum to 1", group.name()),
                    span.clone(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::BasicEvent;
    use crate::model::expression::Expression;
    use crate::model::fault_tree::FaultTree;
    use crate::model::formula::{Formula, Operator};
    use crate::model::event::Gate;

    #[test]
    fn undefined_basic_event_is_rejected() {
        let be = BasicEvent::new("A");
        // no expression assigned
        let formula = Formula::new(
            Operator::Not,
            vec![FormulaArg::Basic(be)],
            SourceSpan::unknown(),
        )
        .unwrap();
        let gate = Gate::new("Top", formula);
        let mut tree = FaultTree::new("T");
        tree.add_top_gate(gate);

        let mut model = Model::new();
        model.add_fault_tree(tree);

        let err = validate(&model, SourceSpan::unknown()).unwrap_err();
        assert!(matches!(err, ScramError::UndefinedElement { .. }));
    }

    #[test]
    fn valid_model_passes() {
        let a = BasicEvent::new("A");
        a.assign_expression(Expression::constant(0.1)).unwrap();
        let b = BasicEvent::new("B");
        b.assign_expression(Expression::constant(0.2)).unwrap();
        let formula = Formula::new(
            Operator::Or,
            vec![FormulaArg::Basic(a), FormulaArg::Basic(b)],
            SourceSpan::unknown(),
        )
        .unwrap();
        let gate = Gate::new("Top", formula);
        let mut tree = FaultTree::new("T");
        tree.add_top_gate(gate);

        let mut model = Model::new();
        model.add_fault_tree(tree);
        validate(&model, SourceSpan::unknown()).unwrap();
    }
}
