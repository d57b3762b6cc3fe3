//! Property tests for spec.md §8's model invariants, run against the
//! public crate API with `proptest`.

use proptest::prelude::*;
use scram::error::SourceSpan;
use scram::model::ccf::{CcfGroup, CcfModel};
use scram::model::event::{BasicEvent, Gate};
use scram::model::expression::{Deviate, Expression};
use scram::model::fault_tree::FaultTree;
use scram::model::formula::{Formula, FormulaArg, Operator};

fn basic(name: &str, p: f64) -> std::rc::Rc<BasicEvent> {
    let event = BasicEvent::new(name);
    event.assign_expression(Expression::constant(p)).unwrap();
    event
}

proptest! {
    /// Invariant 2: for every Expression, Min() <= Mean() <= Max().
    #[test]
    fn uniform_deviate_mean_is_within_its_support(min in -1000.0f64..1000.0, spread in 0.01f64..1000.0) {
        let max = min + spread;
        let expr = Expression::deviate(Deviate::Uniform { min, max }, SourceSpan::unknown()).unwrap();
        prop_assert!(expr.min() <= expr.mean() + 1e-9);
        prop_assert!(expr.mean() <= expr.max() + 1e-9);
    }

    /// Invariant 5: summing a beta-factor CCF group's synthesised event
    /// probabilities, weighted by how many of a member's own CcfEvents
    /// each belongs to, reconstitutes the member's base Q within 1e-9
    /// (here checked directly: the OR-gate substituting a single member
    /// sums back to Q, since a member appears in exactly the singles and
    /// the all-member event for the beta-factor model).
    #[test]
    fn beta_factor_ccf_decomposition_matches_base_probability(
        q in 1e-6f64..0.2,
        beta in 0.0f64..1.0,
        n in 2usize..6,
    ) {
        let members: Vec<_> = (0..n).map(|i| basic(&format!("M{i}"), q)).collect();
        let group = CcfGroup::new("G", members, CcfModel::BetaFactor { beta }, SourceSpan::unknown()).unwrap();
        let expansion = group.expand(SourceSpan::unknown()).unwrap();

        let (_, gate) = expansion.substitutions.iter().find(|(m, _)| m.name() == "M0").unwrap();
        let total: f64 = gate
            .formula()
            .args()
            .iter()
            .map(|arg| match arg {
                FormulaArg::Basic(b) => b.probability().unwrap(),
                _ => 0.0,
            })
            .sum();
        prop_assert!((total - q).abs() < 1e-9);
    }

    /// Invariant 7: orphan(e) is true iff e is unreachable from every
    /// declared top gate.
    #[test]
    fn orphan_flag_tracks_reachability(reachable in any::<bool>()) {
        let leaf = basic("Leaf", 0.1);
        let formula = Formula::new(Operator::Null, vec![FormulaArg::Basic(leaf.clone())], SourceSpan::unknown()).unwrap();
        let gate = Gate::new("Gate", formula);

        let mut tree = FaultTree::new("Example");
        if reachable {
            tree.add_top_gate(gate);
        } else {
            tree.add_gate(gate);
        }
        tree.add_basic_event(leaf.clone());
        tree.recompute_orphans();

        prop_assert_eq!(leaf.is_orphan(), !reachable);
    }
}

/// Invariant 6: validating an unchanged model twice yields identical
/// results (idempotent).
#[test]
fn validation_is_idempotent() {
    let a = basic("A", 0.1);
    let b = basic("B", 0.2);
    let formula = Formula::new(
        Operator::And,
        vec![FormulaArg::Basic(a.clone()), FormulaArg::Basic(b.clone())],
        SourceSpan::unknown(),
    )
    .unwrap();
    let top = Gate::new("Top", formula);

    let mut model = scram::model::Model::new();
    let mut tree = FaultTree::new("Example");
    tree.add_top_gate(top);
    tree.add_basic_event(a);
    tree.add_basic_event(b);
    model.add_fault_tree(tree);

    let first = scram::validator::validate(&model, SourceSpan::unknown());
    let second = scram::validator::validate(&model, SourceSpan::unknown());
    assert_eq!(first.is_ok(), second.is_ok());
}
