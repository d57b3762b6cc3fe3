//! Parameter graph: named, reusable expressions with unit tags and an
//! acyclic dependency check (spec.md §3, §4.C).

use crate::error::{ScramError, SourceSpan};
use crate::model::expression::{Expression, Unit};
use crate::model::graph::detect_cycle;
use crate::model::identifier::Identifier;
use rand::RngCore;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// A named expression, cached for `O(1)` repeated mean reads across a
/// session (spec.md §4.C). Shared via `Rc` so every reference to the same
/// parameter observes the same cached mean and the same sampled draw
/// within a cycle (the coherence invariant, spec.md §3 invariant 3).
#[derive(Debug)]
pub struct Parameter {
    id: Identifier,
    unit: Unit,
    expression: RefCell<Expression>,
    mean_cache: RefCell<Option<f64>>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, unit: Unit, expression: Expression) -> Rc<Self> {
        Rc::new(Self {
            id: Identifier::new(name),
            unit,
            expression: RefCell::new(expression),
            mean_cache: RefCell::new(None),
        })
    }

    pub fn id(&self) -> &str {
        self.id.id()
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn expression(&self) -> Ref<'_, Expression> {
        self.expression.borrow()
    }

    pub fn mean(&self) -> f64 {
        if let Some(v) = *self.mean_cache.borrow() {
            return v;
        }
        let v = self.expression.borrow().mean();
        *self.mean_cache.borrow_mut() = Some(v);
        v
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.expression.borrow().sample(rng)
    }

    /// Clears this parameter's own mean cache and recursively resets its
    /// expression's sample cache (spec.md §3).
    pub fn reset(&self) {
        self.expression.borrow().reset();
    }

    pub fn invalidate_mean_cache(&self) {
        *self.mean_cache.borrow_mut() = None;
    }

    /// Replaces the held expression. Per spec.md §4.C this must invalidate
    /// caches throughout the reverse-reachable set; callers are expected to
    /// follow this with [`ParameterGraph::validate`] and a model-wide mean
    /// cache sweep (the façade does both, see `analysis::AnalysisFacade`).
    pub fn set_expression(&self, expression: Expression) {
        *self.expression.borrow_mut() = expression;
        self.invalidate_mean_cache();
    }
}

/// Tracks the dependency edges between parameters and checks acyclicity by
/// DFS (spec.md §4.C); on a cycle, raises [`ScramError::Cycle`] naming the
/// full cycle (scenario S4).
#[derive(Debug, Default)]
pub struct ParameterGraph {
    parameters: Vec<Rc<Parameter>>,
}

impl ParameterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, parameter: Rc<Parameter>) {
        self.parameters.push(parameter);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Parameter>> {
        self.parameters.iter()
    }

    /// Runs the acyclicity DFS over the full parameter set. Call after
    /// every parameter addition or expression replacement — construction
    /// itself never blocks on this so that forward references within a
    /// single MEF document can be resolved before the graph is complete.
    pub fn validate(&self, span: SourceSpan) -> Result<(), ScramError> {
        let ids: Vec<String> = self.parameters.iter().map(|p| p.id().to_string()).collect();
        let by_id: std::collections::HashMap<&str, &Rc<Parameter>> = self
            .parameters
            .iter()
            .map(|p| (p.id(), p))
            .collect();

        if let Some(cycle) = detect_cycle(&ids, |id| {
            by_id
                .get(id.as_str())
                .map(|p| p.expression().direct_parameter_refs())
                .unwrap_or_default()
        }) {
            return Err(ScramError::Cycle { cycle, span });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::expression::{ArithOp, Expression};

    #[test]
    fn self_cycle_is_rejected() {
        // a := a + 1 (direct self-reference): construct first without the
        // edge, attach the cycle, then re-validate.
        let a = Parameter::new("a", Unit::Unitless, Expression::constant(1.0));
        let self_ref = Expression::arith(
            ArithOp::Add,
            vec![Expression::parameter(a.clone()), Expression::constant(1.0)],
            SourceSpan::unknown(),
        )
        .unwrap();
        a.set_expression(self_ref);

        let mut graph = ParameterGraph::new();
        graph.add(a);
        let err = graph.validate(SourceSpan::unknown()).unwrap_err();
        assert!(matches!(err, ScramError::Cycle { .. }));
    }

    #[test]
    fn mutual_cycle_is_named() {
        // S4: A <- B; B <- A.
        let a = Parameter::new("A", Unit::Unitless, Expression::constant(0.0));
        let b = Parameter::new("B", Unit::Unitless, Expression::parameter(a.clone()));
        a.set_expression(Expression::parameter(b.clone()));

        let mut graph = ParameterGraph::new();
        graph.add(a);
        graph.add(b);
        let err = graph.validate(SourceSpan::unknown()).unwrap_err();
        match err {
            ScramError::Cycle { cycle, .. } => {
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
            _ => panic!("expected cycle error"),
        }
    }

    #[test]
    fn acyclic_graph_validates() {
        let a = Parameter::new("A", Unit::Unitless, Expression::constant(1.0));
        let b = Parameter::new("B", Unit::Unitless, Expression::parameter(a.clone()));
        let mut graph = ParameterGraph::new();
        graph.add(a);
        graph.add(b);
        graph.validate(SourceSpan::unknown()).unwrap();
    }

    #[test]
    fn mean_cache_is_o1_on_repeat_reads() {
        let p = Parameter::new("A", Unit::Unitless, Expression::constant(3.0));
        assert_eq!(p.mean(), 3.0);
        assert_eq!(p.mean(), 3.0);
    }
}
