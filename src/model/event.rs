//! Event hierarchy: House / Basic / Gate / CCF events (spec.md §3, §4.D).
//!
//! The abstract `Event`/`PrimaryEvent` hierarchy of spec.md is recast as
//! composition rather than inheritance: `HouseEvent` and `BasicEvent` each
//! carry their own identity and orphan flag directly, and a `CcfEvent` is
//! simply a `BasicEvent` whose `ccf_origin` is populated (see DESIGN.md for
//! why this collapses the `CcfEvent ⊂ BasicEvent` subtype into one struct).

use crate::error::ScramError;
use crate::model::expression::Expression;
use crate::model::formula::Formula;
use crate::model::identifier::Identifier;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A house event: a leaf with a fixed boolean state, equivalent to a
/// probability of 1 or 0 (spec.md §3).
#[derive(Debug)]
pub struct HouseEvent {
    id: Identifier,
    orphan: Cell<bool>,
    state: Cell<bool>,
    has_expression: Cell<bool>,
}

impl HouseEvent {
    pub fn new(name: impl Into<String>, initial_state: bool) -> Rc<Self> {
        Rc::new(Self {
            id: Identifier::new(name),
            orphan: Cell::new(true),
            state: Cell::new(initial_state),
            has_expression: Cell::new(true),
        })
    }

    pub fn id(&self) -> &str {
        self.id.id()
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// Sets the boolean state; per spec.md §4.D this also marks
    /// `has_expression` true (a house event always has a defined value).
    pub fn set_state(&self, on: bool) {
        self.state.set(on);
        self.has_expression.set(true);
    }

    pub fn state(&self) -> bool {
        self.state.get()
    }

    pub fn probability(&self) -> f64 {
        if self.state.get() {
            1.0
        } else {
            0.0
        }
    }

    pub fn has_expression(&self) -> bool {
        self.has_expression.get()
    }

    pub fn is_orphan(&self) -> bool {
        self.orphan.get()
    }

    pub fn set_orphan(&self, orphan: bool) {
        self.orphan.set(orphan);
    }
}

/// Where a synthesised [`BasicEvent`] came from, when it is a CCF event
/// (spec.md §3 "CcfEvent"): the originating group name and the ordered
/// member names it represents.
#[derive(Debug, Clone)]
pub struct CcfOrigin {
    pub group: String,
    pub members: Vec<String>,
}

/// A basic event: a leaf whose failure is governed by at most one
/// [`Expression`] (spec.md §3). When `ccf_origin` is set this event is a
/// CCF-synthesised event; when `ccf_gate` is set, this event has been
/// substituted in all formulae by an OR-gate over its CCF expansion
/// (spec.md §4.G step 3).
#[derive(Debug)]
pub struct BasicEvent {
    id: Identifier,
    orphan: Cell<bool>,
    expression: RefCell<Option<Expression>>,
    ccf_gate: RefCell<Option<Rc<Gate>>>,
    ccf_origin: Option<CcfOrigin>,
}

impl BasicEvent {
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            id: Identifier::new(name),
            orphan: Cell::new(true),
            expression: RefCell::new(None),
            ccf_gate: RefCell::new(None),
            ccf_origin: None,
        })
    }

    pub fn new_ccf_event(name: impl Into<String>, origin: CcfOrigin) -> Rc<Self> {
        Rc::new(Self {
            id: Identifier::new(name),
            orphan: Cell::new(true),
            expression: RefCell::new(None),
            ccf_gate: RefCell::new(None),
            ccf_origin: Some(origin),
        })
    }

    pub fn id(&self) -> &str {
        self.id.id()
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn is_ccf_event(&self) -> bool {
        self.ccf_origin.is_some()
    }

    pub fn ccf_origin(&self) -> Option<&CcfOrigin> {
        self.ccf_origin.as_ref()
    }

    /// Assigns this event's expression. May be called at most once;
    /// reassignment is a `LogicError` (spec.md §4.D).
    pub fn assign_expression(&self, expression: Expression) -> Result<(), ScramError> {
        let mut slot = self.expression.borrow_mut();
        if slot.is_some() {
            return Err(ScramError::Logic(format!(
                "basic event '{}' already has an expression assigned",
                self.name()
            )));
        }
        *slot = Some(expression);
        Ok(())
    }

    pub fn has_expression(&self) -> bool {
        self.expression.borrow().is_some()
    }

    /// True if this event's expression is constant-valued (spec.md §3);
    /// used by the validator to scope the `[0, 1]` probability-range check
    /// to values that are meaningful independent of mission time.
    pub fn is_constant_expression(&self) -> bool {
        self.expression
            .borrow()
            .as_ref()
            .map(Expression::is_constant)
            .unwrap_or(false)
    }

    /// `p()` per spec.md §4.D: `Mean()` of the assigned expression.
    /// Undefined state is surfaced as `IllegalOperation` rather than a
    /// silent default, since Rust has no notion of "caller must check"
    /// that the type system can express here.
    pub fn probability(&self) -> Result<f64, ScramError> {
        self.expression
            .borrow()
            .as_ref()
            .map(Expression::mean)
            .ok_or_else(|| ScramError::IllegalOperation {
                message: format!("basic event '{}' has no expression", self.name()),
                span: crate::error::SourceSpan::unknown(),
            })
    }

    pub fn sample(&self, rng: &mut dyn rand::RngCore) -> Result<f64, ScramError> {
        self.expression
            .borrow()
            .as_ref()
            .map(|e| e.sample(rng))
            .ok_or_else(|| ScramError::IllegalOperation {
                message: format!("basic event '{}' has no expression", self.name()),
                span: crate::error::SourceSpan::unknown(),
            })
    }

    pub fn reset(&self) {
        if let Some(e) = self.expression.borrow().as_ref() {
            e.reset();
        }
    }

    /// Swaps this event's expression, returning whatever was there before.
    /// Bypasses the assign-once rule of [`Self::assign_expression`]: this
    /// exists solely for importance-measure probing
    /// (`analysis::AnalysisFacade::importance`), which forces p=0 and p=1
    /// in turn and must restore the original expression afterwards.
    pub fn swap_expression(&self, expression: Expression) -> Option<Expression> {
        self.expression.borrow_mut().replace(expression)
    }

    pub fn set_ccf_gate(&self, gate: Rc<Gate>) {
        *self.ccf_gate.borrow_mut() = Some(gate);
    }

    pub fn ccf_gate(&self) -> Option<Rc<Gate>> {
        self.ccf_gate.borrow().clone()
    }

    pub fn is_orphan(&self) -> bool {
        self.orphan.get()
    }

    pub fn set_orphan(&self, orphan: bool) {
        self.orphan.set(orphan);
    }
}

/// A gate: an internal node owning exactly one [`Formula`] (spec.md §3).
/// The traversal mark described in spec.md §9 ("mark_ encodes temp/perm")
/// is intentionally *not* a field here — it lives in a side table built by
/// whichever traversal needs it (see `validator::acyclicity`), per the
/// Design Notes' re-architecture guidance.
#[derive(Debug)]
pub struct Gate {
    id: Identifier,
    orphan: Cell<bool>,
    formula: RefCell<Formula>,
}

impl Gate {
    pub fn new(name: impl Into<String>, formula: Formula) -> Rc<Self> {
        Rc::new(Self {
            id: Identifier::new(name),
            orphan: Cell::new(true),
            formula: RefCell::new(formula),
        })
    }

    pub fn id(&self) -> &str {
        self.id.id()
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn formula(&self) -> std::cell::Ref<'_, Formula> {
        self.formula.borrow()
    }

    pub fn set_formula(&self, formula: Formula) {
        *self.formula.borrow_mut() = formula;
    }

    pub fn is_orphan(&self) -> bool {
        self.orphan.get()
    }

    pub fn set_orphan(&self, orphan: bool) {
        self.orphan.set(orphan);
    }
}

/// A primary event (house or basic), the argument kind that participates
/// directly in formulae alongside gates (spec.md §3).
#[derive(Debug, Clone)]
pub enum PrimaryEvent {
    House(Rc<HouseEvent>),
    Basic(Rc<BasicEvent>),
}

impl PrimaryEvent {
    pub fn id(&self) -> &str {
        match self {
            PrimaryEvent::House(h) => h.id(),
            PrimaryEvent::Basic(b) => b.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PrimaryEvent::House(h) => h.name(),
            PrimaryEvent::Basic(b) => b.name(),
        }
    }

    pub fn is_orphan(&self) -> bool {
        match self {
            PrimaryEvent::House(h) => h.is_orphan(),
            PrimaryEvent::Basic(b) => b.is_orphan(),
        }
    }

    pub fn set_orphan(&self, orphan: bool) {
        match self {
            PrimaryEvent::House(h) => h.set_orphan(orphan),
            PrimaryEvent::Basic(b) => b.set_orphan(orphan),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_event_expression_assigned_once() {
        let be = BasicEvent::new("PumpFails");
        be.assign_expression(Expression::constant(0.1)).unwrap();
        let err = be.assign_expression(Expression::constant(0.2)).unwrap_err();
        assert!(matches!(err, ScramError::Logic(_)));
    }

    #[test]
    fn house_event_state_sets_probability() {
        let he = HouseEvent::new("Maintenance", false);
        assert_eq!(he.probability(), 0.0);
        he.set_state(true);
        assert_eq!(he.probability(), 1.0);
        assert!(he.has_expression());
    }

    #[test]
    fn basic_event_without_expression_is_illegal_operation() {
        let be = BasicEvent::new("Unassigned");
        let err = be.probability().unwrap_err();
        assert!(matches!(err, ScramError::IllegalOperation { .. }));
    }
}
