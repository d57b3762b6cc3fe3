//! Boolean formulae that drive gate logic (spec.md §3, §4.E).
//!
//! Arguments are stored as a flat tagged sequence (`FormulaArg`) rather than
//! through a trait object, following the Design Notes' "closed set of
//! cases" guidance already applied to `Expression`: a formula's children are
//! always one of house/basic/gate references or a nested sub-formula, and
//! that set never grows, so a tagged enum is the natural fit over `dyn`.

use crate::error::{ScramError, SourceSpan};
use crate::model::event::{BasicEvent, Gate, HouseEvent};
use std::collections::HashSet;
use std::rc::Rc;

/// The Boolean connective a formula applies to its arguments (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
    Nor,
    Nand,
    Xor,
    Null,
    /// `AtLeast(k)`: true when at least `k` of the arguments are true.
    AtLeast(u32),
}

impl Operator {
    fn name(self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
            Operator::Nor => "nor",
            Operator::Nand => "nand",
            Operator::Xor => "xor",
            Operator::Null => "null",
            Operator::AtLeast(_) => "atleast",
        }
    }
}

/// One argument of a [`Formula`]: a reference to an existing event, or a
/// nested formula with no gate identity of its own (spec.md §3, §4.E).
#[derive(Debug, Clone)]
pub enum FormulaArg {
    House(Rc<HouseEvent>),
    Basic(Rc<BasicEvent>),
    Gate(Rc<Gate>),
    Nested(Box<Formula>),
}

impl FormulaArg {
    /// A stable identity used for duplicate-argument detection. Nested
    /// formulae have no name of their own and are never duplicates of a
    /// named reference, so they are excluded from the uniqueness check
    /// (spec.md §4.E only requires uniqueness "by id").
    fn dedup_key(&self) -> Option<String> {
        match self {
            FormulaArg::House(h) => Some(format!("house:{}", h.id())),
            FormulaArg::Basic(b) => Some(format!("basic:{}", b.id())),
            FormulaArg::Gate(g) => Some(format!("gate:{}", g.id())),
            FormulaArg::Nested(_) => None,
        }
    }
}

/// A Boolean formula: an operator applied to an ordered argument list
/// (spec.md §3, §4.E).
#[derive(Debug, Clone)]
pub struct Formula {
    operator: Operator,
    args: Vec<FormulaArg>,
}

impl Formula {
    /// Builds and validates a formula in one step; arity and uniqueness
    /// rules are spec.md §4.E invariants, not optional checks, so
    /// construction cannot succeed without them.
    pub fn new(operator: Operator, args: Vec<FormulaArg>, span: SourceSpan) -> Result<Self, ScramError> {
        let formula = Self { operator, args };
        formula.validate(span)?;
        Ok(formula)
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn args(&self) -> &[FormulaArg] {
        &self.args
    }

    /// Arity and uniqueness checks (spec.md §4.E):
    /// - `NULL`/`NOT` take exactly one argument.
    /// - `AND`/`OR`/`NAND`/`NOR`/`XOR` take at least two.
    /// - `ATLEAST(k)` takes at least two, with `2 <= k < n`.
    /// - Named arguments (house/basic/gate) must be pairwise distinct.
    pub fn validate(&self, span: SourceSpan) -> Result<(), ScramError> {
        let n = self.args.len();
        match self.operator {
            Operator::Null | Operator::Not => {
                if n != 1 {
                    return Err(ScramError::validation(
                        format!("'{}' requires exactly one argument, got {}", self.operator.name(), n),
                        span.clone(),
                    ));
                }
            }
            Operator::And | Operator::Or | Operator::Nand | Operator::Nor | Operator::Xor => {
                if n < 2 {
                    return Err(ScramError::validation(
                        format!("'{}' requires at least two arguments, got {}", self.operator.name(), n),
                        span.clone(),
                    ));
                }
            }
            Operator::AtLeast(k) => {
                if n < 2 {
                    return Err(ScramError::validation(
                        format!("'atleast' requires at least two arguments, got {}", n),
                        span.clone(),
                    ));
                }
                if k < 2 || k as usize >= n {
                    return Err(ScramError::validation(
                        format!("'atleast' threshold {} out of range for {} arguments", k, n),
                        span.clone(),
                    ));
                }
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        for arg in &self.args {
            if let Some(key) = arg.dedup_key() {
                if !seen.insert(key.clone()) {
                    return Err(ScramError::DuplicateArgument { id: key, span });
                }
            }
        }
        Ok(())
    }

    /// Evaluates this formula over a boolean assignment of primary events,
    /// recursing through gates and nested formulae. Used by the cut-set
    /// enumerator (`analysis::cutsets`) to re-check candidate sets.
    pub fn evaluate(&self, state: &dyn Fn(&str) -> bool) -> bool {
        let values: Vec<bool> = self.args.iter().map(|a| Self::eval_arg(a, state)).collect();
        apply(self.operator, &values)
    }

    fn eval_arg(arg: &FormulaArg, state: &dyn Fn(&str) -> bool) -> bool {
        match arg {
            FormulaArg::House(h) => h.state(),
            // A CCF-expanded member is substituted by its OR-gate over the
            // group's synthetic subset events wherever it appears as an
            // argument (spec.md §4.G step 4).
            FormulaArg::Basic(b) => match b.ccf_gate() {
                Some(gate) => gate.formula().evaluate(state),
                None => state(b.id()),
            },
            FormulaArg::Gate(g) => g.formula().evaluate(state),
            FormulaArg::Nested(f) => f.evaluate(state),
        }
    }
}

fn apply(operator: Operator, values: &[bool]) -> bool {
    match operator {
        Operator::And => values.iter().all(|v| *v),
        Operator::Or => values.iter().any(|v| *v),
        Operator::Not => !values[0],
        Operator::Nor => !values.iter().any(|v| *v),
        Operator::Nand => !values.iter().all(|v| *v),
        Operator::Xor => values.iter().filter(|v| **v).count() % 2 == 1,
        Operator::Null => values[0],
        Operator::AtLeast(k) => values.iter().filter(|v| **v).count() >= k as usize,
    }
}
