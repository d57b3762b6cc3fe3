//! Common-cause-failure (CCF) groups (spec.md §3, §4.G).
//!
//! A CCF group replaces each member's independent-failure basic event with
//! an OR-gate over synthetic [`CcfEvent`](crate::model::event::BasicEvent)s,
//! one per non-empty subset of the group, following the symmetric treatment
//! shared by all four models: every subset of a given size carries the same
//! probability, so the model only ever needs to know a subset's size.

use crate::error::{ScramError, SourceSpan};
use crate::model::event::{BasicEvent, CcfOrigin, Gate};
use crate::model::formula::{Formula, FormulaArg, Operator};
use std::rc::Rc;

/// The four CCF parameterisations of spec.md §3/§4.G.
#[derive(Debug, Clone)]
pub enum CcfModel {
    /// Two levels only: independent failure and total common-cause failure.
    BetaFactor { beta: f64 },
    /// Multiple Greek Letter model. `rho[i]` is rho_(i+2), so the vector has
    /// `n - 1` entries for an `n`-member group.
    Mgl { rho: Vec<f64> },
    /// `alpha[k - 1]` is alpha_k for `k = 1..=n`.
    AlphaFactor { alpha: Vec<f64> },
    /// `phi[k - 1]` is the fraction of total failure probability
    /// attributable to level `k`; must sum to 1 within `1e-4`.
    PhiFactor { phi: Vec<f64> },
}

impl CcfModel {
    fn validate(&self, n: usize, span: SourceSpan) -> Result<(), ScramError> {
        match self {
            CcfModel::BetaFactor { beta } => {
                if !(0.0..=1.0).contains(beta) {
                    return Err(ScramError::validation(
                        format!("beta-factor: beta ({beta}) must be in [0, 1]"),
                        span,
                    ));
                }
            }
            CcfModel::Mgl { rho } => {
                if rho.len() != n - 1 {
                    return Err(ScramError::validation(
                        format!("MGL: expected {} factors for a {}-member group, got {}", n - 1, n, rho.len()),
                        span,
                    ));
                }
                if rho.iter().any(|r| !(0.0..=1.0).contains(r)) {
                    return Err(ScramError::validation("MGL: all factors must be in [0, 1]", span));
                }
            }
            CcfModel::AlphaFactor { alpha } => {
                if alpha.len() != n {
                    return Err(ScramError::validation(
                        format!("alpha-factor: expected {n} factors, got {}", alpha.len()),
                        span,
                    ));
                }
                if alpha.iter().any(|a| *a < 0.0) {
                    return Err(ScramError::validation("alpha-factor: factors must be non-negative", span));
                }
                let s: f64 = alpha.iter().enumerate().map(|(i, a)| (i + 1) as f64 * a).sum();
                if s <= 0.0 {
                    return Err(ScramError::validation(
                        "alpha-factor: weighted sum of factors must be positive",
                        span,
                    ));
                }
            }
            CcfModel::PhiFactor { phi } => {
                if phi.len() != n {
                    return Err(ScramError::validation(
                        format!("phi-factor: expected {n} factors, got {}", phi.len()),
                        span,
                    ));
                }
                let sum: f64 = phi.iter().sum();
                if (sum - 1.0).abs() > 1e-4 {
                    return Err(ScramError::validation(
                        format!("phi-factor: factors must sum to 1 (got {sum})"),
                        span,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Probability that a *specific* subset of size `k` (out of an
    /// `n`-member group with shared individual probability `q`) fails due to
    /// a common cause at exactly that size (spec.md §4.G).
    fn level_probability(&self, n: usize, k: usize, q: f64) -> f64 {
        match self {
            CcfModel::BetaFactor { beta } => {
                if k == 1 {
                    (1.0 - beta) * q
                } else if k == n {
                    beta * q
                } else {
                    0.0
                }
            }
            CcfModel::Mgl { rho } => {
                if k == n {
                    rho.iter().product::<f64>() * q
                } else {
                    let prod_upto: f64 = rho[..k - 1].iter().product();
                    let rho_next = rho[k - 1];
                    prod_upto * (1.0 - rho_next) / binom(n - 1, k - 1) * q
                }
            }
            CcfModel::AlphaFactor { alpha } => {
                let s: f64 = alpha.iter().enumerate().map(|(i, a)| (i + 1) as f64 * a).sum();
                (k as f64 * alpha[k - 1]) / s / binom(n - 1, k - 1) * q
            }
            CcfModel::PhiFactor { phi } => phi[k - 1] / binom(n - 1, k - 1) * q,
        }
    }
}

fn binom(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut result: f64 = 1.0;
    for i in 0..k {
        result = result * (n - i) as f64 / (i + 1) as f64;
    }
    result
}

/// A named CCF group: a homogeneous set of basic events sharing one failure
/// model (spec.md §3).
pub struct CcfGroup {
    name: String,
    members: Vec<Rc<BasicEvent>>,
    model: CcfModel,
}

/// The result of [`CcfGroup::expand`]: the synthetic CCF basic events to
/// register in the model, and the per-member substitution gate that
/// replaces each member's direct appearance in existing formulae.
pub struct CcfExpansion {
    pub ccf_events: Vec<Rc<BasicEvent>>,
    pub substitutions: Vec<(Rc<BasicEvent>, Rc<Gate>)>,
}

impl CcfGroup {
    pub fn new(
        name: impl Into<String>,
        members: Vec<Rc<BasicEvent>>,
        model: CcfModel,
        span: SourceSpan,
    ) -> Result<Self, ScramError> {
        if members.len() < 2 {
            return Err(ScramError::validation(
                "a CCF group requires at least two members",
                span,
            ));
        }
        model.validate(members.len(), span)?;
        Ok(Self {
            name: name.into(),
            members,
            model,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Rc<BasicEvent>] {
        &self.members
    }

    pub fn model(&self) -> &CcfModel {
        &self.model
    }

    /// Builds the subset-indexed CCF events and per-member substitution
    /// gates (spec.md §4.G step 3). Every member is assumed to share the
    /// same individual probability (the first member's `p()` is taken as
    /// the group's `Q`); see DESIGN.md for this simplification.
    pub fn expand(&self, span: SourceSpan) -> Result<CcfExpansion, ScramError> {
        let n = self.members.len();
        let q = self.members[0].probability()?;

        let mut ccf_events = Vec::new();
        // member index -> CcfEvents whose subset contains it
        let mut per_member: Vec<Vec<Rc<BasicEvent>>> = vec![Vec::new(); n];

        for mask in 1u32..(1u32 << n) {
            let indices: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
            let k = indices.len();
            let subset_probability = self.model.level_probability(n, k, q);
            let member_names: Vec<String> = indices.iter().map(|&i| self.members[i].name().to_string()).collect();
            let event_name = format!("{}-[{}]", self.name, member_names.join(" "));

            let ccf_event = BasicEvent::new_ccf_event(
                event_name,
                CcfOrigin {
                    group: self.name.clone(),
                    members: member_names,
                },
            );
            ccf_event.assign_expression(crate::model::expression::Expression::constant(subset_probability))?;

            for &i in &indices {
                per_member[i].push(ccf_event.clone());
            }
            ccf_events.push(ccf_event);
        }

        let mut substitutions = Vec::with_capacity(n);
        for (i, member) in self.members.iter().enumerate() {
            let args = per_member[i]
                .iter()
                .cloned()
                .map(FormulaArg::Basic)
                .collect::<Vec<_>>();
            let formula = Formula::new(Operator::Or, args, span.clone())?;
            let gate = Gate::new(format!("{}-ccf-{}", self.name, member.name()), formula);
            member.set_ccf_gate(gate.clone());
            substitutions.push((member.clone(), gate));
        }

        Ok(CcfExpansion {
            ccf_events,
            substitutions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::expression::Expression;

    fn member(name: &str, q: f64) -> Rc<BasicEvent> {
        let be = BasicEvent::new(name);
        be.assign_expression(Expression::constant(q)).unwrap();
        be
    }

    #[test]
    fn beta_factor_total_identity_holds() {
        // sum_k C(n-1,k-1) * Q_k == Q, the defining consistency invariant.
        let n = 3;
        let q = 0.01;
        let model = CcfModel::BetaFactor { beta: 0.1 };
        let total: f64 = (1..=n).map(|k| binom(n - 1, k - 1) * model.level_probability(n, k, q)).sum();
        assert!((total - q).abs() < 1e-12);
    }

    #[test]
    fn alpha_factor_total_identity_holds() {
        let n = 4;
        let q = 0.02;
        let model = CcfModel::AlphaFactor {
            alpha: vec![0.9, 0.05, 0.03, 0.02],
        };
        let total: f64 = (1..=n).map(|k| binom(n - 1, k - 1) * model.level_probability(n, k, q)).sum();
        assert!((total - q).abs() < 1e-9);
    }

    #[test]
    fn phi_factor_must_sum_to_one() {
        let members = vec![member("A", 0.01), member("B", 0.01)];
        let err = CcfGroup::new(
            "G1",
            members,
            CcfModel::PhiFactor { phi: vec![0.5, 0.6] },
            SourceSpan::unknown(),
        )
        .unwrap_err();
        assert!(matches!(err, ScramError::Validation { .. }));
    }

    #[test]
    fn expand_produces_all_nonempty_subsets() {
        let members = vec![member("A", 0.01), member("B", 0.01), member("C", 0.01)];
        let group = CcfGroup::new(
            "G1",
            members,
            CcfModel::BetaFactor { beta: 0.1 },
            SourceSpan::unknown(),
        )
        .unwrap();
        let expansion = group.expand(SourceSpan::unknown()).unwrap();
        assert_eq!(expansion.ccf_events.len(), 7); // 2^3 - 1
        assert_eq!(expansion.substitutions.len(), 3);
    }
}
