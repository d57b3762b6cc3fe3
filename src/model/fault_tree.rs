//! Fault-tree container: a named root gate plus the full set of events and
//! gates reachable from it (spec.md §3, §4.F).

use crate::model::event::{BasicEvent, Gate, HouseEvent, PrimaryEvent};
use crate::model::formula::FormulaArg;
use std::collections::HashMap;
use std::rc::Rc;

/// One fault tree: a collection of named top gates plus every gate and
/// primary event reachable from them. Orphan flags (spec.md §4.F) are
/// computed once over the whole collection, since an event can be shared
/// across multiple top gates within the same tree.
#[derive(Debug, Default)]
pub struct FaultTree {
    name: String,
    top_gates: Vec<Rc<Gate>>,
    gates: HashMap<String, Rc<Gate>>,
    house_events: HashMap<String, Rc<HouseEvent>>,
    basic_events: HashMap<String, Rc<BasicEvent>>,
}

impl FaultTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_top_gate(&mut self, gate: Rc<Gate>) {
        self.gates.insert(gate.id().to_string(), gate.clone());
        self.top_gates.push(gate);
    }

    pub fn add_gate(&mut self, gate: Rc<Gate>) {
        self.gates.entry(gate.id().to_string()).or_insert(gate);
    }

    pub fn add_house_event(&mut self, event: Rc<HouseEvent>) {
        self.house_events.entry(event.id().to_string()).or_insert(event);
    }

    pub fn add_basic_event(&mut self, event: Rc<BasicEvent>) {
        self.basic_events.entry(event.id().to_string()).or_insert(event);
    }

    pub fn top_gates(&self) -> &[Rc<Gate>] {
        &self.top_gates
    }

    pub fn gates(&self) -> impl Iterator<Item = &Rc<Gate>> {
        self.gates.values()
    }

    pub fn gate(&self, id: &str) -> Option<&Rc<Gate>> {
        self.gates.get(id)
    }

    pub fn basic_events(&self) -> impl Iterator<Item = &Rc<BasicEvent>> {
        self.basic_events.values()
    }

    pub fn basic_event(&self, id: &str) -> Option<&Rc<BasicEvent>> {
        self.basic_events.get(id)
    }

    pub fn house_events(&self) -> impl Iterator<Item = &Rc<HouseEvent>> {
        self.house_events.values()
    }

    pub fn house_event(&self, id: &str) -> Option<&Rc<HouseEvent>> {
        self.house_events.get(id)
    }

    /// Recomputes every event's and gate's orphan flag: an element is an
    /// orphan unless it is a declared top gate or reachable from one
    /// through some formula (spec.md §4.F).
    pub fn recompute_orphans(&self) {
        let mut reachable_gates: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut reachable_house: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut reachable_basic: std::collections::HashSet<String> = std::collections::HashSet::new();

        for top in &self.top_gates {
            walk(top, &mut reachable_gates, &mut reachable_house, &mut reachable_basic);
        }

        for (id, gate) in &self.gates {
            gate.set_orphan(!reachable_gates.contains(id));
        }
        for (id, event) in &self.house_events {
            event.set_orphan(!reachable_house.contains(id));
        }
        for (id, event) in &self.basic_events {
            event.set_orphan(!reachable_basic.contains(id));
        }
    }

    /// Promotes every gate not referenced as another gate's child to a top
    /// gate. The MEF format has no explicit "this is a top gate" marker, so
    /// the reader (`mef::reader`) calls this once a tree's gates are fully
    /// declared: whatever nothing points to is, by construction, a root.
    pub fn promote_unreferenced_gates_to_top(&mut self) {
        let mut referenced: std::collections::HashSet<String> = std::collections::HashSet::new();
        for gate in self.gates.values() {
            collect_gate_refs(gate.formula().args(), &mut referenced);
        }
        let already_top: std::collections::HashSet<String> =
            self.top_gates.iter().map(|g| g.id().to_string()).collect();
        let mut ids: Vec<&String> = self.gates.keys().collect();
        ids.sort();
        for id in ids {
            if !referenced.contains(id) && !already_top.contains(id) {
                self.top_gates.push(self.gates[id].clone());
            }
        }
    }

    /// All primary events reachable from the declared top gates, in the
    /// order first encountered.
    pub fn reachable_primary_events(&self) -> Vec<PrimaryEvent> {
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut out = Vec::new();
        for top in &self.top_gates {
            collect_primary(top, &mut seen, &mut out);
        }
        out
    }
}

fn walk(
    gate: &Rc<Gate>,
    gates: &mut std::collections::HashSet<String>,
    house: &mut std::collections::HashSet<String>,
    basic: &mut std::collections::HashSet<String>,
) {
    if !gates.insert(gate.id().to_string()) {
        return;
    }
    walk_args(gate.formula().args(), gates, house, basic);
}

fn walk_args(
    args: &[FormulaArg],
    gates: &mut std::collections::HashSet<String>,
    house: &mut std::collections::HashSet<String>,
    basic: &mut std::collections::HashSet<String>,
) {
    for arg in args {
        match arg {
            FormulaArg::House(h) => {
                house.insert(h.id().to_string());
            }
            FormulaArg::Basic(b) => {
                basic.insert(b.id().to_string());
            }
            FormulaArg::Gate(g) => walk(g, gates, house, basic),
            FormulaArg::Nested(f) => walk_args(f.args(), gates, house, basic),
        }
    }
}

fn collect_gate_refs(args: &[FormulaArg], out: &mut std::collections::HashSet<String>) {
    for arg in args {
        match arg {
            FormulaArg::Gate(g) => {
                out.insert(g.id().to_string());
            }
            FormulaArg::Nested(f) => collect_gate_refs(f.args(), out),
            FormulaArg::House(_) | FormulaArg::Basic(_) => {}
        }
    }
}

fn collect_primary(gate: &Rc<Gate>, seen: &mut std::collections::HashSet<String>, out: &mut Vec<PrimaryEvent>) {
    if !seen.insert(format!("gate:{}", gate.id())) {
        return;
    }
    collect_primary_args(gate.formula().args(), seen, out);
}

fn collect_primary_args(
    args: &[FormulaArg],
    seen: &mut std::collections::HashSet<String>,
    out: &mut Vec<PrimaryEvent>,
) {
    for arg in args {
        match arg {
            FormulaArg::House(h) => {
                if seen.insert(format!("house:{}", h.id())) {
                    out.push(PrimaryEvent::House(h.clone()));
                }
            }
            FormulaArg::Basic(b) => {
                if seen.insert(format!("basic:{}", b.id())) {
                    out.push(PrimaryEvent::Basic(b.clone()));
                }
            }
            FormulaArg::Gate(g) => collect_primary(g, seen, out),
            FormulaArg::Nested(f) => collect_primary_args(f.args(), seen, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceSpan;
    use crate::model::expression::Expression;
    use crate::model::formula::{Formula, Operator};

    #[test]
    fn unreferenced_gate_is_orphan() {
        let leaf_a = BasicEvent::new("A");
        leaf_a.assign_expression(Expression::constant(0.1)).unwrap();
        let leaf_b = BasicEvent::new("B");
        leaf_b.assign_expression(Expression::constant(0.2)).unwrap();

        let top_formula = Formula::new(
            Operator::Null,
            vec![FormulaArg::Basic(leaf_a.clone())],
            SourceSpan::unknown(),
        )
        .unwrap();
        let top = Gate::new("Top", top_formula);

        let stray_formula = Formula::new(
            Operator::Not,
            vec![FormulaArg::Basic(leaf_b.clone())],
            SourceSpan::unknown(),
        )
        .unwrap();
        let stray = Gate::new("Stray", stray_formula);

        let mut tree = FaultTree::new("Example");
        tree.add_top_gate(top);
        tree.add_gate(stray.clone());
        tree.add_basic_event(leaf_a);
        tree.add_basic_event(leaf_b.clone());

        tree.recompute_orphans();
        assert!(stray.is_orphan());
        assert!(leaf_b.is_orphan());
    }

    #[test]
    fn promotes_the_one_gate_nothing_points_to() {
        let leaf_a = BasicEvent::new("A");
        leaf_a.assign_expression(Expression::constant(0.1)).unwrap();
        let leaf_b = BasicEvent::new("B");
        leaf_b.assign_expression(Expression::constant(0.2)).unwrap();

        let child_formula = Formula::new(
            Operator::Null,
            vec![FormulaArg::Basic(leaf_a.clone())],
            SourceSpan::unknown(),
        )
        .unwrap();
        let child = Gate::new("Child", child_formula);

        let top_formula = Formula::new(
            Operator::And,
            vec![FormulaArg::Gate(child.clone()), FormulaArg::Basic(leaf_b.clone())],
            SourceSpan::unknown(),
        )
        .unwrap();
        let top = Gate::new("Top", top_formula);

        let mut tree = FaultTree::new("Example");
        tree.add_gate(child);
        tree.add_gate(top.clone());
        tree.add_basic_event(leaf_a);
        tree.add_basic_event(leaf_b);

        tree.promote_unreferenced_gates_to_top();
        assert_eq!(tree.top_gates().len(), 1);
        assert_eq!(tree.top_gates()[0].id(), top.id());
    }
}
