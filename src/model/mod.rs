//! The probabilistic risk model: fault trees, parameters, CCF groups, and
//! the shared mission-time handle (spec.md §3, §4).

pub mod ccf;
pub mod event;
pub mod expression;
pub mod fault_tree;
pub mod formula;
pub mod graph;
pub mod identifier;
pub mod mission_time;
pub mod parameter;

use crate::error::{ScramError, SourceSpan};
use ccf::CcfGroup;
use event::{BasicEvent, HouseEvent};
use fault_tree::FaultTree;
use identifier::{Registry, Scope};
use mission_time::MissionTimeHandle;
use parameter::ParameterGraph;
use std::collections::HashMap;
use std::rc::Rc;

/// The full analysis input: every fault tree, the shared parameter graph,
/// every CCF group, and the process-wide mission-time handle (spec.md §3
/// "Model").
pub struct Model {
    pub fault_trees: Vec<FaultTree>,
    pub parameters: ParameterGraph,
    pub ccf_groups: Vec<CcfGroup>,
    pub mission_time: MissionTimeHandle,
    pub registry: Registry,
    house_events: HashMap<String, Rc<HouseEvent>>,
    basic_events: HashMap<String, Rc<BasicEvent>>,
}

impl Model {
    pub fn new() -> Self {
        Self {
            fault_trees: Vec::new(),
            parameters: ParameterGraph::new(),
            ccf_groups: Vec::new(),
            mission_time: MissionTimeHandle::default(),
            registry: Registry::new(),
            house_events: HashMap::new(),
            basic_events: HashMap::new(),
        }
    }

    pub fn add_fault_tree(&mut self, tree: FaultTree) {
        for event in tree.basic_events() {
            self.basic_events.entry(event.id().to_string()).or_insert_with(|| event.clone());
        }
        for event in tree.house_events() {
            self.house_events.entry(event.id().to_string()).or_insert_with(|| event.clone());
        }
        self.fault_trees.push(tree);
    }

    pub fn basic_event(&self, id: &str) -> Option<&Rc<BasicEvent>> {
        self.basic_events.get(id)
    }

    pub fn basic_events(&self) -> impl Iterator<Item = &Rc<BasicEvent>> {
        self.basic_events.values()
    }

    pub fn house_event(&self, id: &str) -> Option<&Rc<HouseEvent>> {
        self.house_events.get(id)
    }

    /// Applies every CCF group's expansion against the model's basic
    /// events, registering the synthetic subset events (spec.md §4.G step
    /// 3). Must run after all fault trees are loaded and before validation,
    /// since the substitution gates are picked up by formula evaluation via
    /// each member's `ccf_gate()` back-reference.
    pub fn expand_ccf_groups(&mut self, span: SourceSpan) -> Result<(), ScramError> {
        let groups = std::mem::take(&mut self.ccf_groups);
        for group in &groups {
            let expansion = group.expand(span.clone())?;
            for event in expansion.ccf_events {
                self.basic_events.insert(event.id().to_string(), event);
            }
        }
        self.ccf_groups = groups;
        Ok(())
    }

    /// Clears every memoised mean and sample across the full model
    /// (spec.md §4.I `Reset()`): every basic event's expression and every
    /// parameter's expression and mean cache.
    pub fn reset_all(&self) {
        for event in self.basic_events.values() {
            event.reset();
        }
        for parameter in self.parameters.iter() {
            parameter.reset();
            parameter.invalidate_mean_cache();
        }
    }

    /// Recomputes orphan flags across every fault tree (spec.md §4.F).
    pub fn recompute_orphans(&self) {
        for tree in &self.fault_trees {
            tree.recompute_orphans();
        }
    }

    pub fn root_scope() -> Scope {
        Scope::root(true)
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}
