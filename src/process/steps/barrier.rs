//! Side-effect steps and the local barrier.

use super::{group_key, GroupBy};
use crate::error::Result;
use crate::process::side_effects::{Reducer, SideEffects};
use crate::process::step::{Barrier, BarrierContents, BarrierKind, Step};
use crate::process::traverser::{StepId, Traverser};
use crate::structure::MemoryGraph;
use serde_json::{Map, Value as Json};
use std::collections::VecDeque;
use std::sync::Arc;

/// `barrier()` and `aggregate(key)`: a local barrier.
///
/// Each worker holds the traversers that reach it. The first vote after
/// they arrive ships an empty marker to the master; the master later
/// broadcasts `BarrierDone` and every worker releases what it holds. With a
/// side-effect key, every value is also appended to that side effect.
#[derive(Debug)]
pub struct AggregateStep {
    id: StepId,
    next: StepId,
    key: Option<String>,
    side_effects: SideEffects,
    held: Vec<Traverser>,
    released: VecDeque<Traverser>,
    flushed: bool,
}

impl AggregateStep {
    pub fn new(id: StepId, next: StepId, key: Option<String>, side_effects: SideEffects) -> Self {
        if let Some(key) = &key {
            side_effects.register(key, Reducer::Append);
        }
        Self {
            id,
            next,
            key,
            side_effects,
            held: Vec::new(),
            released: VecDeque::new(),
            flushed: false,
        }
    }
}

impl Step for AggregateStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        if let Some(key) = &self.key {
            let copies = traverser.bulk.max(0) as usize;
            let values = vec![traverser.value.to_json(); copies];
            self.side_effects.add(key, Json::Array(values))?;
        }
        self.held.push(traverser);
        self.flushed = false;
        Ok(())
    }

    fn has_next(&self) -> bool {
        !self.released.is_empty()
    }

    fn next(&mut self) -> Option<Traverser> {
        self.released.pop_front()
    }

    fn barrier_kind(&self) -> Option<BarrierKind> {
        Some(BarrierKind::Local)
    }

    fn as_barrier(&mut self) -> Option<&mut dyn Barrier> {
        Some(self)
    }
}

impl Barrier for AggregateStep {
    fn has_next_barrier(&self) -> bool {
        !self.held.is_empty() && !self.flushed
    }

    fn next_barrier(&mut self) -> Result<BarrierContents> {
        self.flushed = true;
        Ok(BarrierContents::Empty)
    }

    fn add_barrier(&mut self, _contents: BarrierContents) -> Result<()> {
        Ok(())
    }

    fn done(&mut self) {
        let next = self.next.clone();
        self.released
            .extend(self.held.drain(..).map(|t| t.advance(next.clone())));
        self.flushed = false;
    }
}

/// `groupCount(key)`: counts into a side effect and passes traversers through
#[derive(Debug)]
pub struct GroupCountSideEffectStep {
    id: StepId,
    next: StepId,
    key: String,
    by: GroupBy,
    graph: Arc<MemoryGraph>,
    side_effects: SideEffects,
    outputs: VecDeque<Traverser>,
}

impl GroupCountSideEffectStep {
    pub fn new(
        id: StepId,
        next: StepId,
        key: String,
        by: GroupBy,
        graph: Arc<MemoryGraph>,
        side_effects: SideEffects,
    ) -> Self {
        side_effects.register(&key, Reducer::MergeCounts);
        Self {
            id,
            next,
            key,
            by,
            graph,
            side_effects,
            outputs: VecDeque::new(),
        }
    }
}

impl Step for GroupCountSideEffectStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        let mut delta = Map::new();
        delta.insert(
            group_key(&self.by, &self.graph, &traverser.value),
            Json::from(traverser.bulk),
        );
        self.side_effects.add(&self.key, Json::Object(delta))?;
        self.outputs.push_back(traverser.advance(self.next.clone()));
        Ok(())
    }

    fn has_next(&self) -> bool {
        !self.outputs.is_empty()
    }

    fn next(&mut self) -> Option<Traverser> {
        self.outputs.pop_front()
    }
}

/// `cap(key)`: consumes every traverser and emits the side effect's value once,
/// at the master, after all deltas have been merged there
#[derive(Debug)]
pub struct CapStep {
    id: StepId,
    next: StepId,
    key: String,
    side_effects: SideEffects,
    seen: bool,
    at_master: bool,
    emitted: bool,
}

impl CapStep {
    pub fn new(id: StepId, next: StepId, key: String, side_effects: SideEffects) -> Self {
        Self {
            id,
            next,
            key,
            side_effects,
            seen: false,
            at_master: false,
            emitted: false,
        }
    }
}

impl Step for CapStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, _traverser: Traverser) -> Result<()> {
        self.seen = true;
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.at_master && !self.emitted
    }

    fn next(&mut self) -> Option<Traverser> {
        if !self.has_next() {
            return None;
        }
        self.emitted = true;
        let value = self.side_effects.get(&self.key).unwrap_or(Json::Null);
        Some(Traverser::new(value, self.next.clone()))
    }

    fn set_at_master(&mut self, at_master: bool) {
        self.at_master = at_master;
    }

    fn barrier_kind(&self) -> Option<BarrierKind> {
        Some(BarrierKind::Global)
    }

    fn as_barrier(&mut self) -> Option<&mut dyn Barrier> {
        Some(self)
    }
}

impl Barrier for CapStep {
    fn has_next_barrier(&self) -> bool {
        self.seen
    }

    fn next_barrier(&mut self) -> Result<BarrierContents> {
        self.seen = false;
        Ok(BarrierContents::Empty)
    }

    fn add_barrier(&mut self, _contents: BarrierContents) -> Result<()> {
        self.seen = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::step::drain_outputs;
    use serde_json::json;

    #[test]
    fn test_aggregate_holds_until_done() {
        let side_effects = SideEffects::new();
        side_effects.set_distributed(true);
        let mut step = AggregateStep::new(
            StepId::new("aggregate@1"),
            StepId::new("cap@2"),
            Some("x".to_string()),
            side_effects.clone(),
        );

        step.add_start(Traverser::new(json!(1), StepId::new("aggregate@1"))).unwrap();
        step.add_start(Traverser::new(json!(2), StepId::new("aggregate@1"))).unwrap();
        assert!(!step.has_next());
        assert!(step.has_next_barrier());
        assert_eq!(step.next_barrier().unwrap(), BarrierContents::Empty);
        assert!(!step.has_next_barrier());
        assert_eq!(side_effects.take_pending(), vec![("x".to_string(), json!([1, 2]))]);

        step.done();
        let released = drain_outputs(&mut step);
        assert_eq!(released.len(), 2);
        assert!(released.iter().all(|t| t.step_id.as_str() == "cap@2"));
    }

    #[test]
    fn test_cap_emits_side_effect_once_at_master() {
        let side_effects = SideEffects::new();
        side_effects.register("x", Reducer::Sum);
        side_effects.add("x", json!(5)).unwrap();

        let mut step = CapStep::new(
            StepId::new("cap@1"),
            StepId::halt(),
            "x".to_string(),
            side_effects,
        );
        assert!(!step.has_next());
        step.set_at_master(true);
        assert_eq!(step.next().map(|t| t.value.to_json()), Some(json!(5)));
        assert!(step.next().is_none());
    }

    #[test]
    fn test_group_count_side_effect_passes_through() {
        let graph = Arc::new(MemoryGraph::modern());
        let side_effects = SideEffects::new();
        let mut step = GroupCountSideEffectStep::new(
            StepId::new("groupCount@1"),
            StepId::halt(),
            "labels".to_string(),
            GroupBy::Label,
            Arc::clone(&graph),
            side_effects.clone(),
        );
        for v in graph.vertices() {
            step.add_start(Traverser::new(v.clone(), StepId::new("groupCount@1")))
                .unwrap();
        }
        assert_eq!(drain_outputs(&mut step).len(), 6);
        assert_eq!(side_effects.get("labels"), Some(json!({"person": 4, "software": 2})));
    }
}
