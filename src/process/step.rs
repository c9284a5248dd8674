//! # Steps and Pipelines
//!
//! A compiled traversal is a [`StepPipeline`]: a linear sequence of steps
//! addressed by [`StepId`]. Steps are push based. `add_start` hands a traverser
//! to the step and `next` pulls whatever the step produced, already pointed at
//! the following step (or at `halt` for the last one).
//!
//! Barrier steps additionally implement [`Barrier`]. Workers stage barrier
//! contents and ship them to the master with `next_barrier`; the master fuses
//! them with `add_barrier`. Local barriers hold traversers on each worker
//! until `done` releases them.

use super::side_effects::SideEffects;
use super::traverser::{StepId, Traverser, TraverserSet};
use crate::error::{Result, TraversalError};
use crate::structure::Partition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierKind {
    /// Contributions from every worker are fused at the master
    Global,
    /// Each worker completes the barrier locally once the master releases it
    Local,
}

/// Payload of a `BarrierAdd` contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BarrierContents {
    Traversers(TraverserSet),
    Data(serde_json::Value),
    Empty,
}

pub trait Step: Send + fmt::Debug {
    fn id(&self) -> &StepId;

    fn add_start(&mut self, traverser: Traverser) -> Result<()>;

    fn has_next(&self) -> bool;

    fn next(&mut self) -> Option<Traverser>;

    /// Traversers injected when processing begins. Only start steps produce any.
    fn start(&mut self) -> Result<Vec<Traverser>> {
        Ok(Vec::new())
    }

    /// Restrict the step to the elements of one partition
    #[allow(unused_variables)]
    fn configure_partition(&mut self, partition: Arc<dyn Partition>) {}

    #[allow(unused_variables)]
    fn set_at_master(&mut self, at_master: bool) {}

    fn barrier_kind(&self) -> Option<BarrierKind> {
        None
    }

    fn as_barrier(&mut self) -> Option<&mut dyn Barrier> {
        None
    }

    fn is_order_global(&self) -> bool {
        false
    }

    fn is_range_global(&self) -> bool {
        false
    }

    fn is_tail_global(&self) -> bool {
        false
    }
}

pub trait Barrier {
    fn has_next_barrier(&self) -> bool;

    fn next_barrier(&mut self) -> Result<BarrierContents>;

    fn add_barrier(&mut self, contents: BarrierContents) -> Result<()>;

    /// Release whatever a local barrier holds. No-op for global barriers.
    fn done(&mut self) {}
}

/// Produces fresh, independent pipelines; one per actor
pub trait PipelineFactory: Send + Sync {
    fn create_pipeline(&self) -> Result<StepPipeline>;

    fn describe(&self) -> String;
}

#[derive(Debug)]
pub struct StepPipeline {
    steps: Vec<Box<dyn Step>>,
    index: HashMap<StepId, usize>,
    side_effects: SideEffects,
    description: String,
}

impl StepPipeline {
    pub fn new(
        steps: Vec<Box<dyn Step>>,
        side_effects: SideEffects,
        description: impl Into<String>,
    ) -> Result<Self> {
        let description = description.into();
        if steps.is_empty() {
            return Err(TraversalError::pipeline(
                "pipeline",
                format!("{description} has no steps"),
            ));
        }

        let mut index = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            if step.id().is_halt() || index.insert(step.id().clone(), position).is_some() {
                return Err(TraversalError::pipeline(
                    step.id(),
                    "step ids must be unique and must not use the halt sentinel",
                ));
            }
        }

        Ok(Self {
            steps,
            index,
            side_effects,
            description,
        })
    }

    pub fn get_step(&mut self, id: &StepId) -> Option<&mut dyn Step> {
        let position = *self.index.get(id)?;
        let step: &mut dyn Step = self.steps[position].as_mut();
        Some(step)
    }

    pub fn step_ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|s| s.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn side_effects(&self) -> &SideEffects {
        &self.side_effects
    }

    pub fn describe(&self) -> &str {
        &self.description
    }

    /// Bind every step to a worker's partition and switch side effects to
    /// distributed mode
    pub fn configure_partition(&mut self, partition: Arc<dyn Partition>) {
        for step in &mut self.steps {
            step.configure_partition(Arc::clone(&partition));
        }
        self.side_effects.set_distributed(true);
    }

    pub fn set_at_master(&mut self, at_master: bool) {
        for step in &mut self.steps {
            step.set_at_master(at_master);
        }
    }

    /// Start traversers produced by the first step
    pub fn start(&mut self) -> Result<Vec<Traverser>> {
        self.steps[0].start()
    }

    /// Pull anything still pending in the pipeline through to its end.
    ///
    /// Each step is drained in order and its outputs are fed to the step they
    /// point at, so only halted traversers come out. Reducing steps that never
    /// saw input emit their seed here.
    pub fn drain_tail(&mut self) -> Result<Vec<Traverser>> {
        let mut halted = Vec::new();
        for position in 0..self.steps.len() {
            while self.steps[position].has_next() {
                let Some(traverser) = self.steps[position].next() else {
                    break;
                };
                if traverser.is_halted() {
                    halted.push(traverser);
                    continue;
                }
                let target = *self
                    .index
                    .get(&traverser.step_id)
                    .ok_or_else(|| TraversalError::pipeline(&traverser.step_id, "unknown step"))?;
                if target <= position {
                    return Err(TraversalError::pipeline(
                        &traverser.step_id,
                        "traverser points backwards in a linear pipeline",
                    ));
                }
                self.steps[target].add_start(traverser)?;
            }
        }
        Ok(halted)
    }
}

/// Drain every output a step currently has
pub fn drain_outputs(step: &mut dyn Step) -> Vec<Traverser> {
    let mut outputs = Vec::new();
    while step.has_next() {
        match step.next() {
            Some(traverser) => outputs.push(traverser),
            None => break,
        }
    }
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::steps::{IdentityStep, ReducingStep};
    use serde_json::json;

    fn pipeline() -> StepPipeline {
        let steps: Vec<Box<dyn Step>> = vec![
            Box::new(IdentityStep::new(StepId::new("identity@0"), StepId::new("count@1"))),
            Box::new(ReducingStep::count(StepId::new("count@1"), StepId::halt())),
        ];
        StepPipeline::new(steps, SideEffects::new(), "identity().count()").unwrap()
    }

    #[test]
    fn test_lookup_by_step_id() {
        let mut pipeline = pipeline();
        assert_eq!(pipeline.len(), 2);
        assert!(pipeline.get_step(&StepId::new("count@1")).is_some());
        assert!(pipeline.get_step(&StepId::new("missing")).is_none());
        assert!(pipeline.get_step(&StepId::halt()).is_none());
    }

    #[test]
    fn test_duplicate_step_ids_rejected() {
        let steps: Vec<Box<dyn Step>> = vec![
            Box::new(IdentityStep::new(StepId::new("a"), StepId::new("a"))),
            Box::new(IdentityStep::new(StepId::new("a"), StepId::halt())),
        ];
        assert!(StepPipeline::new(steps, SideEffects::new(), "bad").is_err());
    }

    #[test]
    fn test_drain_tail_emits_reducer_seed() {
        let mut pipeline = pipeline();
        pipeline.set_at_master(true);
        let halted = pipeline.drain_tail().unwrap();
        assert_eq!(halted.len(), 1);
        assert_eq!(halted[0].value.to_json(), json!(0));
        assert!(pipeline.drain_tail().unwrap().is_empty());
    }
}
