//! # Traversal Actor Program
//!
//! The actor program that executes a compiled traversal across the partitions
//! of a graph. Each actor compiles its own pipeline from a shared
//! [`PipelineFactory`]; the master program publishes the final traversers and
//! side effects into a [`ResultSink`] that the submitting side reads after
//! the actor system has terminated.

pub mod master;
pub mod termination;
pub mod worker;

pub use master::TraversalMasterProgram;
pub use termination::{MasterVote, MessageCounters, WorkerVote};
pub use worker::TraversalWorkerProgram;

use crate::actors::{
    ActorProgram, Address, MasterHandle, MasterProgram, MessageClass, ProgramState, WorkerHandle,
    WorkerProgram,
};
use crate::constants::state::{ACTOR_PROGRAM_KEY, PIPELINE_KEY};
use crate::error::{Result, TraversalError};
use crate::process::{PipelineFactory, TraverserSet};
use crate::structure::{Element, Partitioner};
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const PROGRAM_NAME: &str = "TraversalActorProgram";

/// What the master publishes once the traversal completes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraversalOutput {
    pub traversers: TraverserSet,
    pub side_effects: BTreeMap<String, Json>,
}

/// Write-once slot for the master's output
#[derive(Debug, Clone, Default)]
pub struct ResultSink(Arc<Mutex<Option<TraversalOutput>>>);

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, output: TraversalOutput) {
        *self.0.lock() = Some(output);
    }

    pub fn take(&self) -> Option<TraversalOutput> {
        self.0.lock().take()
    }

    pub fn is_published(&self) -> bool {
        self.0.lock().is_some()
    }
}

/// Maps partitions to the worker that owns them
#[derive(Debug, Clone)]
pub struct PartitionRoutes {
    partitioner: Arc<dyn Partitioner>,
    addresses: HashMap<String, Address>,
}

impl PartitionRoutes {
    /// `workers` must be in partition order
    pub fn new(partitioner: Arc<dyn Partitioner>, workers: &[Address]) -> Result<Self> {
        let partitions = partitioner.partitions();
        if partitions.len() != workers.len() {
            return Err(TraversalError::configuration(format!(
                "{} partitions but {} workers",
                partitions.len(),
                workers.len()
            )));
        }
        let addresses = partitions
            .iter()
            .zip(workers)
            .map(|(partition, worker)| (partition.id().to_string(), worker.clone()))
            .collect();
        Ok(Self {
            partitioner,
            addresses,
        })
    }

    pub fn route(&self, element: &Element) -> Result<Address> {
        let partition = self.partitioner.partition_of(element)?;
        self.addresses.get(partition.id()).cloned().ok_or_else(|| {
            TraversalError::routing(format!(
                "partition {} of {element} has no worker",
                partition.id()
            ))
        })
    }
}

/// Runs the pipelines produced by `F` on the master and every worker
pub struct TraversalActorProgram<F: PipelineFactory> {
    factory: Arc<F>,
    sink: ResultSink,
}

impl<F: PipelineFactory> TraversalActorProgram<F> {
    pub fn new(factory: F, sink: ResultSink) -> Self {
        Self {
            factory: Arc::new(factory),
            sink,
        }
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }
}

impl<F: PipelineFactory + 'static> ActorProgram for TraversalActorProgram<F> {
    fn name(&self) -> &str {
        PROGRAM_NAME
    }

    fn create_master_program(&self, handle: Box<dyn MasterHandle>) -> Result<Box<dyn MasterProgram>> {
        let pipeline = self.factory.create_pipeline()?;
        let program = TraversalMasterProgram::new(handle, pipeline, self.sink.clone())?;
        Ok(Box::new(program))
    }

    fn create_worker_program(&self, handle: Box<dyn WorkerHandle>) -> Result<Box<dyn WorkerProgram>> {
        let pipeline = self.factory.create_pipeline()?;
        let program = TraversalWorkerProgram::new(handle, pipeline)?;
        Ok(Box::new(program))
    }

    fn message_priorities(&self) -> Option<Vec<MessageClass>> {
        Some(vec![
            MessageClass::Start,
            MessageClass::Traverser,
            MessageClass::SideEffectSet,
            MessageClass::BarrierDone,
            MessageClass::SideEffectAdd,
            MessageClass::BarrierAdd,
            MessageClass::Terminate,
        ])
    }

    fn clone_program(&self) -> Box<dyn ActorProgram> {
        Box::new(Self {
            factory: Arc::clone(&self.factory),
            sink: self.sink.clone(),
        })
    }

    fn store_state(&self, state: &mut ProgramState) {
        state.set(ACTOR_PROGRAM_KEY, Json::from(PROGRAM_NAME));
        state.set(PIPELINE_KEY, Json::from(self.factory.describe()));
    }

    fn load_state(&self, state: &ProgramState) -> Result<()> {
        match state.get_str(ACTOR_PROGRAM_KEY) {
            Some(PROGRAM_NAME) => {}
            other => {
                return Err(TraversalError::configuration(format!(
                    "state names program {other:?}, expected {PROGRAM_NAME}"
                )))
            }
        }
        let expected = self.factory.describe();
        match state.get_str(PIPELINE_KEY) {
            Some(pipeline) if pipeline == expected => Ok(()),
            other => Err(TraversalError::configuration(format!(
                "state describes pipeline {other:?}, expected {expected}"
            ))),
        }
    }
}
