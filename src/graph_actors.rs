//! # Graph Actors
//!
//! Entry point for running a traversal over a partitioned graph. A
//! [`GraphActors`] instance holds the configuration and partitioner; each
//! submitted job gets its own actor system, master and workers.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use traversal_actors::config::ActorsConfig;
//! use traversal_actors::process::Traversal;
//! use traversal_actors::structure::{MemoryGraph, MemoryPartitioner};
//! use traversal_actors::GraphActors;
//!
//! # async fn example() -> traversal_actors::Result<()> {
//! let graph = Arc::new(MemoryGraph::modern());
//! let partitioner = Arc::new(MemoryPartitioner::hashed(Arc::clone(&graph), 3)?);
//! let result = GraphActors::new(ActorsConfig::default())
//!     .partitioner(partitioner)
//!     .submit(Traversal::v([]).out(["knows"]).count().bind(graph))
//!     .await?;
//! println!("{} traversers", result.traversers.len());
//! # Ok(())
//! # }
//! ```

use crate::actors::{ActorProgram, ActorSystem, Address, MasterActor, ProgramState, TokioActorSystem};
use crate::config::{ActorsConfig, ConfigManager};
use crate::error::{Result, TraversalError};
use crate::logging::log_job;
use crate::process::{PipelineFactory, TraverserSet};
use crate::program::{ResultSink, TraversalActorProgram};
use crate::structure::Partitioner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Outcome of a completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: Uuid,
    /// In arrival order, or in stamp order when the traversal ordered its output
    pub traversers: TraverserSet,
    pub side_effects: BTreeMap<String, Json>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GraphActors {
    config: ActorsConfig,
    partitioner: Option<Arc<dyn Partitioner>>,
}

impl GraphActors {
    pub fn new(config: ActorsConfig) -> Self {
        Self {
            config,
            partitioner: None,
        }
    }

    pub fn from_manager(manager: &ConfigManager) -> Self {
        Self::new(manager.config().clone())
    }

    pub fn partitioner(mut self, partitioner: Arc<dyn Partitioner>) -> Self {
        self.partitioner = Some(partitioner);
        self
    }

    pub fn config(&self) -> &ActorsConfig {
        &self.config
    }

    /// Start an actor program in a fresh actor system without waiting for it.
    /// Must be called from within a tokio runtime.
    pub fn launch(&self, program: Box<dyn ActorProgram>, sink: ResultSink) -> Result<JobHandle> {
        self.config.validate()?;
        let partitioner = self
            .partitioner
            .clone()
            .ok_or_else(|| TraversalError::configuration("no partitioner configured"))?;

        let job_id = Uuid::new_v4();
        let system = TokioActorSystem::new(&self.config);
        let mut state = ProgramState::new();
        program.store_state(&mut state);

        let master = Address::master(self.config.master_location.clone());
        let actor = MasterActor::new(
            master.clone(),
            Arc::new(system.clone()),
            program,
            state,
            partitioner,
            self.config.worker_prefix.clone(),
        );
        system.spawn(Box::new(actor))?;
        log_job(&job_id.to_string(), "started", Some(system.name()));

        Ok(JobHandle {
            job_id,
            system,
            master,
            sink,
            started_at: Utc::now(),
            timeout: self.config.job.timeout(),
        })
    }

    /// Run a traversal to completion
    #[instrument(skip_all, fields(system = %self.config.system_name, pipeline = %factory.describe()))]
    pub async fn submit<F: PipelineFactory + 'static>(&self, factory: F) -> Result<JobResult> {
        let sink = ResultSink::new();
        let program = TraversalActorProgram::new(factory, sink.clone());
        self.launch(Box::new(program), sink)?.await_result().await
    }
}

/// A running job
#[derive(Debug)]
pub struct JobHandle {
    job_id: Uuid,
    system: TokioActorSystem,
    master: Address,
    sink: ResultSink,
    started_at: DateTime<Utc>,
    timeout: Option<Duration>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn system(&self) -> &TokioActorSystem {
        &self.system
    }

    pub fn master(&self) -> &Address {
        &self.master
    }

    /// Wait for the actor system to terminate and collect the master's output
    pub async fn await_result(self) -> Result<JobResult> {
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.system.await_termination()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.system.fail(TraversalError::host(format!(
                        "job {} timed out after {}ms",
                        self.job_id,
                        limit.as_millis()
                    )));
                    self.system.await_termination().await
                }
            },
            None => self.system.await_termination().await,
        };

        if let Err(error) = outcome {
            log_job(&self.job_id.to_string(), "failed", Some(&error.to_string()));
            return Err(error);
        }

        let output = self.sink.take().ok_or_else(|| {
            TraversalError::host(format!("job {} terminated without a result", self.job_id))
        })?;
        let completed_at = Utc::now();
        info!(
            job_id = %self.job_id,
            traversers = output.traversers.len(),
            elapsed_ms = (completed_at - self.started_at).num_milliseconds(),
            "✅ JOB: completed"
        );

        Ok(JobResult {
            job_id: self.job_id,
            traversers: output.traversers,
            side_effects: output.side_effects,
            started_at: self.started_at,
            completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Traversal;
    use crate::structure::{MemoryGraph, MemoryPartitioner};
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_partitioner_is_configuration_error() {
        let graph = Arc::new(MemoryGraph::modern());
        let result = GraphActors::new(ActorsConfig::default())
            .submit(Traversal::v([]).count().bind(graph))
            .await;
        assert!(matches!(result, Err(TraversalError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_count_over_partitions() {
        let graph = Arc::new(MemoryGraph::modern());
        let partitioner = Arc::new(MemoryPartitioner::hashed(Arc::clone(&graph), 3).unwrap());
        let result = GraphActors::new(ActorsConfig::default())
            .partitioner(partitioner)
            .submit(Traversal::v([]).count().bind(graph))
            .await
            .unwrap();

        let values: Vec<Json> = result.traversers.iter().map(|t| t.value.to_json()).collect();
        assert_eq!(values, vec![json!(6)]);
        assert!(result.completed_at >= result.started_at);
    }
}
