//! Graphs, partitioners and job helpers shared by the integration tests

use serde_json::Value as Json;
use std::sync::Arc;
use traversal_actors::config::ActorsConfig;
use traversal_actors::structure::{ElementId, MemoryGraph, MemoryPartitioner, Partitioner};
use traversal_actors::{GraphActors, JobResult, Result, Traversal, TraverserSet};

pub fn modern() -> Arc<MemoryGraph> {
    Arc::new(MemoryGraph::modern())
}

/// `v1 -> v2 -> ... -> vN`, every vertex labelled `node`
pub fn chain(length: u64) -> Arc<MemoryGraph> {
    let mut builder = MemoryGraph::builder();
    for id in 1..=length {
        builder = builder.vertex(id, "node", vec![("name".to_string(), Json::from(format!("n{id}")))]);
    }
    for id in 1..length {
        builder = builder.edge(100 + id, id, "next", id + 1, Vec::<(String, Json)>::new());
    }
    Arc::new(builder.build().expect("chain graph"))
}

pub fn explicit(graph: &Arc<MemoryGraph>, assignment: Vec<Vec<ElementId>>) -> Arc<dyn Partitioner> {
    Arc::new(MemoryPartitioner::explicit(Arc::clone(graph), assignment).expect("explicit partitioning"))
}

pub fn hashed(graph: &Arc<MemoryGraph>, count: usize) -> Arc<dyn Partitioner> {
    Arc::new(MemoryPartitioner::hashed(Arc::clone(graph), count).expect("hashed partitioning"))
}

/// Configuration for tests: a generous timeout so a stuck vote fails instead of hanging
pub fn test_config() -> ActorsConfig {
    let mut config = ActorsConfig::default();
    config.job.timeout_ms = Some(10_000);
    config
}

pub async fn run(
    traversal: Traversal,
    graph: &Arc<MemoryGraph>,
    partitioner: Arc<dyn Partitioner>,
) -> Result<JobResult> {
    GraphActors::new(test_config())
        .partitioner(partitioner)
        .submit(traversal.bind(Arc::clone(graph)))
        .await
}

pub fn values(traversers: &TraverserSet) -> Vec<Json> {
    traversers.iter().map(|t| t.value.to_json()).collect()
}

/// Values with bulk expanded, sorted, for comparing unordered results
pub fn value_multiset(traversers: &TraverserSet) -> Vec<String> {
    let mut expanded: Vec<String> = traversers
        .iter()
        .flat_map(|t| std::iter::repeat(t.value.to_json().to_string()).take(t.bulk.max(0) as usize))
        .collect();
    expanded.sort();
    expanded
}
