//! # Partitioners
//!
//! A [`Partitioner`] enumerates disjoint partitions that together cover the
//! graph and answers which partition owns an element. Edges always live with
//! their out-vertex, so a worker that owns a vertex can walk its out-edges
//! without leaving its partition.

use super::memory::MemoryGraph;
use super::{Edge, Element, ElementId, Vertex};
use crate::constants::partitions::{DEFAULT_LOCATION, GLOBAL_PARTITION_ID};
use crate::error::{Result, TraversalError};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// One slice of the graph, processed by exactly one worker
pub trait Partition: Send + Sync + fmt::Debug {
    /// Stable partition identifier; worker addresses are derived from it
    fn id(&self) -> &str;

    /// Host location hint for the worker running this partition
    fn location(&self) -> &str;

    fn contains(&self, element: &Element) -> bool;

    /// Local vertices with the given ids, or all local vertices when `ids` is empty
    fn vertices(&self, ids: &[ElementId]) -> Vec<Vertex>;

    /// Local edges with the given ids, or all local edges when `ids` is empty
    fn edges(&self, ids: &[ElementId]) -> Vec<Edge>;
}

pub trait Partitioner: Send + Sync + fmt::Debug {
    /// Partitions in a stable order; the first one hosts the vote leader
    fn partitions(&self) -> &[Arc<dyn Partition>];

    fn partition_of(&self, element: &Element) -> Result<Arc<dyn Partition>>;
}

/// Partition backed by a shared [`MemoryGraph`] and an ownership set
#[derive(Debug)]
pub struct MemoryPartition {
    id: String,
    location: String,
    graph: Arc<MemoryGraph>,
    owned: Option<HashSet<ElementId>>,
}

impl MemoryPartition {
    fn owns_vertex(&self, id: ElementId) -> bool {
        match &self.owned {
            Some(owned) => owned.contains(&id),
            None => self.graph.vertex(id).is_some(),
        }
    }

    fn select<T: Clone>(
        items: &[T],
        ids: &[ElementId],
        id_of: impl Fn(&T) -> ElementId,
        keep: impl Fn(&T) -> bool,
    ) -> Vec<T> {
        items
            .iter()
            .filter(|item| ids.is_empty() || ids.contains(&id_of(item)))
            .filter(|item| keep(item))
            .cloned()
            .collect()
    }
}

impl Partition for MemoryPartition {
    fn id(&self) -> &str {
        &self.id
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn contains(&self, element: &Element) -> bool {
        match element {
            Element::Vertex(v) => self.owns_vertex(v.id),
            Element::Edge(e) => self.graph.edge(e.id).is_some() && self.owns_vertex(e.out_v),
        }
    }

    fn vertices(&self, ids: &[ElementId]) -> Vec<Vertex> {
        Self::select(self.graph.vertices(), ids, |v| v.id, |v| self.owns_vertex(v.id))
    }

    fn edges(&self, ids: &[ElementId]) -> Vec<Edge> {
        Self::select(self.graph.edges(), ids, |e| e.id, |e| self.owns_vertex(e.out_v))
    }
}

/// A single partition holding the whole graph
#[derive(Debug)]
pub struct GlobalPartitioner {
    partitions: Vec<Arc<dyn Partition>>,
}

impl GlobalPartitioner {
    pub fn new(graph: Arc<MemoryGraph>) -> Self {
        let partition: Arc<dyn Partition> = Arc::new(MemoryPartition {
            id: GLOBAL_PARTITION_ID.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            graph,
            owned: None,
        });
        Self {
            partitions: vec![partition],
        }
    }
}

impl Partitioner for GlobalPartitioner {
    fn partitions(&self) -> &[Arc<dyn Partition>] {
        &self.partitions
    }

    fn partition_of(&self, element: &Element) -> Result<Arc<dyn Partition>> {
        let partition = &self.partitions[0];
        if partition.contains(element) {
            Ok(Arc::clone(partition))
        } else {
            Err(TraversalError::routing(format!(
                "{element} is not part of the graph"
            )))
        }
    }
}

/// Splits a [`MemoryGraph`] into several partitions by vertex ownership
#[derive(Debug)]
pub struct MemoryPartitioner {
    graph: Arc<MemoryGraph>,
    partitions: Vec<Arc<dyn Partition>>,
    owners: HashMap<ElementId, usize>,
}

impl MemoryPartitioner {
    /// Assign each vertex to partition `id % count`
    pub fn hashed(graph: Arc<MemoryGraph>, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(TraversalError::configuration(
                "a partitioner needs at least one partition",
            ));
        }
        let mut assignment = vec![Vec::new(); count];
        for vertex in graph.vertices() {
            assignment[(vertex.id % count as u64) as usize].push(vertex.id);
        }
        Self::explicit(graph, assignment)
    }

    /// Assign vertices to partitions exactly as listed. Every vertex must be
    /// listed once.
    pub fn explicit(graph: Arc<MemoryGraph>, assignment: Vec<Vec<ElementId>>) -> Result<Self> {
        if assignment.is_empty() {
            return Err(TraversalError::configuration(
                "a partitioner needs at least one partition",
            ));
        }

        let mut owners = HashMap::new();
        let mut partitions: Vec<Arc<dyn Partition>> = Vec::with_capacity(assignment.len());
        for (index, ids) in assignment.into_iter().enumerate() {
            for &id in &ids {
                if graph.vertex(id).is_none() {
                    return Err(TraversalError::configuration(format!(
                        "partition {index} lists unknown vertex {id}"
                    )));
                }
                if owners.insert(id, index).is_some() {
                    return Err(TraversalError::configuration(format!(
                        "vertex {id} is assigned to more than one partition"
                    )));
                }
            }
            partitions.push(Arc::new(MemoryPartition {
                id: format!("partition-{index}"),
                location: DEFAULT_LOCATION.to_string(),
                graph: Arc::clone(&graph),
                owned: Some(ids.into_iter().collect()),
            }));
        }

        if let Some(orphan) = graph.vertices().iter().find(|v| !owners.contains_key(&v.id)) {
            return Err(TraversalError::configuration(format!(
                "vertex {} is not assigned to any partition",
                orphan.id
            )));
        }

        Ok(Self {
            graph,
            partitions,
            owners,
        })
    }

    pub fn graph(&self) -> &Arc<MemoryGraph> {
        &self.graph
    }
}

impl Partitioner for MemoryPartitioner {
    fn partitions(&self) -> &[Arc<dyn Partition>] {
        &self.partitions
    }

    fn partition_of(&self, element: &Element) -> Result<Arc<dyn Partition>> {
        let owner_vertex = match element {
            Element::Vertex(v) => v.id,
            Element::Edge(e) => e.out_v,
        };
        self.owners
            .get(&owner_vertex)
            .map(|&index| Arc::clone(&self.partitions[index]))
            .ok_or_else(|| TraversalError::routing(format!("no partition owns {element}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(graph: &MemoryGraph, id: ElementId) -> Element {
        Element::from(graph.vertex(id).unwrap().clone())
    }

    #[test]
    fn test_global_partitioner_owns_everything() {
        let graph = Arc::new(MemoryGraph::modern());
        let partitioner = GlobalPartitioner::new(Arc::clone(&graph));

        assert_eq!(partitioner.partitions().len(), 1);
        let partition = partitioner.partition_of(&vertex(&graph, 4)).unwrap();
        assert_eq!(partition.id(), "global");
        assert_eq!(partition.vertices(&[]).len(), 6);
        assert_eq!(partition.edges(&[7, 8]).len(), 2);
    }

    #[test]
    fn test_hashed_partitions_are_disjoint_and_covering() {
        let graph = Arc::new(MemoryGraph::modern());
        let partitioner = MemoryPartitioner::hashed(Arc::clone(&graph), 3).unwrap();

        let mut seen = HashSet::new();
        for partition in partitioner.partitions() {
            for v in partition.vertices(&[]) {
                assert!(seen.insert(v.id), "vertex {} owned twice", v.id);
            }
        }
        assert_eq!(seen.len(), graph.vertex_count());
    }

    #[test]
    fn test_edges_live_with_out_vertex() {
        let graph = Arc::new(MemoryGraph::modern());
        let partitioner =
            MemoryPartitioner::explicit(Arc::clone(&graph), vec![vec![1, 2, 3], vec![4, 5, 6]])
                .unwrap();

        let edge = Element::from(graph.edge(10).unwrap().clone());
        let owner = partitioner.partition_of(&edge).unwrap();
        assert_eq!(owner.id(), "partition-1");
        assert!(owner.contains(&edge));
        assert!(!partitioner.partitions()[0].contains(&edge));
    }

    #[test]
    fn test_explicit_assignment_must_cover_graph() {
        let graph = Arc::new(MemoryGraph::modern());
        let result = MemoryPartitioner::explicit(graph, vec![vec![1, 2, 3]]);
        assert!(matches!(result, Err(TraversalError::Configuration(_))));
    }
}
