use crate::error::{Result, TraversalError};
use crate::process::step::Step;
use crate::process::traverser::{StepId, Traverser};
use crate::structure::{Element, ElementId, MemoryGraph, Partition};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStepKind {
    Vertices,
    Edges,
}

/// `V(ids)` / `E(ids)`: the start step. Bound to a partition it only yields
/// the partition's own elements.
#[derive(Debug)]
pub struct GraphStep {
    id: StepId,
    next: StepId,
    kind: GraphStepKind,
    ids: Vec<ElementId>,
    graph: Arc<MemoryGraph>,
    partition: Option<Arc<dyn Partition>>,
}

impl GraphStep {
    pub fn new(
        id: StepId,
        next: StepId,
        kind: GraphStepKind,
        ids: Vec<ElementId>,
        graph: Arc<MemoryGraph>,
    ) -> Self {
        Self {
            id,
            next,
            kind,
            ids,
            graph,
            partition: None,
        }
    }

    fn elements(&self) -> Vec<Element> {
        let wanted = |id: ElementId| self.ids.is_empty() || self.ids.contains(&id);
        match (self.kind, &self.partition) {
            (GraphStepKind::Vertices, Some(partition)) => {
                partition.vertices(&self.ids).into_iter().map(Element::from).collect()
            }
            (GraphStepKind::Edges, Some(partition)) => {
                partition.edges(&self.ids).into_iter().map(Element::from).collect()
            }
            (GraphStepKind::Vertices, None) => self
                .graph
                .vertices()
                .iter()
                .filter(|v| wanted(v.id))
                .cloned()
                .map(Element::from)
                .collect(),
            (GraphStepKind::Edges, None) => self
                .graph
                .edges()
                .iter()
                .filter(|e| wanted(e.id))
                .cloned()
                .map(Element::from)
                .collect(),
        }
    }
}

impl Step for GraphStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, _traverser: Traverser) -> Result<()> {
        Err(TraversalError::pipeline(
            &self.id,
            "graph steps only start a traversal",
        ))
    }

    fn has_next(&self) -> bool {
        false
    }

    fn next(&mut self) -> Option<Traverser> {
        None
    }

    fn start(&mut self) -> Result<Vec<Traverser>> {
        Ok(self
            .elements()
            .into_iter()
            .map(|element| Traverser::new(element, self.next.clone()))
            .collect())
    }

    fn configure_partition(&mut self, partition: Arc<dyn Partition>) {
        self.partition = Some(partition);
    }
}
