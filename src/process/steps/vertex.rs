use crate::error::{Result, TraversalError};
use crate::process::step::Step;
use crate::process::traverser::{StepId, Traverser};
use crate::structure::{Direction, Element, MemoryGraph};
use std::collections::VecDeque;
use std::sync::Arc;

/// `out()`, `in()`, `both()` and their edge-returning forms
#[derive(Debug)]
pub struct VertexStep {
    id: StepId,
    next: StepId,
    direction: Direction,
    labels: Vec<String>,
    return_edges: bool,
    graph: Arc<MemoryGraph>,
    outputs: VecDeque<Traverser>,
}

impl VertexStep {
    pub fn new(
        id: StepId,
        next: StepId,
        direction: Direction,
        labels: Vec<String>,
        return_edges: bool,
        graph: Arc<MemoryGraph>,
    ) -> Self {
        Self {
            id,
            next,
            direction,
            labels,
            return_edges,
            graph,
            outputs: VecDeque::new(),
        }
    }
}

impl Step for VertexStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        let Some(vertex) = traverser.element().and_then(Element::as_vertex) else {
            return Err(TraversalError::pipeline(
                &self.id,
                format!("expected a vertex, got {}", traverser.value),
            ));
        };

        let neighbours: Vec<Element> = if self.return_edges {
            self.graph
                .incident_edges(vertex.id, self.direction, &self.labels)
                .into_iter()
                .cloned()
                .map(Element::from)
                .collect()
        } else {
            self.graph
                .adjacent(vertex.id, self.direction, &self.labels)
                .into_iter()
                .cloned()
                .map(Element::from)
                .collect()
        };

        for element in neighbours {
            self.outputs
                .push_back(traverser.split(element, self.next.clone()));
        }
        Ok(())
    }

    fn has_next(&self) -> bool {
        !self.outputs.is_empty()
    }

    fn next(&mut self) -> Option<Traverser> {
        self.outputs.pop_front()
    }
}

/// `outV()`, `inV()`, `bothV()`: from an edge to its endpoints
#[derive(Debug)]
pub struct EdgeVertexStep {
    id: StepId,
    next: StepId,
    direction: Direction,
    graph: Arc<MemoryGraph>,
    outputs: VecDeque<Traverser>,
}

impl EdgeVertexStep {
    pub fn new(id: StepId, next: StepId, direction: Direction, graph: Arc<MemoryGraph>) -> Self {
        Self {
            id,
            next,
            direction,
            graph,
            outputs: VecDeque::new(),
        }
    }
}

impl Step for EdgeVertexStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        let Some(edge) = traverser.element().and_then(Element::as_edge) else {
            return Err(TraversalError::pipeline(
                &self.id,
                format!("expected an edge, got {}", traverser.value),
            ));
        };

        let endpoints = match self.direction {
            Direction::Out => vec![edge.out_v],
            Direction::In => vec![edge.in_v],
            Direction::Both => vec![edge.out_v, edge.in_v],
        };
        for id in endpoints {
            if let Some(vertex) = self.graph.vertex(id) {
                self.outputs
                    .push_back(traverser.split(Element::from(vertex.clone()), self.next.clone()));
            }
        }
        Ok(())
    }

    fn has_next(&self) -> bool {
        !self.outputs.is_empty()
    }

    fn next(&mut self) -> Option<Traverser> {
        self.outputs.pop_front()
    }
}
