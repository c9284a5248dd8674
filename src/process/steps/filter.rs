use crate::error::Result;
use crate::process::step::Step;
use crate::process::traverser::{StepId, Traverser};
use crate::structure::MemoryGraph;
use serde_json::Value as Json;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    HasLabel(Vec<String>),
    Has { key: String, value: Json },
}

/// Passes traversers whose element satisfies the predicate; drops the rest
#[derive(Debug)]
pub struct FilterStep {
    id: StepId,
    next: StepId,
    predicate: Predicate,
    graph: Arc<MemoryGraph>,
    outputs: VecDeque<Traverser>,
}

impl FilterStep {
    pub fn new(id: StepId, next: StepId, predicate: Predicate, graph: Arc<MemoryGraph>) -> Self {
        Self {
            id,
            next,
            predicate,
            graph,
            outputs: VecDeque::new(),
        }
    }

    fn test(&self, traverser: &Traverser) -> bool {
        let Some(element) = traverser.element() else {
            return false;
        };
        match &self.predicate {
            Predicate::HasLabel(labels) => labels.iter().any(|l| l == element.label()),
            Predicate::Has { key, value } => self.graph.property(element, key) == Some(value),
        }
    }
}

impl Step for FilterStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        if self.test(&traverser) {
            self.outputs.push_back(traverser.advance(self.next.clone()));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::step::drain_outputs;
    use crate::structure::Element;
    use serde_json::json;

    fn start(graph: &MemoryGraph, id: u64) -> Traverser {
        Traverser::new(
            Element::from(graph.vertex(id).unwrap().clone()),
            StepId::new("filter@1"),
        )
    }

    #[test]
    fn test_has_label() {
        let graph = Arc::new(MemoryGraph::modern());
        let mut step = FilterStep::new(
            StepId::new("filter@1"),
            StepId::halt(),
            Predicate::HasLabel(vec!["software".to_string()]),
            Arc::clone(&graph),
        );
        for id in 1..=6 {
            step.add_start(start(&graph, id)).unwrap();
        }
        let ids: Vec<_> = drain_outputs(&mut step)
            .iter()
            .filter_map(|t| t.element().map(|e| e.id()))
            .collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn test_has_property_and_data_is_dropped() {
        let graph = Arc::new(MemoryGraph::modern());
        let mut step = FilterStep::new(
            StepId::new("filter@1"),
            StepId::halt(),
            Predicate::Has {
                key: "name".to_string(),
                value: json!("josh"),
            },
            Arc::clone(&graph),
        );
        step.add_start(start(&graph, 4)).unwrap();
        step.add_start(start(&graph, 1)).unwrap();
        step.add_start(Traverser::new(json!("josh"), StepId::new("filter@1")))
            .unwrap();
        assert_eq!(drain_outputs(&mut step).len(), 1);
    }
}
