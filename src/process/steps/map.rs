use super::element_property;
use crate::error::Result;
use crate::process::step::Step;
use crate::process::traverser::{StepId, Traverser};
use crate::structure::MemoryGraph;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
pub struct IdentityStep {
    id: StepId,
    next: StepId,
    outputs: VecDeque<Traverser>,
}

impl IdentityStep {
    pub fn new(id: StepId, next: StepId) -> Self {
        Self {
            id,
            next,
            outputs: VecDeque::new(),
        }
    }
}

impl Step for IdentityStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
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

/// `values(keys..)`: property values of an element as data traversers.
/// With no keys every property is emitted, in key order.
#[derive(Debug)]
pub struct ValuesStep {
    id: StepId,
    next: StepId,
    keys: Vec<String>,
    graph: Arc<MemoryGraph>,
    outputs: VecDeque<Traverser>,
}

impl ValuesStep {
    pub fn new(id: StepId, next: StepId, keys: Vec<String>, graph: Arc<MemoryGraph>) -> Self {
        Self {
            id,
            next,
            keys,
            graph,
            outputs: VecDeque::new(),
        }
    }
}

impl Step for ValuesStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        let values: Vec<serde_json::Value> = if self.keys.is_empty() {
            traverser
                .element()
                .and_then(|element| self.graph.properties(element))
                .map(|props| props.values().cloned().collect())
                .unwrap_or_default()
        } else {
            self.keys
                .iter()
                .filter_map(|key| element_property(&self.graph, &traverser.value, key))
                .collect()
        };

        for value in values {
            self.outputs.push_back(traverser.split(value, self.next.clone()));
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
