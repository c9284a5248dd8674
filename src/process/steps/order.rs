use crate::error::{Result, TraversalError};
use crate::process::step::{Barrier, BarrierContents, BarrierKind, Step};
use crate::process::traverser::{StepId, Traverser, TraverserSet};
use crate::structure::{compare_json, MemoryGraph};
use serde_json::Value as Json;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBy {
    /// The value itself; elements compare by id
    Value,
    Label,
    Property(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// `order()`: a global barrier that emits everything it collected in sorted
/// order once the master drains it
#[derive(Debug)]
pub struct OrderStep {
    id: StepId,
    next: StepId,
    by: OrderBy,
    direction: SortDirection,
    graph: Arc<MemoryGraph>,
    buffer: VecDeque<Traverser>,
    sorted: bool,
    at_master: bool,
}

impl OrderStep {
    pub fn new(
        id: StepId,
        next: StepId,
        by: OrderBy,
        direction: SortDirection,
        graph: Arc<MemoryGraph>,
    ) -> Self {
        Self {
            id,
            next,
            by,
            direction,
            graph,
            buffer: VecDeque::new(),
            sorted: false,
            at_master: false,
        }
    }

    fn sort_key(&self, traverser: &Traverser) -> Json {
        match (&self.by, traverser.element()) {
            (OrderBy::Label, Some(element)) => Json::from(element.label()),
            (OrderBy::Property(key), Some(element)) => {
                self.graph.property(element, key).cloned().unwrap_or(Json::Null)
            }
            _ => traverser.value.to_json(),
        }
    }

    fn sort(&mut self) {
        let buffer = std::mem::take(&mut self.buffer);
        let mut keyed: Vec<(Json, Traverser)> = buffer
            .into_iter()
            .map(|t| (self.sort_key(&t), t))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| {
            let ordering = compare_json(a, b);
            match self.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        self.buffer = keyed.into_iter().map(|(_, t)| t).collect();
        self.sorted = true;
    }
}

impl Step for OrderStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        self.buffer.push_back(traverser);
        self.sorted = false;
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.at_master && !self.buffer.is_empty()
    }

    fn next(&mut self) -> Option<Traverser> {
        if !self.has_next() {
            return None;
        }
        if !self.sorted {
            self.sort();
        }
        self.buffer
            .pop_front()
            .map(|t| t.advance(self.next.clone()))
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

    fn is_order_global(&self) -> bool {
        true
    }
}

impl Barrier for OrderStep {
    fn has_next_barrier(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn next_barrier(&mut self) -> Result<BarrierContents> {
        let traversers: TraverserSet = self.buffer.drain(..).collect();
        Ok(BarrierContents::Traversers(traversers))
    }

    fn add_barrier(&mut self, contents: BarrierContents) -> Result<()> {
        match contents {
            BarrierContents::Traversers(traversers) => {
                self.buffer.extend(traversers);
                self.sorted = false;
                Ok(())
            }
            BarrierContents::Empty => Ok(()),
            BarrierContents::Data(_) => Err(TraversalError::pipeline(
                &self.id,
                "order() only merges traversers",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::step::drain_outputs;
    use crate::structure::Element;

    fn people(graph: &MemoryGraph) -> Vec<Traverser> {
        [1, 2, 4, 6]
            .iter()
            .map(|&id| {
                Traverser::new(Element::from(graph.vertex(id).unwrap().clone()), StepId::new("order@1"))
            })
            .collect()
    }

    #[test]
    fn test_master_sorts_merged_contributions() {
        let graph = Arc::new(MemoryGraph::modern());
        let mut worker = OrderStep::new(
            StepId::new("order@1"),
            StepId::halt(),
            OrderBy::Property("age".to_string()),
            SortDirection::Desc,
            Arc::clone(&graph),
        );
        for t in people(&graph) {
            worker.add_start(t).unwrap();
        }
        assert!(!worker.has_next());
        let contents = worker.next_barrier().unwrap();

        let mut master = OrderStep::new(
            StepId::new("order@1"),
            StepId::halt(),
            OrderBy::Property("age".to_string()),
            SortDirection::Desc,
            Arc::clone(&graph),
        );
        master.set_at_master(true);
        master.add_barrier(contents).unwrap();

        let ids: Vec<_> = drain_outputs(&mut master)
            .iter()
            .filter_map(|t| t.element().map(|e| e.id()))
            .collect();
        assert_eq!(ids, vec![6, 4, 1, 2]);
    }
}
