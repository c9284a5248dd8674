//! Reducing barriers fold every traverser into one accumulator. Workers ship
//! partial accumulators to the master, which merges them and emits a single
//! result. A reducing step at the master that never saw input still emits
//! its seed (`count()` of nothing is `0`).

use super::group_key;
use crate::error::{Result, TraversalError};
use crate::process::side_effects::Reducer;
use crate::process::step::{Barrier, BarrierContents, BarrierKind, Step};
use crate::process::traverser::{StepId, Traverser};
use crate::structure::MemoryGraph;
use serde_json::{Map, Value as Json};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupBy {
    Label,
    Property(String),
    /// The value itself (element id for elements)
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    Count,
    Sum,
    GroupCount(GroupBy),
}

impl Reduction {
    fn seed(&self) -> Json {
        self.reducer().identity()
    }

    /// Reducer that merges two partial accumulators
    fn reducer(&self) -> Reducer {
        match self {
            Reduction::Count | Reduction::Sum => Reducer::Sum,
            Reduction::GroupCount(_) => Reducer::MergeCounts,
        }
    }
}

#[derive(Debug)]
pub struct ReducingStep {
    id: StepId,
    next: StepId,
    reduction: Reduction,
    graph: Option<Arc<MemoryGraph>>,
    accumulator: Json,
    seen: bool,
    at_master: bool,
    emitted: bool,
}

impl ReducingStep {
    pub fn new(id: StepId, next: StepId, reduction: Reduction, graph: Option<Arc<MemoryGraph>>) -> Self {
        let accumulator = reduction.seed();
        Self {
            id,
            next,
            reduction,
            graph,
            accumulator,
            seen: false,
            at_master: false,
            emitted: false,
        }
    }

    pub fn count(id: StepId, next: StepId) -> Self {
        Self::new(id, next, Reduction::Count, None)
    }

    fn fold(&self, traverser: &Traverser) -> Result<Json> {
        match &self.reduction {
            Reduction::Count => Ok(Json::from(traverser.bulk)),
            Reduction::Sum => {
                let data = traverser.value.as_data().filter(|d| d.is_number()).ok_or_else(|| {
                    TraversalError::pipeline(
                        &self.id,
                        format!("sum() needs numbers, got {}", traverser.value),
                    )
                })?;
                match data.as_i64() {
                    Some(n) => n.checked_mul(traverser.bulk).map(Json::from).ok_or_else(|| {
                        TraversalError::pipeline(
                            &self.id,
                            format!("integer overflow summing {n} with bulk {}", traverser.bulk),
                        )
                    }),
                    None => Ok(Json::from(
                        data.as_f64().unwrap_or_default() * traverser.bulk as f64,
                    )),
                }
            }
            Reduction::GroupCount(by) => {
                let graph = self.graph.as_ref().ok_or_else(|| {
                    TraversalError::pipeline(&self.id, "groupCount() needs a graph")
                })?;
                let mut delta = Map::new();
                delta.insert(
                    group_key(by, graph, &traverser.value),
                    Json::from(traverser.bulk),
                );
                Ok(Json::Object(delta))
            }
        }
    }

    fn merge(&mut self, partial: &Json) -> Result<()> {
        self.accumulator =
            self.reduction
                .reducer()
                .reduce(self.id.as_str(), &self.accumulator, partial)?;
        self.seen = true;
        Ok(())
    }
}

impl Step for ReducingStep {
    fn id(&self) -> &StepId {
        &self.id
    }

    fn add_start(&mut self, traverser: Traverser) -> Result<()> {
        let partial = self.fold(&traverser)?;
        self.merge(&partial)
    }

    fn has_next(&self) -> bool {
        self.at_master && !self.emitted
    }

    fn next(&mut self) -> Option<Traverser> {
        if !self.has_next() {
            return None;
        }
        self.emitted = true;
        self.seen = false;
        let result = std::mem::replace(&mut self.accumulator, self.reduction.seed());
        Some(Traverser::new(result, self.next.clone()))
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
}

impl Barrier for ReducingStep {
    fn has_next_barrier(&self) -> bool {
        self.seen
    }

    fn next_barrier(&mut self) -> Result<BarrierContents> {
        self.seen = false;
        let partial = std::mem::replace(&mut self.accumulator, self.reduction.seed());
        Ok(BarrierContents::Data(partial))
    }

    fn add_barrier(&mut self, contents: BarrierContents) -> Result<()> {
        match contents {
            BarrierContents::Data(partial) => self.merge(&partial),
            BarrierContents::Traversers(traversers) => {
                for traverser in traversers {
                    self.add_start(traverser)?;
                }
                Ok(())
            }
            BarrierContents::Empty => Ok(()),
        }
    }
}
