//! # Traversal Builder
//!
//! Declarative, serializable description of a linear traversal. A
//! [`Traversal`] compiles into a [`StepPipeline`] against a graph; binding it
//! to a graph gives a [`PipelineFactory`] that the actor program uses to give
//! every actor its own pipeline.
//!
//! ```rust
//! use std::sync::Arc;
//! use traversal_actors::process::Traversal;
//! use traversal_actors::structure::MemoryGraph;
//!
//! let graph = Arc::new(MemoryGraph::modern());
//! let names = Traversal::v([1]).out(["knows"]).values(["name"]);
//! let results = names.evaluate(&graph).unwrap();
//! assert_eq!(results.len(), 2);
//! ```

use super::side_effects::SideEffects;
use super::step::{drain_outputs, PipelineFactory, Step, StepPipeline};
use super::steps::{
    AggregateStep, CapStep, EdgeVertexStep, FilterStep, GraphStep, GraphStepKind, GroupBy,
    GroupCountSideEffectStep, IdentityStep, OrderBy, OrderStep, Predicate, RangeStep, Reduction,
    ReducingStep, SortDirection, TailStep, ValuesStep, VertexStep,
};
use super::traverser::{StepId, TraverserSet};
use crate::error::{Result, TraversalError};
use crate::structure::{Direction, ElementId, MemoryGraph};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "key", rename_all = "snake_case")]
pub enum Key {
    Value,
    Label,
    Property(String),
}

impl Key {
    fn group_by(&self) -> GroupBy {
        match self {
            Key::Value => GroupBy::Value,
            Key::Label => GroupBy::Label,
            Key::Property(p) => GroupBy::Property(p.clone()),
        }
    }

    fn order_by(&self) -> OrderBy {
        match self {
            Key::Value => OrderBy::Value,
            Key::Label => OrderBy::Label,
            Key::Property(p) => OrderBy::Property(p.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepSpec {
    V { ids: Vec<ElementId> },
    E { ids: Vec<ElementId> },
    HasLabel { labels: Vec<String> },
    Has { key: String, value: Json },
    Vertices { direction: Direction, labels: Vec<String> },
    Edges { direction: Direction, labels: Vec<String> },
    EdgeVertex { direction: Direction },
    Identity,
    Values { keys: Vec<String> },
    Count,
    Sum,
    GroupCount { by: Key },
    GroupCountSideEffect { key: String, by: Key },
    Aggregate { key: String },
    Barrier,
    Cap { key: String },
    Order { by: Key, descending: bool },
    Range { low: u64, high: Option<u64> },
    Tail { count: u64 },
}

impl StepSpec {
    fn name(&self) -> &'static str {
        match self {
            StepSpec::V { .. } => "V",
            StepSpec::E { .. } => "E",
            StepSpec::HasLabel { .. } => "hasLabel",
            StepSpec::Has { .. } => "has",
            StepSpec::Vertices { direction, .. } => match direction {
                Direction::Out => "out",
                Direction::In => "in",
                Direction::Both => "both",
            },
            StepSpec::Edges { direction, .. } => match direction {
                Direction::Out => "outE",
                Direction::In => "inE",
                Direction::Both => "bothE",
            },
            StepSpec::EdgeVertex { direction } => match direction {
                Direction::Out => "outV",
                Direction::In => "inV",
                Direction::Both => "bothV",
            },
            StepSpec::Identity => "identity",
            StepSpec::Values { .. } => "values",
            StepSpec::Count => "count",
            StepSpec::Sum => "sum",
            StepSpec::GroupCount { .. } | StepSpec::GroupCountSideEffect { .. } => "groupCount",
            StepSpec::Aggregate { .. } => "aggregate",
            StepSpec::Barrier => "barrier",
            StepSpec::Cap { .. } => "cap",
            StepSpec::Order { .. } => "order",
            StepSpec::Range { .. } => "range",
            StepSpec::Tail { .. } => "tail",
        }
    }

    fn is_start(&self) -> bool {
        matches!(self, StepSpec::V { .. } | StepSpec::E { .. })
    }
}

impl fmt::Display for StepSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Debug>(items: &[T]) -> String {
            items
                .iter()
                .map(|i| format!("{i:?}"))
                .collect::<Vec<_>>()
                .join(",")
        }
        let name = self.name();
        match self {
            StepSpec::V { ids } | StepSpec::E { ids } => write!(f, "{name}({})", list(ids)),
            StepSpec::HasLabel { labels } => write!(f, "{name}({})", list(labels)),
            StepSpec::Has { key, value } => write!(f, "{name}({key:?},{value})"),
            StepSpec::Vertices { labels, .. } | StepSpec::Edges { labels, .. } => {
                write!(f, "{name}({})", list(labels))
            }
            StepSpec::Values { keys } => write!(f, "{name}({})", list(keys)),
            StepSpec::GroupCount { by } => write!(f, "{name}().by({by:?})"),
            StepSpec::GroupCountSideEffect { key, by } => write!(f, "{name}({key:?}).by({by:?})"),
            StepSpec::Aggregate { key } | StepSpec::Cap { key } => write!(f, "{name}({key:?})"),
            StepSpec::Order { by, descending } => {
                write!(f, "{name}().by({by:?},{})", if *descending { "desc" } else { "asc" })
            }
            StepSpec::Range { low, high } => match high {
                Some(high) => write!(f, "{name}({low},{high})"),
                None => write!(f, "{name}({low},-1)"),
            },
            StepSpec::Tail { count } => write!(f, "{name}({count})"),
            _ => write!(f, "{name}()"),
        }
    }
}

/// A linear traversal, built fluently from a start step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traversal {
    steps: Vec<StepSpec>,
}

fn strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl Traversal {
    pub fn from_steps(steps: Vec<StepSpec>) -> Self {
        Self { steps }
    }

    /// Start from vertices; an empty id list means every vertex
    pub fn v(ids: impl IntoIterator<Item = ElementId>) -> Self {
        Self::from_steps(vec![StepSpec::V {
            ids: ids.into_iter().collect(),
        }])
    }

    /// Start from edges; an empty id list means every edge
    pub fn e(ids: impl IntoIterator<Item = ElementId>) -> Self {
        Self::from_steps(vec![StepSpec::E {
            ids: ids.into_iter().collect(),
        }])
    }

    pub fn then(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    pub fn has_label<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.then(StepSpec::HasLabel {
            labels: strings(labels),
        })
    }

    pub fn has(self, key: &str, value: impl Into<Json>) -> Self {
        self.then(StepSpec::Has {
            key: key.to_string(),
            value: value.into(),
        })
    }

    pub fn out<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.then(StepSpec::Vertices {
            direction: Direction::Out,
            labels: strings(labels),
        })
    }

    pub fn in_<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.then(StepSpec::Vertices {
            direction: Direction::In,
            labels: strings(labels),
        })
    }

    pub fn both<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.then(StepSpec::Vertices {
            direction: Direction::Both,
            labels: strings(labels),
        })
    }

    pub fn out_e<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.then(StepSpec::Edges {
            direction: Direction::Out,
            labels: strings(labels),
        })
    }

    pub fn in_e<I: IntoIterator<Item = S>, S: Into<String>>(self, labels: I) -> Self {
        self.then(StepSpec::Edges {
            direction: Direction::In,
            labels: strings(labels),
        })
    }

    pub fn in_v(self) -> Self {
        self.then(StepSpec::EdgeVertex {
            direction: Direction::In,
        })
    }

    pub fn out_v(self) -> Self {
        self.then(StepSpec::EdgeVertex {
            direction: Direction::Out,
        })
    }

    pub fn identity(self) -> Self {
        self.then(StepSpec::Identity)
    }

    pub fn values<I: IntoIterator<Item = S>, S: Into<String>>(self, keys: I) -> Self {
        self.then(StepSpec::Values { keys: strings(keys) })
    }

    pub fn count(self) -> Self {
        self.then(StepSpec::Count)
    }

    pub fn sum(self) -> Self {
        self.then(StepSpec::Sum)
    }

    pub fn group_count(self, by: Key) -> Self {
        self.then(StepSpec::GroupCount { by })
    }

    pub fn group_count_as(self, key: &str, by: Key) -> Self {
        self.then(StepSpec::GroupCountSideEffect {
            key: key.to_string(),
            by,
        })
    }

    pub fn aggregate(self, key: &str) -> Self {
        self.then(StepSpec::Aggregate {
            key: key.to_string(),
        })
    }

    pub fn barrier(self) -> Self {
        self.then(StepSpec::Barrier)
    }

    pub fn cap(self, key: &str) -> Self {
        self.then(StepSpec::Cap {
            key: key.to_string(),
        })
    }

    pub fn order_by(self, by: Key, direction: SortDirection) -> Self {
        self.then(StepSpec::Order {
            by,
            descending: direction == SortDirection::Desc,
        })
    }

    pub fn range(self, low: u64, high: u64) -> Self {
        self.then(StepSpec::Range {
            low,
            high: Some(high),
        })
    }

    pub fn limit(self, count: u64) -> Self {
        self.range(0, count)
    }

    pub fn skip(self, count: u64) -> Self {
        self.then(StepSpec::Range {
            low: count,
            high: None,
        })
    }

    pub fn tail(self, count: u64) -> Self {
        self.then(StepSpec::Tail { count })
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    /// Compile into a fresh pipeline over `graph`
    pub fn compile(&self, graph: &Arc<MemoryGraph>) -> Result<StepPipeline> {
        let description = self.to_string();
        match self.steps.first() {
            Some(first) if first.is_start() => {}
            _ => {
                return Err(TraversalError::pipeline(
                    "pipeline",
                    format!("{description} must start with V() or E()"),
                ))
            }
        }

        let ids: Vec<StepId> = self
            .steps
            .iter()
            .enumerate()
            .map(|(position, spec)| StepId::new(format!("{}@{position}", spec.name())))
            .collect();

        let side_effects = SideEffects::new();
        let mut steps: Vec<Box<dyn Step>> = Vec::with_capacity(self.steps.len());
        for (position, spec) in self.steps.iter().enumerate() {
            let id = ids[position].clone();
            let next = ids.get(position + 1).cloned().unwrap_or_else(StepId::halt);
            if position > 0 && spec.is_start() {
                return Err(TraversalError::pipeline(
                    &id,
                    "graph steps are only supported at the start",
                ));
            }
            steps.push(Self::build_step(spec, id, next, graph, &side_effects));
        }

        StepPipeline::new(steps, side_effects, description)
    }

    fn build_step(
        spec: &StepSpec,
        id: StepId,
        next: StepId,
        graph: &Arc<MemoryGraph>,
        side_effects: &SideEffects,
    ) -> Box<dyn Step> {
        let graph = Arc::clone(graph);
        match spec {
            StepSpec::V { ids } => Box::new(GraphStep::new(
                id,
                next,
                GraphStepKind::Vertices,
                ids.clone(),
                graph,
            )),
            StepSpec::E { ids } => Box::new(GraphStep::new(
                id,
                next,
                GraphStepKind::Edges,
                ids.clone(),
                graph,
            )),
            StepSpec::HasLabel { labels } => Box::new(FilterStep::new(
                id,
                next,
                Predicate::HasLabel(labels.clone()),
                graph,
            )),
            StepSpec::Has { key, value } => Box::new(FilterStep::new(
                id,
                next,
                Predicate::Has {
                    key: key.clone(),
                    value: value.clone(),
                },
                graph,
            )),
            StepSpec::Vertices { direction, labels } => Box::new(VertexStep::new(
                id,
                next,
                *direction,
                labels.clone(),
                false,
                graph,
            )),
            StepSpec::Edges { direction, labels } => Box::new(VertexStep::new(
                id,
                next,
                *direction,
                labels.clone(),
                true,
                graph,
            )),
            StepSpec::EdgeVertex { direction } => {
                Box::new(EdgeVertexStep::new(id, next, *direction, graph))
            }
            StepSpec::Identity => Box::new(IdentityStep::new(id, next)),
            StepSpec::Values { keys } => Box::new(ValuesStep::new(id, next, keys.clone(), graph)),
            StepSpec::Count => Box::new(ReducingStep::count(id, next)),
            StepSpec::Sum => Box::new(ReducingStep::new(id, next, Reduction::Sum, None)),
            StepSpec::GroupCount { by } => Box::new(ReducingStep::new(
                id,
                next,
                Reduction::GroupCount(by.group_by()),
                Some(graph),
            )),
            StepSpec::GroupCountSideEffect { key, by } => Box::new(GroupCountSideEffectStep::new(
                id,
                next,
                key.clone(),
                by.group_by(),
                graph,
                side_effects.clone(),
            )),
            StepSpec::Aggregate { key } => Box::new(AggregateStep::new(
                id,
                next,
                Some(key.clone()),
                side_effects.clone(),
            )),
            StepSpec::Barrier => Box::new(AggregateStep::new(id, next, None, side_effects.clone())),
            StepSpec::Cap { key } => {
                Box::new(CapStep::new(id, next, key.clone(), side_effects.clone()))
            }
            StepSpec::Order { by, descending } => Box::new(OrderStep::new(
                id,
                next,
                by.order_by(),
                if *descending {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                },
                graph,
            )),
            StepSpec::Range { low, high } => Box::new(RangeStep::new(id, next, *low, *high)),
            StepSpec::Tail { count } => Box::new(TailStep::new(id, next, *count)),
        }
    }

    /// Single-threaded evaluation over the whole graph.
    ///
    /// Traversers are processed first-in first-out; when nothing is left to
    /// process the earliest barrier holding anything is released. Results are
    /// in the order an ordered traversal defines.
    pub fn evaluate(&self, graph: &Arc<MemoryGraph>) -> Result<TraverserSet> {
        let mut pipeline = self.compile(graph)?;
        pipeline.set_at_master(true);

        let mut queue: VecDeque<_> = pipeline.start()?.into();
        let mut results = TraverserSet::new();
        let step_ids = pipeline.step_ids();

        loop {
            while let Some(traverser) = queue.pop_front() {
                if traverser.is_halted() {
                    results.push(traverser);
                    continue;
                }
                let step_id = traverser.step_id.clone();
                let step = pipeline
                    .get_step(&step_id)
                    .ok_or_else(|| TraversalError::pipeline(&step_id, "unknown step"))?;
                step.add_start(traverser)?;
                if step.barrier_kind().is_none() {
                    queue.extend(drain_outputs(step));
                }
            }

            let mut released = false;
            for step_id in &step_ids {
                let Some(step) = pipeline.get_step(step_id) else {
                    continue;
                };
                if step.barrier_kind().is_none() {
                    continue;
                }
                if let Some(barrier) = step.as_barrier() {
                    barrier.done();
                }
                if step.has_next() {
                    queue.extend(drain_outputs(step));
                    released = true;
                    break;
                }
            }
            if !released {
                break;
            }
        }

        results.extend(pipeline.drain_tail()?);
        Ok(results)
    }

    pub fn bind(&self, graph: Arc<MemoryGraph>) -> BoundTraversal {
        BoundTraversal {
            traversal: self.clone(),
            graph,
        }
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.steps.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("."))
    }
}

/// A traversal paired with the graph it runs over
#[derive(Debug, Clone)]
pub struct BoundTraversal {
    traversal: Traversal,
    graph: Arc<MemoryGraph>,
}

impl BoundTraversal {
    pub fn traversal(&self) -> &Traversal {
        &self.traversal
    }

    pub fn graph(&self) -> &Arc<MemoryGraph> {
        &self.graph
    }
}

impl PipelineFactory for BoundTraversal {
    fn create_pipeline(&self) -> Result<StepPipeline> {
        self.traversal.compile(&self.graph)
    }

    fn describe(&self) -> String {
        self.traversal.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph() -> Arc<MemoryGraph> {
        Arc::new(MemoryGraph::modern())
    }

    fn json_values(results: &TraverserSet) -> Vec<Json> {
        results.iter().map(|t| t.value.to_json()).collect()
    }

    #[test]
    fn test_describe() {
        let traversal = Traversal::v([1]).out(["knows"]).values(["name"]).count();
        assert_eq!(traversal.to_string(), r#"V(1).out("knows").values("name").count()"#);
    }

    #[test]
    fn test_compile_rejects_missing_start() {
        let traversal = Traversal::from_steps(vec![StepSpec::Count]);
        assert!(traversal.compile(&graph()).is_err());

        let traversal = Traversal::v([]).then(StepSpec::V { ids: vec![] });
        assert!(traversal.compile(&graph()).is_err());
    }

    #[test]
    fn test_step_ids_follow_position() {
        let pipeline = Traversal::v([]).out(Vec::<String>::new()).count().compile(&graph()).unwrap();
        let ids: Vec<String> = pipeline.step_ids().iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, vec!["V@0", "out@1", "count@2"]);
    }

    #[test]
    fn test_evaluate_filters_and_maps() {
        let names = Traversal::v([1]).out(["knows"]).values(["name"]);
        let results = names.evaluate(&graph()).unwrap();
        assert_eq!(json_values(&results), vec![json!("vadas"), json!("josh")]);
    }

    #[test]
    fn test_evaluate_count_of_nothing_is_zero() {
        let results = Traversal::v([]).has_label(["robot"]).count().evaluate(&graph()).unwrap();
        assert_eq!(json_values(&results), vec![json!(0)]);
    }

    #[test]
    fn test_evaluate_order_then_limit() {
        let results = Traversal::v([])
            .has_label(["person"])
            .order_by(Key::Property("age".to_string()), SortDirection::Asc)
            .limit(2)
            .values(["name"])
            .evaluate(&graph())
            .unwrap();
        assert_eq!(json_values(&results), vec![json!("vadas"), json!("marko")]);
    }

    #[test]
    fn test_evaluate_aggregate_then_cap() {
        let results = Traversal::v([])
            .has_label(["software"])
            .values(["name"])
            .aggregate("names")
            .cap("names")
            .evaluate(&graph())
            .unwrap();
        assert_eq!(json_values(&results), vec![json!(["lop", "ripple"])]);
    }

    #[test]
    fn test_traversal_serde() {
        let traversal = Traversal::v([1]).both(["knows"]).group_count(Key::Label);
        let encoded = serde_json::to_string(&traversal).unwrap();
        let decoded: Traversal = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, traversal);
    }
}
