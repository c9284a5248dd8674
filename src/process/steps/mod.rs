//! # Step Library
//!
//! Reference steps compiled from a [`crate::process::Traversal`]. Every step
//! knows its own id and the id of the step that follows it, and re-points the
//! traversers it emits accordingly.

mod barrier;
mod filter;
mod graph_step;
mod map;
mod order;
mod range;
mod reducing;
mod vertex;

pub use barrier::{AggregateStep, CapStep, GroupCountSideEffectStep};
pub use filter::{FilterStep, Predicate};
pub use graph_step::{GraphStep, GraphStepKind};
pub use map::{IdentityStep, ValuesStep};
pub use order::{OrderBy, OrderStep, SortDirection};
pub use range::{RangeStep, TailStep};
pub use reducing::{GroupBy, Reduction, ReducingStep};
pub use vertex::{EdgeVertexStep, VertexStep};

use crate::structure::{Element, MemoryGraph, Value};
use serde_json::Value as Json;

/// Grouping key of a value, rendered as the map key of a count object
pub(crate) fn group_key(by: &GroupBy, graph: &MemoryGraph, value: &Value) -> String {
    let key = match (by, value) {
        (GroupBy::Label, Value::Element(element)) => Json::from(element.label()),
        (GroupBy::Property(property), Value::Element(element)) => graph
            .property(element, property)
            .cloned()
            .unwrap_or(Json::Null),
        (_, other) => other.to_json(),
    };
    match key {
        Json::String(s) => s,
        other => other.to_string(),
    }
}

/// Property lookup that treats non-elements as having no properties
pub(crate) fn element_property(graph: &MemoryGraph, value: &Value, key: &str) -> Option<Json> {
    value
        .as_element()
        .and_then(|element: &Element| graph.property(element, key))
        .cloned()
}
