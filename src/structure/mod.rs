//! # Graph Structure
//!
//! Element and value types shared by the traversal pipeline and the actor
//! protocol, plus the partitioning seam the actors route through.
//!
//! Elements are lightweight references (id, label and, for edges, the two
//! endpoints). Properties and adjacency live in the graph that owns them, see
//! [`memory::MemoryGraph`].

pub mod memory;
pub mod partitioner;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub use memory::{MemoryGraph, MemoryGraphBuilder};
pub use partitioner::{
    GlobalPartitioner, MemoryPartition, MemoryPartitioner, Partition, Partitioner,
};

/// Identifier for vertices and edges. Vertices and edges use separate id spaces.
pub type ElementId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex {
    pub id: ElementId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: ElementId,
    pub label: String,
    pub out_v: ElementId,
    pub in_v: ElementId,
}

/// A graph element: the only kind of value that is owned by a partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Vertex(Vertex),
    Edge(Edge),
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::Vertex(v) => v.id,
            Element::Edge(e) => e.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Element::Vertex(v) => &v.label,
            Element::Edge(e) => &e.label,
        }
    }

    pub fn is_vertex(&self) -> bool {
        matches!(self, Element::Vertex(_))
    }

    pub fn as_vertex(&self) -> Option<&Vertex> {
        match self {
            Element::Vertex(v) => Some(v),
            Element::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            Element::Edge(e) => Some(e),
            Element::Vertex(_) => None,
        }
    }
}

impl From<Vertex> for Element {
    fn from(vertex: Vertex) -> Self {
        Element::Vertex(vertex)
    }
}

impl From<Edge> for Element {
    fn from(edge: Edge) -> Self {
        Element::Edge(edge)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Vertex(v) => write!(f, "v[{}]", v.id),
            Element::Edge(e) => write!(f, "e[{}][{}-{}->{}]", e.id, e.out_v, e.label, e.in_v),
        }
    }
}

/// Direction of adjacency relative to a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Out,
    In,
    Both,
}

/// The value a traverser carries: a graph element or plain data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Element(Element),
    Data(serde_json::Value),
}

impl Value {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Value::Element(element) => Some(element),
            Value::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            Value::Element(_) => None,
        }
    }

    /// JSON projection used for ordering and grouping keys
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Element(element) => serde_json::Value::from(element.id()),
            Value::Data(data) => data.clone(),
        }
    }
}

impl From<Element> for Value {
    fn from(element: Element) -> Self {
        Value::Element(element)
    }
}

impl From<Vertex> for Value {
    fn from(vertex: Vertex) -> Self {
        Value::Element(Element::Vertex(vertex))
    }
}

impl From<serde_json::Value> for Value {
    fn from(data: serde_json::Value) -> Self {
        Value::Data(data)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Element(element) => element.fmt(f),
            Value::Data(data) => data.fmt(f),
        }
    }
}

/// Total order over JSON values used by ordering steps.
///
/// Nulls sort first, then booleans, numbers, strings, arrays and objects.
pub fn compare_json(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    use serde_json::Value as Json;

    fn rank(value: &Json) -> u8 {
        match value {
            Json::Null => 0,
            Json::Bool(_) => 1,
            Json::Number(_) => 2,
            Json::String(_) => 3,
            Json::Array(_) => 4,
            Json::Object(_) => 5,
        }
    }

    match (a, b) {
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        (Json::Number(x), Json::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        },
        (Json::String(x), Json::String(y)) => x.cmp(y),
        (Json::Array(x), Json::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_json(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Json::Object(x), Json::Object(y)) => x.len().cmp(&y.len()),
        _ => rank(a).cmp(&rank(b)),
    }
}
