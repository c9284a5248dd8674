//! # In-Memory Property Graph
//!
//! Immutable graph used by the reference partitioners and steps. Built once
//! through [`MemoryGraphBuilder`] and shared behind an `Arc` by every actor.

use super::{Direction, Edge, Element, ElementId, Vertex};
use crate::error::{Result, TraversalError};
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap};

pub type Properties = BTreeMap<String, Json>;

#[derive(Debug, Default)]
pub struct MemoryGraph {
    vertices: Vec<Vertex>,
    vertex_index: HashMap<ElementId, usize>,
    edges: Vec<Edge>,
    edge_index: HashMap<ElementId, usize>,
    vertex_properties: HashMap<ElementId, Properties>,
    edge_properties: HashMap<ElementId, Properties>,
    out_edges: HashMap<ElementId, Vec<usize>>,
    in_edges: HashMap<ElementId, Vec<usize>>,
}

impl MemoryGraph {
    pub fn builder() -> MemoryGraphBuilder {
        MemoryGraphBuilder::default()
    }

    /// The six-vertex "modern" graph: four people, two pieces of software.
    pub fn modern() -> Self {
        let person = |name: &str, age: i64| {
            vec![
                ("name".to_string(), Json::from(name)),
                ("age".to_string(), Json::from(age)),
            ]
        };
        let software = |name: &str| {
            vec![
                ("name".to_string(), Json::from(name)),
                ("lang".to_string(), Json::from("java")),
            ]
        };
        let weight = |w: f64| vec![("weight".to_string(), Json::from(w))];

        let builder = MemoryGraph::builder()
            .vertex(1, "person", person("marko", 29))
            .vertex(2, "person", person("vadas", 27))
            .vertex(3, "software", software("lop"))
            .vertex(4, "person", person("josh", 32))
            .vertex(5, "software", software("ripple"))
            .vertex(6, "person", person("peter", 35))
            .edge(7, 1, "knows", 2, weight(0.5))
            .edge(8, 1, "knows", 4, weight(1.0))
            .edge(9, 1, "created", 3, weight(0.4))
            .edge(10, 4, "created", 5, weight(1.0))
            .edge(11, 4, "created", 3, weight(0.4))
            .edge(12, 6, "created", 3, weight(0.2));

        // Every endpoint above is declared, so building cannot fail.
        builder.build().unwrap_or_default()
    }

    pub fn vertex(&self, id: ElementId) -> Option<&Vertex> {
        self.vertex_index.get(&id).map(|&i| &self.vertices[i])
    }

    pub fn edge(&self, id: ElementId) -> Option<&Edge> {
        self.edge_index.get(&id).map(|&i| &self.edges[i])
    }

    /// All vertices in insertion order
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// All edges in insertion order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn properties(&self, element: &Element) -> Option<&Properties> {
        match element {
            Element::Vertex(v) => self.vertex_properties.get(&v.id),
            Element::Edge(e) => self.edge_properties.get(&e.id),
        }
    }

    pub fn property(&self, element: &Element, key: &str) -> Option<&Json> {
        self.properties(element).and_then(|props| props.get(key))
    }

    /// Incident edges of a vertex, optionally restricted to a set of labels
    pub fn incident_edges(
        &self,
        vertex: ElementId,
        direction: Direction,
        labels: &[String],
    ) -> Vec<&Edge> {
        let empty = Vec::new();
        let outgoing = self.out_edges.get(&vertex).unwrap_or(&empty);
        let incoming = self.in_edges.get(&vertex).unwrap_or(&empty);
        let indices: Vec<usize> = match direction {
            Direction::Out => outgoing.clone(),
            Direction::In => incoming.clone(),
            Direction::Both => outgoing.iter().chain(incoming.iter()).copied().collect(),
        };

        indices
            .into_iter()
            .map(|i| &self.edges[i])
            .filter(|edge| labels.is_empty() || labels.iter().any(|l| *l == edge.label))
            .collect()
    }

    /// Adjacent vertices of a vertex, one per incident edge
    pub fn adjacent(&self, vertex: ElementId, direction: Direction, labels: &[String]) -> Vec<&Vertex> {
        let mut adjacent = Vec::new();
        for (dir, edges) in [
            (Direction::Out, self.incident_edges(vertex, Direction::Out, labels)),
            (Direction::In, self.incident_edges(vertex, Direction::In, labels)),
        ] {
            if direction != Direction::Both && direction != dir {
                continue;
            }
            for edge in edges {
                let other = if dir == Direction::Out { edge.in_v } else { edge.out_v };
                if let Some(v) = self.vertex(other) {
                    adjacent.push(v);
                }
            }
        }
        adjacent
    }
}

#[derive(Debug, Default)]
pub struct MemoryGraphBuilder {
    vertices: Vec<(Vertex, Properties)>,
    edges: Vec<(Edge, Properties)>,
}

impl MemoryGraphBuilder {
    pub fn vertex<P>(mut self, id: ElementId, label: &str, properties: P) -> Self
    where
        P: IntoIterator<Item = (String, Json)>,
    {
        self.vertices.push((
            Vertex {
                id,
                label: label.to_string(),
            },
            properties.into_iter().collect(),
        ));
        self
    }

    pub fn edge<P>(
        mut self,
        id: ElementId,
        out_v: ElementId,
        label: &str,
        in_v: ElementId,
        properties: P,
    ) -> Self
    where
        P: IntoIterator<Item = (String, Json)>,
    {
        self.edges.push((
            Edge {
                id,
                label: label.to_string(),
                out_v,
                in_v,
            },
            properties.into_iter().collect(),
        ));
        self
    }

    pub fn build(self) -> Result<MemoryGraph> {
        let mut graph = MemoryGraph::default();

        for (vertex, properties) in self.vertices {
            if graph.vertex_index.contains_key(&vertex.id) {
                return Err(TraversalError::configuration(format!(
                    "duplicate vertex id {}",
                    vertex.id
                )));
            }
            graph.vertex_index.insert(vertex.id, graph.vertices.len());
            graph.vertex_properties.insert(vertex.id, properties);
            graph.vertices.push(vertex);
        }

        for (edge, properties) in self.edges {
            if graph.edge_index.contains_key(&edge.id) {
                return Err(TraversalError::configuration(format!(
                    "duplicate edge id {}",
                    edge.id
                )));
            }
            for endpoint in [edge.out_v, edge.in_v] {
                if !graph.vertex_index.contains_key(&endpoint) {
                    return Err(TraversalError::configuration(format!(
                        "edge {} references unknown vertex {endpoint}",
                        edge.id
                    )));
                }
            }
            let index = graph.edges.len();
            graph.edge_index.insert(edge.id, index);
            graph.edge_properties.insert(edge.id, properties);
            graph.out_edges.entry(edge.out_v).or_default().push(index);
            graph.in_edges.entry(edge.in_v).or_default().push(index);
            graph.edges.push(edge);
        }

        Ok(graph)
    }
}
