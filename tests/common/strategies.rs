use proptest::prelude::*;
use serde_json::Value as Json;
use std::collections::BTreeSet;
use std::sync::Arc;
use traversal_actors::process::{Key, SortDirection};
use traversal_actors::structure::MemoryGraph;
use traversal_actors::Traversal;

/// A random graph description: vertex labels and ages, plus directed edges
#[derive(Debug, Clone)]
pub struct GraphSpec {
    pub vertices: Vec<(String, i64)>,
    pub edges: Vec<(u64, u64, String)>,
}

impl GraphSpec {
    pub fn build(&self) -> Arc<MemoryGraph> {
        let mut builder = MemoryGraph::builder();
        for (index, (label, age)) in self.vertices.iter().enumerate() {
            let id = index as u64 + 1;
            builder = builder.vertex(
                id,
                label,
                vec![
                    ("name".to_string(), Json::from(format!("v{id}"))),
                    ("age".to_string(), Json::from(*age)),
                ],
            );
        }
        for (index, (out_v, in_v, label)) in self.edges.iter().enumerate() {
            builder = builder.edge(1000 + index as u64, *out_v, label, *in_v, Vec::<(String, Json)>::new());
        }
        Arc::new(builder.build().expect("generated graph"))
    }

    pub fn vertex_count(&self) -> u64 {
        self.vertices.len() as u64
    }
}

pub fn label_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("person".to_string()), Just("software".to_string())]
}

pub fn edge_label_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just("knows".to_string()), Just("created".to_string())]
}

/// Graphs of 1 to 12 vertices with up to 24 edges between them
pub fn graph_strategy() -> impl Strategy<Value = GraphSpec> {
    prop::collection::vec((label_strategy(), 0i64..100), 1..12).prop_flat_map(|vertices| {
        let n = vertices.len() as u64;
        let edges = prop::collection::vec((1..=n, 1..=n, edge_label_strategy()), 0..24);
        (Just(vertices), edges).prop_map(|(vertices, edges)| GraphSpec { vertices, edges })
    })
}

/// A graph together with an assignment of its vertices to 1 to 4 partitions.
/// Empty partitions are dropped.
pub fn partitioned_graph_strategy() -> impl Strategy<Value = (GraphSpec, Vec<Vec<u64>>)> {
    graph_strategy().prop_flat_map(|spec| {
        let n = spec.vertex_count() as usize;
        (Just(spec), 1usize..=4).prop_flat_map(move |(spec, parts)| {
            prop::collection::vec(0..parts, n).prop_map(move |owners| {
                let mut assignment = vec![Vec::new(); parts];
                for (index, owner) in owners.iter().enumerate() {
                    assignment[*owner].push(index as u64 + 1);
                }
                assignment.retain(|p: &Vec<u64>| !p.is_empty());
                (spec.clone(), assignment)
            })
        })
    })
}

/// Whether a traversal's result order is defined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    Ordered,
    Unordered,
}

/// Traversals whose results do not depend on processing order (or that
/// order their output explicitly)
pub fn traversal_strategy() -> impl Strategy<Value = (Traversal, Ordering)> {
    let labels = || prop::collection::btree_set(edge_label_strategy(), 0..2).prop_map(|s: BTreeSet<String>| s.into_iter().collect::<Vec<_>>());
    prop_oneof![
        labels().prop_map(|l| (Traversal::v([]).out(l), Ordering::Unordered)),
        labels().prop_map(|l| (Traversal::v([]).out(l.clone()).in_(l), Ordering::Unordered)),
        labels().prop_map(|l| (Traversal::v([]).both(l).count(), Ordering::Unordered)),
        labels().prop_map(|l| (Traversal::v([]).out_e(l).in_v().values(["name"]), Ordering::Unordered)),
        Just((Traversal::v([]).has_label(["person"]).values(["age"]).sum(), Ordering::Unordered)),
        Just((Traversal::v([]).out(Vec::<String>::new()).group_count(Key::Label), Ordering::Unordered)),
        Just((
            Traversal::v([]).out(Vec::<String>::new()).group_count_as("labels", Key::Label).barrier().cap("labels"),
            Ordering::Unordered
        )),
        Just((Traversal::v([]).aggregate("seen").out(Vec::<String>::new()).count(), Ordering::Unordered)),
        (0u64..4, 1u64..5).prop_map(|(low, width)| (
            Traversal::v([]).values(["age"]).order_by(Key::Value, SortDirection::Asc).range(low, low + width),
            Ordering::Ordered
        )),
        (1u64..4).prop_map(|count| (
            Traversal::v([]).order_by(Key::Property("age".to_string()), SortDirection::Desc).values(["age"]).tail(count),
            Ordering::Ordered
        )),
    ]
}
