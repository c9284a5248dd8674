//! Property tests: a job run through the actors must produce what the
//! single-threaded evaluation of the same traversal produces, for any graph
//! and any way of partitioning it.

mod common;

use common::*;
use proptest::prelude::*;
use traversal_actors::Result;
use traversal_actors::{JobResult, Traversal};

fn run_blocking(traversal: Traversal, spec: &GraphSpec, assignment: Vec<Vec<u64>>) -> Result<JobResult> {
    let graph = spec.build();
    let partitioner = explicit(&graph, assignment);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("test runtime");
    runtime.block_on(run(traversal, &graph, partitioner))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_actor_result_matches_oracle(
        (spec, assignment) in partitioned_graph_strategy(),
        (traversal, ordering) in traversal_strategy(),
    ) {
        let graph = spec.build();
        let expected = traversal.evaluate(&graph).expect("oracle evaluation");
        let actual = run_blocking(traversal, &spec, assignment).expect("actor job");

        match ordering {
            Ordering::Ordered => {
                prop_assert_eq!(values(&actual.traversers), values(&expected));
                let stamps: Vec<Option<i32>> = actual.traversers.iter().map(|t| t.order).collect();
                let dense: Vec<Option<i32>> = (0..actual.traversers.len() as i32).map(Some).collect();
                prop_assert_eq!(stamps, dense);
            }
            Ordering::Unordered => {
                prop_assert_eq!(value_multiset(&actual.traversers), value_multiset(&expected));
            }
        }
        prop_assert!(actual.traversers.iter().all(|t| t.is_halted()));
    }

    #[test]
    fn prop_count_is_partition_invariant(
        (spec, assignment) in partitioned_graph_strategy(),
    ) {
        let vertices = spec.vertex_count();
        let result = run_blocking(Traversal::v([]).count(), &spec, assignment).expect("actor job");
        prop_assert_eq!(values(&result.traversers), vec![serde_json::json!(vertices)]);
    }

    #[test]
    fn prop_single_partition_matches_many(
        (spec, assignment) in partitioned_graph_strategy(),
    ) {
        let traversal = Traversal::v([]).out(Vec::<String>::new()).out(Vec::<String>::new());
        let all: Vec<u64> = (1..=spec.vertex_count()).collect();
        let single = run_blocking(traversal.clone(), &spec, vec![all]).expect("single partition");
        let many = run_blocking(traversal, &spec, assignment).expect("partitioned");
        prop_assert_eq!(value_multiset(&single.traversers), value_multiset(&many.traversers));
    }
}
