//! # Traversal Worker Program
//!
//! Runs on a worker actor bound to one partition. Traversers over local
//! elements are processed to completion on a work stack; everything else is
//! routed to its owner or to the master. Barrier contributions and
//! side-effect deltas are held back and shipped to the master whenever the
//! termination token passes through.

use super::termination::WorkerVote;
use super::PartitionRoutes;
use crate::actors::{Address, Message, WorkerHandle, WorkerProgram};
use crate::error::{Result, TraversalError};
use crate::logging::log_vote;
use crate::process::step::drain_outputs;
use crate::process::{StepId, StepPipeline, Traverser};
use std::sync::Arc;
use tracing::{debug, trace};

pub struct TraversalWorkerProgram {
    handle: Box<dyn WorkerHandle>,
    pipeline: StepPipeline,
    routes: PartitionRoutes,
    /// Barrier steps holding contributions not yet shipped
    staged: Vec<StepId>,
    vote: WorkerVote,
}

impl TraversalWorkerProgram {
    pub fn new(handle: Box<dyn WorkerHandle>, mut pipeline: StepPipeline) -> Result<Self> {
        pipeline.configure_partition(Arc::clone(handle.partition()));
        pipeline.set_at_master(false);
        let routes = PartitionRoutes::new(Arc::clone(handle.partitioner()), handle.workers())?;
        let vote = WorkerVote::new(handle.address(), handle.workers(), handle.master().clone())?;

        Ok(Self {
            handle,
            pipeline,
            routes,
            staged: Vec::new(),
            vote,
        })
    }

    fn send(&mut self, to: &Address, message: Message) -> Result<()> {
        if message.is_work() {
            self.vote.on_sent();
        }
        self.handle.send(to, message)
    }

    fn send_to_master(&mut self, message: Message) -> Result<()> {
        let master = self.handle.master().clone();
        self.send(&master, message)
    }

    /// Route traversers produced on this worker, processing local ones until
    /// nothing local is left
    fn route_outputs(&mut self, outputs: Vec<Traverser>) -> Result<()> {
        let mut stack = Vec::new();
        self.dispatch(outputs, &mut stack)?;
        while let Some(traverser) = stack.pop() {
            let outputs = self.process_local(traverser)?;
            self.dispatch(outputs, &mut stack)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, outputs: Vec<Traverser>, stack: &mut Vec<Traverser>) -> Result<()> {
        let mut local = Vec::new();
        for traverser in outputs {
            if traverser.is_halted() {
                self.send_to_master(Message::traverser(traverser))?;
                continue;
            }
            let owner = match traverser.element() {
                Some(element) if self.handle.partition().contains(element) => None,
                Some(element) => Some(self.routes.route(element)?),
                None => Some(self.handle.master().clone()),
            };
            match owner {
                None => local.push(traverser),
                Some(to) => self.send(&to, Message::traverser(traverser))?,
            }
        }
        // Keep depth-first processing in output order
        stack.extend(local.into_iter().rev());
        Ok(())
    }

    fn process_local(&mut self, traverser: Traverser) -> Result<Vec<Traverser>> {
        let step_id = traverser.step_id.clone();
        let step = self
            .pipeline
            .get_step(&step_id)
            .ok_or_else(|| TraversalError::pipeline(&step_id, "unknown step"))?;
        step.set_at_master(false);
        step.add_start(traverser)?;
        if step.barrier_kind().is_some() {
            if !self.staged.contains(&step_id) {
                self.staged.push(step_id);
            }
            return Ok(Vec::new());
        }
        Ok(drain_outputs(step))
    }

    fn accept_traverser(&mut self, traverser: Traverser) -> Result<()> {
        if let Some(element) = traverser.element() {
            if !self.handle.partition().contains(element) {
                return Err(TraversalError::routing(format!(
                    "{element} arrived at {} which does not own it",
                    self.handle.address()
                )));
            }
        }
        let outputs = self.process_local(traverser)?;
        self.route_outputs(outputs)
    }

    fn barrier_done(&mut self, step_id: StepId) -> Result<()> {
        let step = self
            .pipeline
            .get_step(&step_id)
            .ok_or_else(|| TraversalError::barrier_consistency(&step_id))?;
        let barrier = step
            .as_barrier()
            .ok_or_else(|| TraversalError::barrier_consistency(&step_id))?;
        barrier.done();
        let released = drain_outputs(step);
        trace!(step_id = %step_id, released = released.len(), "Local barrier released");
        self.route_outputs(released)
    }

    /// Ship pending side-effect deltas and staged barrier contents
    fn flush(&mut self) -> Result<()> {
        let mut outbound: Vec<Message> = self
            .pipeline
            .side_effects()
            .take_pending()
            .into_iter()
            .map(|(key, value)| Message::SideEffectAdd { key, value })
            .collect();

        for step_id in std::mem::take(&mut self.staged) {
            let step = self
                .pipeline
                .get_step(&step_id)
                .ok_or_else(|| TraversalError::barrier_consistency(&step_id))?;
            let barrier = step
                .as_barrier()
                .ok_or_else(|| TraversalError::barrier_consistency(&step_id))?;
            if barrier.has_next_barrier() {
                let contents = barrier.next_barrier()?;
                outbound.push(Message::BarrierAdd { step_id, contents });
            }
        }

        if !outbound.is_empty() {
            debug!(worker = %self.handle.address(), messages = outbound.len(), "Flushing to master");
        }
        for message in outbound {
            self.send_to_master(message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
impl TraversalWorkerProgram {
    pub(crate) fn side_effects(&self) -> &crate::process::SideEffects {
        self.pipeline.side_effects()
    }
}

impl WorkerProgram for TraversalWorkerProgram {
    fn execute(&mut self, message: Message) -> Result<()> {
        if message.is_work() {
            self.vote.on_received();
        }

        match message {
            Message::Start => {
                let outputs = self.pipeline.start()?;
                self.route_outputs(outputs)
            }
            Message::Traverser { traverser } => self.accept_traverser(traverser),
            Message::BarrierDone { step_id } => self.barrier_done(step_id),
            Message::SideEffectSet { key, value } => self.pipeline.side_effects().set(&key, value),
            Message::Terminate(token) => {
                self.flush()?;
                let (to, token) = self.vote.on_token(token);
                log_vote(self.handle.address(), token.phase, token.balance);
                self.handle.send(&to, Message::Terminate(token))
            }
            other @ (Message::BarrierAdd { .. } | Message::SideEffectAdd { .. }) => {
                Err(TraversalError::protocol(
                    self.handle.address().to_string(),
                    other.class().to_string(),
                ))
            }
        }
    }

    fn terminate(&mut self) {
        trace!(worker = %self.handle.address(), "Worker program stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::{Phase, Terminate};
    use crate::process::{BarrierContents, Traversal};
    use crate::program::testing::{workers, Outbox, RecordingWorker};
    use crate::structure::{Element, MemoryGraph, MemoryPartitioner, Partitioner};
    use serde_json::json;

    struct Fixture {
        program: TraversalWorkerProgram,
        outbox: Outbox,
        workers: Vec<Address>,
        master: Address,
        graph: Arc<MemoryGraph>,
    }

    /// Worker for partition `index` of `{1,2,3}` / `{4,5,6}`
    fn fixture(traversal: Traversal, index: usize) -> Fixture {
        let graph = Arc::new(MemoryGraph::modern());
        let partitioner: Arc<dyn Partitioner> = Arc::new(
            MemoryPartitioner::explicit(Arc::clone(&graph), vec![vec![1, 2, 3], vec![4, 5, 6]])
                .unwrap(),
        );
        let workers = workers(partitioner.as_ref());
        let master = Address::master("master");
        let outbox = Outbox::default();
        let handle = RecordingWorker {
            address: workers[index].clone(),
            master: master.clone(),
            workers: workers.clone(),
            partition: Arc::clone(&partitioner.partitions()[index]),
            partitioner,
            outbox: Arc::clone(&outbox),
        };
        let pipeline = traversal.compile(&graph).unwrap();
        let program = TraversalWorkerProgram::new(Box::new(handle), pipeline).unwrap();
        Fixture {
            program,
            outbox,
            workers,
            master,
            graph,
        }
    }

    fn vertex(graph: &MemoryGraph, id: u64) -> Element {
        graph.vertex(id).unwrap().clone().into()
    }

    #[test]
    fn test_start_routes_remote_neighbours_to_their_owner() {
        // v1 knows v2 (local) and v4 (remote), and created v3 (local)
        let traversal = Traversal::v([1]).out(Vec::<String>::new()).count();
        let mut fixture = fixture(traversal, 0);
        fixture.program.execute(Message::Start).unwrap();

        let sent = fixture.outbox.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, fixture.workers[1]);
        match &sent[0].1 {
            Message::Traverser { traverser } => {
                assert_eq!(traverser.element().map(Element::id), Some(4));
                assert_eq!(traverser.step_id, StepId::new("count@2"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(fixture.program.staged, vec![StepId::new("count@2")]);
    }

    #[test]
    fn test_non_local_element_is_a_routing_error() {
        let mut fixture = fixture(Traversal::v([]).out(Vec::<String>::new()), 0);
        let remote = vertex(&fixture.graph, 4);
        let result = fixture
            .program
            .execute(Message::traverser(Traverser::new(remote, StepId::new("out@1"))));
        assert!(matches!(result, Err(TraversalError::Routing(_))));
    }

    #[test]
    fn test_token_flushes_barrier_contributions_before_voting() {
        let mut fixture = fixture(Traversal::v([]).count(), 1);
        fixture.program.execute(Message::Start).unwrap();
        assert!(fixture.outbox.lock().is_empty());

        fixture
            .program
            .execute(Message::Terminate(Terminate::yes(0)))
            .unwrap();
        let sent = fixture.outbox.lock().clone();
        assert_eq!(
            sent[0],
            (
                fixture.master.clone(),
                Message::BarrierAdd {
                    step_id: StepId::new("count@1"),
                    contents: BarrierContents::Data(json!(3)),
                }
            )
        );
        // Non-leader: active since Start, so the pass is void
        assert_eq!(sent[1].0, fixture.workers[0]);
        assert!(matches!(
            sent[1].1,
            Message::Terminate(Terminate {
                phase: Phase::No,
                balance: 0
            })
        ));

        // Nothing staged twice
        fixture.outbox.lock().clear();
        fixture
            .program
            .execute(Message::Terminate(Terminate::yes(0)))
            .unwrap();
        let sent = fixture.outbox.lock().clone();
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn test_side_effects_converge_to_master_values() {
        let traversal = Traversal::v([]).aggregate("x").count();
        let mut fixture = fixture(traversal, 0);
        fixture.program.execute(Message::Start).unwrap();
        fixture
            .program
            .execute(Message::Terminate(Terminate::maybe()))
            .unwrap();

        let pushed = json!([1, 2, 3, 4, 5, 6]);
        fixture
            .program
            .execute(Message::SideEffectSet {
                key: "x".to_string(),
                value: pushed.clone(),
            })
            .unwrap();
        fixture
            .program
            .execute(Message::BarrierDone {
                step_id: StepId::new("aggregate@1"),
            })
            .unwrap();

        assert_eq!(fixture.program.pipeline.side_effects().get("x"), Some(pushed));
        assert!(fixture.program.pipeline.side_effects().take_pending().is_empty());
    }

    #[test]
    fn test_master_only_messages_are_protocol_errors() {
        let mut fixture = fixture(Traversal::v([]).count(), 0);
        let result = fixture.program.execute(Message::SideEffectAdd {
            key: "x".to_string(),
            value: json!(1),
        });
        assert!(matches!(result, Err(TraversalError::Protocol { .. })));
    }
}
