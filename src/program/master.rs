//! # Traversal Master Program
//!
//! Runs on the master actor. It starts the workers, processes traversers that
//! carry plain data (workers only handle elements), fuses barrier
//! contributions and side-effect deltas, and drives the termination vote.
//!
//! ## Rounds
//!
//! A round ends when a `Yes` token proves quiescence. If barriers were
//! installed during the round they are drained in installation order and a
//! new round begins; otherwise the pipeline tail is drained, the result is
//! published and the actor system is closed.

use super::termination::MasterVote;
use super::{PartitionRoutes, ResultSink, TraversalOutput};
use crate::actors::{Address, MasterHandle, MasterProgram, Message, Phase, Terminate};
use crate::error::{Result, TraversalError};
use crate::logging::{log_round, log_vote};
use crate::process::step::drain_outputs;
use crate::process::{BarrierContents, BarrierKind, Step, StepId, StepPipeline, Traverser, TraverserSet};
use std::sync::Arc;
use tracing::{debug, info, trace};

pub struct TraversalMasterProgram {
    handle: Box<dyn MasterHandle>,
    pipeline: StepPipeline,
    routes: PartitionRoutes,
    /// Barrier steps awaiting drain, in installation order
    barriers: Vec<StepId>,
    results: TraverserSet,
    leader: Address,
    order_counter: Option<i32>,
    vote: MasterVote,
    sink: ResultSink,
}

impl TraversalMasterProgram {
    pub fn new(handle: Box<dyn MasterHandle>, mut pipeline: StepPipeline, sink: ResultSink) -> Result<Self> {
        let leader = handle
            .workers()
            .first()
            .cloned()
            .ok_or_else(|| TraversalError::configuration("master program needs at least one worker"))?;
        let routes = PartitionRoutes::new(Arc::clone(handle.partitioner()), handle.workers())?;
        pipeline.set_at_master(true);

        Ok(Self {
            handle,
            pipeline,
            routes,
            barriers: Vec::new(),
            results: TraverserSet::new(),
            leader,
            order_counter: None,
            vote: MasterVote::new(),
            sink,
        })
    }

    fn send(&mut self, to: &Address, message: Message) -> Result<()> {
        if message.is_work() {
            self.vote.on_sent();
        }
        self.handle.send(to, message)
    }

    fn seed(&mut self) -> Result<()> {
        let token = self.vote.seed();
        let leader = self.leader.clone();
        self.handle.send(&leader, Message::Terminate(token))
    }

    fn process_traverser(&mut self, traverser: Traverser) -> Result<()> {
        let mut stack = vec![traverser];
        while let Some(traverser) = stack.pop() {
            if traverser.is_halted() || traverser.element().is_some() {
                self.send_traverser(traverser)?;
                continue;
            }

            let step_id = traverser.step_id.clone();
            let step = self
                .pipeline
                .get_step(&step_id)
                .ok_or_else(|| TraversalError::pipeline(&step_id, "unknown step"))?;
            step.set_at_master(true);
            step.add_start(traverser)?;
            if step.barrier_kind().is_some() {
                install(&mut self.barriers, step_id);
                continue;
            }
            stack.extend(drain_outputs(step).into_iter().rev());
        }
        Ok(())
    }

    fn send_traverser(&mut self, traverser: Traverser) -> Result<()> {
        if traverser.is_halted() {
            self.results.push(traverser);
            return Ok(());
        }
        let to = match traverser.element() {
            Some(element) => self.routes.route(element)?,
            None => self.handle.address().clone(),
        };
        self.send(&to, Message::traverser(traverser))
    }

    fn route_all(&mut self, traversers: Vec<Traverser>) -> Result<()> {
        for traverser in traversers {
            self.send_traverser(traverser)?;
        }
        Ok(())
    }

    fn add_barrier(&mut self, step_id: StepId, contents: BarrierContents) -> Result<()> {
        let step = self
            .pipeline
            .get_step(&step_id)
            .ok_or_else(|| TraversalError::barrier_consistency(&step_id))?;
        step.set_at_master(true);
        let barrier = step
            .as_barrier()
            .ok_or_else(|| TraversalError::barrier_consistency(&step_id))?;
        barrier.add_barrier(contents)?;
        install(&mut self.barriers, step_id);
        Ok(())
    }

    fn on_vote(&mut self, token: Terminate) -> Result<()> {
        log_vote(self.handle.address(), token.phase, token.balance);

        if !self.vote.is_quiescent(&token) {
            trace!(balance = token.balance + self.vote.balance(), "Work still in flight");
            return self.seed();
        }

        log_round(self.vote.rounds(), self.barriers.len(), token.balance);
        if self.barriers.is_empty() {
            return self.finish();
        }

        for step_id in std::mem::take(&mut self.barriers) {
            self.drain_barrier(&step_id)?;
        }
        self.seed()
    }

    fn drain_barrier(&mut self, step_id: &StepId) -> Result<()> {
        let step = self
            .pipeline
            .get_step(step_id)
            .ok_or_else(|| TraversalError::barrier_consistency(step_id))?;
        if step.is_order_global() {
            self.order_counter = Some(0);
        }
        if self.order_counter.is_some() && (step.is_range_global() || step.is_tail_global()) {
            restore_stamp_order(step, step_id)?;
        }

        match step.barrier_kind() {
            Some(BarrierKind::Global) => {
                let mut outputs = drain_outputs(step);
                if let Some(counter) = self.order_counter.as_mut() {
                    for traverser in &mut outputs {
                        traverser.order = Some(*counter);
                        *counter += 1;
                    }
                }
                debug!(step_id = %step_id, released = outputs.len(), "Drained global barrier");
                self.route_all(outputs)
            }
            Some(BarrierKind::Local) => self.release_local(step_id),
            None => Err(TraversalError::barrier_consistency(step_id)),
        }
    }

    /// Push the master's side effects to every worker, release the barrier
    /// everywhere, then release the master's own copy
    fn release_local(&mut self, step_id: &StepId) -> Result<()> {
        let snapshot = self.pipeline.side_effects().snapshot();
        let workers = self.handle.workers().to_vec();
        for worker in &workers {
            for (key, value) in &snapshot {
                self.send(
                    worker,
                    Message::SideEffectSet {
                        key: key.clone(),
                        value: value.clone(),
                    },
                )?;
            }
            self.send(
                worker,
                Message::BarrierDone {
                    step_id: step_id.clone(),
                },
            )?;
        }

        let step = self
            .pipeline
            .get_step(step_id)
            .ok_or_else(|| TraversalError::barrier_consistency(step_id))?;
        if let Some(barrier) = step.as_barrier() {
            barrier.done();
        }
        let released = drain_outputs(step);
        debug!(step_id = %step_id, released = released.len(), "Released local barrier");
        self.route_all(released)
    }

    fn finish(&mut self) -> Result<()> {
        let tail = self.pipeline.drain_tail()?;
        self.results.extend(tail);

        let mut traversers = std::mem::take(&mut self.results);
        if self.order_counter.is_some() {
            traversers.sort_by_order();
            traversers.renumber();
        }
        let side_effects = self.pipeline.side_effects().snapshot();

        info!(
            pipeline = self.pipeline.describe(),
            traversers = traversers.len(),
            rounds = self.vote.rounds(),
            "✅ MASTER: traversal complete"
        );
        self.sink.publish(TraversalOutput {
            traversers,
            side_effects,
        });
        self.handle.close();
        Ok(())
    }
}

#[cfg(test)]
impl TraversalMasterProgram {
    pub(crate) fn side_effects(&self) -> &crate::process::SideEffects {
        self.pipeline.side_effects()
    }
}

impl MasterProgram for TraversalMasterProgram {
    fn setup(&mut self) -> Result<()> {
        let workers = self.handle.workers().to_vec();
        for worker in &workers {
            self.send(worker, Message::Start)?;
        }
        self.seed()
    }

    fn execute(&mut self, message: Message) -> Result<()> {
        if message.is_work() {
            self.vote.on_received();
        }

        match message {
            Message::Traverser { traverser } => self.process_traverser(traverser),
            Message::BarrierAdd { step_id, contents } => self.add_barrier(step_id, contents),
            Message::SideEffectAdd { key, value } => self.pipeline.side_effects().add(&key, value),
            Message::Terminate(token) => match token.phase {
                Phase::Yes => self.on_vote(token),
                Phase::Maybe | Phase::No => Ok(()),
            },
            other @ (Message::Start | Message::BarrierDone { .. } | Message::SideEffectSet { .. }) => {
                Err(TraversalError::protocol(
                    self.handle.address().to_string(),
                    other.class().to_string(),
                ))
            }
        }
    }

    fn terminate(&mut self) {
        debug!(
            master = %self.handle.address(),
            published = self.sink.is_published(),
            "Master program stopped"
        );
    }
}

fn install(barriers: &mut Vec<StepId>, step_id: StepId) {
    if !barriers.contains(&step_id) {
        barriers.push(step_id);
    }
}

/// Contributions from different workers arrive interleaved; put them back in
/// stamp order before a range or tail window is applied
fn restore_stamp_order(step: &mut dyn Step, step_id: &StepId) -> Result<()> {
    let barrier = step
        .as_barrier()
        .ok_or_else(|| TraversalError::barrier_consistency(step_id))?;
    if let BarrierContents::Traversers(mut traversers) = barrier.next_barrier()? {
        traversers.sort_by_order();
        barrier.add_barrier(BarrierContents::Traversers(traversers))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::testing::{workers, Outbox, RecordingMaster};
    use crate::process::Traversal;
    use crate::structure::{MemoryGraph, MemoryPartitioner, Partitioner};
    use parking_lot::Mutex;
    use serde_json::json;

    struct Fixture {
        program: TraversalMasterProgram,
        outbox: Outbox,
        closed: Arc<Mutex<bool>>,
        sink: ResultSink,
        workers: Vec<Address>,
    }

    fn fixture(traversal: Traversal) -> Fixture {
        let graph = Arc::new(MemoryGraph::modern());
        let partitioner: Arc<dyn Partitioner> =
            Arc::new(MemoryPartitioner::hashed(Arc::clone(&graph), 2).unwrap());
        let workers = workers(partitioner.as_ref());
        let outbox = Outbox::default();
        let closed = Arc::new(Mutex::new(false));
        let handle = RecordingMaster {
            address: Address::master("master"),
            workers: workers.clone(),
            partitioner,
            outbox: Arc::clone(&outbox),
            closed: Arc::clone(&closed),
        };
        let sink = ResultSink::new();
        let pipeline = traversal.compile(&graph).unwrap();
        let program = TraversalMasterProgram::new(Box::new(handle), pipeline, sink.clone()).unwrap();
        Fixture {
            program,
            outbox,
            closed,
            sink,
            workers,
        }
    }

    fn count_traversal() -> Traversal {
        Traversal::v([]).count()
    }

    #[test]
    fn test_setup_starts_workers_then_seeds_leader() {
        let mut fixture = fixture(count_traversal());
        fixture.program.setup().unwrap();

        let sent = fixture.outbox.lock().clone();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], (fixture.workers[0].clone(), Message::Start));
        assert_eq!(sent[1], (fixture.workers[1].clone(), Message::Start));
        assert_eq!(
            sent[2],
            (
                fixture.workers[0].clone(),
                Message::Terminate(Terminate::maybe())
            )
        );
    }

    #[test]
    fn test_duplicate_barrier_add_installs_once() {
        let mut fixture = fixture(count_traversal());
        let step_id = StepId::new("count@1");
        for partial in [3, 3] {
            fixture
                .program
                .execute(Message::BarrierAdd {
                    step_id: step_id.clone(),
                    contents: BarrierContents::Data(json!(partial)),
                })
                .unwrap();
        }
        assert_eq!(fixture.program.barriers, vec![step_id]);
    }

    #[test]
    fn test_barrier_add_for_non_barrier_step_is_rejected() {
        let mut fixture = fixture(count_traversal());
        let result = fixture.program.execute(Message::BarrierAdd {
            step_id: StepId::new("V@0"),
            contents: BarrierContents::Empty,
        });
        assert!(matches!(result, Err(TraversalError::BarrierConsistency { .. })));
    }

    #[test]
    fn test_worker_only_messages_are_protocol_errors() {
        let mut fixture = fixture(count_traversal());
        for message in [
            Message::Start,
            Message::BarrierDone {
                step_id: StepId::new("count@1"),
            },
            Message::SideEffectSet {
                key: "x".to_string(),
                value: json!(1),
            },
        ] {
            assert!(matches!(
                fixture.program.execute(message),
                Err(TraversalError::Protocol { .. })
            ));
        }
    }

    #[test]
    fn test_rounds_drain_barriers_then_finish() {
        let mut fixture = fixture(count_traversal());
        fixture.program.setup().unwrap();
        for partial in [2, 4] {
            fixture
                .program
                .execute(Message::BarrierAdd {
                    step_id: StepId::new("count@1"),
                    contents: BarrierContents::Data(json!(partial)),
                })
                .unwrap();
        }

        // Two starts sent and two contributions received: balanced, but the
        // master was active since seeding
        fixture.program.execute(Message::Terminate(Terminate::yes(0))).unwrap();
        assert_eq!(fixture.program.barriers.len(), 1);

        // Quiet round: the count is drained into the results
        fixture.program.execute(Message::Terminate(Terminate::yes(0))).unwrap();
        assert!(fixture.program.barriers.is_empty());
        assert!(!*fixture.closed.lock());

        // Final round publishes
        fixture.program.execute(Message::Terminate(Terminate::yes(0))).unwrap();
        assert!(*fixture.closed.lock());
        let output = fixture.sink.take().unwrap();
        assert_eq!(output.traversers.len(), 1);
        assert_eq!(output.traversers.as_slice()[0].value.to_json(), json!(6));
    }

    #[test]
    fn test_unbalanced_yes_reseeds() {
        let mut fixture = fixture(count_traversal());
        fixture.program.setup().unwrap();
        fixture.outbox.lock().clear();

        // Starts not yet accounted for by the workers
        fixture.program.execute(Message::Terminate(Terminate::yes(0))).unwrap();
        assert!(!*fixture.closed.lock());
        let sent = fixture.outbox.lock().clone();
        assert_eq!(
            sent,
            vec![(
                fixture.workers[0].clone(),
                Message::Terminate(Terminate::maybe())
            )]
        );
    }

    #[test]
    fn test_data_traversers_are_processed_at_master() {
        let mut fixture = fixture(Traversal::v([]).values(["name"]).count());
        fixture
            .program
            .execute(Message::traverser(Traverser::new(json!("marko"), StepId::new("count@2"))))
            .unwrap();
        assert_eq!(fixture.program.barriers, vec![StepId::new("count@2")]);
    }
}
