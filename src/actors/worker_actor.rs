//! # Worker Actor
//!
//! Host shell for a [`WorkerProgram`] bound to a single partition.

use super::address::{Address, AddressBook};
use super::messages::{Envelope, Message, MessageClass};
use super::traits::{Actor, ActorProgram, ActorSystem, ProgramState, WorkerHandle, WorkerProgram};
use crate::error::{Result, TraversalError};
use crate::structure::{Partition, Partitioner};
use std::sync::Arc;
use tracing::debug;

struct WorkerRef {
    address: Address,
    master: Address,
    workers: Vec<Address>,
    partition: Arc<dyn Partition>,
    partitioner: Arc<dyn Partitioner>,
    book: AddressBook,
}

impl WorkerHandle for WorkerRef {
    fn address(&self) -> &Address {
        &self.address
    }

    fn master(&self) -> &Address {
        &self.master
    }

    fn workers(&self) -> &[Address] {
        &self.workers
    }

    fn partition(&self) -> &Arc<dyn Partition> {
        &self.partition
    }

    fn partitioner(&self) -> &Arc<dyn Partitioner> {
        &self.partitioner
    }

    fn send(&mut self, to: &Address, message: Message) -> Result<()> {
        self.book.deliver(&self.address, to, message)
    }
}

pub struct WorkerActor {
    address: Address,
    master: Address,
    workers: Vec<Address>,
    partition: Arc<dyn Partition>,
    partitioner: Arc<dyn Partitioner>,
    system: Arc<dyn ActorSystem>,
    program: Box<dyn ActorProgram>,
    state: ProgramState,
    worker_program: Option<Box<dyn WorkerProgram>>,
}

impl WorkerActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: Address,
        master: Address,
        workers: Vec<Address>,
        partition: Arc<dyn Partition>,
        partitioner: Arc<dyn Partitioner>,
        system: Arc<dyn ActorSystem>,
        program: Box<dyn ActorProgram>,
        state: ProgramState,
    ) -> Self {
        Self {
            address,
            master,
            workers,
            partition,
            partitioner,
            system,
            program,
            state,
            worker_program: None,
        }
    }
}

impl Actor for WorkerActor {
    fn address(&self) -> &Address {
        &self.address
    }

    fn message_priorities(&self) -> Option<Vec<MessageClass>> {
        self.program.message_priorities()
    }

    fn pre_start(&mut self) -> Result<()> {
        self.program.load_state(&self.state)?;
        let handle = WorkerRef {
            address: self.address.clone(),
            master: self.master.clone(),
            workers: self.workers.clone(),
            partition: Arc::clone(&self.partition),
            partitioner: Arc::clone(&self.partitioner),
            book: AddressBook::new(Arc::clone(&self.system)),
        };
        let mut program = self.program.create_worker_program(Box::new(handle))?;
        program.setup()?;
        self.worker_program = Some(program);
        debug!(worker = %self.address, partition = self.partition.id(), "Worker program ready");
        Ok(())
    }

    fn receive(&mut self, envelope: Envelope) -> Result<()> {
        let program = self.worker_program.as_mut().ok_or_else(|| {
            TraversalError::host(format!("{} received a message before setup", self.address))
        })?;
        program.execute(envelope.message)
    }

    fn post_stop(&mut self) {
        if let Some(program) = self.worker_program.as_mut() {
            program.terminate();
        }
    }
}
