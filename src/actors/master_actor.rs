//! # Master Actor
//!
//! Host shell for a [`MasterProgram`]. On start it spawns one
//! [`WorkerActor`] per partition, builds the master program through the
//! [`ActorProgram`] factory and runs its `setup`. Every envelope after that is
//! handed to the program.

use super::address::{Address, AddressBook};
use super::messages::{Envelope, Message, MessageClass};
use super::traits::{Actor, ActorProgram, ActorSystem, MasterHandle, MasterProgram, ProgramState};
use super::worker_actor::WorkerActor;
use crate::error::{Result, TraversalError};
use crate::structure::Partitioner;
use std::sync::Arc;
use tracing::{debug, info};

/// The handle a master program talks through
struct MasterRef {
    address: Address,
    workers: Vec<Address>,
    partitioner: Arc<dyn Partitioner>,
    book: AddressBook,
}

impl MasterHandle for MasterRef {
    fn address(&self) -> &Address {
        &self.address
    }

    fn workers(&self) -> &[Address] {
        &self.workers
    }

    fn partitioner(&self) -> &Arc<dyn Partitioner> {
        &self.partitioner
    }

    fn send(&mut self, to: &Address, message: Message) -> Result<()> {
        self.book.deliver(&self.address, to, message)
    }

    fn close(&mut self) {
        self.book.system().terminate();
    }
}

pub struct MasterActor {
    address: Address,
    system: Arc<dyn ActorSystem>,
    program: Box<dyn ActorProgram>,
    state: ProgramState,
    partitioner: Arc<dyn Partitioner>,
    worker_prefix: String,
    master_program: Option<Box<dyn MasterProgram>>,
}

impl MasterActor {
    pub fn new(
        address: Address,
        system: Arc<dyn ActorSystem>,
        program: Box<dyn ActorProgram>,
        state: ProgramState,
        partitioner: Arc<dyn Partitioner>,
        worker_prefix: impl Into<String>,
    ) -> Self {
        Self {
            address,
            system,
            program,
            state,
            partitioner,
            worker_prefix: worker_prefix.into(),
            master_program: None,
        }
    }

    fn spawn_workers(&self) -> Result<Vec<Address>> {
        let partitions = self.partitioner.partitions();
        let workers: Vec<Address> = partitions
            .iter()
            .map(|partition| Address::for_partition(&self.worker_prefix, partition.as_ref()))
            .collect();

        for (partition, address) in partitions.iter().zip(&workers) {
            let worker = WorkerActor::new(
                address.clone(),
                self.address.clone(),
                workers.clone(),
                Arc::clone(partition),
                Arc::clone(&self.partitioner),
                Arc::clone(&self.system),
                self.program.clone_program(),
                self.state.clone(),
            );
            self.system.spawn(Box::new(worker))?;
            debug!(worker = %address, partition = partition.id(), "Spawned worker");
        }
        Ok(workers)
    }
}

impl Actor for MasterActor {
    fn address(&self) -> &Address {
        &self.address
    }

    fn message_priorities(&self) -> Option<Vec<MessageClass>> {
        self.program.message_priorities()
    }

    fn pre_start(&mut self) -> Result<()> {
        self.program.load_state(&self.state)?;
        let workers = self.spawn_workers()?;
        info!(
            master = %self.address,
            program = self.program.name(),
            workers = workers.len(),
            "🚀 MASTER: workers spawned"
        );

        let handle = MasterRef {
            address: self.address.clone(),
            workers,
            partitioner: Arc::clone(&self.partitioner),
            book: AddressBook::new(Arc::clone(&self.system)),
        };
        let mut program = self.program.create_master_program(Box::new(handle))?;
        program.setup()?;
        self.master_program = Some(program);
        Ok(())
    }

    fn receive(&mut self, envelope: Envelope) -> Result<()> {
        let program = self.master_program.as_mut().ok_or_else(|| {
            TraversalError::host(format!("{} received a message before setup", self.address))
        })?;
        program.execute(envelope.message)
    }

    fn post_stop(&mut self) {
        if let Some(program) = self.master_program.as_mut() {
            program.terminate();
        }
    }
}
