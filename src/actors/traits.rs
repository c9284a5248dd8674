//! # Core Actor Traits
//!
//! The seams between the coordination protocol and whatever hosts it.
//!
//! - [`ActorSystem`] and [`Actor`]: the host runtime, implemented by
//!   [`super::system::TokioActorSystem`].
//! - [`ActorProgram`]: a factory for the behaviour that runs inside the master
//!   and worker actors. One program instance is cloned per actor.
//! - [`MasterProgram`] / [`WorkerProgram`]: that behaviour. Handlers are
//!   synchronous and run to completion; they talk to other actors only through
//!   their [`MasterHandle`] / [`WorkerHandle`].

use super::address::Address;
use super::mailbox::MailboxSender;
use super::messages::{Envelope, Message, MessageClass};
use crate::error::{Result, TraversalError};
use crate::structure::{Partition, Partitioner};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An actor hosted by an [`ActorSystem`]
///
/// ## Lifecycle
///
/// - `pre_start()`: called inside the actor's task before the first message.
///   An error here fails the whole system.
/// - `receive()`: called once per envelope, serially.
/// - `post_stop()`: called when the actor loop exits, whatever the reason.
pub trait Actor: Send + 'static {
    fn address(&self) -> &Address;

    /// Batch ordering for this actor's mailbox
    fn message_priorities(&self) -> Option<Vec<MessageClass>> {
        None
    }

    fn pre_start(&mut self) -> Result<()> {
        Ok(())
    }

    fn receive(&mut self, envelope: Envelope) -> Result<()>;

    fn post_stop(&mut self) {}
}

#[async_trait]
pub trait ActorSystem: Send + Sync {
    fn name(&self) -> &str;

    /// Register the actor's mailbox and start its task. Addresses are unique.
    fn spawn(&self, actor: Box<dyn Actor>) -> Result<()>;

    /// Mailbox of a live actor
    fn select(&self, address: &Address) -> Option<MailboxSender>;

    /// Stop every actor before its next envelope
    fn terminate(&self);

    /// Record the first error and terminate
    fn fail(&self, error: TraversalError);

    fn is_terminated(&self) -> bool;

    /// Resolve once terminated and every actor task has finished
    async fn await_termination(&self) -> Result<()>;
}

/// Master-side view of the actor system
pub trait MasterHandle: Send {
    fn address(&self) -> &Address;

    /// Worker addresses in partition order; the first is the vote leader
    fn workers(&self) -> &[Address];

    fn partitioner(&self) -> &Arc<dyn Partitioner>;

    fn send(&mut self, to: &Address, message: Message) -> Result<()>;

    /// Terminate the actor system; the job is over
    fn close(&mut self);
}

/// Worker-side view of the actor system
pub trait WorkerHandle: Send {
    fn address(&self) -> &Address;

    fn master(&self) -> &Address;

    /// All worker addresses in partition order, including this one
    fn workers(&self) -> &[Address];

    fn partition(&self) -> &Arc<dyn Partition>;

    fn partitioner(&self) -> &Arc<dyn Partitioner>;

    fn send(&mut self, to: &Address, message: Message) -> Result<()>;
}

pub trait MasterProgram: Send {
    fn setup(&mut self) -> Result<()>;

    fn execute(&mut self, message: Message) -> Result<()>;

    fn terminate(&mut self) {}
}

pub trait WorkerProgram: Send {
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, message: Message) -> Result<()>;

    fn terminate(&mut self) {}
}

/// Serializable description of an actor program, written by the submitting
/// side and checked by every actor before it builds its program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramState(BTreeMap<String, Json>);

impl ProgramState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: Json) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Json> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Json::as_str)
    }
}

pub trait ActorProgram: Send + Sync {
    fn name(&self) -> &str;

    fn create_master_program(&self, handle: Box<dyn MasterHandle>) -> Result<Box<dyn MasterProgram>>;

    fn create_worker_program(&self, handle: Box<dyn WorkerHandle>) -> Result<Box<dyn WorkerProgram>>;

    fn message_priorities(&self) -> Option<Vec<MessageClass>> {
        None
    }

    /// Independent copy for another actor
    fn clone_program(&self) -> Box<dyn ActorProgram>;

    fn store_state(&self, state: &mut ProgramState);

    /// Reject a state written by a different program
    fn load_state(&self, state: &ProgramState) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_program_state_access() {
        let mut state = ProgramState::new();
        state.set("traversal.actorProgram", json!("TraversalActorProgram"));
        state.set("answer", json!(42));
        assert_eq!(state.get_str("traversal.actorProgram"), Some("TraversalActorProgram"));
        assert_eq!(state.get("answer"), Some(&json!(42)));
        assert_eq!(state.get_str("answer"), None);
    }

    #[test]
    fn test_traits_are_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn ActorSystem>();
        assert_send_sync::<dyn ActorProgram>();
    }
}
