//! # Actor Layer
//!
//! Addresses, messages and mailboxes, the tokio-hosted actor system, and the
//! master and worker host shells that run actor programs.

pub mod address;
pub mod mailbox;
pub mod master_actor;
pub mod messages;
pub mod system;
pub mod traits;
pub mod worker_actor;

pub use address::Address;
pub use mailbox::{MailboxFactory, MailboxReceiver, MailboxSender};
pub use master_actor::MasterActor;
pub use messages::{Envelope, Message, MessageClass, Phase, Terminate};
pub use system::TokioActorSystem;
pub use traits::{
    Actor, ActorProgram, ActorSystem, MasterHandle, MasterProgram, ProgramState, WorkerHandle,
    WorkerProgram,
};
pub use worker_actor::WorkerActor;
