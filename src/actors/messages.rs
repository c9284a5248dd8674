//! # Actor Messages
//!
//! The closed set of messages exchanged between the master and its workers.
//! Every message except the termination token is a *work* message and is
//! counted by the termination vote.

use super::address::Address;
use crate::process::{BarrierContents, StepId, Traverser};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// Phase of the termination vote token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Master asks the leader to start a vote
    Maybe,
    /// Nobody on the ring has been active so far
    Yes,
    /// Someone on the ring was active; the pass is void
    No,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Maybe => "MAYBE",
            Phase::Yes => "YES",
            Phase::No => "NO",
        };
        f.write_str(name)
    }
}

/// The vote token. `balance` accumulates `sent - received` work messages of
/// every actor the token has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminate {
    pub phase: Phase,
    pub balance: i64,
}

impl Terminate {
    pub fn maybe() -> Self {
        Self {
            phase: Phase::Maybe,
            balance: 0,
        }
    }

    pub fn yes(balance: i64) -> Self {
        Self {
            phase: Phase::Yes,
            balance,
        }
    }

    pub fn no(balance: i64) -> Self {
        Self {
            phase: Phase::No,
            balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Start,
    Traverser {
        traverser: Traverser,
    },
    BarrierAdd {
        step_id: StepId,
        contents: BarrierContents,
    },
    BarrierDone {
        step_id: StepId,
    },
    SideEffectAdd {
        key: String,
        value: Json,
    },
    SideEffectSet {
        key: String,
        value: Json,
    },
    Terminate(Terminate),
}

/// Message classes an actor program can prioritise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageClass {
    Start,
    Traverser,
    BarrierAdd,
    BarrierDone,
    SideEffectAdd,
    SideEffectSet,
    Terminate,
}

impl Message {
    pub fn traverser(traverser: Traverser) -> Self {
        Message::Traverser { traverser }
    }

    pub fn class(&self) -> MessageClass {
        match self {
            Message::Start => MessageClass::Start,
            Message::Traverser { .. } => MessageClass::Traverser,
            Message::BarrierAdd { .. } => MessageClass::BarrierAdd,
            Message::BarrierDone { .. } => MessageClass::BarrierDone,
            Message::SideEffectAdd { .. } => MessageClass::SideEffectAdd,
            Message::SideEffectSet { .. } => MessageClass::SideEffectSet,
            Message::Terminate(_) => MessageClass::Terminate,
        }
    }

    /// Whether the termination vote counts this message
    pub fn is_work(&self) -> bool {
        !matches!(self, Message::Terminate(_))
    }
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageClass::Start => "Start",
            MessageClass::Traverser => "Traverser",
            MessageClass::BarrierAdd => "BarrierAdd",
            MessageClass::BarrierDone => "BarrierDone",
            MessageClass::SideEffectAdd => "SideEffectAdd",
            MessageClass::SideEffectSet => "SideEffectSet",
            MessageClass::Terminate => "Terminate",
        };
        f.write_str(name)
    }
}

/// A message together with its sender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Address,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: Address, message: Message) -> Self {
        Self { from, message }
    }
}
