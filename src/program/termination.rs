//! # Termination Vote
//!
//! A token circulates over the workers in enumeration order. The leader (the
//! first worker) starts a pass when the master seeds `Maybe`, and reports to
//! the master once a pass closes with nobody active. Every actor also counts
//! the work messages it sent and received; the token carries the running sum
//! of `sent - received`, and the master only accepts a round when that sum,
//! plus its own, is zero. Tokens and work messages from different senders may
//! be reordered, so a clean pass alone does not prove quiescence.

use crate::actors::{Address, Phase, Terminate};
use crate::error::{Result, TraversalError};

/// Cumulative work-message counts of one actor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageCounters {
    sent: u64,
    received: u64,
}

impl MessageCounters {
    pub fn on_sent(&mut self) {
        self.sent += 1;
    }

    pub fn on_received(&mut self) {
        self.received += 1;
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn balance(&self) -> i64 {
        self.sent as i64 - self.received as i64
    }
}

/// Master side of the vote
#[derive(Debug, Default)]
pub struct MasterVote {
    counters: MessageCounters,
    active: bool,
    rounds: u64,
}

impl MasterVote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new round; the returned token goes to the leader
    pub fn seed(&mut self) -> Terminate {
        self.active = false;
        self.rounds += 1;
        Terminate::maybe()
    }

    pub fn on_sent(&mut self) {
        self.counters.on_sent();
        self.active = true;
    }

    pub fn on_received(&mut self) {
        self.counters.on_received();
        self.active = true;
    }

    /// A `Yes` token proves quiescence only if the master stayed idle since
    /// seeding and no work message is in flight
    pub fn is_quiescent(&self, token: &Terminate) -> bool {
        token.phase == Phase::Yes && !self.active && token.balance + self.counters.balance() == 0
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn balance(&self) -> i64 {
        self.counters.balance()
    }
}

/// Worker side of the vote: one position on the ring
#[derive(Debug)]
pub struct WorkerVote {
    leader: bool,
    neighbor: Address,
    master: Address,
    counters: MessageCounters,
    active: bool,
}

impl WorkerVote {
    pub fn new(me: &Address, workers: &[Address], master: Address) -> Result<Self> {
        let position = workers.iter().position(|w| w == me).ok_or_else(|| {
            TraversalError::configuration(format!("{me} is not among the enumerated workers"))
        })?;
        Ok(Self {
            leader: position == 0,
            neighbor: workers[(position + 1) % workers.len()].clone(),
            master,
            counters: MessageCounters::default(),
            active: false,
        })
    }

    pub fn is_leader(&self) -> bool {
        self.leader
    }

    pub fn neighbor(&self) -> &Address {
        &self.neighbor
    }

    pub fn on_sent(&mut self) {
        self.counters.on_sent();
    }

    pub fn on_received(&mut self) {
        self.counters.on_received();
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Where the token goes next, and with what
    pub fn on_token(&mut self, token: Terminate) -> (Address, Terminate) {
        let own = self.counters.balance();

        if !self.leader {
            let phase = if self.active {
                Phase::No
            } else if token.phase == Phase::No {
                Phase::No
            } else {
                Phase::Yes
            };
            self.active = false;
            return (
                self.neighbor.clone(),
                Terminate {
                    phase,
                    balance: token.balance + own,
                },
            );
        }

        match token.phase {
            Phase::Yes if !self.active => (self.master.clone(), Terminate::yes(token.balance + own)),
            // A seed from the master, or a pass that saw activity
            _ => {
                self.active = false;
                (self.neighbor.clone(), Terminate::yes(0))
            }
        }
    }
}
