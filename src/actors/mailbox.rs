//! # Mailboxes
//!
//! Strongly-typed wrappers around the unbounded tokio channels that carry
//! [`Envelope`]s to an actor. Mailboxes are unbounded so that a send never
//! waits: two actors that message each other from inside their handlers can
//! never deadlock.

use super::messages::{Envelope, MessageClass};
use crate::error::{Result, TraversalError};
use tokio::sync::mpsc;

/// Sending half of an actor mailbox
#[derive(Debug, Clone)]
pub struct MailboxSender(pub(crate) mpsc::UnboundedSender<Envelope>);

/// Receiving half of an actor mailbox, owned by the actor's task
#[derive(Debug)]
pub struct MailboxReceiver(pub(crate) mpsc::UnboundedReceiver<Envelope>);

impl MailboxSender {
    /// Deliver an envelope. Fails once the receiving actor has stopped.
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        self.0.send(envelope).map_err(|rejected| {
            TraversalError::host(format!(
                "mailbox closed, dropped {} from {}",
                rejected.0.message.class(),
                rejected.0.from
            ))
        })
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

impl MailboxReceiver {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.0.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.0.try_recv().ok()
    }

    /// Wait for one envelope, then take up to `max - 1` more that are already
    /// queued. With priorities, the batch is stable-sorted by class so FIFO
    /// order holds within a class. Classes missing from the list go last.
    ///
    /// Only the first receive awaits, so dropping this future loses nothing.
    pub async fn next_batch(
        &mut self,
        max: usize,
        priorities: Option<&[MessageClass]>,
    ) -> Option<Vec<Envelope>> {
        let first = self.0.recv().await?;
        let mut batch = vec![first];
        while batch.len() < max.max(1) {
            match self.0.try_recv() {
                Ok(envelope) => batch.push(envelope),
                Err(_) => break,
            }
        }

        if let Some(priorities) = priorities {
            batch.sort_by_key(|envelope| {
                let class = envelope.message.class();
                priorities
                    .iter()
                    .position(|c| *c == class)
                    .unwrap_or(priorities.len())
            });
        }
        Some(batch)
    }
}

/// Factory for mailbox channel pairs
#[derive(Debug)]
pub struct MailboxFactory;

impl MailboxFactory {
    pub fn mailbox() -> (MailboxSender, MailboxReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MailboxSender(tx), MailboxReceiver(rx))
    }
}
