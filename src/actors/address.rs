use super::mailbox::MailboxSender;
use super::messages::{Envelope, Message};
use super::traits::ActorSystem;
use crate::error::{Result, TraversalError};
use crate::structure::Partition;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Actor address. Equality and hashing consider the location only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", content = "location", rename_all = "snake_case")]
pub enum Address {
    Master(String),
    Worker(String),
}

impl Address {
    pub fn master(location: impl Into<String>) -> Self {
        Address::Master(location.into())
    }

    pub fn worker(location: impl Into<String>) -> Self {
        Address::Worker(location.into())
    }

    /// Deterministic worker address for a partition: `prefix` followed by the
    /// hex hash of the partition id
    pub fn for_partition(prefix: &str, partition: &dyn Partition) -> Self {
        let mut hasher = DefaultHasher::new();
        partition.id().hash(&mut hasher);
        Address::Worker(format!("{prefix}{:x}", hasher.finish()))
    }

    pub fn location(&self) -> &str {
        match self {
            Address::Master(location) | Address::Worker(location) => location,
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, Address::Master(_))
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.location() == other.location()
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location().hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Master(location) => write!(f, "master:{location}"),
            Address::Worker(location) => write!(f, "worker:{location}"),
        }
    }
}

/// Per-actor cache of resolved mailboxes
pub(crate) struct AddressBook {
    system: Arc<dyn ActorSystem>,
    cache: HashMap<Address, MailboxSender>,
}

impl AddressBook {
    pub(crate) fn new(system: Arc<dyn ActorSystem>) -> Self {
        Self {
            system,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn deliver(&mut self, from: &Address, to: &Address, message: Message) -> Result<()> {
        let envelope = Envelope::new(from.clone(), message);
        if let Some(mailbox) = self.cache.get(to) {
            return mailbox.send(envelope);
        }
        let mailbox = self
            .system
            .select(to)
            .ok_or_else(|| TraversalError::host(format!("no actor at {to}")))?;
        mailbox.send(envelope)?;
        self.cache.insert(to.clone(), mailbox);
        Ok(())
    }

    pub(crate) fn system(&self) -> &Arc<dyn ActorSystem> {
        &self.system
    }
}
