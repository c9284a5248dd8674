//! # Tokio Actor System
//!
//! Hosts actors as tokio tasks. Each actor owns an unbounded mailbox and
//! processes it serially in batches; a watch channel carries the shutdown
//! flag to every actor loop.
//!
//! ## Failure model
//!
//! The first error reported through [`ActorSystem::fail`] (a handler error, a
//! failed `pre_start` or a panicking actor) is recorded and terminates the
//! system. Errors observed after termination are ignored: once the job is
//! over, late sends into stopped mailboxes are expected.

use super::address::Address;
use super::mailbox::{MailboxFactory, MailboxReceiver, MailboxSender};
use super::messages::MessageClass;
use super::traits::{Actor, ActorSystem};
use crate::config::ActorsConfig;
use crate::error::{Result, TraversalError};
use crate::logging::log_error;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

#[derive(Debug)]
struct SystemInner {
    name: String,
    batch_size: usize,
    priorities_enabled: bool,
    registry: DashMap<Address, MailboxSender>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    failure: Mutex<Option<TraversalError>>,
}

impl SystemInner {
    fn is_terminated(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn terminate(&self) {
        if !self.shutdown.send_replace(true) {
            info!(system = %self.name, "🛑 ACTOR_SYSTEM: terminating");
        }
    }

    fn record(&self, error: TraversalError) {
        let mut slot = self.failure.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn fail(&self, error: TraversalError) {
        if self.is_terminated() {
            debug!(system = %self.name, error = %error, "Ignoring error reported after termination");
            return;
        }
        warn!(system = %self.name, category = error.category(), error = %error, "Actor system failing");
        self.record(error);
        self.terminate();
    }
}

/// Actor system backed by tokio tasks. Clones share the same system.
#[derive(Debug, Clone)]
pub struct TokioActorSystem {
    inner: Arc<SystemInner>,
}

impl TokioActorSystem {
    pub fn new(config: &ActorsConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(SystemInner {
                name: config.system_name.clone(),
                batch_size: config.mailbox.batch_size.max(1),
                priorities_enabled: config.mailbox.priorities_enabled,
                registry: DashMap::new(),
                tasks: Mutex::new(Vec::new()),
                shutdown,
                failure: Mutex::new(None),
            }),
        }
    }

    /// The recorded failure, if any
    pub fn failure(&self) -> Option<TraversalError> {
        self.inner.failure.lock().clone()
    }

    pub fn actor_count(&self) -> usize {
        self.inner.registry.len()
    }
}

#[async_trait]
impl ActorSystem for TokioActorSystem {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn spawn(&self, actor: Box<dyn Actor>) -> Result<()> {
        let address = actor.address().clone();
        let (sender, receiver) = MailboxFactory::mailbox();
        match self.inner.registry.entry(address.clone()) {
            Entry::Occupied(_) => {
                return Err(TraversalError::host(format!(
                    "duplicate actor address {address}"
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(sender);
            }
        }

        let priorities = if self.inner.priorities_enabled {
            actor.message_priorities()
        } else {
            None
        };
        let inner = Arc::clone(&self.inner);
        let span = tracing::info_span!("actor", system = %self.inner.name, address = %address);

        let handle = tokio::spawn(
            async move {
                let run = run_actor(actor, receiver, priorities, Arc::clone(&inner));
                if AssertUnwindSafe(run).catch_unwind().await.is_err() {
                    inner.fail(TraversalError::host(format!("actor {address} panicked")));
                }
            }
            .instrument(span),
        );
        self.inner.tasks.lock().push(handle);
        Ok(())
    }

    fn select(&self, address: &Address) -> Option<MailboxSender> {
        self.inner.registry.get(address).map(|entry| entry.value().clone())
    }

    fn terminate(&self) {
        self.inner.terminate();
    }

    fn fail(&self, error: TraversalError) {
        self.inner.fail(error);
    }

    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }

    async fn await_termination(&self) -> Result<()> {
        let mut shutdown = self.inner.shutdown.subscribe();
        while !*shutdown.borrow_and_update() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }

        // Actors may still be spawning while the first batch is joined.
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.tasks.lock());
            if handles.is_empty() {
                break;
            }
            for outcome in join_all(handles).await {
                if let Err(join_error) = outcome {
                    self.inner.record(TraversalError::host(format!(
                        "actor task failed to join: {join_error}"
                    )));
                }
            }
        }

        let failure = self.inner.failure.lock().clone();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

async fn run_actor(
    mut actor: Box<dyn Actor>,
    mut mailbox: MailboxReceiver,
    priorities: Option<Vec<MessageClass>>,
    inner: Arc<SystemInner>,
) {
    let mut shutdown = inner.shutdown.subscribe();

    if let Err(error) = actor.pre_start() {
        log_error("actor", "pre_start", &error.to_string(), Some(&actor.address().to_string()));
        inner.fail(error);
        actor.post_stop();
        return;
    }
    debug!("Actor started");

    'mailbox: loop {
        if *shutdown.borrow() {
            break;
        }
        let batch = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            batch = mailbox.next_batch(inner.batch_size, priorities.as_deref()) => batch,
        };
        let Some(batch) = batch else {
            break;
        };

        for envelope in batch {
            if inner.is_terminated() {
                break 'mailbox;
            }
            if let Err(error) = actor.receive(envelope) {
                log_error("actor", "receive", &error.to_string(), Some(&actor.address().to_string()));
                inner.fail(error);
                break 'mailbox;
            }
        }
    }

    actor.post_stop();
    debug!("Actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::messages::{Envelope, Message};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts envelopes and terminates the system after `limit`
    struct CountingActor {
        address: Address,
        system: TokioActorSystem,
        seen: Arc<AtomicUsize>,
        limit: usize,
    }

    impl Actor for CountingActor {
        fn address(&self) -> &Address {
            &self.address
        }

        fn receive(&mut self, _envelope: Envelope) -> Result<()> {
            if self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.limit {
                self.system.terminate();
            }
            Ok(())
        }
    }

    struct FailingActor {
        address: Address,
    }

    impl Actor for FailingActor {
        fn address(&self) -> &Address {
            &self.address
        }

        fn receive(&mut self, envelope: Envelope) -> Result<()> {
            Err(TraversalError::protocol(
                self.address.to_string(),
                envelope.message.class().to_string(),
            ))
        }
    }

    fn system() -> TokioActorSystem {
        TokioActorSystem::new(&ActorsConfig::default())
    }

    #[tokio::test]
    async fn test_clean_termination() {
        let system = system();
        let seen = Arc::new(AtomicUsize::new(0));
        let address = Address::worker("counter");
        system
            .spawn(Box::new(CountingActor {
                address: address.clone(),
                system: system.clone(),
                seen: Arc::clone(&seen),
                limit: 3,
            }))
            .unwrap();

        let mailbox = system.select(&address).unwrap();
        for _ in 0..3 {
            mailbox
                .send(Envelope::new(Address::master("test"), Message::Start))
                .unwrap();
        }

        tokio_test::assert_ok!(system.await_termination().await);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert!(system.is_terminated());
    }

    #[tokio::test]
    async fn test_first_error_is_reported() {
        let system = system();
        let address = Address::worker("failing");
        system
            .spawn(Box::new(FailingActor {
                address: address.clone(),
            }))
            .unwrap();
        system
            .select(&address)
            .unwrap()
            .send(Envelope::new(Address::master("test"), Message::Start))
            .unwrap();

        let result = system.await_termination().await;
        assert!(matches!(result, Err(TraversalError::Protocol { .. })));
        assert!(system.failure().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_addresses_rejected() {
        let system = system();
        let address = Address::worker("twin");
        system
            .spawn(Box::new(FailingActor {
                address: address.clone(),
            }))
            .unwrap();
        let duplicate = system.spawn(Box::new(FailingActor { address }));
        assert!(matches!(duplicate, Err(TraversalError::Host(_))));
        assert_eq!(system.actor_count(), 1);

        system.terminate();
        tokio_test::assert_ok!(system.await_termination().await);
    }

    #[tokio::test]
    async fn test_errors_after_termination_are_ignored() {
        let system = system();
        system.terminate();
        system.fail(TraversalError::host("late"));
        assert!(system.failure().is_none());
        tokio_test::assert_ok!(system.await_termination().await);
    }
}
