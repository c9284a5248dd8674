#![allow(clippy::doc_markdown)] // Allow technical terms like TinkerPop, Safra in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Traversal Actors
//!
//! Actor-based coordination core for running graph traversals over a
//! partitioned graph.
//!
//! ## Overview
//!
//! A traversal compiles into a linear pipeline of push-based steps. One
//! **master** actor and one **worker** actor per graph partition each hold
//! their own copy of that pipeline. Workers process traversers over the
//! elements they own and forward everything else: traversers over remote
//! elements go to the owning worker, halted traversers and plain data go to
//! the master.
//!
//! ## Architecture
//!
//! - **Barriers**: steps that must see every input before emitting (`count`,
//!   `order`, `range`, `aggregate`, ...). Workers stage their contributions and
//!   ship them to the master, which fuses and drains them.
//! - **Side effects**: keyed accumulators. Workers log deltas and ship them to
//!   the master; the master pushes merged values back before releasing a local
//!   barrier.
//! - **Termination vote**: a token ring over the workers, with message
//!   counting, tells the master when no work is in flight. Each quiescent
//!   round drains the pending barriers; a quiescent round with none left ends
//!   the job.
//! - **Ordering**: once an order-global step drains, the master stamps
//!   traversers with a counter so that later range and tail steps and the
//!   final result keep that order across workers.
//!
//! ## Module Organization
//!
//! - [`structure`] - In-memory property graph and partitioners
//! - [`process`] - Traversers, steps, pipelines, side effects and the traversal builder
//! - [`actors`] - Addresses, messages, mailboxes and the tokio actor system
//! - [`program`] - The traversal actor program and its termination vote
//! - [`graph_actors`] - Job submission API
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use traversal_actors::config::ActorsConfig;
//! use traversal_actors::process::Traversal;
//! use traversal_actors::structure::{MemoryGraph, MemoryPartitioner};
//! use traversal_actors::GraphActors;
//!
//! # async fn example() -> traversal_actors::Result<()> {
//! traversal_actors::logging::init_structured_logging();
//!
//! let graph = Arc::new(MemoryGraph::modern());
//! let partitioner = Arc::new(MemoryPartitioner::hashed(Arc::clone(&graph), 2)?);
//! let result = GraphActors::new(ActorsConfig::default())
//!     .partitioner(partitioner)
//!     .submit(Traversal::v([1]).out(["knows"]).values(["name"]).bind(graph))
//!     .await?;
//!
//! for traverser in &result.traversers {
//!     println!("{traverser}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod actors;
pub mod config;
pub mod constants;
pub mod error;
pub mod graph_actors;
pub mod logging;
pub mod process;
pub mod program;
pub mod structure;

pub use actors::{ActorProgram, ActorSystem, Address, Message, TokioActorSystem};
pub use config::{ActorsConfig, ConfigManager};
pub use error::{Result, TraversalError};
pub use graph_actors::{GraphActors, JobHandle, JobResult};
pub use process::{Traversal, Traverser, TraverserSet};
pub use program::{ResultSink, TraversalActorProgram};
pub use structure::{MemoryGraph, MemoryPartitioner, Partitioner};
