//! # System Constants
//!
//! Core constants that define defaults and well-known keys for the traversal
//! actor system. Configuration files and environment overrides fall back to
//! these values.

/// Actor system defaults
pub mod system {
    pub const DEFAULT_SYSTEM_NAME: &str = "traversal-actors";
    pub const DEFAULT_MASTER_LOCATION: &str = "master";
    pub const DEFAULT_WORKER_PREFIX: &str = "worker-";
    pub const DEFAULT_MAILBOX_BATCH_SIZE: usize = 64;

    /// Prefix for environment variable overrides (`TRAVERSAL_MAILBOX__BATCH_SIZE=8`)
    pub const ENV_PREFIX: &str = "TRAVERSAL";
    pub const ENV_NESTING_SEPARATOR: &str = "__";
}

/// Keys written by `ActorProgram::store_state`
pub mod state {
    pub const ACTOR_PROGRAM_KEY: &str = "traversal.actorProgram";
    pub const PIPELINE_KEY: &str = "traversal.pipeline";
}

/// Step identifiers with special meaning
pub mod steps {
    /// Step id carried by traversers that have left the pipeline
    pub const HALT: &str = "halt";
}

/// Partition defaults
pub mod partitions {
    pub const GLOBAL_PARTITION_ID: &str = "global";
    pub const DEFAULT_LOCATION: &str = "local";
}
