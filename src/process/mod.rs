//! # Traversal Processing
//!
//! Everything a single actor needs to run its share of a traversal:
//! traversers, side effects, the step and barrier contracts, the reference
//! step library and the traversal builder that compiles into a pipeline.

pub mod side_effects;
pub mod step;
pub mod steps;
pub mod traversal;
pub mod traverser;

pub use side_effects::{Reducer, SideEffects};
pub use step::{Barrier, BarrierContents, BarrierKind, PipelineFactory, Step, StepPipeline};
pub use steps::SortDirection;
pub use traversal::{BoundTraversal, Key, StepSpec, Traversal};
pub use traverser::{StepId, Traverser, TraverserSet};
