//! Domain model: the entities the pipeline reads and writes.
//!
//! `Thread` owns its messages and its cumulative `ThreadState` document;
//! messages reference the thread by id only, so there is no circular
//! data. Dynamic/loosely-typed fields in the source system become
//! explicit tagged variants here (`RecommendationAction`, `Intent`, ...)
//! with absence represented as `Option`, never an implicit null.

mod audit;
mod message;
mod thread;
mod thread_state;

pub use audit::AuditLog;
pub use message::{Message, MessageSource, SenderType, Visibility};
pub use thread::{Thread, ThreadStatus};
pub use thread_state::{
    DuplicateHint, Intent, KnownEnvironment, Recommendation, RecommendationAction, Signals,
    ThreadState, WorkItemCandidate, WorkItemType,
};
