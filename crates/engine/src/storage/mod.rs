//! Storage abstractions for the execution core

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::{ExecutionStore, SlaStore, Storage, TaskStore, WorkflowStore};
