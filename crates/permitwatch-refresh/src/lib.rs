pub mod memory;
pub mod orchestrator;
pub mod store;

pub use memory::MemoryPermitStore;
pub use orchestrator::{RefreshError, RefreshOrchestrator, RefreshSummary, DEFAULT_BATCH_SIZE};
pub use store::{PermitStore, PgPermitStore, StoreError};
