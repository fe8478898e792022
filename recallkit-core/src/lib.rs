pub mod blob;
pub mod config;
pub mod errors;
pub mod filters;
pub mod ids;
pub mod models;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use blob::memory::MemoryBlobStore;
pub use blob::BlobStore;
pub use config::*;
pub use errors::*;
pub use filters::*;
pub use ids::*;
pub use models::*;
pub use scheduler::fsrs::{FsrsParams, FsrsScheduler, FsrsState};
pub use scheduler::{Scheduler, SchedulingInfo, SchedulingOutcomes};
pub use stats::*;
pub use store::IndexStore;
