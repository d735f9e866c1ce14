mod api;
mod error;
mod maintenance;
mod memory;
mod paths;
mod redb_store;

pub use api::*;
pub use error::*;
pub use memory::MemoryScopeStore;
pub use paths::default_durable_path;
pub use redb_store::RedbScopeStore;
