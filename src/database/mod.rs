pub mod grants;
pub mod manager;
pub mod memory;
pub mod models;
pub mod records;

pub use grants::{GrantStore, PgGrantStore};
pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use records::{PgRecordStore, RecordStore};
