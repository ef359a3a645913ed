// handlers/public/mod.rs - Public handlers (no grant required)
//
// Security Level: None
// Middleware: /api/limit runs an empty guard chain so the caller IP is resolved

mod limit;
mod root;
mod test_connection;

pub use limit::limit_get;
pub use root::root;
pub use test_connection::test_connection;
