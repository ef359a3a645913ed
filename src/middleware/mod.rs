pub mod client_ip;
pub mod guard;
pub mod response;

pub use client_ip::resolve_client_ip;
pub use guard::{guard_middleware, CallerIp, Guard, GuardChain};
pub use response::{ApiResponse, ApiResult};
