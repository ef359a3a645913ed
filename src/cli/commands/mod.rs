pub mod grants;
pub mod maintenance;
