// handlers/protected/mod.rs - Customer handlers
//
// Security Level: caller IP must hold an unexpired grant (Guard::ActiveGrant)
// Route Prefix: /api

pub mod records;
