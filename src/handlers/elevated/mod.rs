// handlers/elevated/mod.rs - Administrative handlers
//
// Security Level: caller IP must be on the admin allowlist (Guard::AdminAllowlist)
// Route Prefix: /api/auth-ips

pub mod auth_ips;
