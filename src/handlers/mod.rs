// handlers/mod.rs - Handler tiers
//
// Public (no checks) → Protected (active IP grant) → Elevated (admin allowlist).
// Guards are attached per route group in app.rs; handlers only read the
// resolved CallerIp from request extensions.

pub mod elevated;
pub mod protected;
pub mod public;
