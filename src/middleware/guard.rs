use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::client_ip::resolve_client_ip;

/// Resolved caller IP, injected by [`guard_middleware`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIp(pub String);

/// One access check applied to a route group
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Guard {
    /// Caller IP must be on the configured admin allowlist
    AdminAllowlist,
    /// Caller IP must hold at least one unexpired grant
    ActiveGrant,
    /// Caller IP must have allowance left (read only, nothing is consumed)
    QuotaAvailable,
}

impl Guard {
    pub async fn check(&self, state: &AppState, ip: &str, now: DateTime<Utc>) -> Result<(), ApiError> {
        match self {
            Guard::AdminAllowlist => {
                if state.config.security.admin_ips.iter().any(|admin| admin == ip) {
                    Ok(())
                } else {
                    tracing::warn!("Admin access denied for {}", ip);
                    Err(ApiError::unauthorized("Access denied: IP is not an administrator"))
                }
            }
            Guard::ActiveGrant => match state.grants.find_active(ip, now).await? {
                Some(_) => Ok(()),
                None => {
                    tracing::warn!("Access denied for {}: no active grant", ip);
                    Err(ApiError::unauthorized("Access denied: IP not authorized or access expired"))
                }
            },
            Guard::QuotaAvailable => {
                if state.ledger().remaining(ip, now).await? > 0 {
                    Ok(())
                } else {
                    tracing::info!("Quota exhausted for {}", ip);
                    Err(ApiError::quota_exceeded("Query limit reached for this IP"))
                }
            }
        }
    }
}

/// Ordered guard list for one route group, used as middleware state
#[derive(Clone)]
pub struct GuardChain {
    state: AppState,
    guards: Arc<[Guard]>,
}

impl GuardChain {
    pub fn new(state: AppState, guards: impl Into<Arc<[Guard]>>) -> Self {
        Self {
            state,
            guards: guards.into(),
        }
    }
}

/// Resolve the caller IP, run every guard in order and stop at the first denial
pub async fn guard_middleware(
    State(chain): State<GuardChain>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let ip = resolve_client_ip(
        request.headers(),
        peer,
        &chain.state.config.security.client_ip_headers,
    );

    let now = Utc::now();
    for guard in chain.guards.iter() {
        guard.check(&chain.state, &ip, now).await?;
    }

    request.extensions_mut().insert(CallerIp(ip));
    Ok(next.run(request).await)
}
