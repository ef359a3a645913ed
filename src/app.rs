use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, QuotaMode, SecurityConfig};
use crate::database::{GrantStore, RecordStore};
use crate::handlers::{elevated, protected, public};
use crate::middleware::{guard_middleware, Guard, GuardChain};
use crate::services::{BenefitProvider, QuotaLedger, RecordWriter};

/// Shared handles built once by the entry point and injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub grants: Arc<dyn GrantStore>,
    pub records: Arc<dyn RecordStore>,
    pub provider: Arc<dyn BenefitProvider>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        grants: Arc<dyn GrantStore>,
        records: Arc<dyn RecordStore>,
        provider: Arc<dyn BenefitProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            grants,
            records,
            provider,
        }
    }

    pub fn ledger(&self) -> QuotaLedger {
        QuotaLedger::new(self.grants.clone())
    }

    pub fn writer(&self) -> RecordWriter {
        RecordWriter::new(self.records.clone(), self.provider.clone(), self.config.records.policy)
    }
}

/// Build the full HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/test", get(public::test_connection))
        .merge(caller_routes(&state))
        // Customer API (active grant required)
        .merge(insert_routes(&state))
        .merge(record_routes(&state))
        // Admin API (allowlisted IPs only)
        .merge(admin_routes(&state))
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.security)),
        )
        .with_state(state)
}

/// Attach an ordered guard list to every route of `routes`
fn guarded(routes: Router<AppState>, state: &AppState, guards: Vec<Guard>) -> Router<AppState> {
    let chain = GuardChain::new(state.clone(), guards);
    routes.route_layer(middleware::from_fn_with_state(chain, guard_middleware))
}

fn caller_routes(state: &AppState) -> Router<AppState> {
    // No checks, the chain only resolves the caller IP
    guarded(
        Router::new().route("/api/limit", get(public::limit_get)),
        state,
        Vec::new(),
    )
}

fn insert_routes(state: &AppState) -> Router<AppState> {
    let guards = match state.config.quota.mode {
        QuotaMode::PreWrite => vec![Guard::ActiveGrant],
        QuotaMode::PostWrite => vec![Guard::ActiveGrant, Guard::QuotaAvailable],
    };
    guarded(
        Router::new().route("/api/insert", post(protected::records::insert_post)),
        state,
        guards,
    )
}

fn record_routes(state: &AppState) -> Router<AppState> {
    use protected::records;

    guarded(
        Router::new()
            .route("/api/delete", delete(records::delete_by_file))
            .route("/api/download", get(records::download_get))
            .route("/api/query-inss", post(records::query_inss_post)),
        state,
        vec![Guard::ActiveGrant],
    )
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    use elevated::auth_ips;

    guarded(
        Router::new()
            .route("/api/auth-ips", get(auth_ips::list_get).post(auth_ips::create_post))
            .route("/api/auth-ips/:id", put(auth_ips::update_put).delete(auth_ips::delete_by_id)),
        state,
        vec![Guard::AdminAllowlist],
    )
}

/// Permissive when no origins are configured, otherwise an explicit allowlist
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-ip"),
        ])
}
