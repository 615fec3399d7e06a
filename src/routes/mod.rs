pub mod admin;
pub mod auth;
pub mod relations;
pub mod tuits;
pub mod users;

use axum::http::{header, HeaderValue};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::config::{CorsCfg, SessionCfg};
use crate::middleware::cors::CorsExt;
use crate::middleware::logging::HttpLoggingExt;
use crate::services::Store;

pub fn api() -> Router<Store> {
    Router::new()
        .merge(users::router())
        .merge(admin::router())
        .merge(auth::router())
        .merge(tuits::router())
        .merge(relations::router())
}

/// The whole HTTP application: `/api` routes, sessions, CORS and request logging.
pub fn app(store: Store, session: &SessionCfg, cors: &CorsCfg) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(session.secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            session.expiry_minutes,
        )));

    Router::new()
        .nest("/api", api())
        .with_state(store)
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store"),
                ))
                .layer(CompressionLayer::new()),
        )
        .layer(session_layer)
        .with_cors(&cors.allowed_origins)
        .with_http_logging()
}
