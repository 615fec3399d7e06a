use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

pub trait CorsExt<S> {
    fn with_cors(self, allowed_origins: &[String]) -> Router<S>;
}

impl<S> CorsExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Add credentialed CORS for the configured origins. No origins, no layer.
    fn with_cors(self, allowed_origins: &[String]) -> Router<S> {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(origin = %o, %e, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        if origins.is_empty() {
            return self;
        }

        // session cookies need credentials, which rule out wildcards
        let cors_layer = CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true);

        self.layer(cors_layer)
    }
}
