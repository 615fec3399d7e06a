use tracing_forest::ForestLayer;
use tracing_subscriber::{filter, prelude::*, EnvFilter};

pub trait HttpTracingExt: tracing::Subscriber {
    fn with_http_tracing(
        self,
        level: tracing::Level,
    ) -> tracing_subscriber::layer::Layered<filter::Targets, Self>
    where
        Self: Sized,
    {
        self.with(
            filter::Targets::new()
                .with_target("tower_http::trace::on_response", tracing::Level::DEBUG)
                .with_target("tower_http::trace::on_request", tracing::Level::DEBUG)
                .with_target("tower_sessions", tracing::Level::WARN)
                .with_default(level),
        )
    }
}

impl<S: tracing::Subscriber> HttpTracingExt for S {}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
///
/// An unrecognised `log_level` falls back to `info` and is reported once the
/// subscriber is up.
pub fn init(log_level: &str) {
    let parsed = parse_level(log_level);
    let registry = tracing_subscriber::registry().with(ForestLayer::default());

    match EnvFilter::try_from_default_env() {
        Ok(env_filter) => registry.with(env_filter).init(),
        Err(_) => registry
            .with_http_tracing(parsed.unwrap_or(tracing::Level::INFO))
            .init(),
    }

    if parsed.is_none() {
        tracing::warn!(log_level, "unrecognised log level, falling back to info");
    }
}

fn parse_level(log_level: &str) -> Option<tracing::Level> {
    log_level.trim().parse().ok()
}
