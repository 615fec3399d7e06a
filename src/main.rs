mod auth;
mod config;
mod db;
mod error;
mod helpers;
mod middleware;
mod models;
mod routes;
mod schema;
mod services;

use tracing::*;

use config::AppCfg;
use services::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppCfg::load()?;

    config::tracing::init(&cfg.log_level);

    let store = match cfg.db.url.as_deref() {
        Some(url) => {
            if cfg.db.run_migrations {
                db::run_migrations(url).await?;
            }
            Store::postgres(db::build_pool(url, &cfg.db)?)
        }
        None => {
            warn!("no database url configured, using the in-memory store");
            Store::in_memory()
        }
    };

    let app = routes::app(store, &cfg.session, &cfg.cors);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    info!("starting listening at {}", cfg.listen_addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(%e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
