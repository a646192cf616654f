mod blob;
mod config;
mod db;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use crate::store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let store: Arc<dyn Store> = match &config.database_url {
        Some(database_url) => {
            let pool = db::init_pool(database_url, config.db_max_connections)
                .await
                .expect("database init failed");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let blobs = blob::from_config(&config.blob);

    let port = config.port;
    let state = state::AppState::new(store, blobs, config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "civicwatch listening");
    axum::serve(listener, app).await.expect("server failed");
}
