//! Quiz Duel Back binary entrypoint wiring the duel engine, REST, SSE and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_duel_back::{
    config::DuelConfig,
    dao::{duel_store::memory::InMemoryDuelStore, questions::QuestionBank},
    routes,
    services::{cleanup, sse_gateway::SseGateway},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = DuelConfig::load();
    let questions = QuestionBank::load(&config.questions_path);
    info!(questions = questions.len(), "question bank ready");

    let sse_gateway = SseGateway::new();
    let app_state = AppState::new(config, Arc::new(sse_gateway.clone()), Arc::new(questions));

    let cleanup_task = tokio::spawn(cleanup::run(app_state.clone()));
    app_state.track_supervisor(cleanup_task).await;
    start_storage(&app_state).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone(), sse_gateway);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    app_state.shutdown().await;
    info!("duel engine stopped");
    Ok(())
}

/// Supervise MongoDB when `MONGO_URI` is set, otherwise keep results in memory.
#[cfg(feature = "mongo-store")]
async fn start_storage(state: &SharedState) {
    use quiz_duel_back::{
        dao::{
            duel_store::{
                DuelStore,
                mongodb::{MongoConfig, MongoDuelStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let Ok(uri) = env::var("MONGO_URI") else {
        install_memory_store(state).await;
        return;
    };
    let db_name = env::var("MONGO_DB").ok();

    let supervisor = tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
            let store = MongoDuelStore::connect(config).await?;
            Ok::<Arc<dyn DuelStore>, StorageError>(Arc::new(store))
        }
    }));
    state.track_supervisor(supervisor).await;
    info!("MongoDB duel store supervisor started");
}

#[cfg(not(feature = "mongo-store"))]
async fn start_storage(state: &SharedState) {
    install_memory_store(state).await;
}

async fn install_memory_store(state: &SharedState) {
    state
        .install_duel_store(Arc::new(InMemoryDuelStore::new()))
        .await;
    info!("using the in-memory duel store");
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState, sse_gateway: SseGateway) -> Router<()> {
    routes::router(state, sse_gateway)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
