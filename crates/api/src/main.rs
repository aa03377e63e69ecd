use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syncsphere_api::background::LockSweeper;
use syncsphere_api::collab::OwnershipManager;
use syncsphere_api::config::ServerConfig;
use syncsphere_api::state::AppState;
use syncsphere_api::{routes, ws};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let pool = connect_database().await;

    // Live connections, one registry for both façades.
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // Domain events: bus plus the task that makes them durable.
    let event_bus = Arc::new(syncsphere_events::EventBus::default());
    let persistence_handle = tokio::spawn(syncsphere_events::EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));

    let ownership = Arc::new(OwnershipManager::new(pool.clone(), Arc::clone(&event_bus)));

    // Stale-lock sweeper: one pass at startup for locks stranded by a
    // previous process lifetime, then on a timer.
    let sweep_cancel = tokio_util::sync::CancellationToken::new();
    let sweeper = LockSweeper::new(
        Arc::clone(&ownership),
        Arc::clone(&ws_manager),
        config.lock_max_age_secs,
        config.lock_sweep_interval_secs,
    );
    let sweep_handle = tokio::spawn({
        let cancel = sweep_cancel.clone();
        async move { sweeper.run(cancel).await }
    });
    tracing::info!("Background services started (event persistence, lock sweeper)");

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
        ownership: Arc::clone(&ownership),
    };
    let app = build_app(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections, cleaning up");

    // Sweeper first. Locks it would have reclaimed simply age until the
    // next process lifetime sweeps them at startup.
    sweep_cancel.cancel();
    let _ = tokio::time::timeout(shutdown_timeout, sweep_handle).await;
    tracing::info!("Lock sweeper stopped");

    // Closing the bus lets event persistence drain its backlog and exit.
    drop(event_bus);
    let _ = tokio::time::timeout(shutdown_timeout, persistence_handle).await;
    tracing::info!("Event persistence shut down");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;
    heartbeat_handle.abort();

    tracing::info!("Graceful shutdown complete");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncsphere_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect, verify reachability, and apply embedded migrations.
///
/// Each step panics on failure: there is nothing useful this server can do
/// without its database.
async fn connect_database() -> syncsphere_db::DbPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = syncsphere_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");

    syncsphere_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    syncsphere_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database pool ready, migrations applied");
    pool
}

/// Assemble the router: health at the root, everything else under
/// `/api/v1`, wrapped in the middleware stack (layers apply bottom-up).
fn build_app(state: AppState, config: &ServerConfig) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// CORS from the configured origin list.
///
/// An unparseable origin panics at startup rather than silently allowing
/// nothing.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Resolve on SIGINT or SIGTERM, whichever lands first, so the server
/// drains cleanly under both an interactive Ctrl-C and a process manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
