pub mod error;
pub mod requesting;
pub mod route_table;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::Router;
use concord_core::{ConceptRegistry, Config, Engine};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use requesting::Requesting;
use route_table::RouteTable;
use state::AppState;

/// Register `Requesting` and the application concepts, then build the engine
/// with every synchronization. Authoring errors surface here.
pub fn build_engine(config: &Config) -> anyhow::Result<(Engine, Arc<Requesting>)> {
    let requesting = Arc::new(Requesting::new());
    let mut registry = ConceptRegistry::new();
    registry.register(requesting.clone())?;
    concord_concepts::register_concepts(&mut registry, config)?;

    let engine = Engine::builder(registry)
        .config(config.engine.clone())
        .rules(concord_concepts::all_syncs(config))
        .build()?;
    Ok((engine, requesting))
}

/// Engine, route table and timeout for one server instance.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let (engine, requesting) = build_engine(config)?;
    Ok(AppState::new(
        engine,
        requesting,
        RouteTable::from_config(&config.routes),
        Duration::from_millis(config.server.response_timeout_ms),
    ))
}

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState, base_url: &str) -> Router {
    let base = base_url.trim_end_matches('/');

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(routes::health::health))
        .route(&format!("{base}/_routes"), get(routes::catalog::list_routes))
        .route(
            &format!("{base}/{{concept}}/{{operation}}"),
            get(routes::operations::call_operation).post(routes::operations::call_operation),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the concept server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let app_state = build_state(&config)?;
    app_state
        .routes
        .log_summary(app_state.engine.registry());
    tracing::info!(
        operations = app_state.engine.registry().paths().len(),
        syncs = app_state.engine.rules().len(),
        "engine ready"
    );

    let app = build_router(app_state, &config.server.base_url);
    let port = config.server.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!("concept server listening on http://localhost:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}
