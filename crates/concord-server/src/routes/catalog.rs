use axum::extract::State;
use axum::Json;

use crate::route_table::RouteEntry;
use crate::state::AppState;

/// GET {base}/_routes: every callable path and how it is served.
pub async fn list_routes(State(app): State<AppState>) -> Json<Vec<RouteEntry>> {
    Json(app.routes.listing(app.engine.registry()))
}
