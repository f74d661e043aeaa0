use concord_core::Engine;
use std::sync::Arc;
use std::time::Duration;

use crate::requesting::Requesting;
use crate::route_table::RouteTable;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub requesting: Arc<Requesting>,
    pub routes: Arc<RouteTable>,
    pub response_timeout: Duration,
}

impl AppState {
    pub fn new(
        engine: Engine,
        requesting: Arc<Requesting>,
        routes: RouteTable,
        response_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            requesting,
            routes: Arc::new(routes),
            response_timeout,
        }
    }
}
