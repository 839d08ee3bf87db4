//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{AgentSummary, ErrorResponse, UiPrefs},
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::list_agents, handlers::get_prefs, handlers::put_prefs),
    components(schemas(AgentSummary, UiPrefs, ErrorResponse)),
    tags(
        (name = "Interview API", description = "Realtime voice interview session orchestrator")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/agents", get(handlers::list_agents))
        .route(
            "/prefs",
            get(handlers::get_prefs).put(handlers::put_prefs),
        )
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    // Merge the stateful routes with the stateless Swagger UI.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
