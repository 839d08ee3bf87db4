//! Axum Handlers for the REST API
//!
//! The REST surface is deliberately small: the agent roster for the
//! pre-connect screen and the persisted UI preferences. Everything
//! session-scoped happens over the WebSocket. Handlers carry `utoipa` doc
//! comments for the generated OpenAPI documentation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::{
    models::{AgentSummary, ErrorResponse, UiPrefs},
    state::AppState,
};

pub enum ApiError {
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// List the interview phases and their handoff links.
#[utoipa::path(
    get,
    path = "/agents",
    responses(
        (status = 200, description = "The agent roster", body = [AgentSummary])
    )
)]
pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<AgentSummary>> {
    let agents = state
        .roster
        .agents()
        .iter()
        .map(|agent| AgentSummary {
            id: agent.id.clone(),
            public_description: agent.public_description.clone(),
            downstream_agent_ids: agent.downstream_agent_ids.clone(),
        })
        .collect();
    Json(agents)
}

/// Get the persisted UI preferences.
#[utoipa::path(
    get,
    path = "/prefs",
    responses(
        (status = 200, description = "Current UI preferences", body = UiPrefs)
    )
)]
pub async fn get_prefs(State(state): State<Arc<AppState>>) -> Json<UiPrefs> {
    Json(state.prefs.load().await)
}

/// Replace the persisted UI preferences.
#[utoipa::path(
    put,
    path = "/prefs",
    request_body = UiPrefs,
    responses(
        (status = 204, description = "Preferences stored"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn put_prefs(
    State(state): State<Arc<AppState>>,
    Json(prefs): Json<UiPrefs>,
) -> Result<impl IntoResponse, ApiError> {
    state.prefs.save(&prefs).await?;
    Ok(StatusCode::NO_CONTENT)
}
