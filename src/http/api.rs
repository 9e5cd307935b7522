//! Source CRUD endpoints under `/api`

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::error::Error;
use crate::http::AppState;
use crate::registry::Source;

/// Body of add/update requests
#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub on_demand: bool,
    #[serde(default)]
    pub disable_audio: bool,
    #[serde(default)]
    pub debug: bool,
}

impl StreamRequest {
    fn into_source(self) -> Source {
        Source {
            name: self.name,
            url: self.url,
            status: false,
            on_demand: self.on_demand,
            disable_audio: self.disable_audio,
            debug: self.debug,
        }
    }
}

fn bad_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": "invalid request body"})),
    )
        .into_response()
}

/// `GET /api/streams`
pub async fn list_streams(State(state): State<AppState>) -> Response {
    Json(json!({ "streams": state.registry.snapshot_sources() })).into_response()
}

/// `POST /api/streams`. The stream id is the URL.
pub async fn add_stream(
    State(state): State<AppState>,
    payload: Result<Json<StreamRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return bad_request();
    };
    let id = req.url.clone();
    match state.registry.add(&id, req.into_source()) {
        Ok(()) => {}
        Err(Error::SourceExists(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({"error": "stream with this URL already exists"})),
            )
                .into_response();
        }
        Err(err) => {
            tracing::error!(stream = %id, error = %err, "add stream failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": err.to_string()})),
            )
                .into_response();
        }
    }
    // Persist failures are logged inside and never surfaced.
    state.config.persist(&state.registry);
    // Warm the new stream up so codecs are known by the first viewer.
    state.registry.ensure_started(&id);

    let source = state.registry.source(&id);
    let (name, status) = source
        .map(|s| (s.name, s.status))
        .unwrap_or_default();
    Json(json!({"id": id, "name": name, "url": id, "status": status})).into_response()
}

/// `PUT /api/stream/:uuid`
pub async fn update_stream(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    payload: Result<Json<StreamRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = payload else {
        return bad_request();
    };
    match state.registry.update(&uuid, req.into_source()) {
        Ok(new_id) => {
            state.config.persist(&state.registry);
            let source = state.registry.source(&new_id);
            let (name, status) = source
                .map(|s| (s.name, s.status))
                .unwrap_or_default();
            Json(json!({"id": new_id, "name": name, "url": new_id, "status": status}))
                .into_response()
        }
        Err(Error::SourceNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "stream not found"})),
        )
            .into_response(),
        Err(Error::SourceExists(_)) => (
            StatusCode::CONFLICT,
            Json(json!({"error": "stream with this URL already exists"})),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

/// `DELETE /api/stream/:uuid`. Attached sessions run to their own timeouts.
pub async fn delete_stream(State(state): State<AppState>, Path(uuid): Path<String>) -> Response {
    match state.registry.delete(&uuid) {
        Ok(()) => {
            state.config.persist(&state.registry);
            Json(json!({"message": "stream deleted"})).into_response()
        }
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "stream not found"})),
        )
            .into_response(),
    }
}
