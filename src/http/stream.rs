//! Viewer-facing endpoints under `/stream`
//!
//! The negotiation endpoints accept form-POSTed SDP offers: the per-stream
//! receiver takes the offer in `data` and answers as plain text, while the
//! anonymous endpoint takes `url` + `sdp64`, registers the URL on the fly
//! (deduplicated by normalized URL) and answers as JSON.

use axum::extract::{Form, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::error::Error;
use crate::http::AppState;
use crate::registry::Source;
use crate::session;

/// Track entry in codec listings and anonymous responses
#[derive(Debug, Serialize)]
struct TrackView {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// `GET /stream/info/:uuid`
pub async fn stream_info(State(state): State<AppState>, Path(uuid): Path<String>) -> Response {
    match state.registry.source(&uuid) {
        Some(source) => Json(json!({
            "uuid": uuid,
            "url": source.url,
            "onDemand": source.on_demand,
            "status": source.status,
        }))
        .into_response(),
        None => (StatusCode::NOT_FOUND, "Stream not found").into_response(),
    }
}

/// `GET /stream/codec/:uuid`
///
/// Starts the stream when needed and holds the request on the codec gate.
/// Tracks WebRTC cannot carry are omitted from the listing.
pub async fn stream_codec(State(state): State<AppState>, Path(uuid): Path<String>) -> Response {
    if !state.registry.exists(&uuid) {
        return (StatusCode::NOT_FOUND, "Stream not found").into_response();
    }
    state.registry.ensure_started(&uuid);
    let Some(codecs) = state.registry.wait_for_codecs(&uuid).await else {
        tracing::warn!(stream = %uuid, "no codecs for codec request");
        return (StatusCode::INTERNAL_SERVER_ERROR, "No codecs found").into_response();
    };

    let tracks: Vec<TrackView> = codecs
        .iter()
        .filter(|codec| {
            if codec.is_webrtc_supported() {
                true
            } else {
                tracing::debug!(stream = %uuid, codec = ?codec, "codec not supported over WebRTC, omitting track");
                false
            }
        })
        .map(|codec| TrackView {
            kind: if codec.is_video() { "video" } else { "audio" },
        })
        .collect();
    Json(tracks).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ReceiverForm {
    /// SDP offer, usually base64-encoded
    pub data: String,
}

/// `POST /stream/receiver/:uuid`: SDP exchange, answer as plain text
pub async fn stream_receiver(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Form(form): Form<ReceiverForm>,
) -> Response {
    let opts = state.config.server.muxer_options();
    match session::negotiate(&state.registry, &state.muxers, opts, &uuid, &form.data).await {
        Ok(answer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            answer,
        )
            .into_response(),
        Err(Error::SourceNotFound(_)) => {
            (StatusCode::NOT_FOUND, "Stream Not Found").into_response()
        }
        Err(Error::CodecNotReady(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Stream Codec Not Found").into_response()
        }
        Err(err) => {
            tracing::warn!(stream = %uuid, error = %err, "negotiation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("WriteHeader Error: {err}"),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnonymousForm {
    pub url: String,
    pub sdp64: String,
}

/// `POST /stream`: negotiate against a camera URL directly.
///
/// The URL is registered as an on-demand source when unknown; repeated posts
/// of equivalent URLs (same stream after normalization) reuse the existing
/// entry. Nothing is persisted for these ad-hoc sources.
pub async fn stream_anonymous(
    State(state): State<AppState>,
    Form(form): Form<AnonymousForm>,
) -> Response {
    let normalized = normalize_rtsp_url(&form.url);
    let id = match find_by_normalized_url(&state, &normalized) {
        Some(existing) => {
            tracing::debug!(stream = %existing, url = %form.url, "reusing stream for url");
            existing
        }
        None => {
            let source = Source::new(form.url.clone())
                .name(form.url.clone())
                .on_demand(true);
            if let Err(err) = state.registry.add(&normalized, source) {
                // Lost a race with a concurrent insert; use the entry.
                tracing::debug!(stream = %normalized, error = %err, "anonymous add raced");
            }
            normalized
        }
    };

    let opts = state.config.server.muxer_options();
    match session::negotiate(&state.registry, &state.muxers, opts, &id, &form.sdp64).await {
        Ok(answer) => {
            let tracks: Vec<TrackView> = state
                .registry
                .codecs(&id)
                .unwrap_or_default()
                .iter()
                .filter(|codec| codec.is_webrtc_supported())
                .map(|codec| TrackView {
                    kind: if codec.is_video() { "video" } else { "audio" },
                })
                .collect();
            Json(json!({"tracks": tracks, "sdp64": answer})).into_response()
        }
        Err(Error::CodecNotReady(_)) => {
            let detail = state
                .registry
                .last_error(&id)
                .map(|e| e.to_string())
                .unwrap_or_else(|| "stream codec not found".to_string());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": detail})),
            )
                .into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": err.to_string()})),
        )
            .into_response(),
    }
}

/// Canonical form of an RTSP URL for dedup: lowercase scheme, no trailing
/// slash, query parameters sorted. Unparseable input is returned unchanged.
pub(crate) fn normalize_rtsp_url(input: &str) -> String {
    let Ok(mut parsed) = Url::parse(input) else {
        return input.to_string();
    };
    let trimmed = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&trimmed);

    if parsed.query().is_some() {
        let mut pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();
        parsed.set_query(None);
        parsed.query_pairs_mut().extend_pairs(pairs);
    }
    parsed.to_string()
}

fn find_by_normalized_url(state: &AppState, normalized: &str) -> Option<String> {
    state
        .registry
        .snapshot_sources()
        .into_iter()
        .find(|(_, source)| normalize_rtsp_url(&source.url) == normalized)
        .map(|(id, _)| id)
}
