//! HTTP adapter
//!
//! Thin axum surface over the registry and the session orchestrator. Two
//! route families:
//!
//! - `/api/...`: source CRUD, persisted to the config file
//! - `/stream/...`: viewer-facing info, codec and SDP negotiation endpoints
//!
//! Handlers never hold registry state across a response; panics are confined
//! to the request by the catch-panic layer.

pub mod api;
pub mod stream;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ConfigStore;
use crate::error::Result;
use crate::registry::StreamRegistry;
use crate::webrtc::MuxerFactory;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StreamRegistry>,
    pub muxers: Arc<dyn MuxerFactory>,
    pub config: Arc<ConfigStore>,
}

/// Build the full route table
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/streams", get(api::list_streams).post(api::add_stream))
        .route(
            "/api/stream/:uuid",
            put(api::update_stream).delete(api::delete_stream),
        )
        .route("/stream/info/:uuid", get(stream::stream_info))
        .route("/stream/codec/:uuid", get(stream::stream_codec))
        .route("/stream/receiver/:uuid", post(stream::stream_receiver))
        .route("/stream", post(stream::stream_anonymous))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CatchPanicLayer::new())
}

/// Bind and serve until the process ends
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
