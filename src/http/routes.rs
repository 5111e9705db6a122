//! Normal request handling for everything the proxy hook passes through.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;

use crate::lifecycle::fatal;
use crate::store::ConfigStore;

/// Body of `POST /config`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConfig {
    pub contents: String,
    #[serde(default)]
    pub is_temporary: bool,
}

pub fn build_router(store: Arc<ConfigStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config", get(load_config).post(save_config))
        .route("/config/events", get(config_events))
        .with_state(store)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn load_config(State(store): State<Arc<ConfigStore>>) -> Response {
    match store.load().await {
        Some(contents) => contents.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn save_config(
    State(store): State<Arc<ConfigStore>>,
    Json(request): Json<SaveConfig>,
) -> StatusCode {
    if let Err(e) = store.save(&request.contents, request.is_temporary).await {
        fatal(&e);
    }
    store.publish(request.contents);
    StatusCode::NO_CONTENT
}

async fn config_events(
    State(store): State<Arc<ConfigStore>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let changes = stream::unfold(store.subscribe(), |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(change) => match Event::default().event("config-changed").json_data(&change) {
                    Ok(event) => return Some((Ok(event), rx)),
                    Err(e) => tracing::warn!(error = %e, "Dropping unencodable config event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Config event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(changes).keep_alive(KeepAlive::default())
}
