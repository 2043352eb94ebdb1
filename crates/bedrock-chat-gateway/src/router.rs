use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::dispatch::{InboundEnvelope, OutboundEnvelope};
use crate::state::SharedState;

/// Build the HTTP router. `/` mirrors `/chat` for proxy-style deployments.
///
/// Chat bodies are taken as raw bytes with no size limit so that every
/// request, however malformed, gets its answer from the dispatcher.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat).options(chat))
        .route("/", post(chat).options(chat))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn chat(State(state): State<SharedState>, method: Method, body: Bytes) -> Response {
    let body = match String::from_utf8(body.to_vec()) {
        Ok(text) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(_) => {
            warn!("discarding chat body that is not valid UTF-8");
            None
        }
    };
    let envelope = InboundEnvelope::new(method.as_str(), body);
    state.dispatcher.handle(envelope).await.into_response()
}

impl IntoResponse for OutboundEnvelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        headers.remove(CONTENT_TYPE);
        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("dropping invalid response header {}", name),
            }
        }
        response
    }
}
