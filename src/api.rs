//! HTTP routes: live aggregate, history slices, MJPEG feeds and chat.

use crate::advisory::AdvisoryService;
use crate::history::Slot;
use crate::service::TrafficService;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::time::{self, MissedTickBehavior};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{debug, warn};

pub const EMPTY_MESSAGE_REPLY: &str = "Please say something!";
pub const MALFORMED_REQUEST_REPLY: &str = "Sorry, I couldn't read that request. Please send JSON like {\"message\": \"...\"}.";

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<TrafficService>,
    pub advisory: Arc<AdvisoryService>,
    pub stream_poll: Duration,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/data", get(get_data))
        .route("/api/history", get(get_history))
        .route("/api/chat", post(chat))
        .route("/video_feed/:camera_id", get(video_feed))
        .fallback_service(ServeDir::new("web"))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn get_data(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.service.snapshot().await)
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    slot: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

async fn get_history(State(state): State<ApiState>, Query(params): Query<HistoryParams>) -> Response {
    let slot = match params.slot.as_deref().unwrap_or("morning").parse::<Slot>() {
        Ok(slot) => slot,
        Err(e) => {
            debug!(error = %e, "Rejected history slot");
            return Json(ErrorBody { error: e.to_string() }).into_response();
        }
    };
    Json(state.service.history(slot).await).into_response()
}

// ===== Chat =====

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

async fn chat(State(state): State<ApiState>, body: Bytes) -> Json<ChatResponse> {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Malformed chat payload");
            return Json(ChatResponse {
                response: MALFORMED_REQUEST_REPLY.to_string(),
            });
        }
    };

    let message = request.message.unwrap_or_default();
    if message.trim().is_empty() {
        return Json(ChatResponse {
            response: EMPTY_MESSAGE_REPLY.to_string(),
        });
    }

    let snapshot = state.service.snapshot().await;
    let response = state.advisory.answer(&message, &snapshot).await;
    Json(ChatResponse { response })
}

// ===== Video =====

/// One part of a `multipart/x-mixed-replace; boundary=frame` stream.
pub fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let mut part = BytesMut::with_capacity(jpeg.len() + 48);
    part.put_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// Emits the latest frame for `camera_id` every `poll`, skipping polls
/// where no frame has been produced yet. Ends when the client goes away.
pub fn frame_stream(
    service: Arc<TrafficService>,
    camera_id: String,
    poll: Duration,
) -> impl futures::Stream<Item = Result<Bytes, Infallible>> {
    let mut ticker = time::interval(poll.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    futures::stream::unfold((service, camera_id, ticker), |(service, camera_id, mut ticker)| async move {
        loop {
            ticker.tick().await;
            if let Some(frame) = service.latest_frame(&camera_id).await {
                let part = mjpeg_part(&frame);
                return Some((Ok(part), (service, camera_id, ticker)));
            }
        }
    })
}

async fn video_feed(State(state): State<ApiState>, Path(camera_id): Path<String>) -> Response {
    debug!(camera = %camera_id, "Video feed client connected");
    let stream = frame_stream(state.service.clone(), camera_id, state.stream_poll);
    (
        [(CONTENT_TYPE, "multipart/x-mixed-replace; boundary=frame")],
        Body::from_stream(stream),
    )
        .into_response()
}
