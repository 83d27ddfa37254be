//! HTTP control API.
//!
//! Thin actix handlers over the coordinator handle and the quick sound store.

pub mod health;
pub mod playback;
pub mod queue;
pub mod quick;
pub mod streams;

use std::sync::{Mutex, MutexGuard};

use actix_web::{HttpResponse, web};
use serde::Serialize;

use soundboard_core::coordinator::CoordinatorHandle;
use soundboard_core::error::{ConnectionError, CoordinatorError, MissingResource};
use soundboard_core::events::EventBus;
use soundboard_core::quick_sounds::QuickSoundStore;

/// Shared state for all handlers.
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub events: EventBus,
    pub quick_sounds: Mutex<QuickSoundStore>,
    /// Channel used by `POST /connect`.
    pub channel: String,
}

impl AppState {
    pub fn new(
        coordinator: CoordinatorHandle,
        events: EventBus,
        quick_sounds: QuickSoundStore,
        channel: String,
    ) -> Self {
        Self {
            coordinator,
            events,
            quick_sounds: Mutex::new(quick_sounds),
            channel,
        }
    }

    pub(crate) fn quick_sounds(&self) -> MutexGuard<'_, QuickSoundStore> {
        self.quick_sounds.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Register every route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(playback::status)
        .service(playback::connect)
        .service(playback::disconnect)
        .service(playback::pause)
        .service(playback::resume)
        .service(playback::stop)
        .service(playback::skip)
        .service(playback::volume)
        .service(queue::queue_list)
        .service(queue::queue_add)
        .service(queue::queue_clear)
        .service(quick::quick_list)
        .service(quick::quick_play)
        .service(quick::quick_assign)
        .service(streams::events_stream);
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

/// Errors returned by API handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    Coordinator(CoordinatorError),
    MissingResource(MissingResource),
    BadRequest(String),
    Internal(String),
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        ApiError::Coordinator(err)
    }
}

impl From<MissingResource> for ApiError {
    fn from(err: MissingResource) -> Self {
        ApiError::MissingResource(err)
    }
}

impl ApiError {
    /// Convert an API error into an HTTP response.
    pub(crate) fn into_response(self) -> HttpResponse {
        let message = self.to_string();
        match self {
            ApiError::Coordinator(CoordinatorError::Connection(err)) => {
                let code = match err {
                    ConnectionError::NotConnected => "not_connected",
                    ConnectionError::AlreadyConnected => "already_connected",
                    ConnectionError::ChannelNotFound { .. } => "channel_not_found",
                    ConnectionError::Unavailable { .. } => "output_unavailable",
                };
                let body = ErrorBody {
                    error: code,
                    message,
                    label: None,
                };
                match err {
                    ConnectionError::ChannelNotFound { .. } => HttpResponse::NotFound().json(body),
                    ConnectionError::Unavailable { .. } => {
                        HttpResponse::ServiceUnavailable().json(body)
                    }
                    _ => HttpResponse::Conflict().json(body),
                }
            }
            ApiError::Coordinator(CoordinatorError::Offline) => {
                HttpResponse::InternalServerError().json(ErrorBody {
                    error: "coordinator_offline",
                    message,
                    label: None,
                })
            }
            ApiError::MissingResource(missing) => HttpResponse::Conflict().json(ErrorBody {
                error: "missing_resource",
                message,
                label: Some(missing.label),
            }),
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(ErrorBody {
                error: "bad_request",
                message,
                label: None,
            }),
            ApiError::Internal(_) => HttpResponse::InternalServerError().json(ErrorBody {
                error: "internal",
                message,
                label: None,
            }),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Coordinator(err) => err.fmt(f),
            ApiError::MissingResource(err) => err.fmt(f),
            ApiError::BadRequest(msg) | ApiError::Internal(msg) => f.write_str(msg),
        }
    }
}

/// Run a blocking coordinator call off the async executor.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}
