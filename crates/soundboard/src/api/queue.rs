//! Queue handlers.

use actix_web::{HttpResponse, Responder, delete, get, post, web};
use serde::{Deserialize, Serialize};

use soundboard_core::queue::Track;

use super::{ApiError, AppState, run_blocking};

#[derive(Deserialize)]
pub struct QueueAddBody {
    pub path: String,
}

#[derive(Serialize)]
pub struct QueueResponse {
    pub items: Vec<Track>,
}

#[get("/queue")]
pub async fn queue_list(state: web::Data<AppState>) -> impl Responder {
    let handle = state.coordinator.clone();
    match run_blocking(move || Ok(handle.snapshot()?.queue)).await {
        Ok(items) => HttpResponse::Ok().json(QueueResponse { items }),
        Err(err) => err.into_response(),
    }
}

/// Append a track; playback starts right away when idle.
#[post("/queue")]
pub async fn queue_add(state: web::Data<AppState>, body: web::Json<QueueAddBody>) -> impl Responder {
    let path = body.into_inner().path;
    if path.trim().is_empty() {
        return ApiError::BadRequest("path is required".to_string()).into_response();
    }
    let handle = state.coordinator.clone();
    let result = run_blocking(move || {
        handle.enqueue(Track::new(path))?;
        Ok(handle.snapshot()?.queue)
    })
    .await;
    match result {
        Ok(items) => HttpResponse::Ok().json(QueueResponse { items }),
        Err(err) => err.into_response(),
    }
}

/// Stop and clear everything pending.
#[delete("/queue")]
pub async fn queue_clear(state: web::Data<AppState>) -> impl Responder {
    let handle = state.coordinator.clone();
    match run_blocking(move || Ok(handle.stop()?)).await {
        Ok(_) => HttpResponse::Ok().json(QueueResponse { items: Vec::new() }),
        Err(err) => err.into_response(),
    }
}
