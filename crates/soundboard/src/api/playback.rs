//! Connection, transport and volume handlers.

use actix_web::{HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};

use soundboard_core::state::PlaybackState;

use super::{ApiError, AppState, run_blocking};

#[derive(Serialize)]
pub struct StateResponse {
    pub state: PlaybackState,
}

/// Volume update; omitted fields are left unchanged.
#[derive(Deserialize)]
pub struct VolumeBody {
    pub primary: Option<f32>,
    pub interrupt: Option<f32>,
}

fn state_response(result: Result<PlaybackState, ApiError>) -> HttpResponse {
    match result {
        Ok(state) => HttpResponse::Ok().json(StateResponse { state }),
        Err(err) => err.into_response(),
    }
}

/// Current coordinator snapshot.
#[get("/status")]
pub async fn status(state: web::Data<AppState>) -> impl Responder {
    let handle = state.coordinator.clone();
    match run_blocking(move || Ok(handle.snapshot()?)).await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(err) => err.into_response(),
    }
}

#[post("/connect")]
pub async fn connect(state: web::Data<AppState>) -> impl Responder {
    let handle = state.coordinator.clone();
    let channel = state.channel.clone();
    tracing::info!(channel = %channel, "connect request");
    let result = run_blocking(move || {
        handle.connect(&channel)?;
        Ok(handle.snapshot()?.state)
    })
    .await;
    state_response(result)
}

#[post("/disconnect")]
pub async fn disconnect(state: web::Data<AppState>) -> impl Responder {
    let handle = state.coordinator.clone();
    let result = run_blocking(move || {
        handle.disconnect()?;
        Ok(PlaybackState::Disconnected)
    })
    .await;
    state_response(result)
}

#[post("/pause")]
pub async fn pause(state: web::Data<AppState>) -> impl Responder {
    let handle = state.coordinator.clone();
    state_response(run_blocking(move || Ok(handle.pause()?)).await)
}

#[post("/resume")]
pub async fn resume(state: web::Data<AppState>) -> impl Responder {
    let handle = state.coordinator.clone();
    state_response(run_blocking(move || Ok(handle.resume()?)).await)
}

/// Stop playback and clear the queue.
#[post("/stop")]
pub async fn stop(state: web::Data<AppState>) -> impl Responder {
    let handle = state.coordinator.clone();
    state_response(run_blocking(move || Ok(handle.stop()?)).await)
}

#[post("/skip")]
pub async fn skip(state: web::Data<AppState>) -> impl Responder {
    let handle = state.coordinator.clone();
    state_response(run_blocking(move || Ok(handle.skip()?)).await)
}

/// Set primary and/or interrupt gain; returns the stored settings.
#[post("/volume")]
pub async fn volume(state: web::Data<AppState>, body: web::Json<VolumeBody>) -> impl Responder {
    let handle = state.coordinator.clone();
    let body = body.into_inner();
    let result = run_blocking(move || {
        if let Some(gain) = body.primary {
            handle.set_primary_gain(gain)?;
        }
        if let Some(gain) = body.interrupt {
            handle.set_interrupt_gain(gain)?;
        }
        Ok(handle.snapshot()?.volume)
    })
    .await;
    match result {
        Ok(settings) => HttpResponse::Ok().json(settings),
        Err(err) => err.into_response(),
    }
}
