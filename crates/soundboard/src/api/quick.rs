//! Quick sound handlers.

use actix_web::{HttpResponse, Responder, get, post, put, web};
use serde::{Deserialize, Serialize};

use soundboard_core::quick_sounds::QuickSlot;

use super::{ApiError, AppState, run_blocking};

#[derive(Deserialize)]
pub struct AssignBody {
    pub path: String,
}

#[derive(Serialize)]
pub struct QuickListResponse {
    pub slots: Vec<QuickSlot>,
}

#[get("/quick")]
pub async fn quick_list(state: web::Data<AppState>) -> impl Responder {
    let slots = state.quick_sounds().slots();
    HttpResponse::Ok().json(QuickListResponse { slots })
}

/// Interrupt playback with the clip assigned to `label`.
///
/// Unassigned labels answer 409 `missing_resource` so the client can prompt for a file.
#[post("/quick/{label}/play")]
pub async fn quick_play(state: web::Data<AppState>, label: web::Path<String>) -> impl Responder {
    let label = label.into_inner();
    let clip = match state.quick_sounds().resolve(&label) {
        Ok(clip) => clip,
        Err(missing) => {
            tracing::info!(label = %label, "quick sound not assigned");
            return ApiError::from(missing).into_response();
        }
    };
    tracing::info!(label = %label, clip = %clip, "quick sound request");
    let handle = state.coordinator.clone();
    match run_blocking(move || Ok(handle.trigger_interrupt(clip)?)).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => err.into_response(),
    }
}

/// Assign a clip to `label` and persist the mapping.
#[put("/quick/{label}")]
pub async fn quick_assign(
    state: web::Data<AppState>,
    label: web::Path<String>,
    body: web::Json<AssignBody>,
) -> impl Responder {
    let label = label.into_inner();
    let path = body.into_inner().path;
    if path.trim().is_empty() {
        return ApiError::BadRequest("path is required".to_string()).into_response();
    }
    let result = state.quick_sounds().assign(&label, path.trim());
    match result {
        Ok(()) => HttpResponse::Ok().json(QuickListResponse {
            slots: state.quick_sounds().slots(),
        }),
        Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => {
            ApiError::BadRequest(err.to_string()).into_response()
        }
        Err(err) => ApiError::Internal(format!("save quick sounds: {err}")).into_response(),
    }
}
