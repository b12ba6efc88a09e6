use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use hhm_core::error::ControlError;
use hhm_core::manager::{EndpointCounters, HintedHandoffManager};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
pub struct ErrorBody {
    error: String,
}

fn control_error_response(err: ControlError) -> (StatusCode, Json<ErrorBody>) {
    let status = match err {
        ControlError::UnknownTarget(_) | ControlError::HintNotFound { .. } => StatusCode::NOT_FOUND,
        ControlError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

pub async fn list_pending(
    State(manager): State<HintedHandoffManager>,
) -> Result<Json<Vec<Uuid>>, (StatusCode, Json<ErrorBody>)> {
    manager
        .list_pending_targets()
        .await
        .map(Json)
        .map_err(control_error_response)
}

#[derive(Deserialize)]
pub struct SetPausedBody {
    paused: bool,
}

#[derive(Serialize)]
pub struct PausedBody {
    paused: bool,
}

pub async fn set_paused(
    State(manager): State<HintedHandoffManager>,
    Json(body): Json<SetPausedBody>,
) -> Json<PausedBody> {
    if body.paused {
        manager.pause();
    } else {
        manager.resume();
    }
    Json(PausedBody {
        paused: manager.is_paused(),
    })
}

pub async fn purge(
    State(manager): State<HintedHandoffManager>,
    Path(target_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    manager
        .purge(target_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(control_error_response)
}

pub async fn truncate(
    State(manager): State<HintedHandoffManager>,
) -> Result<StatusCode, (StatusCode, Json<ErrorBody>)> {
    manager
        .truncate_all()
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(control_error_response)
}

#[derive(Serialize)]
pub struct ScheduleBody {
    scheduled: bool,
}

pub async fn schedule(
    State(manager): State<HintedHandoffManager>,
    Path(target_id): Path<Uuid>,
) -> Json<ScheduleBody> {
    let scheduled = manager.schedule_now(target_id);
    Json(ScheduleBody { scheduled })
}

pub async fn counters(
    State(manager): State<HintedHandoffManager>,
    Path(target_id): Path<Uuid>,
) -> Json<EndpointCounters> {
    Json(manager.counters_for(target_id))
}
