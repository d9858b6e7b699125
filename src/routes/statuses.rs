use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sla::SlaTransitionResponse;
use crate::{
    applications as store,
    auth::AuthenticatedUser,
    domain::ApplicationStatus,
    error::AppResult,
    ledger,
    models::StatusEvent,
    policy,
    response::{message_only, to_iso, ApiJson, ApiResponse},
    state::AppState,
};

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
    pub note: String,
}

#[derive(Serialize)]
pub struct StatusEventResponse {
    pub id: Uuid,
    pub application_id: Uuid,
    pub status: ApplicationStatus,
    pub note: String,
    pub changed_by: Uuid,
    pub created_at: String,
}

impl From<StatusEvent> for StatusEventResponse {
    fn from(event: StatusEvent) -> Self {
        Self {
            id: event.id,
            application_id: event.application_id,
            status: event.status,
            note: event.note,
            changed_by: event.changed_by,
            created_at: to_iso(event.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct StatusFeedEntry {
    #[serde(flatten)]
    pub event: StatusEventResponse,
    pub display_code: String,
}

#[derive(Serialize)]
pub struct StatusChangeResponse {
    pub status: StatusEventResponse,
    pub sla: Option<SlaTransitionResponse>,
}

pub async fn list_application_statuses(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<StatusEventResponse>>>> {
    let mut conn = state.db()?;
    let application = store::resolve_application(&mut conn, &identifier)?;
    policy::ensure_can_view(&user, &application)?;

    let history = ledger::list_by_application(&mut conn, application.id)?;
    Ok(ApiResponse::ok(
        "status history retrieved",
        history.into_iter().map(StatusEventResponse::from).collect(),
    ))
}

pub async fn create_status(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<StatusRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<StatusChangeResponse>>)> {
    policy::ensure_can_write_status(&user)?;
    let status: ApplicationStatus = payload.status.parse()?;

    let mut conn = state.db()?;
    let application = store::resolve_application(&mut conn, &identifier)?;

    let outcome = ledger::append_status(
        &mut conn,
        application.id,
        status,
        &payload.note,
        user.user_id,
        state.clock.as_ref(),
    )?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            "status recorded",
            StatusChangeResponse {
                status: StatusEventResponse::from(outcome.event),
                sla: outcome.sla.map(SlaTransitionResponse::from),
            },
        ),
    ))
}

pub async fn list_statuses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<StatusFeedEntry>>>> {
    policy::ensure_admin(&user, "list all statuses")?;
    let mut conn = state.db()?;
    let feed = ledger::list_all(&mut conn)?
        .into_iter()
        .map(|(event, display_code)| StatusFeedEntry {
            event: StatusEventResponse::from(event),
            display_code,
        })
        .collect();
    Ok(ApiResponse::ok("statuses retrieved", feed))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(status_id): Path<Uuid>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<StatusRequest>,
) -> AppResult<Json<ApiResponse<StatusEventResponse>>> {
    policy::ensure_can_write_status(&user)?;
    let status: ApplicationStatus = payload.status.parse()?;

    let mut conn = state.db()?;
    let updated = ledger::update_status(&mut conn, status_id, status, &payload.note, user.user_id)?;
    Ok(ApiResponse::ok(
        "status updated",
        StatusEventResponse::from(updated),
    ))
}

pub async fn delete_status(
    State(state): State<AppState>,
    Path(status_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<()>>> {
    policy::ensure_can_write_status(&user)?;
    let mut conn = state.db()?;
    ledger::delete_status(&mut conn, status_id)?;
    Ok(message_only("status deleted"))
}
