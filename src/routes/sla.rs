use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    applications as store,
    auth::AuthenticatedUser,
    domain::ApplicationStatus,
    error::AppResult,
    models::SlaTransition,
    policy,
    response::{to_iso, ApiResponse},
    sla::{self, SlaSummary},
    state::AppState,
};

#[derive(Serialize)]
pub struct SlaTransitionResponse {
    pub id: Uuid,
    pub application_id: Uuid,
    pub from_status: ApplicationStatus,
    pub to_status: ApplicationStatus,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: i32,
    pub note: Option<String>,
}

impl From<SlaTransition> for SlaTransitionResponse {
    fn from(transition: SlaTransition) -> Self {
        Self {
            id: transition.id,
            application_id: transition.application_id,
            from_status: transition.from_status,
            to_status: transition.to_status,
            start_time: to_iso(transition.start_time),
            end_time: to_iso(transition.end_time),
            duration_minutes: transition.duration_minutes,
            note: transition.note,
        }
    }
}

#[derive(Serialize)]
pub struct SlaSummaryResponse {
    pub application_id: Uuid,
    pub display_code: String,
    pub transitions: Vec<SlaTransitionResponse>,
    pub total_minutes: i64,
    pub total_hours: String,
    pub total_days: String,
}

impl SlaSummaryResponse {
    fn new(application_id: Uuid, display_code: String, summary: SlaSummary) -> Self {
        Self {
            application_id,
            display_code,
            transitions: summary
                .transitions
                .into_iter()
                .map(SlaTransitionResponse::from)
                .collect(),
            total_minutes: summary.total_minutes,
            total_hours: summary.total_hours,
            total_days: summary.total_days,
        }
    }
}

#[derive(Serialize)]
pub struct SlaFeedEntry {
    #[serde(flatten)]
    pub transition: SlaTransitionResponse,
    pub display_code: String,
}

pub async fn application_sla(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<SlaSummaryResponse>>> {
    let mut conn = state.db()?;
    let application = store::resolve_application(&mut conn, &identifier)?;
    policy::ensure_can_view(&user, &application)?;

    let summary = sla::summarize_by_application(&mut conn, application.id)?;
    Ok(ApiResponse::ok(
        "SLA summary retrieved",
        SlaSummaryResponse::new(application.id, application.display_code, summary),
    ))
}

pub async fn list_sla(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<SlaFeedEntry>>>> {
    policy::ensure_admin(&user, "view the SLA feed")?;
    let mut conn = state.db()?;
    let feed = sla::list_all(&mut conn)?
        .into_iter()
        .map(|(transition, display_code)| SlaFeedEntry {
            transition: SlaTransitionResponse::from(transition),
            display_code,
        })
        .collect();
    Ok(ApiResponse::ok("SLA feed retrieved", feed))
}
