use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::statuses::StatusEventResponse;
use crate::{
    applications::{self as store, ApplicationChanges, NewApplicationInput},
    auth::AuthenticatedUser,
    domain::{ApplicationStatus, CollateralType, LoanType},
    error::AppResult,
    ledger,
    models::CreditApplication,
    policy,
    response::{message_only, to_iso, ApiJson, ApiResponse},
    schema::application_status,
    state::AppState,
};

#[derive(Deserialize)]
pub struct CreateApplicationRequest {
    pub national_id: String,
    pub full_name: String,
    pub address: String,
    pub birth_place: String,
    pub birth_date: NaiveDate,
    pub loan_type: String,
    pub collateral_type: String,
    pub ceiling_amount: BigDecimal,
}

#[derive(Deserialize, Default)]
pub struct UpdateApplicationRequest {
    pub national_id: Option<String>,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub birth_place: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub loan_type: Option<String>,
    pub collateral_type: Option<String>,
    pub ceiling_amount: Option<BigDecimal>,
}

impl UpdateApplicationRequest {
    fn into_changes(self) -> AppResult<ApplicationChanges> {
        Ok(ApplicationChanges {
            national_id: self.national_id,
            full_name: self.full_name,
            address: self.address,
            birth_place: self.birth_place,
            birth_date: self.birth_date,
            loan_type: self
                .loan_type
                .as_deref()
                .map(str::parse::<LoanType>)
                .transpose()?,
            collateral_type: self
                .collateral_type
                .as_deref()
                .map(str::parse::<CollateralType>)
                .transpose()?,
            ceiling_amount: self.ceiling_amount,
        })
    }
}

#[derive(Serialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub display_code: String,
    pub national_id: String,
    pub full_name: String,
    pub address: String,
    pub birth_place: String,
    pub birth_date: NaiveDate,
    pub email: String,
    pub loan_type: LoanType,
    pub collateral_type: CollateralType,
    pub ceiling_amount: BigDecimal,
    pub user_id: Uuid,
    pub current_status: Option<ApplicationStatus>,
    pub created_at: String,
    pub updated_at: String,
}

impl ApplicationResponse {
    fn new(application: CreditApplication, current_status: Option<ApplicationStatus>) -> Self {
        Self {
            id: application.id,
            display_code: application.display_code,
            national_id: application.national_id,
            full_name: application.full_name,
            address: application.address,
            birth_place: application.birth_place,
            birth_date: application.birth_date,
            email: application.email,
            loan_type: application.loan_type,
            collateral_type: application.collateral_type,
            ceiling_amount: application.ceiling_amount,
            user_id: application.user_id,
            current_status,
            created_at: to_iso(application.created_at),
            updated_at: to_iso(application.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub statuses: Vec<StatusEventResponse>,
}

#[derive(Serialize)]
pub struct CreatedApplicationResponse {
    pub application: ApplicationResponse,
    pub status: StatusEventResponse,
}

/// Latest status per application in one query, for list views.
fn current_statuses(
    conn: &mut PgConnection,
    applications: &[CreditApplication],
) -> AppResult<HashMap<Uuid, ApplicationStatus>> {
    let ids: Vec<Uuid> = applications.iter().map(|application| application.id).collect();
    let rows: Vec<(Uuid, ApplicationStatus)> = application_status::table
        .filter(application_status::application_id.eq_any(ids))
        .order((
            application_status::application_id.asc(),
            application_status::created_at.desc(),
            application_status::seq.desc(),
        ))
        .select((application_status::application_id, application_status::status))
        .load(conn)?;

    let mut latest = HashMap::with_capacity(applications.len());
    for (application_id, status) in rows {
        latest.entry(application_id).or_insert(status);
    }
    Ok(latest)
}

fn with_current_statuses(
    conn: &mut PgConnection,
    applications: Vec<CreditApplication>,
) -> AppResult<Vec<ApplicationResponse>> {
    let statuses = current_statuses(conn, &applications)?;
    Ok(applications
        .into_iter()
        .map(|application| {
            let current = statuses.get(&application.id).copied();
            ApplicationResponse::new(application, current)
        })
        .collect())
}

pub async fn list_applications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<ApplicationResponse>>>> {
    policy::ensure_admin(&user, "list all applications")?;
    let mut conn = state.db()?;
    let applications = store::list_applications(&mut conn)?;
    let response = with_current_statuses(&mut conn, applications)?;
    Ok(ApiResponse::ok("applications retrieved", response))
}

pub async fn list_my_applications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<ApplicationResponse>>>> {
    let mut conn = state.db()?;
    let applications = store::list_applications_for_owner(&mut conn, user.user_id)?;
    let response = with_current_statuses(&mut conn, applications)?;
    Ok(ApiResponse::ok("applications retrieved", response))
}

pub async fn create_application(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<CreateApplicationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedApplicationResponse>>)> {
    let input = NewApplicationInput {
        national_id: payload.national_id,
        full_name: payload.full_name,
        address: payload.address,
        birth_place: payload.birth_place,
        birth_date: payload.birth_date,
        loan_type: payload.loan_type.parse()?,
        collateral_type: payload.collateral_type.parse()?,
        ceiling_amount: payload.ceiling_amount,
    };

    let mut conn = state.db()?;
    let created = store::create_application(
        &mut conn,
        &state.display_codes,
        state.clock.as_ref(),
        user.user_id,
        &user.email,
        input,
    )?;

    let status = created.initial_status.status;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            "credit application submitted",
            CreatedApplicationResponse {
                application: ApplicationResponse::new(created.application, Some(status)),
                status: StatusEventResponse::from(created.initial_status),
            },
        ),
    ))
}

pub async fn get_application(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<ApplicationDetail>>> {
    let mut conn = state.db()?;
    let application = store::resolve_application(&mut conn, &identifier)?;
    policy::ensure_can_view(&user, &application)?;

    let history = ledger::list_by_application(&mut conn, application.id)?;
    let current = history.first().map(|event| event.status);

    Ok(ApiResponse::ok(
        "application retrieved",
        ApplicationDetail {
            application: ApplicationResponse::new(application, current),
            statuses: history.into_iter().map(StatusEventResponse::from).collect(),
        },
    ))
}

pub async fn update_application(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<UpdateApplicationRequest>,
) -> AppResult<Json<ApiResponse<ApplicationResponse>>> {
    let changes = payload.into_changes()?;

    let mut conn = state.db()?;
    let application = store::resolve_application(&mut conn, &identifier)?;
    policy::ensure_can_modify(&user, &application)?;

    let updated =
        store::update_application(&mut conn, application.id, changes, state.clock.as_ref())?;
    let current = ledger::latest_status(&mut conn, updated.id)?.map(|event| event.status);

    Ok(ApiResponse::ok(
        "application updated",
        ApplicationResponse::new(updated, current),
    ))
}

pub async fn delete_application(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<()>>> {
    let mut conn = state.db()?;
    let application = store::resolve_application(&mut conn, &identifier)?;
    policy::ensure_can_modify(&user, &application)?;

    let deleted = store::delete_application(&mut conn, application.id)?;
    Ok(message_only(format!(
        "application {} deleted",
        deleted.display_code
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_normalizes_enum_input() {
        let request = UpdateApplicationRequest {
            loan_type: Some("productive credit".to_string()),
            collateral_type: Some("vehicle-title".to_string()),
            ..Default::default()
        };
        let changes = request.into_changes().unwrap();
        assert_eq!(changes.loan_type, Some(LoanType::ProductiveCredit));
        assert_eq!(changes.collateral_type, Some(CollateralType::VehicleTitle));
    }

    #[test]
    fn update_request_rejects_unknown_loan_type() {
        let request = UpdateApplicationRequest {
            loan_type: Some("CAR".to_string()),
            ..Default::default()
        };
        let err = request.into_changes().unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
