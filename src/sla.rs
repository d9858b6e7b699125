//! Service-level timing between consecutive distinct statuses.
//!
//! [`record_transition`] must run inside the caller's transaction, after the
//! application row has been locked, so the "latest status" it reads cannot
//! move underneath it before the new status event is written.

use chrono::NaiveDateTime;
use diesel::{prelude::*, PgConnection};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::ApplicationStatus;
use crate::ledger;
use crate::models::{NewSlaTransition, SlaTransition, StatusEvent};
use crate::schema::{application_sla, credit_applications};

const MILLIS_PER_MINUTE: i64 = 60_000;

#[derive(Debug, Error)]
pub enum SlaError {
    #[error(
        "negative SLA duration for {from} -> {to}: started {start}, ended {end}"
    )]
    NegativeDuration {
        from: ApplicationStatus,
        to: ApplicationStatus,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("SLA duration of {minutes} minutes does not fit the stored range")]
    DurationOverflow { minutes: i64 },
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// A transition that should be persisted, before it has an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransition {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub duration_minutes: i32,
}

/// Whole minutes between `start` and `end`, rounded down.
pub fn elapsed_minutes(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_MINUTE)
}

pub fn transition_note(from: ApplicationStatus, to: ApplicationStatus) -> String {
    format!("Status changed from {from} to {to}")
}

/// Decides whether moving to `new_status` at `now` yields an SLA point.
///
/// No latest event means this is the first status, and re-asserting the
/// current status is a no-op; both return `Ok(None)`.
pub fn plan_transition(
    latest: Option<&StatusEvent>,
    new_status: ApplicationStatus,
    now: NaiveDateTime,
) -> Result<Option<PlannedTransition>, SlaError> {
    let Some(latest) = latest else {
        return Ok(None);
    };

    if latest.status == new_status {
        return Ok(None);
    }

    let minutes = elapsed_minutes(latest.created_at, now);
    if minutes < 0 {
        return Err(SlaError::NegativeDuration {
            from: latest.status,
            to: new_status,
            start: latest.created_at,
            end: now,
        });
    }
    let duration_minutes =
        i32::try_from(minutes).map_err(|_| SlaError::DurationOverflow { minutes })?;

    Ok(Some(PlannedTransition {
        from: latest.status,
        to: new_status,
        start_time: latest.created_at,
        end_time: now,
        duration_minutes,
    }))
}

pub fn record_transition(
    conn: &mut PgConnection,
    application_id: Uuid,
    new_status: ApplicationStatus,
    now: NaiveDateTime,
) -> Result<Option<SlaTransition>, SlaError> {
    let latest = ledger::latest_status(conn, application_id)?;
    let Some(planned) = plan_transition(latest.as_ref(), new_status, now)? else {
        return Ok(None);
    };

    let row = NewSlaTransition {
        id: Uuid::new_v4(),
        application_id,
        from_status: planned.from,
        to_status: planned.to,
        start_time: planned.start_time,
        end_time: planned.end_time,
        duration_minutes: planned.duration_minutes,
        note: Some(transition_note(planned.from, planned.to)),
    };

    let stored: SlaTransition = diesel::insert_into(application_sla::table)
        .values(&row)
        .get_result(conn)?;

    tracing::info!(
        application_id = %application_id,
        from = %stored.from_status,
        to = %stored.to_status,
        duration_minutes = stored.duration_minutes,
        "recorded SLA transition"
    );

    Ok(Some(stored))
}

#[derive(Debug, Clone)]
pub struct SlaSummary {
    pub transitions: Vec<SlaTransition>,
    pub total_minutes: i64,
    pub total_hours: String,
    pub total_days: String,
}

pub fn summarize(transitions: Vec<SlaTransition>) -> SlaSummary {
    let total_minutes: i64 = transitions
        .iter()
        .map(|transition| i64::from(transition.duration_minutes))
        .sum();

    SlaSummary {
        total_hours: format!("{:.2}", total_minutes as f64 / 60.0),
        total_days: format!("{:.2}", total_minutes as f64 / 1_440.0),
        total_minutes,
        transitions,
    }
}

/// Oldest-first SLA history for one application with its totals.
pub fn summarize_by_application(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> Result<SlaSummary, SlaError> {
    let transitions: Vec<SlaTransition> = application_sla::table
        .filter(application_sla::application_id.eq(application_id))
        .order((
            application_sla::end_time.asc(),
            application_sla::start_time.asc(),
            application_sla::created_at.asc(),
        ))
        .load(conn)?;
    Ok(summarize(transitions))
}

/// Newest-first feed across all applications, paired with display codes.
pub fn list_all(conn: &mut PgConnection) -> Result<Vec<(SlaTransition, String)>, SlaError> {
    let rows = application_sla::table
        .inner_join(credit_applications::table)
        .order((application_sla::end_time.desc(), application_sla::start_time.desc()))
        .select((
            application_sla::all_columns,
            credit_applications::display_code,
        ))
        .load::<(SlaTransition, String)>(conn)?;
    Ok(rows)
}
