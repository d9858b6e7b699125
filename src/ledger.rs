//! Time-ordered status history per credit application.
//!
//! The newest event defines the current status. Every application keeps at
//! least one event. SLA rows are append-only: deleting or correcting an
//! event never rewrites SLA history that was derived from it.

use chrono::NaiveDateTime;
use diesel::{dsl::count_star, prelude::*, PgConnection};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::ApplicationStatus;
use crate::models::{NewStatusEvent, SlaTransition, StatusEvent};
use crate::schema::{application_status, credit_applications};
use crate::sla::{self, SlaError};

pub const MAX_NOTE_LENGTH: usize = 255;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    PreconditionFailed(String),
    #[error(transparent)]
    Sla(#[from] SlaError),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// What a status change produced: the new event and, when the status
/// actually moved, the SLA point derived from it.
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub event: StatusEvent,
    pub sla: Option<SlaTransition>,
}

pub fn normalize_note(note: &str) -> LedgerResult<String> {
    let trimmed = note.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidArgument(
            "note must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NOTE_LENGTH {
        return Err(LedgerError::InvalidArgument(format!(
            "note must be at most {MAX_NOTE_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Appends a status in its own transaction, locking the application row so
/// concurrent transitions on the same application serialize.
///
/// The timestamp is taken from `clock` only once the lock is held, so a writer
/// that waited behind another one measures from the event it just committed.
pub fn append_status(
    conn: &mut PgConnection,
    application_id: Uuid,
    new_status: ApplicationStatus,
    note: &str,
    acting_user: Uuid,
    clock: &dyn Clock,
) -> LedgerResult<AppendOutcome> {
    let note = normalize_note(note)?;

    conn.transaction::<AppendOutcome, LedgerError, _>(|conn| {
        lock_application(conn, application_id)?;
        let now = clock.now();
        append_locked(conn, application_id, new_status, &note, acting_user, now)
    })
}

/// Appends a status inside a transaction that already holds the application lock.
///
/// The SLA point is computed from the latest event first; the new event is
/// stamped with the same `now`, so both rows agree on the transition time.
pub(crate) fn append_locked(
    conn: &mut PgConnection,
    application_id: Uuid,
    new_status: ApplicationStatus,
    note: &str,
    acting_user: Uuid,
    now: NaiveDateTime,
) -> LedgerResult<AppendOutcome> {
    let sla = sla::record_transition(conn, application_id, new_status, now)?;

    let new_event = NewStatusEvent {
        id: Uuid::new_v4(),
        application_id,
        status: new_status,
        note: note.to_string(),
        changed_by: acting_user,
        created_at: now,
    };

    let event: StatusEvent = diesel::insert_into(application_status::table)
        .values(&new_event)
        .get_result(conn)?;

    tracing::info!(
        application_id = %application_id,
        status_id = %event.id,
        status = %event.status,
        changed_by = %acting_user,
        sla_recorded = sla.is_some(),
        "appended application status"
    );

    Ok(AppendOutcome { event, sla })
}

pub(crate) fn lock_application(conn: &mut PgConnection, application_id: Uuid) -> LedgerResult<()> {
    credit_applications::table
        .find(application_id)
        .select(credit_applications::id)
        .for_update()
        .first::<Uuid>(conn)
        .optional()?
        .ok_or(LedgerError::NotFound("application"))?;
    Ok(())
}

pub fn latest_status(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> Result<Option<StatusEvent>, diesel::result::Error> {
    application_status::table
        .filter(application_status::application_id.eq(application_id))
        .order((
            application_status::created_at.desc(),
            application_status::seq.desc(),
        ))
        .first::<StatusEvent>(conn)
        .optional()
}

/// Most recent first.
pub fn list_by_application(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> Result<Vec<StatusEvent>, diesel::result::Error> {
    application_status::table
        .filter(application_status::application_id.eq(application_id))
        .order((
            application_status::created_at.desc(),
            application_status::seq.desc(),
        ))
        .load(conn)
}

pub fn find_status(conn: &mut PgConnection, status_id: Uuid) -> LedgerResult<StatusEvent> {
    application_status::table
        .find(status_id)
        .first::<StatusEvent>(conn)
        .optional()?
        .ok_or(LedgerError::NotFound("status"))
}

/// Administrative correction of an event's status and note. SLA rows are left untouched.
pub fn update_status(
    conn: &mut PgConnection,
    status_id: Uuid,
    status: ApplicationStatus,
    note: &str,
    acting_user: Uuid,
) -> LedgerResult<StatusEvent> {
    let note = normalize_note(note)?;

    conn.transaction::<StatusEvent, LedgerError, _>(|conn| {
        let existing = find_status(conn, status_id)?;
        lock_application(conn, existing.application_id)?;

        let updated: StatusEvent = diesel::update(application_status::table.find(status_id))
            .set((
                application_status::status.eq(status),
                application_status::note.eq(&note),
                application_status::changed_by.eq(acting_user),
            ))
            .get_result(conn)?;

        tracing::info!(
            application_id = %updated.application_id,
            status_id = %status_id,
            previous = %existing.status,
            status = %updated.status,
            changed_by = %acting_user,
            "corrected application status"
        );

        Ok(updated)
    })
}

/// Removes an event. The application's first event and its last remaining
/// one are never removed.
pub fn delete_status(conn: &mut PgConnection, status_id: Uuid) -> LedgerResult<StatusEvent> {
    conn.transaction::<StatusEvent, LedgerError, _>(|conn| {
        let existing = find_status(conn, status_id)?;
        lock_application(conn, existing.application_id)?;

        let remaining: i64 = application_status::table
            .filter(application_status::application_id.eq(existing.application_id))
            .select(count_star())
            .first(conn)?;
        if remaining <= 1 {
            return Err(LedgerError::PreconditionFailed(
                "cannot delete the only status of an application".to_string(),
            ));
        }

        let first_id: Uuid = application_status::table
            .filter(application_status::application_id.eq(existing.application_id))
            .order((
                application_status::created_at.asc(),
                application_status::seq.asc(),
            ))
            .select(application_status::id)
            .first(conn)?;
        if first_id == status_id {
            return Err(LedgerError::PreconditionFailed(
                "cannot delete the initial status of an application".to_string(),
            ));
        }

        diesel::delete(application_status::table.find(status_id)).execute(conn)?;

        tracing::info!(
            application_id = %existing.application_id,
            status_id = %status_id,
            status = %existing.status,
            "deleted application status"
        );

        Ok(existing)
    })
}

/// Newest-first feed across all applications, paired with display codes.
pub fn list_all(
    conn: &mut PgConnection,
) -> Result<Vec<(StatusEvent, String)>, diesel::result::Error> {
    application_status::table
        .inner_join(credit_applications::table)
        .order((
            application_status::created_at.desc(),
            application_status::seq.desc(),
        ))
        .select((
            application_status::all_columns,
            credit_applications::display_code,
        ))
        .load::<(StatusEvent, String)>(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_are_trimmed() {
        assert_eq!(normalize_note("  moved to review ").unwrap(), "moved to review");
    }

    #[test]
    fn blank_notes_are_rejected() {
        assert!(matches!(
            normalize_note("   "),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn overlong_notes_are_rejected() {
        let note = "x".repeat(MAX_NOTE_LENGTH + 1);
        assert!(matches!(
            normalize_note(&note),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(normalize_note(&"x".repeat(MAX_NOTE_LENGTH)).is_ok());
    }
}
