//! Credit application records and their sequential display codes.

use bigdecimal::{BigDecimal, Zero};
use chrono::{NaiveDate, NaiveDateTime};
use diesel::{
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    PgConnection,
};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::codes::{
    format_display_code, parse_display_number, retry_on_collision, CodeGenerationError,
    DisplayCodeIssuer, MAX_CODE_ATTEMPTS,
};
use crate::domain::{ApplicationStatus, CollateralType, LoanType};
use crate::ledger::{self, LedgerError};
use crate::models::{
    CreditApplication, CreditApplicationChangeset, NewCreditApplication, StatusEvent,
};
use crate::policy::{self, PolicyError};
use crate::schema::credit_applications;

pub const INITIAL_STATUS_NOTE: &str = "Credit application submitted";
const DISPLAY_CODE_CONSTRAINT: &str = "credit_applications_display_code_key";

const MAX_NATIONAL_ID_LENGTH: usize = 20;
const MAX_FULL_NAME_LENGTH: usize = 150;
const MAX_ADDRESS_LENGTH: usize = 255;
const MAX_BIRTH_PLACE_LENGTH: usize = 100;
/// NUMERIC(15, 2) leaves thirteen integer digits.
const CEILING_LIMIT: i64 = 10_000_000_000_000;
const CEILING_SCALE: i64 = 2;

#[derive(Debug, Error)]
pub enum ApplicationStoreError {
    #[error("application {0} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Codes(#[from] CodeGenerationError),
    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

pub type StoreResult<T> = Result<T, ApplicationStoreError>;

#[derive(Debug, Clone)]
pub struct NewApplicationInput {
    pub national_id: String,
    pub full_name: String,
    pub address: String,
    pub birth_place: String,
    pub birth_date: NaiveDate,
    pub loan_type: LoanType,
    pub collateral_type: CollateralType,
    pub ceiling_amount: BigDecimal,
}

impl NewApplicationInput {
    /// Trims text fields and rejects anything the table would refuse.
    pub fn validate(self, today: NaiveDate) -> StoreResult<Self> {
        Ok(Self {
            national_id: required_text("national_id", &self.national_id, MAX_NATIONAL_ID_LENGTH)?,
            full_name: required_text("full_name", &self.full_name, MAX_FULL_NAME_LENGTH)?,
            address: required_text("address", &self.address, MAX_ADDRESS_LENGTH)?,
            birth_place: required_text("birth_place", &self.birth_place, MAX_BIRTH_PLACE_LENGTH)?,
            birth_date: valid_birth_date(self.birth_date, today)?,
            loan_type: self.loan_type,
            collateral_type: self.collateral_type,
            ceiling_amount: valid_ceiling(self.ceiling_amount)?,
        })
    }
}

/// Partial update; `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct ApplicationChanges {
    pub national_id: Option<String>,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub birth_place: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub loan_type: Option<LoanType>,
    pub collateral_type: Option<CollateralType>,
    pub ceiling_amount: Option<BigDecimal>,
}

impl ApplicationChanges {
    pub fn is_empty(&self) -> bool {
        self.national_id.is_none()
            && self.full_name.is_none()
            && self.address.is_none()
            && self.birth_place.is_none()
            && self.birth_date.is_none()
            && self.loan_type.is_none()
            && self.collateral_type.is_none()
            && self.ceiling_amount.is_none()
    }

    pub fn into_changeset(self, now: NaiveDateTime) -> StoreResult<CreditApplicationChangeset> {
        let today = now.date();
        Ok(CreditApplicationChangeset {
            national_id: self
                .national_id
                .map(|value| required_text("national_id", &value, MAX_NATIONAL_ID_LENGTH))
                .transpose()?,
            full_name: self
                .full_name
                .map(|value| required_text("full_name", &value, MAX_FULL_NAME_LENGTH))
                .transpose()?,
            address: self
                .address
                .map(|value| required_text("address", &value, MAX_ADDRESS_LENGTH))
                .transpose()?,
            birth_place: self
                .birth_place
                .map(|value| required_text("birth_place", &value, MAX_BIRTH_PLACE_LENGTH))
                .transpose()?,
            birth_date: self
                .birth_date
                .map(|value| valid_birth_date(value, today))
                .transpose()?,
            loan_type: self.loan_type,
            collateral_type: self.collateral_type,
            ceiling_amount: self.ceiling_amount.map(valid_ceiling).transpose()?,
            updated_at: Some(now),
        })
    }
}

fn required_text(field: &str, value: &str, max_length: usize) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApplicationStoreError::InvalidArgument(format!(
            "{field} is required"
        )));
    }
    if trimmed.chars().count() > max_length {
        return Err(ApplicationStoreError::InvalidArgument(format!(
            "{field} must be at most {max_length} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn valid_birth_date(value: NaiveDate, today: NaiveDate) -> StoreResult<NaiveDate> {
    if value > today {
        return Err(ApplicationStoreError::InvalidArgument(
            "birth_date cannot be in the future".to_string(),
        ));
    }
    Ok(value)
}

fn valid_ceiling(value: BigDecimal) -> StoreResult<BigDecimal> {
    if value <= BigDecimal::zero() {
        return Err(ApplicationStoreError::InvalidArgument(
            "ceiling_amount must be greater than zero".to_string(),
        ));
    }
    if value >= BigDecimal::from(CEILING_LIMIT) {
        return Err(ApplicationStoreError::InvalidArgument(
            "ceiling_amount is too large".to_string(),
        ));
    }
    let (_, scale) = value.normalized().as_bigint_and_exponent();
    if scale > CEILING_SCALE {
        return Err(ApplicationStoreError::InvalidArgument(format!(
            "ceiling_amount must have at most {CEILING_SCALE} decimal places"
        )));
    }
    Ok(value)
}

/// A freshly stored application together with its first history entry.
#[derive(Debug, Clone)]
pub struct CreatedApplication {
    pub application: CreditApplication,
    pub initial_status: StatusEvent,
}

fn is_display_code_collision(err: &ApplicationStoreError) -> bool {
    matches!(
        err,
        ApplicationStoreError::Database(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            info,
        )) if info.constraint_name() == Some(DISPLAY_CODE_CONSTRAINT)
    )
}

/// Stores a new application and its SUBMITTED entry in one transaction.
///
/// A concurrent creator that grabbed the same display code makes the insert
/// fail on the unique constraint; the whole transaction is then retried with
/// a freshly scanned code, up to [`MAX_CODE_ATTEMPTS`] times. Timestamps are
/// read from `clock` inside each attempt.
pub fn create_application(
    conn: &mut PgConnection,
    issuer: &DisplayCodeIssuer,
    clock: &dyn Clock,
    owner_id: Uuid,
    owner_email: &str,
    input: NewApplicationInput,
) -> StoreResult<CreatedApplication> {
    let input = input.validate(clock.now().date())?;

    let (created, number) = retry_on_collision(
        "application code",
        MAX_CODE_ATTEMPTS,
        |_| {
            conn.transaction::<_, ApplicationStoreError, _>(|conn| {
                let number = issuer.propose(conn)?;
                let now = clock.now();
                let row = NewCreditApplication {
                    id: Uuid::new_v4(),
                    display_code: format_display_code(number),
                    national_id: input.national_id.clone(),
                    full_name: input.full_name.clone(),
                    address: input.address.clone(),
                    birth_place: input.birth_place.clone(),
                    birth_date: input.birth_date,
                    email: owner_email.to_string(),
                    loan_type: input.loan_type,
                    collateral_type: input.collateral_type,
                    ceiling_amount: input.ceiling_amount.clone(),
                    user_id: owner_id,
                    created_at: now,
                    updated_at: now,
                };

                let application: CreditApplication =
                    diesel::insert_into(credit_applications::table)
                        .values(&row)
                        .get_result(conn)?;

                let first = ledger::append_locked(
                    conn,
                    application.id,
                    ApplicationStatus::Submitted,
                    INITIAL_STATUS_NOTE,
                    owner_id,
                    now,
                )?;

                Ok((
                    CreatedApplication {
                        application,
                        initial_status: first.event,
                    },
                    number,
                ))
            })
        },
        is_display_code_collision,
    )?;

    issuer.record_issued(number);

    tracing::info!(
        application_id = %created.application.id,
        display_code = %created.application.display_code,
        owner_id = %owner_id,
        "created credit application"
    );

    Ok(created)
}

pub fn find_application(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> StoreResult<CreditApplication> {
    credit_applications::table
        .find(application_id)
        .first::<CreditApplication>(conn)
        .optional()?
        .ok_or_else(|| ApplicationStoreError::NotFound(application_id.to_string()))
}

pub fn find_by_display_code(
    conn: &mut PgConnection,
    display_code: &str,
) -> StoreResult<CreditApplication> {
    credit_applications::table
        .filter(credit_applications::display_code.eq(display_code))
        .first::<CreditApplication>(conn)
        .optional()?
        .ok_or_else(|| ApplicationStoreError::NotFound(display_code.to_string()))
}

/// Looks an application up by UUID or by display code (`L-0007`, case-insensitive).
pub fn resolve_application(
    conn: &mut PgConnection,
    identifier: &str,
) -> StoreResult<CreditApplication> {
    let identifier = identifier.trim();
    if let Ok(id) = Uuid::parse_str(identifier) {
        return find_application(conn, id);
    }

    let code = identifier.to_ascii_uppercase();
    if parse_display_number(&code).is_none() {
        return Err(ApplicationStoreError::InvalidArgument(format!(
            "'{identifier}' is neither an application id nor an application code"
        )));
    }
    find_by_display_code(conn, &code)
}

/// Newest first.
pub fn list_applications(conn: &mut PgConnection) -> StoreResult<Vec<CreditApplication>> {
    let applications = credit_applications::table
        .order((
            credit_applications::created_at.desc(),
            credit_applications::id.desc(),
        ))
        .load(conn)?;
    Ok(applications)
}

pub fn list_applications_for_owner(
    conn: &mut PgConnection,
    owner_id: Uuid,
) -> StoreResult<Vec<CreditApplication>> {
    let applications = credit_applications::table
        .filter(credit_applications::user_id.eq(owner_id))
        .order((
            credit_applications::created_at.desc(),
            credit_applications::id.desc(),
        ))
        .load(conn)?;
    Ok(applications)
}

fn lock_editable(conn: &mut PgConnection, application_id: Uuid) -> StoreResult<CreditApplication> {
    let application = credit_applications::table
        .find(application_id)
        .for_update()
        .first::<CreditApplication>(conn)
        .optional()?
        .ok_or_else(|| ApplicationStoreError::NotFound(application_id.to_string()))?;

    let latest = ledger::latest_status(conn, application_id)?;
    policy::ensure_editable(latest.as_ref())?;
    Ok(application)
}

/// Applies field changes while the latest status is still SUBMITTED.
pub fn update_application(
    conn: &mut PgConnection,
    application_id: Uuid,
    changes: ApplicationChanges,
    clock: &dyn Clock,
) -> StoreResult<CreditApplication> {
    conn.transaction::<CreditApplication, ApplicationStoreError, _>(|conn| {
        let current = lock_editable(conn, application_id)?;
        if changes.is_empty() {
            return Ok(current);
        }

        let changeset = changes.into_changeset(clock.now())?;
        let updated: CreditApplication =
            diesel::update(credit_applications::table.find(application_id))
                .set(&changeset)
                .get_result(conn)?;

        tracing::info!(
            application_id = %application_id,
            display_code = %updated.display_code,
            "updated credit application"
        );

        Ok(updated)
    })
}

/// Deletes an application (and, by cascade, its history) while it is still SUBMITTED.
pub fn delete_application(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> StoreResult<CreditApplication> {
    conn.transaction::<CreditApplication, ApplicationStoreError, _>(|conn| {
        let application = lock_editable(conn, application_id)?;
        diesel::delete(credit_applications::table.find(application_id)).execute(conn)?;

        tracing::info!(
            application_id = %application_id,
            display_code = %application.display_code,
            "deleted credit application"
        );

        Ok(application)
    })
}
