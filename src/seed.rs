//! Demo data for a fresh database: one account per role, a few applications
//! and enough status history to populate the SLA views.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::{dsl::count_star, prelude::*, result::Error as DieselError, PgConnection};
use thiserror::Error;
use uuid::Uuid;

use crate::applications::{self, ApplicationStoreError, NewApplicationInput};
use crate::auth::password;
use crate::clock::Clock;
use crate::codes::{self, CodeGenerationError, DisplayCodeIssuer};
use crate::domain::{ApplicationStatus, CollateralType, LoanType, Role};
use crate::ledger::{self, LedgerError};
use crate::models::NewUser;
use crate::schema::users;

pub const DEFAULT_PASSWORD: &str = "password123";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("database already has {0} user(s); seeding only runs on an empty database")]
    NotEmpty(i64),
    #[error("failed to hash seed password: {0}")]
    Password(String),
    #[error("invalid seed fixture: {0}")]
    Fixture(&'static str),
    #[error(transparent)]
    Applications(#[from] ApplicationStoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Codes(#[from] CodeGenerationError),
    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub applications: usize,
    pub statuses: usize,
}

struct SeedUser {
    name: &'static str,
    email: &'static str,
    phone: Option<&'static str>,
    role: Role,
}

const USERS: [SeedUser; 4] = [
    SeedUser {
        name: "Administrator",
        email: "admin@example.com",
        phone: None,
        role: Role::Admin,
    },
    SeedUser {
        name: "Firas Hidayat",
        email: "agent@example.com",
        phone: Some("081200000001"),
        role: Role::Agent,
    },
    SeedUser {
        name: "Sulthan Akbar",
        email: "sulthan@example.com",
        phone: Some("081200000002"),
        role: Role::Customer,
    },
    SeedUser {
        name: "Nadia Putri",
        email: "nadia@example.com",
        phone: None,
        role: Role::Customer,
    },
];

struct SeedApplication {
    owner: usize,
    national_id: &'static str,
    full_name: &'static str,
    address: &'static str,
    birth_place: &'static str,
    birth_date: (i32, u32, u32),
    loan_type: LoanType,
    collateral_type: CollateralType,
    ceiling_amount: i64,
    /// Status recorded by the admin after submission, if any.
    outcome: Option<(ApplicationStatus, &'static str)>,
}

const APPLICATIONS: [SeedApplication; 3] = [
    SeedApplication {
        owner: 3,
        national_id: "3171014501920003",
        full_name: "Nadia Putri",
        address: "Jl. Kemang Raya 12, Jakarta Selatan",
        birth_place: "Jakarta",
        birth_date: (1992, 1, 5),
        loan_type: LoanType::Multipurpose,
        collateral_type: CollateralType::EmploymentLetter,
        ceiling_amount: 75_000_000,
        outcome: Some((ApplicationStatus::InReview, "documents under verification")),
    },
    SeedApplication {
        owner: 2,
        national_id: "3273021103880001",
        full_name: "Sulthan Akbar",
        address: "Jl. Dago 45, Bandung",
        birth_place: "Bandung",
        birth_date: (1988, 3, 11),
        loan_type: LoanType::Mortgage,
        collateral_type: CollateralType::Certificate,
        ceiling_amount: 450_000_000,
        outcome: Some((ApplicationStatus::Approved, "collateral appraised above ceiling")),
    },
    SeedApplication {
        owner: 1,
        national_id: "3578062207950002",
        full_name: "Firas Hidayat",
        address: "Jl. Darmo 7, Surabaya",
        birth_place: "Surabaya",
        birth_date: (1995, 7, 22),
        loan_type: LoanType::ProductiveCredit,
        collateral_type: CollateralType::VehicleTitle,
        ceiling_amount: 120_000_000,
        outcome: Some((ApplicationStatus::Rejected, "insufficient business history")),
    },
];

const ADMIN: usize = 0;

/// Inserts the demo accounts and applications in one transaction. Every account
/// shares `password`. Refuses to run when any user exists.
pub fn seed_demo_data(
    conn: &mut PgConnection,
    issuer: &DisplayCodeIssuer,
    clock: &dyn Clock,
    password: &str,
) -> Result<SeedSummary, SeedError> {
    let password_hash =
        password::hash_password(password).map_err(|err| SeedError::Password(err.to_string()))?;

    conn.transaction::<SeedSummary, SeedError, _>(|conn| {
        let existing: i64 = users::table.select(count_star()).first(conn)?;
        if existing > 0 {
            return Err(SeedError::NotEmpty(existing));
        }

        let mut summary = SeedSummary::default();
        let mut user_ids = Vec::with_capacity(USERS.len());
        for seed in &USERS {
            let agent_code = match seed.role {
                Role::Agent => Some(codes::generate_agent_code(conn)?),
                _ => None,
            };
            let user = NewUser {
                id: Uuid::new_v4(),
                name: seed.name.to_string(),
                email: seed.email.to_string(),
                password_hash: password_hash.clone(),
                phone: seed.phone.map(str::to_string),
                agent_code,
                role: seed.role,
            };
            diesel::insert_into(users::table).values(&user).execute(conn)?;
            user_ids.push(user.id);
            summary.users += 1;
        }

        for seed in &APPLICATIONS {
            let (year, month, day) = seed.birth_date;
            let input = NewApplicationInput {
                national_id: seed.national_id.to_string(),
                full_name: seed.full_name.to_string(),
                address: seed.address.to_string(),
                birth_place: seed.birth_place.to_string(),
                birth_date: NaiveDate::from_ymd_opt(year, month, day)
                    .ok_or(SeedError::Fixture("birth date"))?,
                loan_type: seed.loan_type,
                collateral_type: seed.collateral_type,
                ceiling_amount: BigDecimal::from(seed.ceiling_amount),
            };
            let created = applications::create_application(
                conn,
                issuer,
                clock,
                user_ids[seed.owner],
                USERS[seed.owner].email,
                input,
            )?;
            summary.applications += 1;
            summary.statuses += 1;

            if let Some((status, note)) = seed.outcome {
                ledger::append_status(
                    conn,
                    created.application.id,
                    status,
                    note,
                    user_ids[ADMIN],
                    clock,
                )?;
                summary.statuses += 1;
            }
        }

        tracing::info!(
            users = summary.users,
            applications = summary.applications,
            statuses = summary.statuses,
            "seeded demo data"
        );

        Ok(summary)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_reference_existing_owners() {
        for application in &APPLICATIONS {
            assert!(application.owner < USERS.len());
            assert_ne!(application.owner, ADMIN);
        }
        assert_eq!(USERS[ADMIN].role, Role::Admin);
    }

    #[test]
    fn fixture_birth_dates_are_valid() {
        for application in &APPLICATIONS {
            let (year, month, day) = application.birth_date;
            assert!(NaiveDate::from_ymd_opt(year, month, day).is_some());
        }
    }

    #[test]
    fn every_role_is_seeded() {
        for role in [Role::Admin, Role::Agent, Role::Customer] {
            assert!(USERS.iter().any(|user| user.role == role), "{role} missing");
        }
    }
}
