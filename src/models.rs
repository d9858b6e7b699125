use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{ApplicationStatus, CollateralType, LoanType, Role};
use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub agent_code: Option<String>,
    pub role: Role,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub agent_code: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = credit_applications)]
#[diesel(belongs_to(User))]
pub struct CreditApplication {
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
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = credit_applications)]
pub struct NewCreditApplication {
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
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = credit_applications)]
pub struct CreditApplicationChangeset {
    pub national_id: Option<String>,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub birth_place: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub loan_type: Option<LoanType>,
    pub collateral_type: Option<CollateralType>,
    pub ceiling_amount: Option<BigDecimal>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = application_status)]
#[diesel(belongs_to(CreditApplication, foreign_key = application_id))]
pub struct StatusEvent {
    pub id: Uuid,
    pub application_id: Uuid,
    pub status: ApplicationStatus,
    pub note: String,
    pub changed_by: Uuid,
    pub created_at: NaiveDateTime,
    /// Insertion order; breaks ties between events sharing a timestamp.
    pub seq: i64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = application_status)]
pub struct NewStatusEvent {
    pub id: Uuid,
    pub application_id: Uuid,
    pub status: ApplicationStatus,
    pub note: String,
    pub changed_by: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = application_sla)]
#[diesel(belongs_to(CreditApplication, foreign_key = application_id))]
pub struct SlaTransition {
    pub id: Uuid,
    pub application_id: Uuid,
    pub from_status: ApplicationStatus,
    pub to_status: ApplicationStatus,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub duration_minutes: i32,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = application_sla)]
pub struct NewSlaTransition {
    pub id: Uuid,
    pub application_id: Uuid,
    pub from_status: ApplicationStatus,
    pub to_status: ApplicationStatus,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub duration_minutes: i32,
    pub note: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
pub struct UserChangeset {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub agent_code: Option<Option<String>>,
    pub role: Option<Role>,
    pub updated_at: Option<NaiveDateTime>,
}
