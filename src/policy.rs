//! Who may read or change which records. Pure decisions, no persistence.

use thiserror::Error;

use crate::auth::AuthenticatedUser;
use crate::domain::{ApplicationStatus, Role};
use crate::models::{CreditApplication, StatusEvent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("you are not allowed to {0}")]
    Forbidden(&'static str),
    #[error("application can no longer be changed: current status is {0}")]
    NotEditable(ApplicationStatus),
}

pub type PolicyResult = Result<(), PolicyError>;

pub fn is_owner(principal: &AuthenticatedUser, application: &CreditApplication) -> bool {
    application.user_id == principal.user_id
}

/// Admins see everything; everyone else only their own applications.
pub fn ensure_can_view(
    principal: &AuthenticatedUser,
    application: &CreditApplication,
) -> PolicyResult {
    if principal.is_admin() || is_owner(principal, application) {
        Ok(())
    } else {
        Err(PolicyError::Forbidden("access this application"))
    }
}

pub fn ensure_can_modify(
    principal: &AuthenticatedUser,
    application: &CreditApplication,
) -> PolicyResult {
    if principal.is_admin() || is_owner(principal, application) {
        Ok(())
    } else {
        Err(PolicyError::Forbidden("modify this application"))
    }
}

/// Creating, correcting and deleting status history is reserved to admins.
pub fn ensure_can_write_status(principal: &AuthenticatedUser) -> PolicyResult {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(PolicyError::Forbidden("change application status"))
    }
}

pub fn ensure_admin(principal: &AuthenticatedUser, action: &'static str) -> PolicyResult {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(PolicyError::Forbidden(action))
    }
}

/// Public sign-up may create customers and agents; admins are made by admins.
pub fn ensure_self_assignable(role: Role) -> PolicyResult {
    if role.is_elevated() {
        Err(PolicyError::Forbidden("register an administrator account"))
    } else {
        Ok(())
    }
}

/// Field edits and deletion are only allowed while the latest status is SUBMITTED.
/// An application without history is treated as freshly submitted.
pub fn ensure_editable(latest: Option<&StatusEvent>) -> PolicyResult {
    match latest {
        Some(event) if event.status != ApplicationStatus::Submitted => {
            Err(PolicyError::NotEditable(event.status))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CollateralType, LoanType};
    use bigdecimal::BigDecimal;
    use chrono::{NaiveDate, NaiveDateTime};
    use uuid::Uuid;

    fn principal(role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            role,
        }
    }

    fn timestamp() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-02-01 09:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn application_owned_by(owner: Uuid) -> CreditApplication {
        CreditApplication {
            id: Uuid::new_v4(),
            display_code: "L-0001".to_string(),
            national_id: "3174000000000001".to_string(),
            full_name: "Dewi Lestari".to_string(),
            address: "Jl. Merdeka 1".to_string(),
            birth_place: "Bandung".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            email: "dewi@example.com".to_string(),
            loan_type: LoanType::Mortgage,
            collateral_type: CollateralType::Certificate,
            ceiling_amount: BigDecimal::from(250_000_000),
            user_id: owner,
            created_at: timestamp(),
            updated_at: timestamp(),
        }
    }

    fn event(status: ApplicationStatus) -> StatusEvent {
        StatusEvent {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            status,
            note: "note".to_string(),
            changed_by: Uuid::new_v4(),
            seq: 1,
            created_at: timestamp(),
        }
    }

    #[test]
    fn owner_and_admin_can_view_others_cannot() {
        let owner = principal(Role::Customer);
        let application = application_owned_by(owner.user_id);

        assert_eq!(ensure_can_view(&owner, &application), Ok(()));
        assert_eq!(ensure_can_view(&principal(Role::Admin), &application), Ok(()));
        assert_eq!(
            ensure_can_view(&principal(Role::Customer), &application),
            Err(PolicyError::Forbidden("access this application"))
        );
        assert!(ensure_can_view(&principal(Role::Agent), &application).is_err());
    }

    #[test]
    fn only_admin_writes_status() {
        assert!(ensure_can_write_status(&principal(Role::Admin)).is_ok());
        assert!(ensure_can_write_status(&principal(Role::Agent)).is_err());
        assert!(ensure_can_write_status(&principal(Role::Customer)).is_err());
    }

    #[test]
    fn sign_up_cannot_grant_admin() {
        assert!(ensure_self_assignable(Role::Customer).is_ok());
        assert!(ensure_self_assignable(Role::Agent).is_ok());
        assert_eq!(
            ensure_self_assignable(Role::Admin),
            Err(PolicyError::Forbidden("register an administrator account"))
        );
    }

    #[test]
    fn modification_follows_ownership() {
        let owner = principal(Role::Customer);
        let application = application_owned_by(owner.user_id);
        assert!(ensure_can_modify(&owner, &application).is_ok());
        assert!(ensure_can_modify(&principal(Role::Customer), &application).is_err());
    }

    #[test]
    fn only_submitted_applications_are_editable() {
        assert!(ensure_editable(None).is_ok());
        assert!(ensure_editable(Some(&event(ApplicationStatus::Submitted))).is_ok());
        assert_eq!(
            ensure_editable(Some(&event(ApplicationStatus::InReview))),
            Err(PolicyError::NotEditable(ApplicationStatus::InReview))
        );
        assert!(ensure_editable(Some(&event(ApplicationStatus::Rejected))).is_err());
    }
}
