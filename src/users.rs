//! Account administration: listing, editing and removing users.

use diesel::{
    dsl::{count_star, exists},
    prelude::*,
    result::Error as DieselError,
    select, PgConnection,
};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::codes::{self, CodeGenerationError};
use crate::domain::Role;
use crate::models::{User, UserChangeset};
use crate::schema::{application_status, credit_applications, users};

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_PHONE_LENGTH: usize = 25;

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("user {0} not found")]
    NotFound(Uuid),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    InUse(String),
    #[error(transparent)]
    Codes(#[from] CodeGenerationError),
    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

pub type UserResult<T> = Result<T, UserStoreError>;

/// Partial account update. `phone: Some("")` clears the number.
/// `email` is expected to be normalized already.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.role.is_none()
    }

    fn validated_name(&self) -> UserResult<Option<String>> {
        let Some(raw) = self.name.as_deref() else {
            return Ok(None);
        };
        let name = raw.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(UserStoreError::InvalidArgument(format!(
                "name is required and must be at most {MAX_NAME_LENGTH} characters"
            )));
        }
        Ok(Some(name.to_string()))
    }

    fn validated_phone(&self) -> UserResult<Option<Option<String>>> {
        let Some(raw) = self.phone.as_deref() else {
            return Ok(None);
        };
        let phone = raw.trim();
        if phone.is_empty() {
            return Ok(Some(None));
        }
        if phone.chars().count() > MAX_PHONE_LENGTH {
            return Err(UserStoreError::InvalidArgument(format!(
                "phone must be at most {MAX_PHONE_LENGTH} characters"
            )));
        }
        Ok(Some(Some(phone.to_string())))
    }
}

/// Newest first.
pub fn list_users(conn: &mut PgConnection) -> UserResult<Vec<User>> {
    let rows = users::table
        .order((users::created_at.desc(), users::id.desc()))
        .load(conn)?;
    Ok(rows)
}

pub fn find_user(conn: &mut PgConnection, user_id: Uuid) -> UserResult<User> {
    users::table
        .find(user_id)
        .first::<User>(conn)
        .optional()?
        .ok_or(UserStoreError::NotFound(user_id))
}

fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> UserResult<User> {
    users::table
        .find(user_id)
        .for_update()
        .first::<User>(conn)
        .optional()?
        .ok_or(UserStoreError::NotFound(user_id))
}

/// What happens to the agent code when an account moves to `role`: becoming
/// an agent issues one if missing, leaving the agent role drops it.
fn agent_code_change(
    conn: &mut PgConnection,
    current: &User,
    role: Role,
) -> UserResult<Option<Option<String>>> {
    match (role, current.agent_code.as_ref()) {
        (Role::Agent, None) => Ok(Some(Some(codes::generate_agent_code(conn)?))),
        (Role::Agent, Some(_)) => Ok(None),
        (_, Some(_)) => Ok(Some(None)),
        (_, None) => Ok(None),
    }
}

pub fn update_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    changes: UserChanges,
    clock: &dyn Clock,
) -> UserResult<User> {
    let name = changes.validated_name()?;
    let phone = changes.validated_phone()?;

    conn.transaction::<User, UserStoreError, _>(|conn| {
        let current = lock_user(conn, user_id)?;
        if changes.is_empty() {
            return Ok(current);
        }

        let agent_code = match changes.role {
            Some(role) => agent_code_change(conn, &current, role)?,
            None => None,
        };

        let changeset = UserChangeset {
            name,
            email: changes.email.clone(),
            phone,
            agent_code,
            role: changes.role,
            updated_at: Some(clock.now()),
        };

        let updated: User = diesel::update(users::table.find(user_id))
            .set(&changeset)
            .get_result(conn)?;

        tracing::info!(
            user_id = %user_id,
            previous_role = %current.role,
            role = %updated.role,
            "updated user account"
        );

        Ok(updated)
    })
}

/// Removes an account that has no applications and no recorded status changes.
pub fn delete_user(
    conn: &mut PgConnection,
    user_id: Uuid,
    acting_user: Uuid,
) -> UserResult<User> {
    if user_id == acting_user {
        return Err(UserStoreError::InvalidArgument(
            "you cannot delete your own account".to_string(),
        ));
    }

    conn.transaction::<User, UserStoreError, _>(|conn| {
        let user = lock_user(conn, user_id)?;

        let owned: i64 = credit_applications::table
            .filter(credit_applications::user_id.eq(user_id))
            .select(count_star())
            .first(conn)?;
        let acted: bool = select(exists(
            application_status::table.filter(application_status::changed_by.eq(user_id)),
        ))
        .get_result(conn)?;

        if owned > 0 || acted {
            return Err(UserStoreError::InUse(
                "user still owns credit applications or status history".to_string(),
            ));
        }

        diesel::delete(users::table.find(user_id)).execute(conn)?;
        tracing::info!(user_id = %user_id, email = %user.email, "deleted user account");
        Ok(user)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_changes_are_detected() {
        assert!(UserChanges::default().is_empty());
        let changes = UserChanges {
            role: Some(Role::Agent),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        let changes = UserChanges {
            name: Some("  Firas  ".to_string()),
            ..Default::default()
        };
        assert_eq!(changes.validated_name().unwrap().as_deref(), Some("Firas"));

        let blank = UserChanges {
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            blank.validated_name(),
            Err(UserStoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn blank_phone_clears_the_number() {
        let clear = UserChanges {
            phone: Some(" ".to_string()),
            ..Default::default()
        };
        assert_eq!(clear.validated_phone().unwrap(), Some(None));

        let untouched = UserChanges::default();
        assert_eq!(untouched.validated_phone().unwrap(), None);

        let long = UserChanges {
            phone: Some("0".repeat(MAX_PHONE_LENGTH + 1)),
            ..Default::default()
        };
        assert!(long.validated_phone().is_err());
    }
}
