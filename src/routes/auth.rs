use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    codes,
    domain::Role,
    error::{AppError, AppResult},
    models::{NewUser, User},
    policy,
    response::{to_iso, ApiJson, ApiResponse},
    schema::users,
    state::AppState,
    users::{MAX_NAME_LENGTH, MAX_PHONE_LENGTH},
};

const MAX_EMAIL_LENGTH: usize = 150;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub agent_code: Option<String>,
    pub role: Role,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            agent_code: user.agent_code,
            role: user.role,
            created_at: to_iso(user.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Lower-cases and checks the `local@domain.tld` shape.
pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = email.chars().count() <= MAX_EMAIL_LENGTH
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain
                        .rsplit_once('.')
                        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        };

    if valid {
        Ok(email)
    } else {
        Err(AppError::bad_request("invalid email format"))
    }
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    let name = payload.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::bad_request(format!(
            "name is required and must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    let email = normalize_email(&payload.email)?;
    if payload.password.chars().count() < password::MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {} characters",
            password::MIN_PASSWORD_LENGTH
        )));
    }
    let phone = payload
        .phone
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    if phone
        .as_ref()
        .is_some_and(|value| value.chars().count() > MAX_PHONE_LENGTH)
    {
        return Err(AppError::bad_request(format!(
            "phone must be at most {MAX_PHONE_LENGTH} characters"
        )));
    }
    let role = match payload.role.as_deref() {
        Some(raw) => raw.parse::<Role>()?,
        None => Role::Customer,
    };
    policy::ensure_self_assignable(role)?;

    let password_hash = password::hash_password(&payload.password)?;
    let mut conn = state.db()?;

    let agent_code = match role {
        Role::Agent => Some(codes::generate_agent_code(&mut conn)?),
        _ => None,
    };

    let new_user = NewUser {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email,
        password_hash,
        phone,
        agent_code,
        role,
    };

    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(&mut conn)?;

    tracing::info!(
        user_id = %user.id,
        role = %user.role,
        agent_code = user.agent_code.as_deref().unwrap_or(""),
        "registered user"
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("user registered", UserResponse::from(user)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }

    let mut conn = state.db()?;
    let user: User = users::table
        .filter(users::email.eq(&email))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        tracing::warn!(user_id = %user.id, "rejected login with wrong password");
        return Err(AppError::unauthorized());
    }

    let access_token = state.jwt.generate_token(user.id, &user.email, user.role)?;

    Ok(ApiResponse::ok(
        "login successful",
        LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.jwt.expiry_seconds(),
            user: UserResponse::from(user),
        },
    ))
}

pub async fn me(user: AuthenticatedUser) -> Json<ApiResponse<AuthenticatedUser>> {
    ApiResponse::ok("authenticated", user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_lowercased_and_trimmed() {
        assert_eq!(
            normalize_email("  Siti.Rahma@Example.COM ").unwrap(),
            "siti.rahma@example.com"
        );
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for raw in ["", "no-at-sign", "@example.com", "a@b", "a@@b.com", "a b@c.com", "a@.com"] {
            assert!(normalize_email(raw).is_err(), "{raw} should be rejected");
        }
    }
}
