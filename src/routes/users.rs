use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{normalize_email, UserResponse};
use crate::{
    auth::AuthenticatedUser,
    domain::Role,
    error::AppResult,
    policy,
    response::{message_only, ApiJson, ApiResponse},
    state::AppState,
    users::{self as store, UserChanges},
};

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

impl UpdateUserRequest {
    fn into_changes(self) -> AppResult<UserChanges> {
        let email = self.email.as_deref().map(normalize_email).transpose()?;
        let role = self.role.as_deref().map(str::parse::<Role>).transpose()?;
        Ok(UserChanges {
            name: self.name,
            email,
            phone: self.phone,
            role,
        })
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<UserResponse>>>> {
    policy::ensure_admin(&user, "list users")?;
    let mut conn = state.db()?;
    let users = store::list_users(&mut conn)?;
    Ok(ApiResponse::ok(
        "users retrieved",
        users.into_iter().map(UserResponse::from).collect(),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    policy::ensure_admin(&user, "view users")?;
    let mut conn = state.db()?;
    let found = store::find_user(&mut conn, user_id)?;
    Ok(ApiResponse::ok("user retrieved", UserResponse::from(found)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    policy::ensure_admin(&user, "edit users")?;
    let changes = payload.into_changes()?;

    let mut conn = state.db()?;
    let updated = store::update_user(&mut conn, user_id, changes, state.clock.as_ref())?;
    Ok(ApiResponse::ok("user updated", UserResponse::from(updated)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApiResponse<()>>> {
    policy::ensure_admin(&user, "delete users")?;
    let mut conn = state.db()?;
    store::delete_user(&mut conn, user_id, user.user_id)?;
    Ok(message_only("user deleted"))
}
