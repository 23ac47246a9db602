/// Admin API Endpoints
/// User management for staff accounts
use crate::{
    account::{CreateUserRequest, UserInfo},
    auth::StaffAuthContext,
    context::AppContext,
    error::{PanelError, PanelResult},
    services::ServiceUpdate,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/users/", get(list_users).post(create_user))
        .route("/admin/users/:id/services/", post(update_services))
        .route("/admin/users/:id/status/", post(update_status))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserInfo>,
    pub total: usize,
}

async fn list_users(
    State(ctx): State<AppContext>,
    _auth: StaffAuthContext,
    Query(query): Query<ListUsersQuery>,
) -> PanelResult<Json<UserListResponse>> {
    let users: Vec<UserInfo> = ctx
        .account_manager
        .list_users(query.active_only)
        .await?
        .iter()
        .map(UserInfo::from)
        .collect();

    Ok(Json(UserListResponse {
        total: users.len(),
        users,
    }))
}

/// Create a user
async fn create_user(
    State(ctx): State<AppContext>,
    auth: StaffAuthContext,
    Json(req): Json<CreateUserRequest>,
) -> PanelResult<(StatusCode, Json<UserInfo>)> {
    let user = ctx.account_manager.create_user(req).await?;

    tracing::info!(
        admin = %auth.user.username,
        user_id = user.id,
        username = %user.username,
        "admin created user"
    );

    Ok((StatusCode::CREATED, Json(UserInfo::from(&user))))
}

/// Set any subset of the three service flags
async fn update_services(
    State(ctx): State<AppContext>,
    auth: StaffAuthContext,
    Path(user_id): Path<i64>,
    Json(update): Json<ServiceUpdate>,
) -> PanelResult<Json<UserInfo>> {
    if update.is_empty() {
        return Err(PanelError::Validation(
            "At least one service flag is required".to_string(),
        ));
    }

    let user = ctx.account_manager.set_services(user_id, &update).await?;

    tracing::info!(admin = %auth.user.username, user_id, ?update, "service flags updated");

    Ok(Json(UserInfo::from(&user)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

/// Activate or deactivate a user
async fn update_status(
    State(ctx): State<AppContext>,
    auth: StaffAuthContext,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> PanelResult<Json<UserInfo>> {
    if user_id == auth.user.id && !req.is_active {
        return Err(PanelError::Validation(
            "You cannot deactivate your own account".to_string(),
        ));
    }

    let user = ctx.account_manager.set_active(user_id, req.is_active).await?;

    tracing::info!(admin = %auth.user.username, user_id, is_active = req.is_active, "user status updated");

    Ok(Json(UserInfo::from(&user)))
}
