/// Login and logout endpoints
use crate::{
    account::{LoginRequest, LoginResponse, UserInfo},
    api::middleware::{removal_cookie, session_cookie},
    auth::{AuthContext, OptionalAuthContext},
    context::AppContext,
    error::{PanelResult, DASHBOARD_PATH},
    metrics,
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/login/", get(login_page).post(login))
        .route("/dashboard/logout/", post(logout))
}

/// Signed-in users are sent straight to the dashboard
async fn login_page(auth: OptionalAuthContext) -> Response {
    match auth.auth {
        Some(_) => Redirect::to(DASHBOARD_PATH).into_response(),
        None => Json(json!({ "authenticated": false })).into_response(),
    }
}

async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> PanelResult<(CookieJar, Json<LoginResponse>)> {
    let (user, session) = match ctx.account_manager.login(&req.username, &req.password).await {
        Ok(result) => result,
        Err(e) => {
            metrics::record_login_attempt(false);
            tracing::info!(username = %req.username, "login failed");
            return Err(e);
        }
    };

    metrics::record_login_attempt(true);
    tracing::info!(user_id = user.id, username = %user.username, "user logged in");

    let jar = jar.add(session_cookie(
        session.access_token.clone(),
        ctx.config.authentication.secure_cookies,
    ));

    Ok((
        jar,
        Json(LoginResponse {
            token: session.access_token,
            expires_at: session.expires_at,
            user: UserInfo::from(&user),
        }),
    ))
}

async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    jar: CookieJar,
) -> PanelResult<(CookieJar, Json<serde_json::Value>)> {
    ctx.account_manager
        .delete_session(&auth.session.session_id)
        .await?;

    tracing::info!(user_id = auth.user.id, "user logged out");

    Ok((
        jar.remove(removal_cookie()),
        Json(json!({ "success": true, "message": "Logged out" })),
    ))
}
