/// License management endpoints
///
/// Dashboard actions answer `{success, message, ...}`; failures keep the
/// same shape with `success: false`, malformed paths and bodies included.
/// Verification answers `{valid, message, license?}`.
use crate::{
    auth::ServiceAuth,
    context::AppContext,
    db::license::{License, UsageLog},
    error::PanelError,
    licensing::Verification,
    metrics,
    services::LicenseService,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::json;

const DEFAULT_USAGE_LIMIT: i64 = 100;
const MAX_USAGE_LIMIT: i64 = 500;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/licensing/add/", post(add_license))
        .route("/licensing/:id/edit/", get(edit_license_form).post(edit_license))
        .route("/licensing/:id/delete/", post(delete_license))
        .route("/licensing/:id/toggle/", post(toggle_license))
        .route("/licensing/:id/usage/", get(license_usage))
        .route("/licensing/verify/", post(verify_license))
}

/// Error wrapper rendering `{success: false, message}`
#[derive(Debug)]
pub struct ActionError(PanelError);

impl From<PanelError> for ActionError {
    fn from(e: PanelError) -> Self {
        ActionError(e)
    }
}

impl From<PathRejection> for ActionError {
    fn from(rejection: PathRejection) -> Self {
        ActionError(PanelError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ActionError {
    fn from(rejection: QueryRejection) -> Self {
        ActionError(PanelError::Validation(rejection.body_text()))
    }
}

impl From<JsonRejection> for ActionError {
    fn from(rejection: JsonRejection) -> Self {
        ActionError(PanelError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        match self.0 {
            e @ (PanelError::ServiceRequired(_)
            | PanelError::RateLimitExceeded { .. }
            | PanelError::Authentication(_)) => e.into_response(),
            e => {
                let status = e.status_code();
                if status.is_server_error() {
                    tracing::error!(error = %e, "license action failed");
                }
                (
                    status,
                    Json(json!({ "success": false, "message": e.public_message() })),
                )
                    .into_response()
            }
        }
    }
}

type ActionResult<T> = Result<T, ActionError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            license_key: None,
            is_active: None,
        }
    }
}

async fn add_license(
    State(ctx): State<AppContext>,
    auth: ServiceAuth<LicenseService>,
) -> ActionResult<Json<ActionResponse>> {
    let license = ctx.license_manager.create(auth.user.id).await?;

    Ok(Json(ActionResponse {
        license_key: Some(license.key),
        ..ActionResponse::ok("License created successfully")
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LicenseSummary {
    pub id: i64,
    pub key: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EditFormResponse {
    pub success: bool,
    pub license: LicenseSummary,
}

async fn edit_license_form(
    State(ctx): State<AppContext>,
    auth: ServiceAuth<LicenseService>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ActionError>,
) -> ActionResult<Json<EditFormResponse>> {
    let license = ctx.license_manager.get_owned(id, auth.user.id).await?;

    Ok(Json(EditFormResponse {
        success: true,
        license: LicenseSummary {
            id: license.id,
            key: license.key,
            is_active: license.is_active,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct EditLicenseRequest {
    #[serde(default)]
    pub is_active: bool,
}

async fn edit_license(
    State(ctx): State<AppContext>,
    auth: ServiceAuth<LicenseService>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ActionError>,
    WithRejection(Json(req), _): WithRejection<Json<EditLicenseRequest>, ActionError>,
) -> ActionResult<Json<ActionResponse>> {
    ctx.license_manager
        .set_active(id, auth.user.id, req.is_active)
        .await?;

    Ok(Json(ActionResponse::ok("License updated successfully")))
}

async fn delete_license(
    State(ctx): State<AppContext>,
    auth: ServiceAuth<LicenseService>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ActionError>,
) -> ActionResult<Json<ActionResponse>> {
    let key = ctx.license_manager.delete(id).await?;
    tracing::info!(license_id = id, user_id = auth.user.id, "license deleted via dashboard");

    Ok(Json(ActionResponse::ok(format!(
        "License deleted successfully: {}",
        key
    ))))
}

async fn toggle_license(
    State(ctx): State<AppContext>,
    auth: ServiceAuth<LicenseService>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ActionError>,
) -> ActionResult<Json<ActionResponse>> {
    let is_active = ctx.license_manager.toggle(id, auth.user.id).await?;
    let state = if is_active { "active" } else { "inactive" };

    Ok(Json(ActionResponse {
        is_active: Some(is_active),
        ..ActionResponse::ok(format!("License set to {}", state))
    }))
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    pub success: bool,
    pub license_id: i64,
    pub key: String,
    pub entries: Vec<UsageLog>,
}

async fn license_usage(
    State(ctx): State<AppContext>,
    auth: ServiceAuth<LicenseService>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ActionError>,
    WithRejection(Query(query), _): WithRejection<Query<UsageQuery>, ActionError>,
) -> ActionResult<Json<UsageResponse>> {
    let license = ctx.license_manager.get_owned(id, auth.user.id).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_USAGE_LIMIT)
        .clamp(1, MAX_USAGE_LIMIT);

    let entries = ctx.license_manager.usage_for(license.id, limit).await?;

    Ok(Json(UsageResponse {
        success: true,
        license_id: license.id,
        key: license.key,
        entries,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    pub key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

impl VerifyResponse {
    fn rejected(message: &str) -> Self {
        Self {
            valid: false,
            message: message.to_string(),
            license: None,
        }
    }
}

/// Key check for signed-in license holders and their API clients
async fn verify_license(
    State(ctx): State<AppContext>,
    auth: ServiceAuth<LicenseService>,
    body: Option<Json<VerifyRequest>>,
) -> Result<(StatusCode, Json<VerifyResponse>), PanelError> {
    let key = body
        .and_then(|Json(req)| req.key)
        .filter(|k| !k.is_empty());

    let Some(key) = key else {
        metrics::record_license_verification("missing");
        tracing::debug!(user_id = auth.user.id, "verification without a key");
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(VerifyResponse::rejected("Key is required")),
        ));
    };

    let response = match ctx.license_manager.verify(&key).await? {
        Verification::Valid(license) => (
            StatusCode::OK,
            Json(VerifyResponse {
                valid: true,
                message: "License is active.".to_string(),
                license: Some(license),
            }),
        ),
        Verification::Inactive(_) => (
            StatusCode::FORBIDDEN,
            Json(VerifyResponse::rejected("License is inactive.")),
        ),
        Verification::Unknown => (
            StatusCode::BAD_REQUEST,
            Json(VerifyResponse::rejected("Key is invalid")),
        ),
    };

    Ok(response)
}
