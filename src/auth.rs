/// Authentication extractors and utilities
use crate::{
    account::ValidatedSession,
    api::middleware::extract_session_token,
    context::AppContext,
    db::account::User,
    error::PanelError,
    metrics,
    services::RequiredService,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

/// Authenticated context - extracts and validates session from request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub session: ValidatedSession,
}

impl AuthContext {
    async fn resolve(parts: &Parts, state: &AppContext) -> Result<Self, PanelError> {
        let token = extract_session_token(&parts.headers)
            .ok_or_else(|| PanelError::Authentication("Login required".to_string()))?;

        let session = state.account_manager.validate_access_token(&token).await?;

        let user = match state.account_manager.get_user(session.user_id).await {
            Ok(user) => user,
            Err(PanelError::NotFound(_)) => {
                return Err(PanelError::Authentication("Invalid or expired session".to_string()))
            }
            Err(e) => return Err(e),
        };

        if !user.is_active {
            return Err(PanelError::Authentication("Account is disabled".to_string()));
        }

        Ok(AuthContext { user, session })
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = PanelError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        AuthContext::resolve(parts, state).await
    }
}

/// Optional authenticated context - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = PanelError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = match AuthContext::resolve(parts, state).await {
            Ok(auth) => Some(auth),
            Err(PanelError::Authentication(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(OptionalAuthContext { auth })
    }
}

/// Staff authentication context - requires `is_staff`
#[derive(Debug, Clone)]
pub struct StaffAuthContext {
    pub user: User,
    pub session: ValidatedSession,
}

#[async_trait]
impl FromRequestParts<AppContext> for StaffAuthContext {
    type Rejection = PanelError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthContext { user, session } = AuthContext::resolve(parts, state).await?;

        if !user.is_staff {
            tracing::warn!(user_id = user.id, "staff access denied");
            return Err(PanelError::Authorization("Staff access required".to_string()));
        }

        Ok(StaffAuthContext { user, session })
    }
}

/// Service-gated context
///
/// Resolves the signed-in user like [`AuthContext`] and then requires the
/// flag named by `S`. A missing session is a 401; a missing flag redirects
/// to the dashboard with a warning.
///
/// ```ignore
/// async fn licensing(auth: ServiceAuth<LicenseService>) -> ... { }
/// ```
#[derive(Debug, Clone)]
pub struct ServiceAuth<S: RequiredService> {
    pub user: User,
    pub session: ValidatedSession,
    _service: PhantomData<S>,
}

#[async_trait]
impl<S: RequiredService> FromRequestParts<AppContext> for ServiceAuth<S> {
    type Rejection = PanelError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthContext { user, session } = AuthContext::resolve(parts, state).await?;

        if let Err(e) = S::FLAG.check(&user) {
            metrics::record_service_denial(S::FLAG.as_str());
            tracing::info!(user_id = user.id, service = S::FLAG.as_str(), "service gate closed");
            return Err(e);
        }

        Ok(ServiceAuth {
            user,
            session,
            _service: PhantomData,
        })
    }
}

/// Verify a JWT token with full validation
///
/// This performs:
/// 1. JWT signature verification
/// 2. Expiration checking
/// 3. Claims validation
pub fn verify_jwt_token(
    token: &str,
    jwt_secret: &str,
) -> Result<jsonwebtoken::TokenData<serde_json::Value>, PanelError> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (1 minute)
    validation.leeway = 60;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<serde_json::Value>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!("JWT verification failed: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                PanelError::Authentication("Session expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                PanelError::Authentication("Invalid token signature".to_string())
            }
            _ => PanelError::Authentication("Invalid token".to_string()),
        }
    })
}
