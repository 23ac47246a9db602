/// Rate Limiting System
use crate::{
    api::middleware::extract_session_token,
    config,
    error::{PanelError, PanelResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests per second for signed-in users
    pub authenticated_rps: u32,
    /// Requests per second for callers without a valid session
    pub anonymous_rps: u32,
    /// Burst size
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            authenticated_rps: 100,
            anonymous_rps: 20,
            burst_size: 50,
        }
    }
}

impl From<&config::RateLimitConfig> for RateLimitConfig {
    fn from(config: &config::RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            authenticated_rps: config.requests_per_second.saturating_mul(5),
            anonymous_rps: config.requests_per_second,
            burst_size: config.burst_size,
        }
    }
}

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    anonymous: Arc<DirectLimiter>,
}

fn non_zero(value: u32, fallback: NonZeroU32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(fallback)
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let burst = non_zero(config.burst_size, NonZeroU32::MIN);

        let auth_quota =
            Quota::per_second(non_zero(config.authenticated_rps, NonZeroU32::MIN)).allow_burst(burst);
        let anon_quota = Quota::per_second(non_zero(config.anonymous_rps, NonZeroU32::MIN))
            .allow_burst(non_zero(config.burst_size / 2, NonZeroU32::MIN));

        Self {
            enabled: config.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            anonymous: Arc::new(GovernorLimiter::direct(anon_quota)),
        }
    }

    fn check(limiter: &DirectLimiter) -> PanelResult<()> {
        limiter.check().map_err(|_| PanelError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }

    /// Check rate limit for a signed-in caller
    pub fn check_authenticated(&self) -> PanelResult<()> {
        if !self.enabled {
            return Ok(());
        }
        Self::check(&self.authenticated)
    }

    /// Check rate limit for an anonymous caller
    pub fn check_anonymous(&self) -> PanelResult<()> {
        if !self.enabled {
            return Ok(());
        }
        Self::check(&self.anonymous)
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, PanelError> {
    // Only a token that validates earns the authenticated bucket
    let has_session = match extract_session_token(request.headers()) {
        Some(token) => ctx
            .account_manager
            .validate_access_token(&token)
            .await
            .is_ok(),
        None => false,
    };

    if has_session {
        ctx.rate_limiter.check_authenticated()?;
    } else {
        ctx.rate_limiter.check_anonymous()?;
    }

    Ok(next.run(request).await)
}
