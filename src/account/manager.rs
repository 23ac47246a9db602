/// Account manager implementation using runtime queries
/// Runtime query building keeps DATABASE_URL out of the build.

use crate::{
    account::{password, CreateUserRequest, ValidatedSession},
    config::ServerConfig,
    db::account::{Session, User},
    error::{PanelError, PanelResult},
    services::{ServiceFlags, ServiceUpdate},
};
use chrono::{Duration, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const USER_COLUMNS: &str = "id, username, password_hash, first_name, last_name, email, is_active,
    is_staff, whatsapp_service, license_service, email_service, date_joined, last_login";

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Create a new user
    pub async fn create_user(&self, req: CreateUserRequest) -> PanelResult<User> {
        req.validate()
            .map_err(|e| PanelError::Validation(e.to_string()))?;
        self.validate_username(&req.username)?;

        if self.get_user_by_username(&req.username).await?.is_some() {
            return Err(PanelError::Conflict(format!(
                "Username {} already taken",
                req.username
            )));
        }

        let password_hash = password::hash_password(&req.password)?;
        let flags = req.services.apply(ServiceFlags {
            whatsapp_service: false,
            license_service: false,
            email_service: false,
        });
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, first_name, last_name, email, is_active,
                                is_staff, whatsapp_service, license_service, email_service, date_joined)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&req.username)
        .bind(&password_hash)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.email)
        .bind(req.is_staff)
        .bind(flags.whatsapp_service)
        .bind(flags.license_service)
        .bind(flags.email_service)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                PanelError::Conflict(format!("Username {} already taken", req.username))
            }
            other => PanelError::Database(other),
        })?;

        let user_id = result.last_insert_rowid();
        tracing::info!(user_id, username = %req.username, is_staff = req.is_staff, "user created");

        self.get_user(user_id).await
    }

    /// Create the configured staff account if no user by that name exists
    ///
    /// Returns true when a user was created.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> PanelResult<bool> {
        if self.get_user_by_username(username).await?.is_some() {
            tracing::debug!(username, "bootstrap admin already present");
            return Ok(false);
        }

        self.create_user(CreateUserRequest {
            username: username.to_string(),
            password: password.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: None,
            is_staff: true,
            services: ServiceUpdate {
                whatsapp_service: Some(true),
                license_service: Some(true),
                email_service: Some(true),
            },
        })
        .await?;

        tracing::info!(username, "bootstrap admin created");
        Ok(true)
    }

    /// Authenticate a user and create a session
    pub async fn login(&self, username: &str, password: &str) -> PanelResult<(User, Session)> {
        let invalid = || PanelError::Authentication("Invalid username or password".to_string());

        let user = self.get_user_by_username(username).await?.ok_or_else(invalid)?;

        if !password::verify_password(password, &user.password_hash)? {
            return Err(invalid());
        }

        // Inactive users get the same answer as a wrong password
        if !user.is_active {
            return Err(invalid());
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login = ?1 WHERE id = ?2")
            .bind(now)
            .bind(user.id)
            .execute(&self.db)
            .await?;

        let session = self.create_session(user.id).await?;

        Ok((
            User {
                last_login: Some(now),
                ..user
            },
            session,
        ))
    }

    /// Create a session for a user
    pub async fn create_session(&self, user_id: i64) -> PanelResult<Session> {
        let session_id = Uuid::new_v4().to_string();
        let ttl = Duration::hours(self.config.authentication.session_ttl_hours);

        let access_token = self.generate_access_token(user_id, &session_id, ttl)?;

        let now = Utc::now();
        let expires_at = now + ttl;

        sqlx::query(
            "INSERT INTO session (id, user_id, access_token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(&access_token)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(Session {
            id: session_id,
            user_id,
            access_token,
            created_at: now,
            expires_at,
        })
    }

    /// Validate access token and return session info
    pub async fn validate_access_token(&self, token: &str) -> PanelResult<ValidatedSession> {
        crate::auth::verify_jwt_token(token, &self.config.authentication.jwt_secret)?;

        let row = sqlx::query("SELECT id, user_id, expires_at FROM session WHERE access_token = ?1")
            .bind(token)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| PanelError::Authentication("Invalid or expired session".to_string()))?;

        let session_id: String = row.get("id");
        let user_id: i64 = row.get("user_id");
        let expires_at: chrono::DateTime<Utc> = row.get("expires_at");

        if Utc::now() > expires_at {
            return Err(PanelError::Authentication("Session expired".to_string()));
        }

        Ok(ValidatedSession {
            user_id,
            session_id,
        })
    }

    /// Delete a session (logout)
    pub async fn delete_session(&self, session_id: &str) -> PanelResult<()> {
        sqlx::query("DELETE FROM session WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Get user by id
    pub async fn get_user(&self, user_id: i64) -> PanelResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| PanelError::NotFound("User not found".to_string()))
    }

    /// Get user by username
    pub async fn get_user_by_username(&self, username: &str) -> PanelResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// List users ordered by username
    pub async fn list_users(&self, active_only: bool) -> PanelResult<Vec<User>> {
        let query = if active_only {
            format!("SELECT {} FROM users WHERE is_active = 1 ORDER BY username", USER_COLUMNS)
        } else {
            format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS)
        };

        let users = sqlx::query_as::<_, User>(&query).fetch_all(&self.db).await?;

        Ok(users)
    }

    /// Update a user's service flags; unspecified flags keep their value
    pub async fn set_services(&self, user_id: i64, update: &ServiceUpdate) -> PanelResult<User> {
        let user = self.get_user(user_id).await?;
        if update.is_empty() {
            return Ok(user);
        }

        let flags = update.apply(ServiceFlags::from(&user));

        sqlx::query(
            "UPDATE users SET whatsapp_service = ?1, license_service = ?2, email_service = ?3
             WHERE id = ?4",
        )
        .bind(flags.whatsapp_service)
        .bind(flags.license_service)
        .bind(flags.email_service)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        tracing::info!(
            user_id,
            whatsapp_service = flags.whatsapp_service,
            license_service = flags.license_service,
            email_service = flags.email_service,
            "service flags updated"
        );

        Ok(User {
            whatsapp_service: flags.whatsapp_service,
            license_service: flags.license_service,
            email_service: flags.email_service,
            ..user
        })
    }

    /// Activate or deactivate a user; deactivation ends their sessions
    pub async fn set_active(&self, user_id: i64, is_active: bool) -> PanelResult<User> {
        let result = sqlx::query("UPDATE users SET is_active = ?1 WHERE id = ?2")
            .bind(is_active)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PanelError::NotFound("User not found".to_string()));
        }

        if !is_active {
            let ended = sqlx::query("DELETE FROM session WHERE user_id = ?1")
                .bind(user_id)
                .execute(&self.db)
                .await?
                .rows_affected();
            tracing::info!(user_id, sessions_ended = ended, "user deactivated");
        }

        self.get_user(user_id).await
    }

    /// Generate access JWT token
    fn generate_access_token(
        &self,
        user_id: i64,
        session_id: &str,
        ttl: Duration,
    ) -> PanelResult<String> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Serialize, Deserialize)]
        struct Claims {
            sub: String,
            sid: String,
            iat: i64,
            exp: i64,
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            sid: session_id.to_string(),
            iat: now,
            exp: now + ttl.num_seconds(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(signing_failed)
    }

    /// Cleanup expired sessions
    ///
    /// Called hourly by the job scheduler. Returns the number of sessions removed.
    pub async fn cleanup_expired_sessions(&self) -> PanelResult<u64> {
        let result = sqlx::query("DELETE FROM session WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        let sessions_deleted = result.rows_affected();

        if sessions_deleted > 0 {
            tracing::info!(sessions_deleted, "Cleaned up expired sessions");
        } else {
            tracing::debug!("Session cleanup: no expired sessions found");
        }

        Ok(sessions_deleted)
    }

    /// Count sessions that have not expired
    pub async fn count_active_sessions(&self) -> PanelResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM session WHERE expires_at > ?1")
            .bind(Utc::now())
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Validate username format
    fn validate_username(&self, username: &str) -> PanelResult<()> {
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            return Err(PanelError::Validation(
                "Username may only contain letters, digits and @/./+/-/_".to_string(),
            ));
        }

        Ok(())
    }
}

/// Token signing failures are server errors
fn signing_failed(e: jsonwebtoken::errors::Error) -> PanelError {
    PanelError::Internal(format!("Failed to generate token: {}", e))
}
