/// License store backed by SQLite
use crate::{
    db::license::{License, LicenseWithOwner, UsageLog},
    error::{PanelError, PanelResult},
    licensing::{actions, keys, LicenseFilter, LicenseStats, StatusFilter, Verification},
    metrics,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const LICENSE_COLUMNS: &str = "id, license_key, user_id, is_active, created_at, updated_at";

/// Attempts before giving up on finding an unused key
const MAX_KEY_ATTEMPTS: usize = 5;

const NOT_FOUND_OR_DENIED: &str = "License not found or access denied";

/// License manager
#[derive(Clone)]
pub struct LicenseManager {
    db: SqlitePool,
}

impl LicenseManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create an active license owned by `owner_id` with a fresh key
    pub async fn create(&self, owner_id: i64) -> PanelResult<License> {
        self.create_with_keys(owner_id, keys::generate_key).await
    }

    async fn create_with_keys<F>(&self, owner_id: i64, mut next_key: F) -> PanelResult<License>
    where
        F: FnMut() -> String,
    {
        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let key = next_key();
            let now = Utc::now();

            let inserted = sqlx::query_as::<_, License>(&format!(
                "INSERT INTO license (license_key, user_id, is_active, created_at, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?3)
                 RETURNING {}",
                LICENSE_COLUMNS
            ))
            .bind(&key)
            .bind(owner_id)
            .bind(now)
            .fetch_one(&self.db)
            .await;

            match inserted {
                Ok(license) => {
                    self.log_usage(license.id, actions::CREATE).await?;
                    metrics::record_license_operation(actions::CREATE);
                    tracing::info!(license_id = license.id, owner_id, key = %license.key, "license created");
                    return Ok(license);
                }
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    tracing::warn!(attempt, "generated license key already exists, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(PanelError::Conflict(
            "Could not generate a unique license key".to_string(),
        ))
    }

    /// Get a license by id
    pub async fn get(&self, id: i64) -> PanelResult<License> {
        sqlx::query_as::<_, License>(&format!(
            "SELECT {} FROM license WHERE id = ?1",
            LICENSE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| PanelError::NotFound("License not found".to_string()))
    }

    /// Get a license only if `user_id` owns it
    pub async fn get_owned(&self, id: i64, user_id: i64) -> PanelResult<License> {
        sqlx::query_as::<_, License>(&format!(
            "SELECT {} FROM license WHERE id = ?1 AND user_id = ?2",
            LICENSE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| PanelError::NotFound(NOT_FOUND_OR_DENIED.to_string()))
    }

    /// Look up a license by key
    pub async fn get_by_key(&self, key: &str) -> PanelResult<Option<License>> {
        let license = sqlx::query_as::<_, License>(&format!(
            "SELECT {} FROM license WHERE license_key = ?1",
            LICENSE_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        Ok(license)
    }

    /// Set the active flag on a license owned by `user_id`
    pub async fn set_active(&self, id: i64, user_id: i64, is_active: bool) -> PanelResult<License> {
        let license = sqlx::query_as::<_, License>(&format!(
            "UPDATE license SET is_active = ?1, updated_at = ?2
             WHERE id = ?3 AND user_id = ?4
             RETURNING {}",
            LICENSE_COLUMNS
        ))
        .bind(is_active)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| PanelError::NotFound(NOT_FOUND_OR_DENIED.to_string()))?;

        let action = if is_active { actions::ACTIVATE } else { actions::DEACTIVATE };
        self.log_usage(license.id, action).await?;
        metrics::record_license_operation(action);
        tracing::info!(license_id = id, user_id, is_active, "license updated");

        Ok(license)
    }

    /// Flip the active flag on a license owned by `user_id`
    ///
    /// Runs as a single statement so each call flips exactly once, even
    /// under concurrent toggles. Returns the new state.
    pub async fn toggle(&self, id: i64, user_id: i64) -> PanelResult<bool> {
        let is_active: bool = sqlx::query_scalar(
            "UPDATE license SET is_active = NOT is_active, updated_at = ?1
             WHERE id = ?2 AND user_id = ?3
             RETURNING is_active",
        )
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| PanelError::NotFound(NOT_FOUND_OR_DENIED.to_string()))?;

        let action = if is_active { actions::ACTIVATE } else { actions::DEACTIVATE };
        self.log_usage(id, action).await?;
        metrics::record_license_operation(action);
        tracing::info!(license_id = id, user_id, is_active, "license toggled");

        Ok(is_active)
    }

    /// Delete a license, returning its key
    pub async fn delete(&self, id: i64) -> PanelResult<String> {
        let key: String = sqlx::query_scalar("DELETE FROM license WHERE id = ?1 RETURNING license_key")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| PanelError::NotFound("License not found".to_string()))?;

        metrics::record_license_operation("delete");
        tracing::info!(license_id = id, key = %key, "license deleted");

        Ok(key)
    }

    /// List all licenses with owner usernames, newest first
    pub async fn list(&self, filter: &LicenseFilter) -> PanelResult<Vec<LicenseWithOwner>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT l.id, l.license_key, l.user_id, l.is_active, l.created_at, l.updated_at,
                    u.username AS owner_username
             FROM license l
             LEFT JOIN users u ON u.id = l.user_id
             WHERE 1 = 1",
        );

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            query
                .push(" AND (l.license_key LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR u.username LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }

        match filter.status {
            Some(StatusFilter::Active) => {
                query.push(" AND l.is_active = 1");
            }
            Some(StatusFilter::Inactive) => {
                query.push(" AND l.is_active = 0");
            }
            Some(StatusFilter::Assigned) => {
                query.push(" AND l.user_id IS NOT NULL");
            }
            Some(StatusFilter::Unassigned) => {
                query.push(" AND l.user_id IS NULL");
            }
            None => {}
        }

        query.push(" ORDER BY l.created_at DESC, l.id DESC");

        let licenses = query
            .build_query_as::<LicenseWithOwner>()
            .fetch_all(&self.db)
            .await?;

        Ok(licenses)
    }

    /// Licenses owned by a user, newest first
    pub async fn list_for_owner(&self, user_id: i64, active_only: bool) -> PanelResult<Vec<License>> {
        let query = if active_only {
            format!(
                "SELECT {} FROM license WHERE user_id = ?1 AND is_active = 1 ORDER BY created_at DESC, id DESC",
                LICENSE_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM license WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
                LICENSE_COLUMNS
            )
        };

        let licenses = sqlx::query_as::<_, License>(&query)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;

        Ok(licenses)
    }

    /// Counts over every license, ignoring any listing filter
    pub async fn stats(&self) -> PanelResult<LicenseStats> {
        let stats = sqlx::query_as::<_, LicenseStats>(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN is_active = 1 THEN 1 ELSE 0 END), 0) AS active,
                    COALESCE(SUM(CASE WHEN is_active = 0 THEN 1 ELSE 0 END), 0) AS inactive,
                    COALESCE(SUM(CASE WHEN user_id IS NOT NULL THEN 1 ELSE 0 END), 0) AS assigned
             FROM license",
        )
        .fetch_one(&self.db)
        .await?;

        Ok(stats)
    }

    /// Look up a key for an external client
    pub async fn verify(&self, key: &str) -> PanelResult<Verification> {
        let verification = match self.get_by_key(key).await? {
            Some(license) if license.is_active => {
                self.log_usage(license.id, actions::VERIFY).await?;
                Verification::Valid(license)
            }
            Some(license) => {
                self.log_usage(license.id, actions::VERIFY_REJECTED).await?;
                Verification::Inactive(license)
            }
            None => Verification::Unknown,
        };

        metrics::record_license_verification(verification.outcome());
        tracing::debug!(outcome = verification.outcome(), "license verification");

        Ok(verification)
    }

    /// Append a usage log entry
    pub async fn log_usage(&self, license_id: i64, action: &str) -> PanelResult<()> {
        if action.is_empty() || action.len() > 100 {
            return Err(PanelError::Validation(
                "Usage action must be 1-100 characters".to_string(),
            ));
        }

        sqlx::query("INSERT INTO usage_log (license_id, timestamp, action) VALUES (?1, ?2, ?3)")
            .bind(license_id)
            .bind(Utc::now())
            .bind(action)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Usage history of a license, newest first
    pub async fn usage_for(&self, license_id: i64, limit: i64) -> PanelResult<Vec<UsageLog>> {
        let entries = sqlx::query_as::<_, UsageLog>(
            "SELECT id, license_id, timestamp, action FROM usage_log
             WHERE license_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )
        .bind(license_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }
}

/// Build a LIKE pattern matching `needle` literally anywhere
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn setup() -> (LicenseManager, SqlitePool, i64, i64) {
        let pool = db::create_memory_pool().await.unwrap();
        let alice = insert_user(&pool, "alice").await;
        let bob = insert_user(&pool, "bob").await;
        (LicenseManager::new(pool.clone()), pool, alice, bob)
    }

    async fn insert_user(pool: &SqlitePool, username: &str) -> i64 {
        sqlx::query(
            "INSERT INTO users (username, password_hash, date_joined, license_service)
             VALUES (?1, 'x', ?2, 1)",
        )
        .bind(username)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn insert_unassigned(pool: &SqlitePool, key: &str, is_active: bool) -> i64 {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO license (license_key, user_id, is_active, created_at, updated_at)
             VALUES (?1, NULL, ?2, ?3, ?3)",
        )
        .bind(key)
        .bind(is_active)
        .bind(now)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_create_license() {
        let (manager, _, alice, _) = setup().await;

        let license = manager.create(alice).await.unwrap();

        assert!(keys::is_well_formed(&license.key));
        assert_eq!(license.owner_id, Some(alice));
        assert!(license.is_active);

        let usage = manager.usage_for(license.id, 10).await.unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].action, actions::CREATE);
    }

    #[tokio::test]
    async fn test_create_retries_on_key_collision() {
        let (manager, pool, alice, _) = setup().await;
        insert_unassigned(&pool, "LIC-AAAAAAAAAAAAAAAA", true).await;

        let mut candidates = vec!["LIC-BBBBBBBBBBBBBBBB", "LIC-AAAAAAAAAAAAAAAA"];
        let license = manager
            .create_with_keys(alice, || candidates.pop().unwrap().to_string())
            .await
            .unwrap();

        assert_eq!(license.key, "LIC-BBBBBBBBBBBBBBBB");
    }

    #[tokio::test]
    async fn test_create_gives_up_after_repeated_collisions() {
        let (manager, pool, alice, _) = setup().await;
        insert_unassigned(&pool, "LIC-AAAAAAAAAAAAAAAA", true).await;

        let result = manager
            .create_with_keys(alice, || "LIC-AAAAAAAAAAAAAAAA".to_string())
            .await;

        assert!(matches!(result, Err(PanelError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_toggle_flips_once_per_call() {
        let (manager, _, alice, _) = setup().await;
        let license = manager.create(alice).await.unwrap();

        assert!(!manager.toggle(license.id, alice).await.unwrap());
        assert!(!manager.get(license.id).await.unwrap().is_active);

        assert!(manager.toggle(license.id, alice).await.unwrap());
        assert!(manager.get(license.id).await.unwrap().is_active);

        assert!(!manager.toggle(license.id, alice).await.unwrap());
    }

    #[tokio::test]
    async fn test_toggle_requires_ownership() {
        let (manager, _, alice, bob) = setup().await;
        let license = manager.create(alice).await.unwrap();

        let result = manager.toggle(license.id, bob).await;
        assert!(matches!(result, Err(PanelError::NotFound(_))));
        assert!(manager.get(license.id).await.unwrap().is_active);

        let missing = manager.toggle(9999, alice).await;
        assert!(matches!(missing, Err(PanelError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_active() {
        let (manager, _, alice, bob) = setup().await;
        let license = manager.create(alice).await.unwrap();

        let updated = manager.set_active(license.id, alice, false).await.unwrap();
        assert!(!updated.is_active);
        assert!(updated.updated_at >= license.updated_at);

        // Setting the same value again is not a toggle
        let updated = manager.set_active(license.id, alice, false).await.unwrap();
        assert!(!updated.is_active);

        assert!(manager.set_active(license.id, bob, true).await.is_err());
        assert!(manager.get_owned(license.id, bob).await.is_err());
        assert!(manager.get_owned(license.id, alice).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_license() {
        let (manager, _, alice, _) = setup().await;
        let license = manager.create(alice).await.unwrap();
        manager.verify(&license.key).await.unwrap();

        let key = manager.delete(license.id).await.unwrap();
        assert_eq!(key, license.key);

        assert!(matches!(manager.get(license.id).await, Err(PanelError::NotFound(_))));
        assert!(manager.usage_for(license.id, 10).await.unwrap().is_empty());
        assert!(matches!(manager.delete(license.id).await, Err(PanelError::NotFound(_))));

    }

    #[tokio::test]
    async fn test_verify_branches() {
        let (manager, _, alice, _) = setup().await;
        let license = manager.create(alice).await.unwrap();

        match manager.verify(&license.key).await.unwrap() {
            Verification::Valid(found) => assert_eq!(found.id, license.id),
            other => panic!("expected valid, got {:?}", other),
        }

        manager.toggle(license.id, alice).await.unwrap();
        assert!(matches!(
            manager.verify(&license.key).await.unwrap(),
            Verification::Inactive(_)
        ));

        assert_eq!(
            manager.verify("LIC-DOESNOTEXIST0000").await.unwrap(),
            Verification::Unknown
        );

        let actions: Vec<String> = manager
            .usage_for(license.id, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.action)
            .collect();
        assert!(actions.contains(&actions::VERIFY.to_string()));
        assert!(actions.contains(&actions::VERIFY_REJECTED.to_string()));
    }

    #[tokio::test]
    async fn test_list_filters_and_stats() {
        let (manager, pool, alice, bob) = setup().await;
        let a1 = manager.create(alice).await.unwrap();
        let _a2 = manager.create(alice).await.unwrap();
        let b1 = manager.create(bob).await.unwrap();
        manager.toggle(b1.id, bob).await.unwrap();
        insert_unassigned(&pool, "LIC-UNASSIGNED000000", true).await;

        let all = manager.list(&LicenseFilter::default()).await.unwrap();
        assert_eq!(all.len(), 4);

        let active = manager
            .list(&LicenseFilter {
                status: Some(StatusFilter::Active),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 3);

        let inactive = manager
            .list(&LicenseFilter {
                status: Some(StatusFilter::Inactive),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].license.id, b1.id);
        assert_eq!(inactive[0].owner_username.as_deref(), Some("bob"));

        let unassigned = manager
            .list(&LicenseFilter {
                status: Some(StatusFilter::Unassigned),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(unassigned.len(), 1);
        assert!(unassigned[0].owner_username.is_none());

        let assigned = manager
            .list(&LicenseFilter {
                status: Some(StatusFilter::Assigned),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(assigned.len(), 3);

        // Search matches owner username case-insensitively
        let by_owner = manager
            .list(&LicenseFilter {
                search: Some("ALI".to_string()),
                status: None,
            })
            .await
            .unwrap();
        assert_eq!(by_owner.len(), 2);

        // ...and key substrings
        let by_key = manager
            .list(&LicenseFilter {
                search: Some(a1.key[4..12].to_lowercase()),
                status: None,
            })
            .await
            .unwrap();
        assert!(by_key.iter().any(|l| l.license.id == a1.id));

        // Wildcards in the search are literal
        let wildcard = manager
            .list(&LicenseFilter {
                search: Some("%".to_string()),
                status: None,
            })
            .await
            .unwrap();
        assert!(wildcard.is_empty());

        let stats = manager.stats().await.unwrap();
        assert_eq!(
            stats,
            LicenseStats {
                total: 4,
                active: 3,
                inactive: 1,
                assigned: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_stats_on_empty_store() {
        let (manager, _, _, _) = setup().await;
        let stats = manager.stats().await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.assigned, 0);
    }

    #[tokio::test]
    async fn test_list_for_owner() {
        let (manager, _, alice, bob) = setup().await;
        let a1 = manager.create(alice).await.unwrap();
        manager.create(alice).await.unwrap();
        manager.create(bob).await.unwrap();
        manager.toggle(a1.id, alice).await.unwrap();

        assert_eq!(manager.list_for_owner(alice, false).await.unwrap().len(), 2);
        assert_eq!(manager.list_for_owner(alice, true).await.unwrap().len(), 1);
        assert_eq!(manager.list_for_owner(bob, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_owner_deletion_cascades() {
        let (manager, pool, alice, _) = setup().await;
        let license = manager.create(alice).await.unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(alice)
            .execute(&pool)
            .await
            .unwrap();

        assert!(manager.get(license.id).await.is_err());
    }

    #[tokio::test]
    async fn test_log_usage_rejects_long_action() {
        let (manager, _, alice, _) = setup().await;
        let license = manager.create(alice).await.unwrap();

        let long = "x".repeat(101);
        assert!(matches!(
            manager.log_usage(license.id, &long).await,
            Err(PanelError::Validation(_))
        ));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
