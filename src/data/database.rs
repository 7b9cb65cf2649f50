//! SQLite database operations
//!
//! All database access goes through this module.
//! Uses SQLx with migrations applied at connect time.
//!
//! Every query has an `*_in` form that runs against any executor, so
//! the identity-linking flow can compose `create` + `bind` inside one
//! transaction obtained from [`Database::begin`].

use std::path::Path;

use chrono::Utc;
use sqlx::{Pool, Sqlite, SqliteExecutor, SqlitePool, Transaction};

use super::models::{Identity, VendorLink};
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to the SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Begin a transaction for multi-statement atomic flows.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin().await?)
    }

    /// The underlying pool, for callers composing their own executor.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    // =========================================================================
    // Identities
    // =========================================================================

    /// Get an identity by primary key
    pub async fn find_identity(&self, id: &str) -> Result<Option<Identity>, AppError> {
        Self::find_identity_in(&self.pool, id).await
    }

    pub async fn find_identity_in<'e>(
        executor: impl SqliteExecutor<'e>,
        id: &str,
    ) -> Result<Option<Identity>, AppError> {
        let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(identity)
    }

    /// Get an identity by normalized email
    ///
    /// Callers are expected to have normalized the email already; the
    /// lookup is exact.
    pub async fn find_identity_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        Self::find_identity_by_email_in(&self.pool, email).await
    }

    pub async fn find_identity_by_email_in<'e>(
        executor: impl SqliteExecutor<'e>,
        email: &str,
    ) -> Result<Option<Identity>, AppError> {
        let identity = sqlx::query_as::<_, Identity>("SELECT * FROM identities WHERE email = ?")
            .bind(email)
            .fetch_optional(executor)
            .await?;

        Ok(identity)
    }

    /// Insert a new identity
    ///
    /// A unique violation on the email column maps to
    /// [`AppError::EmailRegistered`]; two racing registrations resolve
    /// at this constraint.
    pub async fn create_identity(&self, identity: &Identity) -> Result<(), AppError> {
        Self::create_identity_in(&self.pool, identity).await
    }

    pub async fn create_identity_in<'e>(
        executor: impl SqliteExecutor<'e>,
        identity: &Identity,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO identities (
                id, email, password_hash, password_salt, session_salt,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(&identity.password_salt)
        .bind(&identity.session_salt)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(executor)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(AppError::EmailRegistered),
            Err(e) => Err(e.into()),
        }
    }

    /// Update a persisted identity's mutable fields
    pub async fn update_identity(&self, identity: &Identity) -> Result<(), AppError> {
        Self::update_identity_in(&self.pool, identity).await
    }

    pub async fn update_identity_in<'e>(
        executor: impl SqliteExecutor<'e>,
        identity: &Identity,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET email = ?, password_hash = ?, password_salt = ?,
                session_salt = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(&identity.password_salt)
        .bind(&identity.session_salt)
        .bind(Utc::now())
        .bind(&identity.id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::IdentityNotFound);
        }
        Ok(())
    }

    // =========================================================================
    // Vendor links
    // =========================================================================

    /// Bind a vendor user to an identity, upserting on rebind
    pub async fn bind_vendor(
        &self,
        identity_id: &str,
        vendor: &str,
        vendor_user_id: &str,
    ) -> Result<(), AppError> {
        Self::bind_vendor_in(&self.pool, identity_id, vendor, vendor_user_id).await
    }

    pub async fn bind_vendor_in<'e>(
        executor: impl SqliteExecutor<'e>,
        identity_id: &str,
        vendor: &str,
        vendor_user_id: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO vendor_links (
                identity_id, vendor, vendor_user_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (identity_id, vendor) DO UPDATE SET
                vendor_user_id = excluded.vendor_user_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(identity_id)
        .bind(vendor)
        .bind(vendor_user_id)
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Find the identity id linked to a vendor user, if any
    pub async fn find_identity_id_by_vendor(
        &self,
        vendor: &str,
        vendor_user_id: &str,
    ) -> Result<Option<String>, AppError> {
        let id: Option<(String,)> = sqlx::query_as(
            "SELECT identity_id FROM vendor_links WHERE vendor = ? AND vendor_user_id = ?",
        )
        .bind(vendor)
        .bind(vendor_user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(|(id,)| id))
    }

    /// Get the link row for `(identity, vendor)`, if any
    pub async fn find_vendor_link(
        &self,
        identity_id: &str,
        vendor: &str,
    ) -> Result<Option<VendorLink>, AppError> {
        let link = sqlx::query_as::<_, VendorLink>(
            "SELECT * FROM vendor_links WHERE identity_id = ? AND vendor = ?",
        )
        .bind(identity_id)
        .bind(vendor)
        .fetch_optional(&self.pool)
        .await?;

        Ok(link)
    }

    /// Count link rows for one identity (test support)
    pub async fn count_vendor_links(&self, identity_id: &str) -> Result<i64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM vendor_links WHERE identity_id = ?")
                .bind(identity_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation))
}
