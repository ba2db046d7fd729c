use crate::errors::{LedgerError, Result};
use crate::models::{Account, ActivityEvent, GlobalLock, LeaderboardEntry};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub struct Database {
    pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Point read of an account by username.
    pub async fn get_account(&self, username: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Create an account. Returns `None` when the username already exists,
    /// which makes concurrent first-registrations race-safe: exactly one
    /// caller wins the insert, the other falls back to the login path.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_account(
        &self,
        username: &str,
        balance: Decimal,
        identity_hash: &str,
        social_id: Option<&str>,
        bio: &str,
        country: &str,
        join_event: ActivityEvent,
    ) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username, balance, identity_hash, social_id, bio, country, join_date, activity, warning)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL)
            ON CONFLICT (username) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(balance)
        .bind(identity_hash)
        .bind(social_id)
        .bind(bio)
        .bind(country)
        .bind(Utc::now())
        .bind(Json(vec![join_event]))
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Record the most recent network origin for an existing account.
    pub async fn refresh_identity_hash(
        &self,
        username: &str,
        identity_hash: &str,
    ) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET identity_hash = $2
            WHERE username = $1
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(identity_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Atomically credit a mining reward, guarded by the stored fingerprint.
    ///
    /// The fingerprint check and the increment are a single conditional
    /// update, so a concurrent login that rotates the fingerprint either
    /// happens before this statement (guard miss, no credit) or after it
    /// (credit applied). Returns the new balance, or `None` on a guard miss.
    pub async fn credit_mining(
        &self,
        username: &str,
        claimed_fingerprint: &str,
        amount: Decimal,
    ) -> Result<Option<Decimal>> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE accounts
            SET balance = balance + $3
            WHERE username = $1 AND identity_hash = $2
            RETURNING balance
            "#,
        )
        .bind(username)
        .bind(claimed_fingerprint)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance)
    }

    /// Move `amount` from sender to recipient in one transaction.
    ///
    /// The debit re-checks `balance >= amount` at commit time, so a
    /// concurrent spend cannot drive the sender negative; the row locks
    /// taken by the two updates serialize conflicting transfers. Returns
    /// the sender's new balance, or `None` when the debit guard failed.
    pub async fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: Decimal,
    ) -> Result<Option<Decimal>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(LedgerError::from_commit_error)?;

        let new_balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE accounts
            SET balance = balance - $2
            WHERE username = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(sender)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(LedgerError::from_commit_error)?;

        let Some(new_balance) = new_balance else {
            // Dropping the transaction rolls it back.
            return Ok(None);
        };

        let credited = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE accounts
            SET balance = balance + $2
            WHERE username = $1
            RETURNING balance
            "#,
        )
        .bind(recipient)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(LedgerError::from_commit_error)?;

        if credited.is_none() {
            // Recipient vanished between the precondition read and the
            // commit; roll the debit back with the transaction.
            return Err(LedgerError::AccountNotFound(recipient.to_string()));
        }

        tx.commit().await.map_err(LedgerError::from_commit_error)?;

        Ok(Some(new_balance))
    }

    /// Append one event to an account's activity log.
    ///
    /// `jsonb || jsonb` is a single-statement append, so concurrent writers
    /// interleave without losing entries.
    pub async fn append_activity(&self, username: &str, event: &ActivityEvent) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET activity = activity || $2
            WHERE username = $1
            "#,
        )
        .bind(username)
        .bind(Json(event))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set or clear an account's moderation warning.
    pub async fn set_warning(&self, username: &str, warning: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET warning = $2
            WHERE username = $1
            "#,
        )
        .bind(username)
        .bind(warning)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Holder-editable descriptive metadata. Never touches balance,
    /// identity hash, or warning.
    pub async fn update_profile(
        &self,
        username: &str,
        bio: Option<&str>,
        country: Option<&str>,
    ) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET bio = COALESCE($2, bio),
                country = COALESCE($3, country)
            WHERE username = $1
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(bio)
        .bind(country)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Remove an account row entirely. Irreversible.
    pub async fn delete_account(&self, username: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM accounts WHERE username = $1
            "#,
        )
        .bind(username)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Snapshot scan ordered by balance descending. Not transactional with
    /// respect to in-flight transfers.
    pub async fn top_accounts(&self) -> Result<Vec<LeaderboardEntry>> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT username, balance, country
            FROM accounts
            ORDER BY balance DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Read the singleton lock row. A missing row means unlocked.
    pub async fn get_global_lock(&self) -> Result<GlobalLock> {
        let lock = sqlx::query_as::<_, GlobalLock>(
            r#"
            SELECT is_locked, lock_message FROM global_lock WHERE id = TRUE
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(lock.unwrap_or_default())
    }

    /// Upsert the singleton lock row.
    pub async fn set_global_lock(&self, is_locked: bool, lock_message: &str) -> Result<GlobalLock> {
        let lock = sqlx::query_as::<_, GlobalLock>(
            r#"
            INSERT INTO global_lock (id, is_locked, lock_message)
            VALUES (TRUE, $1, $2)
            ON CONFLICT (id) DO UPDATE SET is_locked = $1, lock_message = $2
            RETURNING is_locked, lock_message
            "#,
        )
        .bind(is_locked)
        .bind(lock_message)
        .fetch_one(&self.pool)
        .await?;

        Ok(lock)
    }
}
