use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{Preferences, UserId};

/// Local sqlite-backed store: user preferences (single row), per-user
/// analytics counters, and the cached profile of the signed-in account.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredUserProfile {
    pub user_id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    // -- preferences ---------------------------------------------------------

    pub async fn preferences(&self) -> Result<Preferences> {
        let row = sqlx::query(
            "SELECT dark_theme, reading_seconds_total, notif_breaking, notif_daily
             FROM preferences WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await
        .context("preferences row missing; migrations not applied")?;
        Ok(Preferences {
            dark_theme: row.get::<bool, _>(0),
            reading_seconds_total: row.get::<i64, _>(1),
            notif_breaking: row.get::<bool, _>(2),
            notif_daily: row.get::<bool, _>(3),
        })
    }

    pub async fn set_dark_theme(&self, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE preferences SET dark_theme = ? WHERE id = 1")
            .bind(enabled)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Flips the theme flag in place and returns the new value.
    pub async fn toggle_dark_theme(&self) -> Result<bool> {
        let rec = sqlx::query(
            "UPDATE preferences SET dark_theme = NOT dark_theme WHERE id = 1
             RETURNING dark_theme",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.get::<bool, _>(0))
    }

    /// Adds to the cumulative reading counter. Non-positive amounts are
    /// rejected before touching the database.
    pub async fn add_reading_seconds(&self, seconds: i64) -> Result<i64> {
        if seconds <= 0 {
            bail!("reading seconds must be positive, got {seconds}");
        }
        let rec = sqlx::query(
            "UPDATE preferences SET reading_seconds_total = reading_seconds_total + ?
             WHERE id = 1
             RETURNING reading_seconds_total",
        )
        .bind(seconds)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.get::<i64, _>(0))
    }

    pub async fn set_breaking_opt_in(&self, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE preferences SET notif_breaking = ? WHERE id = 1")
            .bind(enabled)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_daily_opt_in(&self, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE preferences SET notif_daily = ? WHERE id = 1")
            .bind(enabled)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -- analytics counters --------------------------------------------------

    pub async fn log_action(&self, user_id: &UserId, action: &str) -> Result<i64> {
        let rec = sqlx::query(
            "INSERT INTO analytics_events (user_id, action, count, updated_at)
             VALUES (?, ?, 1, CURRENT_TIMESTAMP)
             ON CONFLICT(user_id, action)
             DO UPDATE SET count = count + 1, updated_at = CURRENT_TIMESTAMP
             RETURNING count",
        )
        .bind(&user_id.0)
        .bind(action)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.get::<i64, _>(0))
    }

    pub async fn analytics_summary(&self, user_id: &UserId) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT action, count FROM analytics_events
             WHERE user_id = ?
             ORDER BY action ASC",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get::<String, _>(0), r.get::<i64, _>(1)))
            .collect())
    }

    pub async fn clear_analytics(&self, user_id: &UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM analytics_events WHERE user_id = ?")
            .bind(&user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn clear_action(&self, user_id: &UserId, action: &str) -> Result<()> {
        sqlx::query("DELETE FROM analytics_events WHERE user_id = ? AND action = ?")
            .bind(&user_id.0)
            .bind(action)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -- cached user profile -------------------------------------------------

    pub async fn upsert_user_profile(
        &self,
        user_id: &UserId,
        email: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id, email, display_name, photo_url)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 email = excluded.email,
                 display_name = excluded.display_name,
                 photo_url = excluded.photo_url",
        )
        .bind(&user_id.0)
        .bind(email)
        .bind(display_name)
        .bind(photo_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn user_profile(&self, user_id: &UserId) -> Result<Option<StoredUserProfile>> {
        let row = sqlx::query(
            "SELECT user_id, email, display_name, photo_url, created_at
             FROM user_profiles WHERE user_id = ?",
        )
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| StoredUserProfile {
            user_id: UserId(r.get::<String, _>(0)),
            email: r.get::<String, _>(1),
            display_name: r.get::<Option<String>, _>(2),
            photo_url: r.get::<Option<String>, _>(3),
            created_at: parse_sqlite_timestamp(&r.get::<String, _>(4)),
        }))
    }

    pub async fn delete_user_profile(&self, user_id: &UserId) -> Result<()> {
        sqlx::query("DELETE FROM user_profiles WHERE user_id = ?")
            .bind(&user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// sqlite's CURRENT_TIMESTAMP is "YYYY-MM-DD HH:MM:SS" in UTC.
fn parse_sqlite_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;
    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
