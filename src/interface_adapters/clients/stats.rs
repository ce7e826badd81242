use crate::domain::ports::StatsRepository;
use crate::domain::state::{AccountFlag, AccountFlags, Identity};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Stored account row: flags plus lifetime totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountRecord {
    pub username: String,
    pub flags: AccountFlags,
    pub games_played: u64,
    pub total_score: u64,
    pub total_kills: u64,
}

// In-memory account store for tests and runs without a database.
#[derive(Clone, Default)]
pub struct InMemoryStatsRepository {
    accounts: Arc<Mutex<HashMap<u64, AccountRecord>>>,
}

impl InMemoryStatsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, account_id: u64) -> Option<AccountRecord> {
        self.accounts.lock().await.get(&account_id).cloned()
    }

    /// Seeds or overwrites an account's flags.
    pub async fn put_flags(&self, account_id: u64, flags: AccountFlags) {
        self.accounts
            .lock()
            .await
            .entry(account_id)
            .or_default()
            .flags = flags;
    }
}

#[async_trait]
impl StatsRepository for InMemoryStatsRepository {
    async fn ensure_account(&self, identity: &Identity) -> Result<(), String> {
        let mut accounts = self.accounts.lock().await;
        let record = accounts
            .entry(identity.account_id)
            .or_insert_with(|| AccountRecord {
                flags: AccountFlags {
                    is_admin: identity.is_admin,
                    is_moderator: identity.is_moderator,
                    ..AccountFlags::default()
                },
                ..AccountRecord::default()
            });
        record.username = identity.username.clone();
        Ok(())
    }

    async fn account_flags(&self, account_id: u64) -> Result<AccountFlags, String> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .get(&account_id)
            .map(|r| r.flags.clone())
            .unwrap_or_default())
    }

    async fn set_flag(&self, account_id: u64, flag: AccountFlag) -> Result<(), String> {
        let mut accounts = self.accounts.lock().await;
        let flags = &mut accounts.entry(account_id).or_default().flags;
        match flag {
            AccountFlag::GodMode(on) => flags.god_mode = on,
            AccountFlag::Moderator(on) => flags.is_moderator = on,
            AccountFlag::MutedUntil(until) => flags.muted_until = until,
            AccountFlag::Banned(reason) => flags.banned_reason = reason,
        }
        Ok(())
    }

    async fn record_game_end(&self, account_id: u64, score: u32, kills: u32) -> Result<(), String> {
        let mut accounts = self.accounts.lock().await;
        let record = accounts.entry(account_id).or_default();
        record.games_played += 1;
        record.total_score += u64::from(score);
        record.total_kills += u64::from(kills);
        Ok(())
    }
}

// PostgreSQL-backed account store.
#[derive(Clone)]
pub struct PostgresStatsRepository {
    pub db: PgPool,
}

impl PostgresStatsRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn db_id(account_id: u64) -> Result<i64, String> {
    i64::try_from(account_id).map_err(|_| format!("account id {account_id} out of range"))
}

fn db_err(e: sqlx::Error) -> String {
    e.to_string()
}

#[async_trait]
impl StatsRepository for PostgresStatsRepository {
    async fn ensure_account(&self, identity: &Identity) -> Result<(), String> {
        // Roles from the identity only seed new rows; stored flags win afterwards.
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, username, is_admin, is_moderator)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (account_id) DO UPDATE SET
                username = EXCLUDED.username,
                last_seen_at = now()
            "#,
        )
        .bind(db_id(identity.account_id)?)
        .bind(identity.username.as_str())
        .bind(identity.is_admin)
        .bind(identity.is_moderator)
        .execute(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn account_flags(&self, account_id: u64) -> Result<AccountFlags, String> {
        let row: Option<(bool, bool, bool, Option<i64>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT is_admin, is_moderator, god_mode, muted_until, banned_reason
            FROM accounts
            WHERE account_id = $1
            "#,
        )
        .bind(db_id(account_id)?)
        .fetch_optional(&self.db)
        .await
        .map_err(db_err)?;

        Ok(row
            .map(
                |(is_admin, is_moderator, god_mode, muted_until, banned_reason)| AccountFlags {
                    is_admin,
                    is_moderator,
                    god_mode,
                    muted_until: muted_until.and_then(|t| u64::try_from(t).ok()),
                    banned_reason,
                },
            )
            .unwrap_or_default())
    }

    async fn set_flag(&self, account_id: u64, flag: AccountFlag) -> Result<(), String> {
        let id = db_id(account_id)?;
        let query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> = match flag {
            AccountFlag::GodMode(on) => {
                sqlx::query("UPDATE accounts SET god_mode = $2 WHERE account_id = $1")
                    .bind(id)
                    .bind(on)
            }
            AccountFlag::Moderator(on) => {
                sqlx::query("UPDATE accounts SET is_moderator = $2 WHERE account_id = $1")
                    .bind(id)
                    .bind(on)
            }
            AccountFlag::MutedUntil(until) => {
                let until = until.map(|t| i64::try_from(t).unwrap_or(i64::MAX));
                sqlx::query("UPDATE accounts SET muted_until = $2 WHERE account_id = $1")
                    .bind(id)
                    .bind(until)
            }
            AccountFlag::Banned(reason) => {
                sqlx::query("UPDATE accounts SET banned_reason = $2 WHERE account_id = $1")
                    .bind(id)
                    .bind(reason)
            }
        };
        query.execute(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn record_game_end(&self, account_id: u64, score: u32, kills: u32) -> Result<(), String> {
        sqlx::query(
            r#"
            UPDATE accounts SET
                games_played = games_played + 1,
                total_score = total_score + $2,
                total_kills = total_kills + $3
            WHERE account_id = $1
            "#,
        )
        .bind(db_id(account_id)?)
        .bind(i64::from(score))
        .bind(i64::from(kills))
        .execute(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
