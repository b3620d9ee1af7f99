use crate::errors::Result;
use crate::models::{CompletedTask, CompletionReceipt, MineReceipt, ReferralEntry, Task, User};
use crate::store::LedgerStore;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::time::Duration;

pub struct Database {
    pool: Pool<Postgres>,
}

const SCHEMA_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id BIGINT PRIMARY KEY,
        username TEXT NOT NULL,
        balance NUMERIC NOT NULL DEFAULT 0,
        mining_rate NUMERIC NOT NULL DEFAULT 0.01,
        last_mined TIMESTAMPTZ,
        referrer_id BIGINT,
        join_date TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    // referrer_id carries no foreign key: a referral payload pointing at an
    // unknown user is accepted, and the bonus update then touches no rows.
    r#"
    CREATE TABLE IF NOT EXISTS referrals (
        id SERIAL PRIMARY KEY,
        referrer_id BIGINT NOT NULL,
        referred_id BIGINT NOT NULL UNIQUE REFERENCES users(user_id),
        date TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id SERIAL PRIMARY KEY,
        title TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL,
        reward NUMERIC NOT NULL,
        required_action TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS completed_tasks (
        id SERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES users(user_id),
        task_id INTEGER NOT NULL REFERENCES tasks(id),
        completion_date TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

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

    /// Create the four ledger tables if they do not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        for ddl in SCHEMA_DDL {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Seed the fixed task set. The unique title makes re-seeding on every
    /// boot idempotent.
    pub async fn seed_tasks(&self) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (title, description, reward, required_action)
            VALUES
                ('Daily Check-in', 'Open the app daily to mine XTX', 0.5, 'daily_check'),
                ('Invite Friends', 'Invite 3 friends to join Xentix', 2.0, 'invite_friends'),
                ('Complete Profile', 'Fill out your mining profile', 1.0, 'complete_profile'),
                ('Join Community', 'Join the Xentix Telegram group', 1.5, 'join_group'),
                ('Share on Social', 'Share about Xentix on social media', 2.5, 'share_social')
            ON CONFLICT (title) DO NOTHING
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LedgerStore for Database {
    async fn create_user(
        &self,
        user_id: i64,
        username: &str,
        mining_rate: Decimal,
        referrer_id: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (user_id, username, mining_rate, last_mined, referrer_id)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(mining_rate)
        .bind(Utc::now())
        .bind(referrer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_referral(
        &self,
        referrer_id: i64,
        referred_id: i64,
        bonus: Decimal,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO referrals (referrer_id, referred_id)
            VALUES ($1, $2)
            ON CONFLICT (referred_id) DO NOTHING
            "#,
        )
        .bind(referrer_id)
        .bind(referred_id)
        .execute(&mut *tx)
        .await?;

        // The bonus follows the referral row, so a replayed registration
        // cannot credit twice.
        if inserted.rows_affected() > 0 {
            sqlx::query("UPDATE users SET balance = balance + $1 WHERE user_id = $2")
                .bind(bonus)
                .bind(referrer_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn apply_mine(
        &self,
        user_id: i64,
        factor: Decimal,
        cooldown_secs: i64,
    ) -> Result<Option<MineReceipt>> {
        let now = Utc::now();

        let receipt = sqlx::query_as::<_, MineReceipt>(
            r#"
            UPDATE users
            SET balance = balance + mining_rate * $2,
                last_mined = $3
            WHERE user_id = $1
              AND (last_mined IS NULL
                   OR last_mined <= $3 - make_interval(secs => $4::double precision))
            RETURNING mining_rate * $2 AS amount, balance, last_mined AS mined_at
            "#,
        )
        .bind(user_id)
        .bind(factor)
        .bind(now)
        .bind(cooldown_secs)
        .fetch_optional(&self.pool)
        .await?;

        Ok(receipt)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(tasks)
    }

    async fn fetch_task(&self, task_id: i32) -> Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(task)
    }

    async fn completions_for_user(&self, user_id: i64) -> Result<Vec<CompletedTask>> {
        let completions = sqlx::query_as::<_, CompletedTask>(
            "SELECT * FROM completed_tasks WHERE user_id = $1 ORDER BY completion_date",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(completions)
    }

    async fn apply_task_completion(
        &self,
        user_id: i64,
        task_id: i32,
        daily: bool,
        reward: Decimal,
        rate_boost: Decimal,
    ) -> Result<Option<CompletionReceipt>> {
        let mut tx = self.pool.begin().await?;

        // Guarded insert: any prior completion blocks a one-time task, only
        // a completion dated today blocks a daily one.
        let inserted = sqlx::query(
            r#"
            INSERT INTO completed_tasks (user_id, task_id)
            SELECT $1, $2
            WHERE NOT EXISTS (
                SELECT 1 FROM completed_tasks
                WHERE user_id = $1
                  AND task_id = $2
                  AND (NOT $3 OR completion_date::date = CURRENT_DATE)
            )
            "#,
        )
        .bind(user_id)
        .bind(task_id)
        .bind(daily)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Ok(None);
        }

        let receipt = sqlx::query_as::<_, CompletionReceipt>(
            r#"
            UPDATE users
            SET balance = balance + $2,
                mining_rate = mining_rate + $3
            WHERE user_id = $1
            RETURNING balance, mining_rate
            "#,
        )
        .bind(user_id)
        .bind(reward)
        .bind(rate_boost)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(receipt))
    }

    async fn count_referrals(&self, user_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM referrals WHERE referrer_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn count_completed_tasks(&self, user_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM completed_tasks WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn list_referrals(&self, user_id: i64) -> Result<Vec<ReferralEntry>> {
        let referrals = sqlx::query_as::<_, ReferralEntry>(
            r#"
            SELECT u.username, r.date
            FROM referrals r
            JOIN users u ON r.referred_id = u.user_id
            WHERE r.referrer_id = $1
            ORDER BY r.date DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrals)
    }
}
