//! Persistence seam for the accounting engine.
//!
//! The engine only talks to this trait, so it can be exercised in tests
//! against a mock or an in-memory ledger without a live database. The
//! Postgres implementation lives in [`crate::database`].

use crate::errors::Result;
use crate::models::{CompletedTask, CompletionReceipt, MineReceipt, ReferralEntry, Task, User};
use async_trait::async_trait;
use rust_decimal::Decimal;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a new user row. Returns false without mutating anything when
    /// the user already exists.
    async fn create_user(
        &self,
        user_id: i64,
        username: &str,
        mining_rate: Decimal,
        referrer_id: Option<i64>,
    ) -> Result<bool>;

    /// Record a referral and credit the bonus to the referrer, atomically.
    /// At most one referral row is kept per referred user; a referrer id
    /// that matches no user is accepted and the credit touches zero rows.
    async fn record_referral(
        &self,
        referrer_id: i64,
        referred_id: i64,
        bonus: Decimal,
    ) -> Result<()>;

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>>;

    /// Conditionally credit `mining_rate * factor` and reset `last_mined`.
    /// Returns None when the cooldown window has not elapsed, so a
    /// concurrent duplicate request cannot double-mine.
    async fn apply_mine(
        &self,
        user_id: i64,
        factor: Decimal,
        cooldown_secs: i64,
    ) -> Result<Option<MineReceipt>>;

    async fn list_tasks(&self) -> Result<Vec<Task>>;

    async fn fetch_task(&self, task_id: i32) -> Result<Option<Task>>;

    async fn completions_for_user(&self, user_id: i64) -> Result<Vec<CompletedTask>>;

    /// Insert a completion row and apply reward + rate boost in one
    /// transaction. The insert is guarded: for a one-time task any prior
    /// completion blocks it, for a daily task only a completion dated
    /// today does. Returns None when the guard rejects the insert.
    async fn apply_task_completion(
        &self,
        user_id: i64,
        task_id: i32,
        daily: bool,
        reward: Decimal,
        rate_boost: Decimal,
    ) -> Result<Option<CompletionReceipt>>;

    async fn count_referrals(&self, user_id: i64) -> Result<i64>;

    async fn count_completed_tasks(&self, user_id: i64) -> Result<i64>;

    async fn list_referrals(&self, user_id: i64) -> Result<Vec<ReferralEntry>>;
}
