use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Tag on a task identifying the recurring daily task. Every other tag is
/// one-time.
pub const DAILY_CHECK: &str = "daily_check";

/// A registered player. `user_id` is the externally assigned Telegram id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub balance: Decimal,
    pub mining_rate: Decimal,
    pub last_mined: Option<DateTime<Utc>>,
    pub referrer_id: Option<i64>,
    pub join_date: DateTime<Utc>,
}

/// Task reference data, seeded at startup and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub reward: Decimal,
    pub required_action: String,
}

impl Task {
    pub fn is_daily(&self) -> bool {
        self.required_action == DAILY_CHECK
    }
}

/// One completion event. Daily tasks accumulate one row per calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompletedTask {
    pub id: i32,
    pub user_id: i64,
    pub task_id: i32,
    pub completion_date: DateTime<Utc>,
}

/// A referred user as seen from the referrer's side.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReferralEntry {
    pub username: String,
    pub date: DateTime<Utc>,
}

/// Outcome of a successful mine, as returned by the store's conditional
/// update.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MineReceipt {
    pub amount: Decimal,
    pub balance: Decimal,
    pub mined_at: DateTime<Utc>,
}

/// Balance and rate after a task reward has been applied.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CompletionReceipt {
    pub balance: Decimal,
    pub mining_rate: Decimal,
}

/// Completion outcome enriched with the task's reference data.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReceipt {
    pub task_id: i32,
    pub title: String,
    pub reward: Decimal,
    pub balance: Decimal,
    pub mining_rate: Decimal,
}

/// Aggregated per-user view backing `/balance` and `GET /api/user/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub user_id: i64,
    pub username: String,
    pub balance: Decimal,
    pub mining_rate: Decimal,
    pub referrals: i64,
    pub completed_tasks: i64,
    pub last_mined: Option<DateTime<Utc>>,
    pub join_date: DateTime<Utc>,
}

/// Mine request body
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct MineRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
}

/// Task completion request body
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct CompleteTaskRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
    #[validate(range(min = 1))]
    pub task_id: i32,
}
