use crate::config::Config;
use crate::errors::{MiningEngineError, Result};
use crate::metrics;
use crate::models::{MineReceipt, ReferralEntry, Task, TaskReceipt, UserStats};
use crate::store::LedgerStore;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Engine parameters, parsed once at startup from [`Config`].
#[derive(Debug, Clone)]
pub struct MiningParams {
    pub cooldown_secs: i64,
    pub default_mining_rate: Decimal,
    pub referral_bonus: Decimal,
    pub rate_boost_factor: Decimal,
    pub bot_username: String,
}

impl MiningParams {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(MiningParams {
            cooldown_secs: config.mining.cooldown_secs,
            default_mining_rate: Decimal::from_str(&config.mining.default_rate)?,
            referral_bonus: Decimal::from_str(&config.mining.referral_bonus)?,
            rate_boost_factor: Decimal::from_str(&config.mining.rate_boost_factor)?,
            bot_username: config.bot.username.clone(),
        })
    }
}

/// The accounting engine. All balance, referral and task rules live here;
/// persistence goes through the injected [`LedgerStore`].
pub struct MiningService {
    store: Arc<dyn LedgerStore>,
    params: MiningParams,
}

impl MiningService {
    pub fn new(store: Arc<dyn LedgerStore>, params: MiningParams) -> Self {
        MiningService { store, params }
    }

    /// Register a user on first contact. Returns false when the user
    /// already exists; the stored name and balance are left untouched.
    pub async fn register(
        &self,
        user_id: i64,
        username: &str,
        referrer_id: Option<i64>,
    ) -> Result<bool> {
        let created = self
            .store
            .create_user(
                user_id,
                username,
                self.params.default_mining_rate,
                referrer_id,
            )
            .await?;

        if !created {
            return Ok(false);
        }

        metrics::USERS_REGISTERED.inc();

        if let Some(referrer_id) = referrer_id {
            self.store
                .record_referral(referrer_id, user_id, self.params.referral_bonus)
                .await?;
            metrics::REFERRALS_RECORDED.inc();

            info!(
                "Registered user {} (referred by {}), bonus {} credited",
                user_id, referrer_id, self.params.referral_bonus
            );
        } else {
            info!("Registered user {}", user_id);
        }

        Ok(true)
    }

    /// Mine once. Rejected with the remaining wait while the cooldown is
    /// active; otherwise credits `mining_rate x factor`, factor uniform in
    /// [0.75, 1.25).
    pub async fn mine(&self, user_id: i64) -> Result<MineReceipt> {
        let user = self
            .store
            .fetch_user(user_id)
            .await?
            .ok_or(MiningEngineError::UserNotFound(user_id))?;

        if let Some(seconds_remaining) =
            cooldown_remaining(user.last_mined, Utc::now(), self.params.cooldown_secs)
        {
            metrics::MINE_REJECTED.inc();
            return Err(MiningEngineError::CooldownActive { seconds_remaining });
        }

        let factor = mining_factor();

        match self
            .store
            .apply_mine(user_id, factor, self.params.cooldown_secs)
            .await?
        {
            Some(receipt) => {
                metrics::MINE_OPERATIONS.inc();
                metrics::MINED_AMOUNT.observe(receipt.amount.to_f64().unwrap_or(0.0));
                info!("User {} mined {} XTX", user_id, receipt.amount);
                Ok(receipt)
            }
            None => {
                // A concurrent mine won the conditional update between our
                // check and the write. Report the fresh cooldown.
                let user = self
                    .store
                    .fetch_user(user_id)
                    .await?
                    .ok_or(MiningEngineError::UserNotFound(user_id))?;
                let seconds_remaining =
                    cooldown_remaining(user.last_mined, Utc::now(), self.params.cooldown_secs)
                        .unwrap_or(1);
                metrics::MINE_REJECTED.inc();
                Err(MiningEngineError::CooldownActive { seconds_remaining })
            }
        }
    }

    /// Aggregate balance, rate and related-row counts for one user.
    pub async fn stats(&self, user_id: i64) -> Result<UserStats> {
        let user = self
            .store
            .fetch_user(user_id)
            .await?
            .ok_or(MiningEngineError::UserNotFound(user_id))?;

        let referrals = self.store.count_referrals(user_id).await?;
        let completed_tasks = self.store.count_completed_tasks(user_id).await?;

        Ok(UserStats {
            user_id: user.user_id,
            username: user.username,
            balance: user.balance.round_dp(4),
            mining_rate: user.mining_rate.round_dp(4),
            referrals,
            completed_tasks,
            last_mined: user.last_mined,
            join_date: user.join_date,
        })
    }

    /// Tasks the user may currently complete: everything not yet completed,
    /// plus daily tasks whose latest completion is before today.
    pub async fn available_tasks(&self, user_id: i64) -> Result<Vec<Task>> {
        let tasks = self.store.list_tasks().await?;
        let completions = self.store.completions_for_user(user_id).await?;
        let today = Utc::now().date_naive();

        Ok(tasks
            .into_iter()
            .filter(|task| {
                let latest = completions
                    .iter()
                    .filter(|c| c.task_id == task.id)
                    .map(|c| c.completion_date.date_naive())
                    .max();

                match latest {
                    None => true,
                    Some(date) => task.is_daily() && date < today,
                }
            })
            .collect())
    }

    /// Complete a task: credit the reward and permanently raise the mining
    /// rate by `reward x rate_boost_factor`.
    pub async fn complete_task(&self, user_id: i64, task_id: i32) -> Result<TaskReceipt> {
        let task = self
            .store
            .fetch_task(task_id)
            .await?
            .ok_or(MiningEngineError::TaskNotFound(task_id))?;

        let daily = task.is_daily();
        let rate_boost = task.reward * self.params.rate_boost_factor;

        match self
            .store
            .apply_task_completion(user_id, task_id, daily, task.reward, rate_boost)
            .await?
        {
            Some(receipt) => {
                metrics::TASKS_COMPLETED.inc();
                info!(
                    "User {} completed task '{}', earned {} XTX",
                    user_id, task.title, task.reward
                );
                Ok(TaskReceipt {
                    task_id,
                    title: task.title,
                    reward: task.reward,
                    balance: receipt.balance,
                    mining_rate: receipt.mining_rate,
                })
            }
            None if daily => Err(MiningEngineError::AlreadyCompletedToday { title: task.title }),
            None => Err(MiningEngineError::AlreadyCompleted { title: task.title }),
        }
    }

    /// Build the deep link that registers new users under this referrer.
    /// Pure formatting, no state access.
    pub fn referral_link(&self, user_id: i64) -> String {
        format!(
            "https://t.me/{}?start=ref{}",
            self.params.bot_username, user_id
        )
    }

    /// Referred users of `user_id`, newest first.
    pub async fn referrals_of(&self, user_id: i64) -> Result<Vec<ReferralEntry>> {
        self.store.list_referrals(user_id).await
    }
}

/// Remaining cooldown in whole seconds (ceiling), or None once mining is
/// allowed again. A user who never mined may mine immediately.
fn cooldown_remaining(
    last_mined: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown_secs: i64,
) -> Option<i64> {
    let last = last_mined?;
    let remaining_ms = cooldown_secs * 1000 - (now - last).num_milliseconds();
    if remaining_ms <= 0 {
        None
    } else {
        Some((remaining_ms + 999) / 1000)
    }
}

/// Uniform yield factor in [0.75, 1.25). The bounds are part of the mining
/// contract.
fn mining_factor() -> Decimal {
    let factor = rand::thread_rng().gen_range(0.75f64..1.25);
    Decimal::from_f64(factor).unwrap_or(Decimal::ONE)
}
