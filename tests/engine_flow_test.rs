// End-to-end accounting flows over an in-memory ledger. The engine sees
// the same trait it talks to in production; only the persistence is faked.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mining_engine::errors::{MiningEngineError, Result};
use mining_engine::models::{
    CompletedTask, CompletionReceipt, MineReceipt, ReferralEntry, Task, User,
};
use mining_engine::services::{MiningParams, MiningService};
use mining_engine::store::LedgerStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct InMemoryLedger {
    users: Mutex<HashMap<i64, User>>,
    referrals: Mutex<Vec<(i64, i64, DateTime<Utc>)>>,
    tasks: Mutex<Vec<Task>>,
    completions: Mutex<Vec<CompletedTask>>,
    next_completion_id: AtomicI32,
}

impl InMemoryLedger {
    fn with_default_tasks() -> Self {
        let ledger = Self::default();
        let seed = [
            ("Daily Check-in", "Open the app daily to mine XTX", dec!(0.5), "daily_check"),
            ("Invite Friends", "Invite 3 friends to join Xentix", dec!(2.0), "invite_friends"),
            ("Complete Profile", "Fill out your mining profile", dec!(1.0), "complete_profile"),
            ("Join Community", "Join the Xentix Telegram group", dec!(1.5), "join_group"),
            ("Share on Social", "Share about Xentix on social media", dec!(2.5), "share_social"),
        ];
        let mut tasks = ledger.tasks.lock().unwrap();
        for (index, (title, description, reward, action)) in seed.into_iter().enumerate() {
            tasks.push(Task {
                id: index as i32 + 1,
                title: title.to_string(),
                description: description.to_string(),
                reward,
                required_action: action.to_string(),
            });
        }
        drop(tasks);
        ledger
    }

    /// Shift a user's last-mined timestamp into the past so the cooldown
    /// elapses without waiting.
    fn backdate_last_mined(&self, user_id: i64, secs: i64) {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.get_mut(&user_id) {
            user.last_mined = user.last_mined.map(|t| t - Duration::seconds(secs));
        }
    }

    /// Shift every completion into the past, simulating a later calendar
    /// day.
    fn backdate_completions(&self, days: i64) {
        let mut completions = self.completions.lock().unwrap();
        for completion in completions.iter_mut() {
            completion.completion_date -= Duration::days(days);
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn create_user(
        &self,
        user_id: i64,
        username: &str,
        mining_rate: Decimal,
        referrer_id: Option<i64>,
    ) -> Result<bool> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user_id) {
            return Ok(false);
        }
        let now = Utc::now();
        users.insert(
            user_id,
            User {
                user_id,
                username: username.to_string(),
                balance: Decimal::ZERO,
                mining_rate,
                last_mined: Some(now),
                referrer_id,
                join_date: now,
            },
        );
        Ok(true)
    }

    async fn record_referral(
        &self,
        referrer_id: i64,
        referred_id: i64,
        bonus: Decimal,
    ) -> Result<()> {
        let mut referrals = self.referrals.lock().unwrap();
        if referrals.iter().any(|(_, referred, _)| *referred == referred_id) {
            return Ok(());
        }
        referrals.push((referrer_id, referred_id, Utc::now()));
        drop(referrals);

        // Dangling referrer ids are accepted; the credit simply lands
        // nowhere.
        let mut users = self.users.lock().unwrap();
        if let Some(referrer) = users.get_mut(&referrer_id) {
            referrer.balance += bonus;
        }
        Ok(())
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn apply_mine(
        &self,
        user_id: i64,
        factor: Decimal,
        cooldown_secs: i64,
    ) -> Result<Option<MineReceipt>> {
        let mut users = self.users.lock().unwrap();
        let user = match users.get_mut(&user_id) {
            Some(user) => user,
            None => return Ok(None),
        };

        let now = Utc::now();
        let allowed = match user.last_mined {
            None => true,
            Some(last) => last <= now - Duration::seconds(cooldown_secs),
        };
        if !allowed {
            return Ok(None);
        }

        let amount = user.mining_rate * factor;
        user.balance += amount;
        user.last_mined = Some(now);
        Ok(Some(MineReceipt {
            amount,
            balance: user.balance,
            mined_at: now,
        }))
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn fetch_task(&self, task_id: i32) -> Result<Option<Task>> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == task_id)
            .cloned())
    }

    async fn completions_for_user(&self, user_id: i64) -> Result<Vec<CompletedTask>> {
        Ok(self
            .completions
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn apply_task_completion(
        &self,
        user_id: i64,
        task_id: i32,
        daily: bool,
        reward: Decimal,
        rate_boost: Decimal,
    ) -> Result<Option<CompletionReceipt>> {
        let now = Utc::now();
        let mut completions = self.completions.lock().unwrap();
        let blocked = completions.iter().any(|c| {
            c.user_id == user_id
                && c.task_id == task_id
                && (!daily || c.completion_date.date_naive() == now.date_naive())
        });
        if blocked {
            return Ok(None);
        }

        let mut users = self.users.lock().unwrap();
        let user = users
            .get_mut(&user_id)
            .ok_or(MiningEngineError::Database(sqlx::Error::RowNotFound))?;

        completions.push(CompletedTask {
            id: self.next_completion_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id,
            task_id,
            completion_date: now,
        });
        user.balance += reward;
        user.mining_rate += rate_boost;

        Ok(Some(CompletionReceipt {
            balance: user.balance,
            mining_rate: user.mining_rate,
        }))
    }

    async fn count_referrals(&self, user_id: i64) -> Result<i64> {
        Ok(self
            .referrals
            .lock()
            .unwrap()
            .iter()
            .filter(|(referrer, _, _)| *referrer == user_id)
            .count() as i64)
    }

    async fn count_completed_tasks(&self, user_id: i64) -> Result<i64> {
        Ok(self
            .completions
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id)
            .count() as i64)
    }

    async fn list_referrals(&self, user_id: i64) -> Result<Vec<ReferralEntry>> {
        let users = self.users.lock().unwrap();
        let mut entries: Vec<ReferralEntry> = self
            .referrals
            .lock()
            .unwrap()
            .iter()
            .filter(|(referrer, _, _)| *referrer == user_id)
            .map(|(_, referred, date)| ReferralEntry {
                username: users
                    .get(referred)
                    .map(|u| u.username.clone())
                    .unwrap_or_default(),
                date: *date,
            })
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }
}

fn params() -> MiningParams {
    MiningParams {
        cooldown_secs: 60,
        default_mining_rate: dec!(0.01),
        referral_bonus: dec!(1.0),
        rate_boost_factor: dec!(0.001),
        bot_username: "XentixMiningBot".to_string(),
    }
}

fn engine() -> (Arc<InMemoryLedger>, MiningService) {
    let ledger = Arc::new(InMemoryLedger::with_default_tasks());
    let service = MiningService::new(ledger.clone(), params());
    (ledger, service)
}

#[tokio::test]
async fn register_is_idempotent_and_keeps_state() {
    let (_, service) = engine();

    assert!(service.register(42, "alice", None).await.unwrap());
    assert!(!service.register(42, "alice2", None).await.unwrap());

    let stats = service.stats(42).await.unwrap();
    assert_eq!(stats.username, "alice");
    assert_eq!(stats.balance, Decimal::ZERO);
    assert_eq!(stats.mining_rate, dec!(0.01));
    assert!(stats.last_mined.is_some());
}

#[tokio::test]
async fn referral_bonus_is_credited_exactly_once() {
    let (_, service) = engine();

    service.register(42, "alice", None).await.unwrap();
    service.register(7, "bob", Some(42)).await.unwrap();
    // Replay of the same registration changes nothing.
    service.register(7, "bob", Some(42)).await.unwrap();

    let stats = service.stats(42).await.unwrap();
    assert_eq!(stats.balance, dec!(1.0));
    assert_eq!(stats.referrals, 1);

    let referred = service.referrals_of(42).await.unwrap();
    assert_eq!(referred.len(), 1);
    assert_eq!(referred[0].username, "bob");
}

#[tokio::test]
async fn dangling_referrer_is_accepted_silently() {
    let (_, service) = engine();

    // Nobody with id 999 exists; registration still succeeds.
    assert!(service.register(9, "carol", Some(999)).await.unwrap());
    assert!(matches!(
        service.stats(999).await.unwrap_err(),
        MiningEngineError::UserNotFound(999)
    ));

    let stats = service.stats(9).await.unwrap();
    assert_eq!(stats.balance, Decimal::ZERO);
}

#[tokio::test]
async fn mine_respects_cooldown_then_credits_within_bounds() {
    let (ledger, service) = engine();
    service.register(42, "alice", None).await.unwrap();

    // Registration sets last_mined, so the first attempt is inside the
    // cooldown window.
    match service.mine(42).await.unwrap_err() {
        MiningEngineError::CooldownActive { seconds_remaining } => {
            assert!(seconds_remaining > 0 && seconds_remaining <= 60);
        }
        other => panic!("expected cooldown, got {other:?}"),
    }
    assert_eq!(service.stats(42).await.unwrap().balance, Decimal::ZERO);

    ledger.backdate_last_mined(42, 120);
    let receipt = service.mine(42).await.unwrap();
    assert!(receipt.amount >= dec!(0.0075) && receipt.amount < dec!(0.0125));
    assert_eq!(service.stats(42).await.unwrap().balance, receipt.amount.round_dp(4));

    // Mining again straight away is rejected without a balance change.
    assert!(matches!(
        service.mine(42).await.unwrap_err(),
        MiningEngineError::CooldownActive { .. }
    ));
    assert_eq!(service.stats(42).await.unwrap().balance, receipt.amount.round_dp(4));
}

#[tokio::test]
async fn mine_unknown_user_is_not_found() {
    let (_, service) = engine();
    assert!(matches!(
        service.mine(1).await.unwrap_err(),
        MiningEngineError::UserNotFound(1)
    ));
}

#[tokio::test]
async fn one_time_task_rewards_once_and_boosts_rate() {
    let (_, service) = engine();
    service.register(42, "alice", None).await.unwrap();

    // Task 4 = Join Community, reward 1.5.
    let receipt = service.complete_task(42, 4).await.unwrap();
    assert_eq!(receipt.title, "Join Community");
    assert_eq!(receipt.reward, dec!(1.5));
    assert_eq!(receipt.balance, dec!(1.5));
    assert_eq!(receipt.mining_rate, dec!(0.0115));

    let err = service.complete_task(42, 4).await.unwrap_err();
    assert!(matches!(err, MiningEngineError::AlreadyCompleted { .. }));

    let stats = service.stats(42).await.unwrap();
    assert_eq!(stats.balance, dec!(1.5));
    assert_eq!(stats.mining_rate, dec!(0.0115));
    assert_eq!(stats.completed_tasks, 1);
}

#[tokio::test]
async fn daily_task_reappears_on_the_next_day() {
    let (ledger, service) = engine();
    service.register(42, "alice", None).await.unwrap();

    // Task 1 = Daily Check-in.
    service.complete_task(42, 1).await.unwrap();
    assert!(matches!(
        service.complete_task(42, 1).await.unwrap_err(),
        MiningEngineError::AlreadyCompletedToday { .. }
    ));

    let available = service.available_tasks(42).await.unwrap();
    assert!(available.iter().all(|t| t.id != 1));

    // The next calendar day it is back, and completable again.
    ledger.backdate_completions(1);
    let available = service.available_tasks(42).await.unwrap();
    assert!(available.iter().any(|t| t.id == 1));

    service.complete_task(42, 1).await.unwrap();
    let stats = service.stats(42).await.unwrap();
    assert_eq!(stats.balance, dec!(1.0));
    assert_eq!(stats.completed_tasks, 2);
}

#[tokio::test]
async fn completed_one_time_tasks_disappear_from_the_listing() {
    let (_, service) = engine();
    service.register(42, "alice", None).await.unwrap();

    assert_eq!(service.available_tasks(42).await.unwrap().len(), 5);

    service.complete_task(42, 3).await.unwrap();
    let available = service.available_tasks(42).await.unwrap();
    assert_eq!(available.len(), 4);
    assert!(available.iter().all(|t| t.id != 3));
}

#[tokio::test]
async fn unknown_task_is_rejected() {
    let (_, service) = engine();
    service.register(42, "alice", None).await.unwrap();
    assert!(matches!(
        service.complete_task(42, 99).await.unwrap_err(),
        MiningEngineError::TaskNotFound(99)
    ));
}

#[tokio::test]
async fn task_boost_compounds_into_later_mining() {
    let (ledger, service) = engine();
    service.register(42, "alice", None).await.unwrap();

    // Reward 2.0 boosts the rate by 0.002 on top of the 0.01 default.
    service.complete_task(42, 2).await.unwrap();
    let boosted_rate = service.stats(42).await.unwrap().mining_rate;
    assert_eq!(boosted_rate, dec!(0.012));

    ledger.backdate_last_mined(42, 120);
    let receipt = service.mine(42).await.unwrap();
    assert!(receipt.amount >= boosted_rate * dec!(0.75));
    assert!(receipt.amount < boosted_rate * dec!(1.25));

    // Balances and rates never go negative anywhere in the flow.
    let stats = service.stats(42).await.unwrap();
    assert!(stats.balance >= Decimal::ZERO);
    assert!(stats.mining_rate >= Decimal::ZERO);
}
