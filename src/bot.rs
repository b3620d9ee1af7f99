//! Telegram adapter: thin command handlers over the accounting engine.
//!
//! Each command is one engine call plus reply formatting. Business
//! rejections (cooldown, not registered, already completed) become
//! friendly texts; store failures are logged and reported generically.

use crate::errors::MiningEngineError;
use crate::models::{MineReceipt, Task, UserStats};
use crate::services::MiningService;
use std::sync::Arc;
use teloxide::payloads::SendMessageSetters;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use teloxide::utils::command::{BotCommands, ParseError};
use teloxide::{dptree, prelude::*};
use tracing::{error, info};
use url::Url;

const WELCOME_NEW: &str = "Welcome to Xentix (XTX) Mining Simulator! 🚀\n\n\
    You can start mining tokens and completing tasks to earn XTX. \
    Use the mini app to access all features.";

const WELCOME_BACK: &str = "Welcome back to Xentix (XTX) Mining Simulator! 📱\n\n\
    Use the mini app to continue mining and earning XTX.";

const REFERRAL_ACK: &str =
    "You joined through a referral link! Both you and your referrer received a bonus!";

const NOT_REGISTERED: &str = "You need to start mining first! Use /start to begin.";

const GENERIC_FAILURE: &str = "Something went wrong on our side. Please try again later.";

#[derive(Clone)]
pub struct BotContext {
    pub service: Arc<MiningService>,
    pub webapp_url: String,
}

// /start may arrive with or without a payload; the stock parser would
// reject the bare form.
fn parse_start_payload(input: String) -> Result<(String,), ParseError> {
    Ok((input,))
}

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "Xentix (XTX) Mining Simulator commands:"
)]
pub enum Command {
    #[command(description = "start mining", parse_with = parse_start_payload)]
    Start(String),
    #[command(description = "mine XTX tokens")]
    Mine,
    #[command(description = "check your balance")]
    Balance,
    #[command(description = "view available tasks")]
    Tasks,
    #[command(description = "get your referral link")]
    Referral,
    #[command(description = "show this help message")]
    Help,
}

/// Run the command dispatcher until the process exits.
pub async fn run(bot: Bot, ctx: BotContext) {
    info!("Starting Telegram bot dispatcher");

    let handler = Update::filter_message()
        .filter_command::<Command>()
        .endpoint(answer);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .default_handler(|_| async {})
        .build()
        .dispatch()
        .await;
}

async fn answer(bot: Bot, msg: Message, cmd: Command, ctx: BotContext) -> ResponseResult<()> {
    let from = match msg.from() {
        Some(from) => from,
        None => return Ok(()),
    };
    let user_id = from.id.0 as i64;
    let username = from
        .username
        .clone()
        .unwrap_or_else(|| format!("user{}", user_id));

    match cmd {
        Command::Start(payload) => {
            let referrer_id = parse_referral_payload(&payload);
            match ctx.service.register(user_id, &username, referrer_id).await {
                Ok(true) => {
                    bot.send_message(msg.chat.id, WELCOME_NEW).await?;
                    if referrer_id.is_some() {
                        bot.send_message(msg.chat.id, REFERRAL_ACK).await?;
                    }
                }
                Ok(false) => {
                    bot.send_message(msg.chat.id, WELCOME_BACK).await?;
                }
                Err(err) => {
                    report_failure(&bot, &msg, &err).await?;
                    return Ok(());
                }
            }

            if let Ok(url) = Url::parse(&ctx.webapp_url) {
                let keyboard = InlineKeyboardMarkup::new([[InlineKeyboardButton::web_app(
                    "⛏️ Open Mining App",
                    WebAppInfo { url },
                )]]);
                bot.send_message(msg.chat.id, "Open the Xentix Mining app:")
                    .reply_markup(keyboard)
                    .await?;
            }
        }
        Command::Mine => match ctx.service.mine(user_id).await {
            Ok(receipt) => {
                bot.send_message(msg.chat.id, format_mine_success(&receipt))
                    .await?;
                bot.send_message(msg.chat.id, format_balance_update(&receipt))
                    .await?;
            }
            Err(err) => report_failure(&bot, &msg, &err).await?,
        },
        Command::Balance => match ctx.service.stats(user_id).await {
            Ok(stats) => {
                bot.send_message(msg.chat.id, format_stats(&stats)).await?;
            }
            Err(err) => report_failure(&bot, &msg, &err).await?,
        },
        Command::Tasks => match ctx.service.available_tasks(user_id).await {
            Ok(tasks) => {
                bot.send_message(msg.chat.id, format_tasks(&tasks)).await?;
            }
            Err(err) => report_failure(&bot, &msg, &err).await?,
        },
        Command::Referral => {
            let link = ctx.service.referral_link(user_id);
            bot.send_message(msg.chat.id, format_referral(&link)).await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
    }

    Ok(())
}

async fn report_failure(bot: &Bot, msg: &Message, err: &MiningEngineError) -> ResponseResult<()> {
    bot.send_message(msg.chat.id, business_reply(err)).await?;
    Ok(())
}

/// Extract the referrer id from a `ref<digits>` start payload.
fn parse_referral_payload(payload: &str) -> Option<i64> {
    payload.strip_prefix("ref")?.parse::<i64>().ok()
}

/// Map engine outcomes to end-user texts. Unexpected failures are logged
/// and reported generically, never with internal detail.
fn business_reply(err: &MiningEngineError) -> String {
    match err {
        MiningEngineError::UserNotFound(_) => NOT_REGISTERED.to_string(),
        MiningEngineError::CooldownActive { seconds_remaining } => {
            format!("You can mine again in {} seconds", seconds_remaining)
        }
        MiningEngineError::TaskNotFound(_) => "Task not found".to_string(),
        MiningEngineError::AlreadyCompleted { .. } => "Task already completed".to_string(),
        MiningEngineError::AlreadyCompletedToday { .. } => {
            "Daily task already completed today".to_string()
        }
        other => {
            error!("Bot command failed: {}", other);
            GENERIC_FAILURE.to_string()
        }
    }
}

fn format_mine_success(receipt: &MineReceipt) -> String {
    format!("Successfully mined {} XTX!", receipt.amount.round_dp(4))
}

fn format_balance_update(receipt: &MineReceipt) -> String {
    format!("Updated Balance: {} XTX", receipt.balance.round_dp(4))
}

fn format_stats(stats: &UserStats) -> String {
    format!(
        "💰 Your XTX Balance: {} XTX\n⛏️ Mining Rate: {} XTX/min\n👥 Referrals: {}\n✅ Tasks Completed: {}",
        stats.balance, stats.mining_rate, stats.referrals, stats.completed_tasks
    )
}

fn format_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "You have completed all available tasks for now!".to_string();
    }

    let mut message = "📋 Available Tasks:\n\n".to_string();
    for (index, task) in tasks.iter().enumerate() {
        message.push_str(&format!(
            "{}. {} - {} XTX\n{}\n\n",
            index + 1,
            task.title,
            task.reward,
            task.description
        ));
    }
    message
}

fn format_referral(link: &str) -> String {
    format!(
        "🔗 Your Referral Link:\n{}\n\nShare this link with friends. You'll earn 1 XTX for each friend who joins!",
        link
    )
}
