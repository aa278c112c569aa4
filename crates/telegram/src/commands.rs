use std::sync::Arc;

use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

use common::{BotState, BotStatus, Error, Instrument, InstrumentDraft, Interval, Market, Result};
use engine::BotController;

type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub controller: BotController,
    pub allowed_user_ids: Arc<Vec<i64>>,
}

/// Telegram bot commands exposed to the operator.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "PulseBot commands:")]
pub enum Command {
    #[command(description = "Show this help")]
    Help,
    #[command(description = "Warm up every instrument and start the schedule")]
    Start,
    #[command(description = "Cancel all scheduled jobs")]
    Stop,
    #[command(description = "Show bot state and monitored instruments")]
    Status,
    #[command(description = "Add an instrument: SYMBOL NAME MARKET [INTERVAL]")]
    Add(String),
    #[command(description = "Remove an instrument: SYMBOL")]
    Remove(String),
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(bot: Bot, deps: BotDeps) {
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(handle_help))
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::Stop].endpoint(handle_stop))
        .branch(case![Command::Status].endpoint(handle_status))
        .branch(case![Command::Add(args)].endpoint(handle_add))
        .branch(case![Command::Remove(symbol)].endpoint(handle_remove));

    Update::filter_message()
        .filter_map(|msg: Message| msg.from().map(|u| u.id))
        .filter_async(auth_filter)
        .branch(command_handler)
}

/// Silently drop messages from users not in the allowed list.
async fn auth_filter(user_id: UserId, deps: Arc<BotDeps>) -> bool {
    let uid = user_id.0 as i64;
    let allowed = deps.allowed_user_ids.contains(&uid);
    if !allowed {
        warn!(user_id = uid, "Unauthorized Telegram access attempt");
    }
    allowed
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn handle_start(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    if deps.controller.state().await == BotState::Running {
        bot.send_message(msg.chat.id, "Bot is already running.").await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Starting, running warm-up pass\u{2026}")
        .await?;
    let reply = match deps.controller.start().await {
        Ok(()) => {
            let status = deps.controller.status().await;
            format!(
                "Bot started with {} scheduled job(s).",
                status.active_job_count
            )
        }
        Err(e) => format!("Start failed: {e}"),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_stop(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    if deps.controller.state().await == BotState::Stopped {
        bot.send_message(msg.chat.id, "Bot is already stopped.").await?;
    } else {
        deps.controller.stop().await;
        bot.send_message(msg.chat.id, "Bot stopped.").await?;
    }
    Ok(())
}

async fn handle_status(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let status = deps.controller.status().await;
    bot.send_message(msg.chat.id, format_status(&status)).await?;
    Ok(())
}

async fn handle_add(bot: Bot, msg: Message, deps: Arc<BotDeps>, args: String) -> HandlerResult {
    let reply = match parse_add_args(&args) {
        Ok(instrument) => {
            let symbol = instrument.symbol.clone();
            match deps.controller.add_instrument(instrument).await {
                Ok(true) => format!("Added {symbol}."),
                Ok(false) => format!("{symbol} is already monitored."),
                Err(e) => format!("Could not add {symbol}: {e}"),
            }
        }
        Err(e) => format!("{e}\nUsage: /add SYMBOL NAME MARKET [INTERVAL]"),
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_remove(
    bot: Bot,
    msg: Message,
    deps: Arc<BotDeps>,
    symbol: String,
) -> HandlerResult {
    let symbol = symbol.trim();
    let reply = if symbol.is_empty() {
        "Usage: /remove SYMBOL".to_string()
    } else if deps.controller.remove_instrument(symbol).await {
        format!("Removed {symbol}.")
    } else {
        format!("{symbol} is not monitored.")
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

/// Parse `SYMBOL NAME MARKET [INTERVAL]`. The name may contain spaces.
pub fn parse_add_args(args: &str) -> Result<Instrument> {
    let mut tokens: Vec<&str> = args.split_whitespace().collect();
    if tokens.len() < 3 {
        return Err(Error::Validation(
            "expected at least a symbol, a name and a market".into(),
        ));
    }

    let interval = match tokens.last().map(|t| t.parse::<Interval>()) {
        Some(Ok(interval)) if tokens.len() >= 4 => {
            tokens.pop();
            Some(interval)
        }
        _ => None,
    };
    let market: Market = tokens.pop().unwrap_or_default().parse()?;
    let symbol = tokens.remove(0);

    Instrument::try_from(InstrumentDraft {
        symbol: Some(symbol.to_string()),
        display_name: Some(tokens.join(" ")),
        market: Some(market),
        interval,
    })
}

pub fn format_status(status: &BotStatus) -> String {
    let mut text = format!(
        "PulseBot Status\nState: {}\nScheduled jobs: {}\nInstruments: {}",
        status.state,
        status.active_job_count,
        status.monitored_instruments.len()
    );
    for i in &status.monitored_instruments {
        text.push_str(&format!(
            "\n\u{2022} {} ({}) {} {}",
            i.symbol, i.display_name, i.market, i.interval
        ));
    }
    if !status.scheduled_jobs.is_empty() {
        text.push_str("\nJobs:");
        for job in &status.scheduled_jobs {
            text.push_str(&format!("\n\u{2022} {} [{}]", job.key, job.cron));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ScheduledJob;

    #[test]
    fn add_args_with_interval() {
        let i = parse_add_args("BTC/USDT Bitcoin crypto 1h").unwrap();
        assert_eq!(i.symbol, "BTC/USDT");
        assert_eq!(i.display_name, "Bitcoin");
        assert_eq!(i.market, Market::Crypto);
        assert_eq!(i.interval, Interval::OneHour);
    }

    #[test]
    fn add_args_with_spaced_name_and_default_interval() {
        let i = parse_add_args("600519.SH Kweichow Moutai CN").unwrap();
        assert_eq!(i.display_name, "Kweichow Moutai");
        assert_eq!(i.market, Market::Cn);
        assert_eq!(i.interval, Market::Cn.default_interval());
    }

    #[test]
    fn add_args_reject_missing_fields_and_unknown_market() {
        assert!(matches!(parse_add_args("BTC/USDT"), Err(Error::Validation(_))));
        assert!(matches!(
            parse_add_args("BTC/USDT Bitcoin MOON"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn status_lists_instruments() {
        let status = BotStatus {
            is_running: true,
            state: BotState::Running,
            monitored_instruments: vec![Instrument::new(
                "BTC/USDT",
                "Bitcoin",
                Market::Crypto,
                Interval::OneMinute,
            )],
            active_job_count: 1,
            scheduled_jobs: vec![ScheduledJob {
                key: "BTC/USDT".into(),
                cron: "0 * * * *".into(),
            }],
        };
        let text = format_status(&status);
        assert!(text.contains("State: running"));
        assert!(text.contains("BTC/USDT (Bitcoin) CRYPTO 1m"));
        assert!(text.contains("BTC/USDT [0 * * * *]"));
    }
}
