mod commands;
mod notifier;

pub use commands::{format_status, parse_add_args, start_bot, BotDeps, Command};
pub use notifier::TelegramNotifier;
