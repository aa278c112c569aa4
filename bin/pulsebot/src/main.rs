use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use advisor::{DeepSeekAdvisor, DeepSeekSettings};
use common::{Config, Notifier};
use engine::{
    chain_from_config, BotController, BroadcastObserver, NotificationFanout, PipelineSettings,
    SqliteSink, Watchlist, WorkflowPipeline,
};
use notify::{EmailNotifier, NtfyNotifier, WeComNotifier};
use strategy::{IndicatorEngine, StrategyScorer};
use telegram_ctrl::{start_bot, BotDeps, TelegramNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("loading configuration")?;
    let watchlist = Watchlist::load(&cfg.watchlist_path).context("loading watchlist")?;
    info!(
        instruments = watchlist.instruments.len(),
        sources = ?cfg.data_sources,
        "PulseBot starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let sink = SqliteSink::connect(&cfg.database_url)
        .await
        .context("opening decision database")?;

    // ── Market data ───────────────────────────────────────────────────────────
    let sources = chain_from_config(&cfg).context("building data sources")?;
    if sources.is_empty() {
        warn!("No market data source configured; every run will fail at fetch");
    }

    // ── Notification channels ─────────────────────────────────────────────────
    let telegram_bot = cfg.telegram.token.as_deref().map(teloxide::Bot::new);
    let mut channels: Vec<Arc<dyn Notifier>> = vec![
        Arc::new(EmailNotifier::from_config(&cfg.email)?),
        Arc::new(NtfyNotifier::from_config(&cfg.ntfy, cfg.http_timeout)?),
        Arc::new(WeComNotifier::from_config(&cfg.wecom, cfg.http_timeout)?),
    ];
    if let Some(bot) = &telegram_bot {
        channels.push(Arc::new(TelegramNotifier::from_config(
            bot.clone(),
            &cfg.telegram,
        )));
    }
    let fanout = NotificationFanout::new(channels, cfg.http_timeout);
    info!(channels = ?fanout.enabled_channels(), "Notification channels ready");

    // ── Pipeline ──────────────────────────────────────────────────────────────
    let observer = Arc::new(BroadcastObserver::default());
    let advisor = DeepSeekAdvisor::new(DeepSeekSettings::from(&cfg))?;
    let pipeline = WorkflowPipeline::new(
        Arc::new(sources),
        Arc::new(IndicatorEngine::new(&watchlist.indicators)),
        StrategyScorer::new(watchlist.scoring.clone()),
        fanout,
    )
    .with_advisor(Arc::new(advisor))
    .with_sink(Arc::new(sink.clone()))
    .with_observer(observer.clone())
    .with_settings(PipelineSettings {
        candle_limit: cfg.candle_limit,
        fetch_timeout: cfg.http_timeout,
        advisor_timeout: cfg.http_timeout,
        effect_timeout: cfg.http_timeout,
    });

    let controller = BotController::new(
        Arc::new(pipeline),
        watchlist.schedule.clone(),
        cfg.overlap_policy,
        watchlist.instruments.clone(),
    );

    // ── Telegram C2 ───────────────────────────────────────────────────────────
    match telegram_bot {
        Some(bot) => {
            let deps = BotDeps {
                controller: controller.clone(),
                allowed_user_ids: Arc::new(cfg.telegram.allowed_user_ids.clone()),
            };
            tokio::spawn(start_bot(bot, deps));
        }
        None => info!("TELEGRAM_TOKEN not set; Telegram commands disabled"),
    }

    // ── Dashboard API ─────────────────────────────────────────────────────────
    let api_state = api::AppState {
        controller: controller.clone(),
        sink,
        observer,
        dashboard_token: cfg.dashboard_token.clone(),
    };
    let port = cfg.dashboard_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "Dashboard API stopped");
        }
    });

    // ── Run ───────────────────────────────────────────────────────────────────
    controller.start().await.context("starting bot")?;

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutdown signal received. Stopping.");
    controller.stop().await;
    Ok(())
}
