//! # Run Club Bot Main Entry Point
//!
//! Initializes logging, loads configuration, prepares the database,
//! starts the cron jobs and the HTTP server, and runs the Telegram bot.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use run_club_bot::bot::commands::menu_commands;
use run_club_bot::bot::handlers::BotHandler;
use run_club_bot::bot::BotContext;
use run_club_bot::config::Config;
use run_club_bot::database::connection::DatabaseManager;
use run_club_bot::services::scheduler::{setup_webhooks, ClubScheduler};
use run_club_bot::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "run_club_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    info!("Starting Run Club Bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded - Database: {}, HTTP Port: {}, Time zone: {}",
        config.database_url, config.http_port, config.time_zone
    );

    info!("Initializing database connection...");
    let db_manager = DatabaseManager::new(&config.database_url).await?;
    info!("Running database migrations...");
    db_manager.run_migrations().await?;
    let db_arc = Arc::new(db_manager);
    info!("Database initialized successfully");

    let bot = Bot::new(&config.telegram_bot_token);
    if let Err(e) = bot
        .set_my_commands(menu_commands())
        .language_code("uk")
        .await
    {
        tracing::warn!("Failed to register the command menu: {}", e);
    }

    let mut scheduler = ClubScheduler::new(bot.clone(), db_arc.clone(), config.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create scheduler: {}", e))?;
    if let Err(e) = scheduler.start().await {
        tracing::error!("Failed to start scheduler: {}", e);
    } else {
        info!("Scheduler started successfully");
    }

    let app = web::router(AppState::new(db_arc.clone(), bot.clone(), config.clone()));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to port {}: {}", config.http_port, e))?;
    info!("HTTP server starting on port {}", config.http_port);

    let handler = BotHandler::new(BotContext::new(db_arc.as_ref().clone(), config.clone()));
    let bot_task = tokio::spawn(async move {
        Dispatcher::builder(bot, BotHandler::schema())
            .dependencies(handler.dependencies())
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    });

    let http_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    // Monobank verifies the webhook URL with a GET, so the listener must be up first
    let (webhook_db, webhook_config) = (db_arc.clone(), config.clone());
    tokio::spawn(async move {
        if let Err(e) = setup_webhooks(webhook_db, webhook_config).await {
            tracing::warn!("Initial Monobank webhook setup failed: {}", e);
        }
    });

    tokio::select! {
        result = bot_task => {
            if let Err(e) = result {
                tracing::error!("Bot task error: {}", e);
            }
        }
        result = http_task => {
            if let Err(e) = result {
                tracing::error!("HTTP task error: {}", e);
            }
        }
    }

    if let Err(e) = scheduler.stop().await {
        tracing::warn!("Error stopping scheduler: {}", e);
    }

    info!("Application stopped");
    Ok(())
}
