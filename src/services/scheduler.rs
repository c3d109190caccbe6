use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use teloxide::Bot;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::Config;
use crate::database::connection::DatabaseManager;
use crate::services::chronopost::MessageScheduler;
use crate::services::weather::{self, OpenWeatherClient};
use crate::services::{greetings, monobank, survey};
use crate::utils::logging::{log_job_run, log_system_event};

type JobResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Every minute, for chronoposts.
pub const CHRONOPOST_SCHEDULE: &str = "0 * * * * *";
/// At the top of every UTC hour. The club time zone has whole-hour offsets,
/// so this is also the top of every local hour.
pub const HOURLY_SCHEDULE: &str = "0 0 * * * *";
/// Local hour of the birthday greetings.
pub const BIRTHDAY_HOUR: u32 = 9;
/// Local hour of the weather forecast.
pub const WEATHER_HOUR: u32 = 7;
/// Local hour of the Monobank webhook refresh.
pub const WEBHOOK_HOUR: u32 = 3;

/// Whether `now` falls within local hour `hour` of `tz`.
/// Cron schedules fire in UTC, daily jobs check this before running.
pub fn is_local_hour(now: DateTime<Utc>, tz: Tz, hour: u32) -> bool {
    now.with_timezone(&tz).hour() == hour
}

/// Cron jobs of the club: chronoposts, greetings, weather, surveys and bank webhooks.
pub struct ClubScheduler {
    bot: Bot,
    db: Arc<DatabaseManager>,
    config: Arc<Config>,
    scheduler: JobScheduler,
}

impl ClubScheduler {
    pub async fn new(bot: Bot, db: Arc<DatabaseManager>, config: Arc<Config>) -> JobResult<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            bot,
            db,
            config,
            scheduler,
        })
    }

    pub async fn start(&mut self) -> JobResult<()> {
        let tz = self.config.time_zone;

        let (bot, db, config) = self.handles();
        let chronopost_job = Job::new_async(CHRONOPOST_SCHEDULE, move |_uuid, _l| {
            let (bot, db, config) = (bot.clone(), db.clone(), config.clone());
            Box::pin(async move {
                if let Err(e) = run_chronoposts(bot, db, config).await {
                    tracing::error!("Chronopost job failed: {}", e);
                }
            })
        })?;
        self.scheduler.add(chronopost_job).await?;

        let (bot, db, config) = self.handles();
        let birthday_job = Job::new_async(HOURLY_SCHEDULE, move |_uuid, _l| {
            let (bot, db, config) = (bot.clone(), db.clone(), config.clone());
            Box::pin(async move {
                if !is_local_hour(Utc::now(), config.time_zone, BIRTHDAY_HOUR) {
                    return;
                }
                if let Err(e) = run_birthdays(bot, db, config).await {
                    tracing::error!("Birthday job failed: {}", e);
                }
            })
        })?;
        self.scheduler.add(birthday_job).await?;

        if self.config.weather_api_key.is_some() {
            let (bot, db, config) = self.handles();
            let weather_job = Job::new_async(HOURLY_SCHEDULE, move |_uuid, _l| {
                let (bot, db, config) = (bot.clone(), db.clone(), config.clone());
                Box::pin(async move {
                    if !is_local_hour(Utc::now(), config.time_zone, WEATHER_HOUR) {
                        return;
                    }
                    if let Err(e) = run_weather(bot, db, config).await {
                        tracing::error!("Weather job failed: {}", e);
                    }
                })
            })?;
            self.scheduler.add(weather_job).await?;
        } else {
            tracing::warn!("WEATHER_API_KEY is not set, weather broadcast disabled");
        }

        let (bot, db, config) = self.handles();
        let survey_job = Job::new_async(HOURLY_SCHEDULE, move |_uuid, _l| {
            let (bot, db, config) = (bot.clone(), db.clone(), config.clone());
            Box::pin(async move {
                if let Err(e) = run_surveys(bot, db, config).await {
                    tracing::error!("Survey job failed: {}", e);
                }
            })
        })?;
        self.scheduler.add(survey_job).await?;

        if self.config.monobank_webhook_url().is_some() {
            let (_, db, config) = self.handles();
            let webhook_job = Job::new_async(HOURLY_SCHEDULE, move |_uuid, _l| {
                let (db, config) = (db.clone(), config.clone());
                Box::pin(async move {
                    if !is_local_hour(Utc::now(), config.time_zone, WEBHOOK_HOUR) {
                        return;
                    }
                    if let Err(e) = setup_webhooks(db, config).await {
                        tracing::error!("Monobank webhook job failed: {}", e);
                    }
                })
            })?;
            self.scheduler.add(webhook_job).await?;
        } else {
            tracing::warn!("BASE_URL is not set, Monobank webhook setup disabled");
        }

        self.scheduler.start().await?;

        log_system_event("scheduler_started", Some(&format!("time zone {}", tz)));
        Ok(())
    }

    pub async fn stop(&mut self) -> JobResult<()> {
        self.scheduler.shutdown().await?;
        Ok(())
    }

    fn handles(&self) -> (Bot, Arc<DatabaseManager>, Arc<Config>) {
        (self.bot.clone(), self.db.clone(), self.config.clone())
    }
}

async fn run_chronoposts(bot: Bot, db: Arc<DatabaseManager>, config: Arc<Config>) -> JobResult<()> {
    let scheduler = MessageScheduler::new(bot, db.pool.clone(), config.time_zone);
    let report = scheduler.process_messages(Utc::now()).await?;
    if report.sent + report.failed > 0 {
        log_job_run("chronopost", report.sent, report.failed);
    }
    Ok(())
}

async fn run_birthdays(bot: Bot, db: Arc<DatabaseManager>, config: Arc<Config>) -> JobResult<()> {
    if config.default_chat_id == 0 {
        tracing::warn!("DEFAULT_CHAT_ID is not set, skipping birthday greetings");
        return Ok(());
    }
    let sent = greetings::send_birthday_greetings(
        &bot,
        &db.pool,
        config.default_chat_id,
        config.time_zone,
        Utc::now(),
    )
    .await?;
    log_job_run("birthdays", sent, 0);
    Ok(())
}

async fn run_weather(bot: Bot, db: Arc<DatabaseManager>, config: Arc<Config>) -> JobResult<()> {
    let Some(api_key) = config.weather_api_key.as_deref() else {
        return Ok(());
    };
    let client = OpenWeatherClient::new(api_key);
    let sent = weather::broadcast_forecast(&bot, &db.pool, &client, config.city_coordinates, config.time_zone)
        .await?;
    log_job_run("weather", sent, 0);
    Ok(())
}

async fn run_surveys(bot: Bot, db: Arc<DatabaseManager>, config: Arc<Config>) -> JobResult<()> {
    let sent = survey::dispatch_surveys(&bot, &db.pool, config.time_zone, Utc::now()).await?;
    if sent > 0 {
        log_job_run("survey", sent, 0);
    }
    Ok(())
}

/// Registers the Monobank webhook for every stored client. Runs daily and
/// once at startup, after the HTTP server is listening.
pub async fn setup_webhooks(db: Arc<DatabaseManager>, config: Arc<Config>) -> JobResult<()> {
    let Some(url) = config.monobank_webhook_url() else {
        return Ok(());
    };
    let configured = monobank::setup_webhooks(&db.pool, &url).await?;
    log_job_run("monobank_webhooks", configured, 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Kyiv;

    #[test]
    fn test_local_hour_in_summer_and_winter() {
        // UTC+3 in July
        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 6, 0, 0).unwrap();
        assert!(is_local_hour(summer, Kyiv, BIRTHDAY_HOUR));
        assert!(!is_local_hour(summer, Kyiv, 6));

        // UTC+2 in January
        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap();
        assert!(is_local_hour(winter, Kyiv, BIRTHDAY_HOUR));
        assert!(!is_local_hour(winter, Kyiv, 7));
    }

    #[test]
    fn test_local_hour_across_utc_midnight() {
        // 01:00 UTC is 03:00 or 04:00 in Kyiv depending on the season
        let winter = Utc.with_ymd_and_hms(2024, 2, 1, 1, 0, 0).unwrap();
        assert!(is_local_hour(winter, Kyiv, WEBHOOK_HOUR));
        let summer = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(is_local_hour(summer, Kyiv, WEBHOOK_HOUR));
    }
}
