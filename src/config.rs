use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use std::env;

const DEFAULT_DATABASE_URL: &str = "sqlite:./data/run_club.db";
const DEFAULT_MONOBANK_WEBHOOK_PATH: &str = "/bank/webhook/monobank/";
const DEFAULT_CITY_COORDINATES: (f64, f64) = (50.4501, 30.5234);

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub http_port: u16,
    /// Club chat used for publishing trainings, quizzes and birthday greetings.
    pub default_chat_id: i64,
    /// Telegram ids allowed to run admin-only commands.
    pub admins: Vec<i64>,
    pub base_url: String,
    pub monobank_webhook_path: String,
    pub weather_api_key: Option<String>,
    pub city_coordinates: (f64, f64),
    pub time_zone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        if token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN must be set"));
        }

        let database_url = non_empty_var("DATABASE_URL")
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let port_str = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "3000".to_string());
        let http_port = port_str.trim()
            .parse()
            .map_err(|_| anyhow!("Invalid HTTP_PORT"))?;

        let default_chat_id = match non_empty_var("DEFAULT_CHAT_ID") {
            Some(raw) => raw.trim()
                .parse()
                .map_err(|_| anyhow!("Invalid DEFAULT_CHAT_ID"))?,
            None => 0,
        };

        let admins = match non_empty_var("ADMINS_BOT") {
            Some(raw) => parse_admins(&raw)?,
            None => Vec::new(),
        };

        let base_url = non_empty_var("BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_default();

        let monobank_webhook_path = non_empty_var("MONOBANK_WEBHOOK_PATH")
            .unwrap_or_else(|| DEFAULT_MONOBANK_WEBHOOK_PATH.to_string());
        if !monobank_webhook_path.starts_with('/') {
            return Err(anyhow!("MONOBANK_WEBHOOK_PATH must start with '/'"));
        }

        let city_coordinates = match non_empty_var("CITY_COORDINATES") {
            Some(raw) => parse_coordinates(&raw)?,
            None => DEFAULT_CITY_COORDINATES,
        };

        let time_zone = non_empty_var("TIME_ZONE")
            .unwrap_or_else(|| "Europe/Kyiv".to_string())
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid TIME_ZONE: {e}"))?;

        Ok(Config {
            telegram_bot_token: token,
            database_url,
            http_port,
            default_chat_id,
            admins,
            base_url,
            monobank_webhook_path,
            weather_api_key: non_empty_var("WEATHER_API_KEY"),
            city_coordinates,
            time_zone,
        })
    }

    /// Full URL Monobank should call, or `None` when no public base URL is configured.
    pub fn monobank_webhook_url(&self) -> Option<String> {
        if self.base_url.is_empty() {
            return None;
        }
        Some(format!("{}{}", self.base_url, self.monobank_webhook_path))
    }

    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.admins.contains(&telegram_id)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_admins(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| anyhow!("Invalid admin id in ADMINS_BOT: {s}")))
        .collect()
}

fn parse_coordinates(raw: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 2 {
        return Err(anyhow!("CITY_COORDINATES must be 'lat,lon'"));
    }
    let lat: f64 = parts[0].parse().map_err(|_| anyhow!("Invalid latitude in CITY_COORDINATES"))?;
    let lon: f64 = parts[1].parse().map_err(|_| anyhow!("Invalid longitude in CITY_COORDINATES"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(anyhow!("CITY_COORDINATES out of range"));
    }
    Ok((lat, lon))
}
