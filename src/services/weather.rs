//! OpenWeatherMap forecast client and the club's forecast messages.

use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::models::WeatherNotification;
use crate::services::broadcaster;
use crate::utils::html::{clean_tag_message, truncate_chars};
use crate::utils::logging::log_external_call;
use crate::utils::media::input_file;
use crate::utils::validation::capitalize;

pub const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";
pub const NO_FORECAST_TEXT: &str = "Прогноз погоди не доступний в даний час доби";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("invalid coordinates ({0}, {1})")]
    InvalidCoordinates(f64, f64),
    #[error("weather API returned {0}")]
    Status(StatusCode),
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub list: Vec<ForecastEntry>,
    #[serde(default)]
    pub city: City,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct City {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ForecastEntry {
    /// Unix timestamp of the 3-hour slot.
    pub dt: i64,
    #[serde(default)]
    pub main: MainReadings,
    #[serde(default)]
    pub weather: Vec<Condition>,
    #[serde(default)]
    pub rain: Option<Precipitation>,
    #[serde(default)]
    pub snow: Option<Precipitation>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MainReadings {
    #[serde(default)]
    pub temp: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Condition {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Precipitation {
    #[serde(rename = "3h", default)]
    pub three_hours: Option<f64>,
}

pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    url: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_url(api_key, FORECAST_URL)
    }

    pub fn with_url(api_key: &str, url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: api_key.to_string(),
            url: url.to_string(),
        }
    }

    pub async fn fetch_forecast(&self, coordinates: (f64, f64)) -> Result<ForecastResponse, WeatherError> {
        let (lat, lon) = coordinates;
        if !valid_coordinates(lat, lon) {
            return Err(WeatherError::InvalidCoordinates(lat, lon));
        }

        log_external_call("openweathermap", "GET forecast", Some(&format!("{lat},{lon}")));
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
                ("lang", "uk".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

fn valid_coordinates(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

pub struct WeatherProcessor {
    pub filter_precipitation: bool,
}

impl WeatherProcessor {
    pub fn has_precipitation(entry: &ForecastEntry) -> bool {
        entry.rain.is_some() || entry.snow.is_some()
    }

    pub fn filter(&self, forecast: &ForecastResponse) -> Vec<ForecastEntry> {
        forecast
            .list
            .iter()
            .filter(|entry| !self.filter_precipitation || Self::has_precipitation(entry))
            .cloned()
            .collect()
    }
}

pub struct WeatherFormatter {
    pub include_today_only: bool,
}

impl WeatherFormatter {
    pub fn format_report(&self, entries: &[ForecastEntry], now: DateTime<Utc>, tz: Tz) -> Vec<String> {
        entries
            .iter()
            .filter_map(|entry| self.format_entry(entry, now, tz))
            .collect()
    }

    fn format_entry(&self, entry: &ForecastEntry, now: DateTime<Utc>, tz: Tz) -> Option<String> {
        let at = Utc.timestamp_opt(entry.dt, 0).single()?.with_timezone(&tz);

        if self.include_today_only && !is_within_today_range(at, now, tz) {
            return None;
        }

        let slot = if self.include_today_only {
            at.format("%H:%M").to_string()
        } else {
            at.format("%Y-%m-%d %H:%M").to_string()
        };

        let description = entry
            .weather
            .first()
            .map(|c| c.description.as_str())
            .filter(|d| !d.is_empty())
            .unwrap_or("немає опису");
        let temperature = (entry.main.temp * 10.0).round() / 10.0;
        let precipitation = precipitation_text(entry);
        let precipitation = if precipitation.is_empty() {
            String::new()
        } else {
            format!(" ☂️ {precipitation}")
        };

        Some(format!(
            "🕗 <b>{slot}</b>\n    🔸 {} 🌡 {temperature:.1}°C{precipitation}",
            capitalize(description)
        ))
    }
}

/// Between 08:00 and 21:00 of the local day of `now`.
pub fn is_within_today_range(at: DateTime<Tz>, now: DateTime<Utc>, tz: Tz) -> bool {
    let today = now.with_timezone(&tz).date_naive();
    if at.date_naive() != today {
        return false;
    }
    let time = at.time();
    let (Some(start), Some(end)) = (NaiveTime::from_hms_opt(8, 0, 0), NaiveTime::from_hms_opt(21, 0, 0)) else {
        return false;
    };
    start <= time && time <= end
}

/// `"Дощ: 0.5 мм, Сніг: 1 мм"` from the 3-hour totals.
pub fn precipitation_text(entry: &ForecastEntry) -> String {
    [("Дощ", &entry.rain), ("Сніг", &entry.snow)]
        .into_iter()
        .filter_map(|(label, data)| {
            data.as_ref()
                .map(|p| format!("{label}: {} мм", p.three_hours.unwrap_or(0.0)))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn forecast_text(recipient_text: &str, city: &str, country: &str, parts: &[String]) -> String {
    format!(
        "{recipient_text}\n➖ ➖ ➖\n🌆 {city}, {country}\n\n{}",
        parts.join("\n")
    )
}

fn city_and_country(forecast: &ForecastResponse) -> (String, String) {
    (
        forecast.city.name.clone().unwrap_or_else(|| "Unknown City".to_string()),
        forecast.city.country.clone().unwrap_or_else(|| "Unknown Country".to_string()),
    )
}

/// Today's unfiltered forecast for `/weather_now`, or [`NO_FORECAST_TEXT`].
pub async fn current_forecast(
    client: &OpenWeatherClient,
    coordinates: (f64, f64),
    tz: Tz,
) -> Result<String, WeatherError> {
    let forecast = client.fetch_forecast(coordinates).await?;
    let entries = WeatherProcessor { filter_precipitation: false }.filter(&forecast);
    let parts = WeatherFormatter { include_today_only: true }.format_report(&entries, Utc::now(), tz);

    if parts.is_empty() {
        return Ok(NO_FORECAST_TEXT.to_string());
    }

    let (city, country) = city_and_country(&forecast);
    Ok(forecast_text("🌤 Прогноз погоди на сьогодні", &city, &country, &parts))
}

/// Daily precipitation warning for every subscribed chat. Returns delivered messages.
pub async fn broadcast_forecast(
    bot: &Bot,
    pool: &SqlitePool,
    client: &OpenWeatherClient,
    coordinates: (f64, f64),
    tz: Tz,
) -> anyhow::Result<usize> {
    let receivers = WeatherNotification::active(pool).await?;
    if receivers.is_empty() {
        info!("There are no active weather subscriptions");
        return Ok(0);
    }

    let forecast = client.fetch_forecast(coordinates).await?;
    let entries = WeatherProcessor { filter_precipitation: true }.filter(&forecast);
    if entries.is_empty() {
        info!("No precipitation in the forecast");
        return Ok(0);
    }
    let parts = WeatherFormatter { include_today_only: true }.format_report(&entries, Utc::now(), tz);
    if parts.is_empty() {
        info!("No precipitation expected during the day");
        return Ok(0);
    }

    let (city, country) = city_and_country(&forecast);
    let mut delivered = 0;

    for receiver in receivers {
        let text = forecast_text(receiver.text.as_deref().unwrap_or_default(), &city, &country, &parts);
        let chat_id = ChatId(receiver.chat_id);

        let sent = match receiver.poster.as_deref().filter(|p| !p.is_empty()) {
            Some(poster) => bot
                .send_photo(chat_id, input_file(poster))
                .caption(clean_tag_message(&truncate_chars(&text, 1024)))
                .parse_mode(ParseMode::Html)
                .await
                .map(|_| true)
                .unwrap_or_else(|e| {
                    error!("Failed to send forecast to {}: {}", receiver.chat_id, e);
                    false
                }),
            None => {
                broadcaster::send_message(bot, chat_id, &clean_tag_message(&truncate_chars(&text, 4096)), None)
                    .await
            }
        };

        if sent {
            delivered += 1;
        } else {
            warn!("Forecast not delivered to {}", receiver.title);
        }
        tokio::time::sleep(broadcaster::MESSAGE_INTERVAL).await;
    }

    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dt: i64, rain: Option<f64>) -> ForecastEntry {
        ForecastEntry {
            dt,
            main: MainReadings { temp: 12.345 },
            weather: vec![Condition { description: "легкий дощ".into() }],
            rain: rain.map(|mm| Precipitation { three_hours: Some(mm) }),
            snow: None,
        }
    }

    #[test]
    fn test_processor_keeps_only_precipitation() {
        let forecast = ForecastResponse {
            list: vec![entry(1, Some(0.4)), entry(2, None)],
            city: City::default(),
        };
        let filtered = WeatherProcessor { filter_precipitation: true }.filter(&forecast);
        assert_eq!(filtered.len(), 1);
        let all = WeatherProcessor { filter_precipitation: false }.filter(&forecast);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_precipitation_text() {
        let mut e = entry(0, Some(0.5));
        e.snow = Some(Precipitation { three_hours: None });
        assert_eq!(precipitation_text(&e), "Дощ: 0.5 мм, Сніг: 0 мм");
        assert_eq!(precipitation_text(&entry(0, None)), "");
    }

    #[test]
    fn test_today_window() {
        let tz = chrono_tz::Europe::Kyiv;
        // 2025-06-10 12:00 Kyiv
        let now = tz.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap().with_timezone(&Utc);
        let inside = tz.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap();
        let early = tz.with_ymd_and_hms(2025, 6, 10, 6, 0, 0).unwrap();
        let late = tz.with_ymd_and_hms(2025, 6, 10, 21, 0, 0).unwrap();
        let tomorrow = tz.with_ymd_and_hms(2025, 6, 11, 9, 0, 0).unwrap();
        assert!(is_within_today_range(inside, now, tz));
        assert!(!is_within_today_range(early, now, tz));
        assert!(is_within_today_range(late, now, tz));
        assert!(!is_within_today_range(tomorrow, now, tz));
    }

    #[test]
    fn test_formatter_today_only() {
        let tz = chrono_tz::Europe::Kyiv;
        let now = tz.with_ymd_and_hms(2025, 6, 10, 7, 0, 0).unwrap().with_timezone(&Utc);
        let morning = tz.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap().timestamp();
        let night = tz.with_ymd_and_hms(2025, 6, 10, 23, 0, 0).unwrap().timestamp();

        let parts = WeatherFormatter { include_today_only: true }
            .format_report(&[entry(morning, Some(0.5)), entry(night, None)], now, tz);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], "🕗 <b>09:00</b>\n    🔸 Легкий дощ 🌡 12.3°C ☂️ Дощ: 0.5 мм");

        let full = WeatherFormatter { include_today_only: false }.format_report(&[entry(night, None)], now, tz);
        assert_eq!(full[0], "🕗 <b>2025-06-10 23:00</b>\n    🔸 Легкий дощ 🌡 12.3°C");
    }

    #[test]
    fn test_formatter_normalises_description_case() {
        let tz = chrono_tz::Europe::Kyiv;
        let now = tz.with_ymd_and_hms(2025, 6, 10, 7, 0, 0).unwrap().with_timezone(&Utc);
        let mut shouting = entry(tz.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap().timestamp(), None);
        shouting.weather = vec![Condition { description: "ЛЕГКИЙ ДОЩ".into() }];

        let parts = WeatherFormatter { include_today_only: true }.format_report(&[shouting], now, tz);
        assert_eq!(parts[0], "🕗 <b>12:00</b>\n    🔸 Легкий дощ 🌡 12.3°C");
    }

    #[test]
    fn test_forecast_text() {
        let text = forecast_text("Увага!", "Kyiv", "UA", &["a".to_string(), "b".to_string()]);
        assert_eq!(text, "Увага!\n➖ ➖ ➖\n🌆 Kyiv, UA\n\na\nb");
    }

    #[test]
    fn test_invalid_coordinates() {
        assert!(!valid_coordinates(91.0, 0.0));
        assert!(valid_coordinates(50.45, 30.52));
    }
}
