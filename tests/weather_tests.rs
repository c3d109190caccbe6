use std::sync::{Arc, Mutex};

use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
use chrono::{NaiveTime, TimeZone, Utc};
use chrono_tz::Europe::Kyiv;
use run_club_bot::database::{connection::DatabaseManager, models::WeatherNotification};
use run_club_bot::services::weather::{
    self, OpenWeatherClient, WeatherError, NO_FORECAST_TEXT,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use teloxide::Bot;
use tempfile::TempDir;

const KYIV: (f64, f64) = (50.4501, 30.5234);

/// The given hour of the current Kyiv day, as a Unix timestamp.
fn today_at(hour: u32) -> i64 {
    let today = Utc::now().with_timezone(&Kyiv).date_naive();
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap();
    Kyiv.from_local_datetime(&today.and_time(time))
        .earliest()
        .unwrap()
        .timestamp()
}

/// Fake forecast endpoint; records the query of every request.
async fn spawn_fake_forecast(body: Value, seen: Arc<Mutex<Vec<HashMap<String, String>>>>) -> String {
    let app = Router::new().route(
        "/forecast",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let body = body.clone();
            let seen = seen.clone();
            async move {
                let authorized = params.get("appid").map(String::as_str) == Some("key");
                seen.lock().unwrap().push(params);
                if authorized {
                    Ok(Json(body))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{address}/forecast")
}

fn forecast_body() -> Value {
    json!({
        "city": { "name": "Kyiv", "country": "UA" },
        "list": [
            { "dt": today_at(6), "main": { "temp": 4.04 }, "weather": [{ "description": "ясно" }] },
            { "dt": today_at(12), "main": { "temp": 9.96 }, "weather": [{ "description": "хмарно" }] },
            {
                "dt": today_at(15),
                "main": { "temp": 8.0 },
                "weather": [{ "description": "легкий дощ" }],
                "rain": { "3h": 1.25 }
            }
        ]
    })
}

#[tokio::test]
async fn test_current_forecast() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let url = spawn_fake_forecast(forecast_body(), seen.clone()).await;
    let client = OpenWeatherClient::with_url("key", &url);

    let text = weather::current_forecast(&client, KYIV, Kyiv).await.unwrap();

    assert!(text.starts_with("🌤 Прогноз погоди на сьогодні\n➖ ➖ ➖\n🌆 Kyiv, UA"));
    // 06:00 is outside the daytime window
    assert!(!text.contains("Ясно"));
    assert!(text.contains("🕗 <b>12:00</b>\n    🔸 Хмарно 🌡 10.0°C"));
    assert!(text.contains("🔸 Легкий дощ 🌡 8.0°C ☂️ Дощ: 1.25 мм"));

    let params = seen.lock().unwrap()[0].clone();
    assert_eq!(params["units"], "metric");
    assert_eq!(params["lang"], "uk");
    assert_eq!(params["lat"], "50.4501");
}

#[tokio::test]
async fn test_current_forecast_without_daytime_slots() {
    let body = json!({
        "city": { "name": "Kyiv", "country": "UA" },
        "list": [{ "dt": today_at(23), "main": { "temp": 1.0 }, "weather": [] }]
    });
    let url = spawn_fake_forecast(body, Arc::new(Mutex::new(Vec::new()))).await;
    let client = OpenWeatherClient::with_url("key", &url);

    let text = weather::current_forecast(&client, KYIV, Kyiv).await.unwrap();
    assert_eq!(text, NO_FORECAST_TEXT);
}

#[tokio::test]
async fn test_forecast_errors() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let url = spawn_fake_forecast(forecast_body(), seen.clone()).await;

    let unauthorized = OpenWeatherClient::with_url("wrong", &url).fetch_forecast(KYIV).await;
    assert!(matches!(unauthorized, Err(WeatherError::Status(status)) if status.as_u16() == 401));

    let invalid = OpenWeatherClient::with_url("key", &url).fetch_forecast((120.0, 30.0)).await;
    assert!(matches!(invalid, Err(WeatherError::InvalidCoordinates(..))));
    // Invalid coordinates never reach the API
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_broadcast_skips_without_work() {
    let temp_dir = TempDir::new().unwrap();
    let db_url = format!("sqlite://{}", temp_dir.path().join("weather.db").display());
    let db = DatabaseManager::new(&db_url).await.unwrap();
    db.run_migrations().await.unwrap();
    let bot = Bot::new("123456:TEST");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let dry = json!({
        "city": { "name": "Kyiv", "country": "UA" },
        "list": [{ "dt": today_at(12), "main": { "temp": 20.0 }, "weather": [{ "description": "ясно" }] }]
    });
    let url = spawn_fake_forecast(dry, seen.clone()).await;
    let client = OpenWeatherClient::with_url("key", &url);

    // No subscriptions: the API is not even called
    let delivered = weather::broadcast_forecast(&bot, &db.pool, &client, KYIV, Kyiv).await.unwrap();
    assert_eq!(delivered, 0);
    assert!(seen.lock().unwrap().is_empty());

    // A dry day sends nothing
    WeatherNotification::create(&db.pool, "Клубний чат", -100500, Some("Увага, дощ!"), None)
        .await
        .unwrap();
    let delivered = weather::broadcast_forecast(&bot, &db.pool, &client, KYIV, Kyiv).await.unwrap();
    assert_eq!(delivered, 0);
    assert_eq!(seen.lock().unwrap().len(), 1);
}
