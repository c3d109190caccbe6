use run_club_bot::config::Config;
use std::env;
use std::sync::Mutex;

// Config tests share process-wide environment variables
static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

const OPTIONAL_VARS: [&str; 9] = [
    "DATABASE_URL",
    "HTTP_PORT",
    "DEFAULT_CHAT_ID",
    "ADMINS_BOT",
    "BASE_URL",
    "MONOBANK_WEBHOOK_PATH",
    "WEATHER_API_KEY",
    "CITY_COORDINATES",
    "TIME_ZONE",
];

fn clear_env() {
    env::remove_var("TELEGRAM_BOT_TOKEN");
    for var in OPTIONAL_VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_config_from_env_with_all_vars() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "test_token_123");
    env::set_var("DATABASE_URL", "sqlite:test.db");
    env::set_var("HTTP_PORT", "8080");
    env::set_var("DEFAULT_CHAT_ID", "-1001234567890");
    env::set_var("ADMINS_BOT", "111, 222");
    env::set_var("BASE_URL", "https://club.example.com/");
    env::set_var("WEATHER_API_KEY", "weather-key");
    env::set_var("CITY_COORDINATES", "49.84,24.03");
    env::set_var("TIME_ZONE", "Europe/Warsaw");

    let config = Config::from_env().unwrap();

    assert_eq!(config.telegram_bot_token, "test_token_123");
    assert_eq!(config.database_url, "sqlite:test.db");
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.default_chat_id, -1001234567890);
    assert_eq!(config.admins, vec![111, 222]);
    assert!(config.is_admin(222));
    assert!(!config.is_admin(333));
    assert_eq!(config.base_url, "https://club.example.com");
    assert_eq!(config.weather_api_key.as_deref(), Some("weather-key"));
    assert_eq!(config.city_coordinates, (49.84, 24.03));
    assert_eq!(config.time_zone, chrono_tz::Europe::Warsaw);
    assert_eq!(
        config.monobank_webhook_url().as_deref(),
        Some("https://club.example.com/bank/webhook/monobank/")
    );

    clear_env();
}

#[test]
fn test_config_from_env_with_defaults() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "required_token");

    let config = Config::from_env().unwrap();

    assert_eq!(config.telegram_bot_token, "required_token");
    assert_eq!(config.database_url, "sqlite:./data/run_club.db");
    assert_eq!(config.http_port, 3000);
    assert_eq!(config.default_chat_id, 0);
    assert!(config.admins.is_empty());
    assert!(config.weather_api_key.is_none());
    assert_eq!(config.time_zone, chrono_tz::Europe::Kyiv);
    assert_eq!(config.city_coordinates, (50.4501, 30.5234));
    // No public URL, no webhook
    assert!(config.monobank_webhook_url().is_none());

    clear_env();
}

#[test]
fn test_config_missing_required_token() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    let result = Config::from_env();
    assert!(result.is_err());

    let error_msg = result.unwrap_err().to_string();
    assert!(error_msg.contains("TELEGRAM_BOT_TOKEN must be set"));
}

#[test]
fn test_config_invalid_port() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "test_token");
    env::set_var("HTTP_PORT", "invalid_port");

    let result = Config::from_env();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Invalid HTTP_PORT"));

    env::set_var("HTTP_PORT", "-1");
    assert!(Config::from_env().is_err());

    env::set_var("HTTP_PORT", "65535");
    assert_eq!(Config::from_env().unwrap().http_port, 65535);

    clear_env();
}

#[test]
fn test_config_invalid_optional_values() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();
    env::set_var("TELEGRAM_BOT_TOKEN", "test_token");

    env::set_var("ADMINS_BOT", "12,abc");
    assert!(Config::from_env().is_err());
    env::remove_var("ADMINS_BOT");

    env::set_var("TIME_ZONE", "Mars/Olympus");
    let error_msg = Config::from_env().unwrap_err().to_string();
    assert!(error_msg.contains("Invalid TIME_ZONE"));
    env::remove_var("TIME_ZONE");

    env::set_var("MONOBANK_WEBHOOK_PATH", "bank/webhook");
    assert!(Config::from_env().is_err());
    env::remove_var("MONOBANK_WEBHOOK_PATH");

    env::set_var("CITY_COORDINATES", "200,30");
    assert!(Config::from_env().is_err());

    clear_env();
}

#[test]
fn test_config_empty_values() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "");
    assert!(Config::from_env().is_err());

    env::set_var("TELEGRAM_BOT_TOKEN", "valid_token");
    env::set_var("DATABASE_URL", "");
    env::set_var("WEATHER_API_KEY", "  ");
    let config = Config::from_env().unwrap();
    assert_eq!(config.database_url, "sqlite:./data/run_club.db");
    assert!(config.weather_api_key.is_none());

    clear_env();
}

#[test]
fn test_config_custom_webhook_path() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "token");
    env::set_var("BASE_URL", "https://run.example.org");
    env::set_var("MONOBANK_WEBHOOK_PATH", "/hooks/mono");

    let config = Config::from_env().unwrap();
    assert_eq!(
        config.monobank_webhook_url().as_deref(),
        Some("https://run.example.org/hooks/mono")
    );

    clear_env();
}
