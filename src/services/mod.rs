/// Paced Telegram delivery shared by every bulk sender
pub mod broadcaster;
/// Scheduled (chronopost) messages
pub mod chronopost;
/// GPX route analysis and map rendering
pub mod gpx;
/// Birthday greetings for the club chat
pub mod greetings;
/// Monobank API client, transaction messages and webhooks
pub mod monobank;
/// Training registration rules
pub mod registration;
/// Cron jobs
pub mod scheduler;
/// Post-training rating survey
pub mod survey;
/// OpenWeatherMap forecasts
pub mod weather;
