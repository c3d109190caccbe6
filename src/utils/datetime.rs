use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parses `DD.MM.YYYY`, accepting `/`, `,` and spaces as separators.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let normalized = input.trim().replace(['/', ',', ' '], ".");
    NaiveDate::parse_from_str(&normalized, "%d.%m.%Y").ok()
}

/// Parses `HH:MM`, accepting `/`, `,`, `.` and spaces as separators.
pub fn parse_time(input: &str) -> Option<NaiveTime> {
    let normalized = input.trim().replace(['/', ',', ' ', '.'], ":");
    NaiveTime::parse_from_str(&normalized, "%H:%M").ok()
}

/// Normalises a pace entry (`5.30`, `5,30`, `5 30`) to `M:SS` form.
pub fn normalize_pace(input: &str) -> String {
    input.trim().replace(['.', ',', ' '], ":")
}

/// Converts a wall-clock date and time in `tz` to UTC.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::new(date, time);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("{} does not exist in {}", naive, tz))
}

/// UTC instant of local midnight starting `date` in `tz`.
pub fn local_day_start(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    local_to_utc(date, NaiveTime::MIN, tz).unwrap_or_else(|_| date.and_time(NaiveTime::MIN).and_utc())
}

pub fn local_today(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// `31.12.2025 18:30` in the club's time zone.
pub fn format_datetime(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%d.%m.%Y %H:%M").to_string()
}

pub fn format_date(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%d.%m.%Y").to_string()
}

pub fn format_time(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%H:%M").to_string()
}

/// Ukrainian month name in the nominative case.
pub fn month_name_uk(month: u32) -> &'static str {
    match month {
        1 => "Січень",
        2 => "Лютий",
        3 => "Березень",
        4 => "Квітень",
        5 => "Травень",
        6 => "Червень",
        7 => "Липень",
        8 => "Серпень",
        9 => "Вересень",
        10 => "Жовтень",
        11 => "Листопад",
        12 => "Грудень",
        _ => "",
    }
}
