use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::datetime::{normalize_pace, parse_date};

pub const MIN_PACE_SECONDS: u32 = 180;
pub const MAX_PACE_SECONDS: u32 = 900;

#[allow(clippy::expect_used)]
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?1?\d{9,13}$").expect("phone regex"));

#[allow(clippy::expect_used)]
static TG_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^tg://\S+$").expect("tg url regex"));

#[allow(clippy::expect_used)]
static WEB_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(https?|ftps?)://[a-z0-9\-._~%]+(\.[a-z0-9\-._~%]+)*(:\d+)?(/\S*)?$").expect("web url regex")
});

/// First or last name: more than 3 and at most 18 characters, stored capitalised.
pub fn validate_person_name(input: &str) -> Result<String> {
    let trimmed = input.trim();
    let len = trimmed.chars().count();

    if len <= 3 || len > 18 {
        return Err(anyhow!("Name must be between 4 and 18 characters"));
    }
    if trimmed.chars().any(|c| c.is_ascii_digit() || c == '\n') {
        return Err(anyhow!("Name cannot contain digits or line breaks"));
    }

    Ok(capitalize(trimmed))
}

/// Uppercases the first character and lowercases the rest.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Normalises a phone number from a shared contact to `+<digits>`.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let digits = raw.trim().trim_start_matches('+');
    let phone = format!("+{digits}");
    if !PHONE_RE.is_match(&phone) {
        return Err(anyhow!("Phone number must contain 9 to 13 digits"));
    }
    Ok(phone)
}

/// Date of birth in `DD.MM.YYYY` (comma accepted), strictly before `today`.
pub fn validate_date_of_birth(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let dob = parse_date(&input.trim().replace(',', "."))
        .ok_or_else(|| anyhow!("Date of birth must be in DD.MM.YYYY format"))?;
    if dob >= today {
        return Err(anyhow!("Date of birth must be in the past"));
    }
    Ok(dob)
}

pub fn validate_training_title(title: &str) -> Result<String> {
    let title = title.trim();
    let len = title.chars().count();

    if len < 3 {
        return Err(anyhow!("Training title must be at least 3 characters long"));
    }
    if len > 200 {
        return Err(anyhow!("Training title cannot be longer than 200 characters"));
    }
    if title.contains('\n') || title.contains('\r') {
        return Err(anyhow!("Training title cannot contain line breaks"));
    }

    Ok(title.to_string())
}

pub fn validate_location(location: &str) -> Result<String> {
    let location = location.trim();
    let len = location.chars().count();

    if len < 3 {
        return Err(anyhow!("Location must be at least 3 characters long"));
    }
    if len > 300 {
        return Err(anyhow!("Location cannot be longer than 300 characters"));
    }

    Ok(location.to_string())
}

/// Distance in kilometres: greater than 1 and at most 100, comma accepted as decimal point.
pub fn validate_distance(input: &str) -> Result<f64> {
    let distance: f64 = input
        .trim()
        .replace(',', ".")
        .parse()
        .map_err(|_| anyhow!("Distance must be a number"))?;

    if !distance.is_finite() || distance <= 1.0 {
        return Err(anyhow!("Distance must be greater than 1 km"));
    }
    if distance > 100.0 {
        return Err(anyhow!("Distance cannot exceed 100 km"));
    }

    Ok((distance * 100.0).round() / 100.0)
}

pub fn validate_max_participants(input: &str) -> Result<i64> {
    let value: i64 = input
        .trim()
        .parse()
        .map_err(|_| anyhow!("Participants limit must be a whole number"))?;

    if !(0..=100).contains(&value) {
        return Err(anyhow!("Participants limit must be between 0 and 100"));
    }

    Ok(value)
}

/// Parses a pace in `MM:SS` per km and returns its normalised text and seconds.
pub fn validate_pace(input: &str) -> Result<(String, u32)> {
    let normalized = normalize_pace(input);
    let (minutes, seconds) = normalized
        .split_once(':')
        .ok_or_else(|| anyhow!("Pace must be in MM:SS format"))?;

    let minutes: u32 = minutes.parse().map_err(|_| anyhow!("Pace must be in MM:SS format"))?;
    let seconds: u32 = seconds.parse().map_err(|_| anyhow!("Pace must be in MM:SS format"))?;
    if seconds >= 60 {
        return Err(anyhow!("Pace seconds must be below 60"));
    }

    let total = minutes * 60 + seconds;
    if !(MIN_PACE_SECONDS..=MAX_PACE_SECONDS).contains(&total) {
        return Err(anyhow!("Pace must be between 3:00 and 15:00 per km"));
    }

    Ok((format!("{minutes}:{seconds:02}"), total))
}

/// Chronopost button links: `tg://` deep links or http(s)/ftp(s)/tel/mailto URLs.
pub fn validate_button_url(url: &str) -> Result<()> {
    let url = url.trim();

    if url.starts_with("tg://") {
        if TG_URL_RE.is_match(url) {
            return Ok(());
        }
        return Err(anyhow!("Invalid Telegram link. Example: tg://resolve?domain=example"));
    }

    let lower = url.to_ascii_lowercase();
    let valid = if let Some(rest) = lower.strip_prefix("mailto:") {
        rest.contains('@') && !rest.contains(char::is_whitespace)
    } else if let Some(rest) = lower.strip_prefix("tel:") {
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || "+-() ".contains(c))
    } else {
        WEB_URL_RE.is_match(url)
    };

    if valid {
        Ok(())
    } else {
        Err(anyhow!("Invalid URL. Example: https://example.com or mailto:user@example.com"))
    }
}

pub fn validate_rating(rating: i64) -> Result<i64> {
    if !(1..=5).contains(&rating) {
        return Err(anyhow!("Rating must be between 1 and 5"));
    }
    Ok(rating)
}
