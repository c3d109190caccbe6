//! Monobank personal API client, transaction message templates and
//! webhook delivery.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::models::{MonoBankCard, MonoBankClient};
use crate::services::broadcaster;
use crate::utils::datetime::local_to_utc;
use crate::utils::html::{clean_tag_message, escape_html};
use crate::utils::logging::{log_external_call, log_external_error};

pub const MONOBANK_API_URL: &str = "https://api.monobank.ua";
pub const RECEIPT_CHECK_URL: &str = "https://check.gov.ua/";

const DEFAULT_DESCRIPTION: &str = "Не зазначено";
const DEFAULT_COMMENT: &str = "---";
const DEFAULT_RECEIPT_ID: &str = "-x-x-";
const SEPARATOR: &str = "〰〰〰〰〰〰〰";

#[allow(clippy::expect_used)]
static PAYER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)user_id:\s*(\d+)").expect("payer id regex"));

#[derive(Debug, Error)]
pub enum MonobankError {
    #[error("Monobank rate limit exceeded")]
    TooManyRequests,
    #[error("Monobank API returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("Monobank request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientInfo {
    #[serde(rename = "clientId", default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "webHookUrl", default)]
    pub web_hook_url: Option<String>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Account {
    pub id: String,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    #[serde(rename = "maskedPan", default)]
    pub masked_pan: Vec<String>,
}

impl Account {
    /// `"black - 537541******1234, 444111******5678"`
    pub fn label(&self) -> String {
        let account_type = self.account_type.as_deref().unwrap_or("Unknown type");
        let pans = if self.masked_pan.is_empty() {
            "Unknown maskedPan".to_string()
        } else {
            self.masked_pan.join(", ")
        };
        format!("{account_type} - {pans}")
    }
}

/// Retries `operation` while Monobank answers 429, up to `retries` attempts in total.
pub async fn retry_on_many_requests<T, F, Fut>(
    retries: u32,
    delay: Duration,
    mut operation: F,
) -> Result<T, MonobankError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MonobankError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(MonobankError::TooManyRequests) if attempt < retries => {
                warn!("Monobank rate limit hit, attempt {}/{}; retrying in {:?}", attempt, retries, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Personal API client authenticated with a client's `X-Token`.
#[derive(Clone)]
pub struct MonobankApi {
    client: Client,
    token: String,
    base_url: String,
}

impl MonobankApi {
    pub fn new(token: &str) -> Self {
        Self::with_base_url(token, MONOBANK_API_URL)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MonobankError> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MonobankError::TooManyRequests);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MonobankError::Api { status, message });
        }
        Ok(response)
    }

    pub async fn client_info(&self) -> Result<ClientInfo, MonobankError> {
        log_external_call("monobank", "GET /personal/client-info", None);
        let response = self
            .client
            .get(format!("{}/personal/client-info", self.base_url))
            .header("X-Token", &self.token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn create_webhook(&self, webhook_url: &str) -> Result<(), MonobankError> {
        log_external_call("monobank", "POST /personal/webhook", Some(webhook_url));
        let response = self
            .client
            .post(format!("{}/personal/webhook", self.base_url))
            .header("X-Token", &self.token)
            .json(&serde_json::json!({ "webHookUrl": webhook_url }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Raw statement items for `account` between two Unix timestamps.
    pub async fn statements(&self, account: &str, from: i64, to: i64) -> Result<Vec<Value>, MonobankError> {
        let path = format!("/personal/statement/{account}/{from}/{to}");
        log_external_call("monobank", "GET", Some(&path));
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("X-Token", &self.token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Statement for whole local days, retried on rate limits.
    pub async fn statements_between(
        &self,
        account: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
        tz: Tz,
    ) -> Result<Vec<Value>, MonobankError> {
        let from = day_bound(date_from, NaiveTime::MIN, tz);
        let to = day_bound(date_to, end_of_day(), tz);
        retry_on_many_requests(3, Duration::from_secs(15), || self.statements(account, from, to)).await
    }

    /// Registers `webhook_url` unless the client already has a webhook.
    /// Returns `true` when a webhook is in place afterwards.
    pub async fn setup_webhook(&self, webhook_url: &str) -> Result<bool, MonobankError> {
        let info = self.client_info().await?;
        if let Some(current) = info.web_hook_url.filter(|url| !url.is_empty()) {
            info!("Monobank webhook is already configured: {}", current);
            return Ok(true);
        }
        self.create_webhook(webhook_url).await?;
        info!("Monobank webhook created: {}", webhook_url);
        Ok(true)
    }

    /// `(account id, label)` pairs for every account of the client.
    pub async fn credit_card_ids(&self) -> Result<Vec<(String, String)>, MonobankError> {
        let info = self.client_info().await?;
        Ok(info
            .accounts
            .iter()
            .map(|account| (account.id.clone(), account.label()))
            .collect())
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

fn day_bound(date: NaiveDate, time: NaiveTime, tz: Tz) -> i64 {
    local_to_utc(date, time, tz)
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|_| date.and_time(time).and_utc().timestamp())
}

/// First and last day of the month containing `today`.
pub fn current_month_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = today.with_day(1).unwrap_or(today);
    let last = first
        .checked_add_months(chrono::Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(today);
    (first, last)
}

/// A statement item as received from the webhook or the statement endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionData {
    pub amount: f64,
    pub balance: f64,
    pub description: String,
    pub comment: String,
    pub receipt_id: String,
    pub commission_rate: f64,
    pub time: i64,
}

impl TransactionData {
    /// Reads `statementItem` when present, otherwise the top-level fields.
    pub fn from_payload(data: &Value) -> Self {
        let item = data
            .get("statementItem")
            .filter(|item| item.as_object().map_or(false, |o| !o.is_empty()));

        let (source, receipt_fallback) = match item {
            Some(item) => (item, None),
            None => (data, Some("id")),
        };

        let receipt_id = text_field(source, "receiptId")
            .or_else(|| receipt_fallback.and_then(|key| text_field(source, key)))
            .unwrap_or_else(|| DEFAULT_RECEIPT_ID.to_string());

        Self {
            amount: number_field(source, "amount") / 100.0,
            balance: number_field(source, "balance") / 100.0,
            description: text_field(source, "description").unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            comment: text_field(source, "comment").unwrap_or_else(|| DEFAULT_COMMENT.to_string()),
            receipt_id,
            commission_rate: number_field(source, "commissionRate"),
            time: number_field(source, "time") as i64,
        }
    }

    pub fn local_time(&self, tz: Tz) -> DateTime<Tz> {
        Utc.timestamp_opt(self.time, 0)
            .single()
            .unwrap_or_default()
            .with_timezone(&tz)
    }

    /// Income template for positive amounts, expense template otherwise.
    pub fn format_message(&self, tz: Tz) -> String {
        let local = self.local_time(tz);
        let date = local.format("%d.%m.%Y");
        let time = local.format("%H:%M:%S");
        let description = escape_html(&self.description);

        if self.amount > 0.0 {
            format!(
                "✅ Зараз відбулось надходження!\n\n\
                 📅 {date} 🕘 {time}\n\
                 👤 {description}\n\
                 {common}\n\
                 🤑 Радуйтеся новим надходженням! 🎉",
                common = self.common_part()
            )
        } else {
            format!(
                "🔻 Щойно були витрачені кошти!\n\n\
                 📅 {date} 🕘 {time}\n\
                 🛍 Кому: {description}\n\
                 🧾 <a href=\"{RECEIPT_CHECK_URL}\">{receipt}</a>\n\
                 {common}\n\
                 💸 Будьте уважні з витратами, але не забувайте жити на повну! 😉",
                receipt = escape_html(&self.receipt_id),
                common = self.common_part()
            )
        }
    }

    /// Thank-you note for the member who paid.
    pub fn format_payer_message(&self, tz: Tz) -> String {
        let local = self.local_time(tz);
        format!(
            "✅ Ваш внесок отримано!\n\n\
             📅 {date} 🕘 {time}\n\
             👤 {description}\n\
             🧾 <a href=\"{RECEIPT_CHECK_URL}\">{receipt}</a>\n\n\
             💰 Сума: {amount:.2}\n\
             {SEPARATOR}\n\
             🙏 Ваш внесок дуже цінується! Дякуємо за довіру! 💖\n\
             🚀 Разом ми рухаємось до нових цілей! 🌈",
            date = local.format("%d.%m.%Y"),
            time = local.format("%H:%M:%S"),
            description = escape_html(&self.description),
            receipt = escape_html(&self.receipt_id),
            amount = self.amount,
        )
    }

    fn common_part(&self) -> String {
        format!(
            "💬 {comment}\n💰 Сума: <b>{amount:.2}</b>\n💵 Баланс: <b>{balance:.2}</b>\n{SEPARATOR}",
            comment = escape_html(&self.comment),
            amount = self.amount,
            balance = self.balance,
        )
    }
}

fn text_field(source: &Value, key: &str) -> Option<String> {
    match source.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(source: &Value, key: &str) -> f64 {
    match source.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// One row of the statement returned by the web API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementEntry {
    pub time: String,
    pub description: String,
    pub comment: String,
    pub amount: f64,
    pub commission: f64,
    pub balance: f64,
}

impl StatementEntry {
    pub fn from_item(item: &Value, tz: Tz) -> Self {
        let transaction = TransactionData::from_payload(item);
        Self {
            time: transaction.local_time(tz).format("%d.%m.%Y %H:%M:%S").to_string(),
            description: transaction.description,
            comment: transaction.comment,
            amount: transaction.amount,
            commission: transaction.commission_rate,
            balance: transaction.balance,
        }
    }
}

/// Resolves which chats hear about a card's transactions.
pub struct ChatIdProvider<'a> {
    pool: &'a SqlitePool,
    admins: &'a [i64],
}

impl<'a> ChatIdProvider<'a> {
    pub fn new(pool: &'a SqlitePool, admins: &'a [i64]) -> Self {
        Self { pool, admins }
    }

    /// The card's own chat, the admins when the card has none, `None` for unknown cards.
    pub async fn chat_ids(&self, card_id: &str) -> Result<Option<Vec<i64>>, sqlx::Error> {
        let card = MonoBankCard::find_active(self.pool, card_id).await?;
        Ok(card.map(|card| match card.chat_id {
            Some(chat_id) if chat_id != 0 => vec![chat_id],
            _ => self.admins.to_vec(),
        }))
    }
}

/// Telegram id of the payer when the comment carries `user_id: <digits>`.
pub fn payer_chat_id(comment: Option<&str>) -> Option<i64> {
    let comment = comment?;
    PAYER_RE
        .captures(comment)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Webhook body sent by Monobank for every statement change.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl WebhookPayload {
    pub fn account(&self) -> Option<&str> {
        self.data.get("account").and_then(Value::as_str)
    }
}

/// Announces one transaction in the card's chats and thanks the payer.
/// Returns the number of delivered messages.
pub async fn notify_transaction(
    bot: &Bot,
    pool: &SqlitePool,
    admins: &[i64],
    tz: Tz,
    payload: &WebhookPayload,
) -> Result<usize, sqlx::Error> {
    let Some(account) = payload.account() else {
        warn!("Monobank webhook without account: {}", payload.kind);
        return Ok(0);
    };

    let Some(chat_ids) = ChatIdProvider::new(pool, admins).chat_ids(account).await? else {
        info!("Monobank webhook for unknown card {}", account);
        return Ok(0);
    };

    let transaction = TransactionData::from_payload(&payload.data);
    let message = clean_tag_message(&transaction.format_message(tz));
    let mut delivered = broadcaster::broadcast(bot, &chat_ids, &message, None).await;

    if let Some(payer) = payer_chat_id(Some(transaction.comment.as_str())) {
        let payer_message = clean_tag_message(&transaction.format_payer_message(tz));
        if broadcaster::send_message(bot, ChatId(payer), &payer_message, None).await {
            delivered += 1;
        }
    }

    Ok(delivered)
}

/// Points every active client's webhook at `webhook_url`; per-client failures are logged.
pub async fn setup_webhooks(pool: &SqlitePool, webhook_url: &str) -> Result<usize, sqlx::Error> {
    let clients = MonoBankClient::active(pool).await?;
    let mut configured = 0;

    for client in clients {
        let api = MonobankApi::new(&client.client_token);
        match retry_on_many_requests(3, Duration::from_secs(15), || api.setup_webhook(webhook_url)).await {
            Ok(_) => configured += 1,
            Err(e) => {
                log_external_error("monobank", "setup_webhook", &e.to_string());
                error!("Failed to set up webhook for client {} ({}): {}", client.id, client.name, e);
            }
        }
    }

    Ok(configured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_account_label() {
        let account = Account {
            id: "abc".into(),
            account_type: Some("black".into()),
            masked_pan: vec!["537541******1234".into()],
        };
        assert_eq!(account.label(), "black - 537541******1234");
    }

    #[test]
    fn test_current_month_range() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap();
        let (first, last) = current_month_range(today);
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[tokio::test]
    async fn test_retry_stops_after_limit() {
        let calls = AtomicU32::new(0);
        let result: Result<(), MonobankError> = retry_on_many_requests(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(MonobankError::TooManyRequests) }
        })
        .await;
        assert!(matches!(result, Err(MonobankError::TooManyRequests)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_other_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), MonobankError> = retry_on_many_requests(3, Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(MonobankError::Api {
                    status: StatusCode::FORBIDDEN,
                    message: "Unknown 'X-Token'".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(MonobankError::Api { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = retry_on_many_requests(3, Duration::ZERO, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(MonobankError::TooManyRequests)
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 1);
    }

    #[test]
    fn test_webhook_payload_account() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "type": "StatementItem",
            "data": {"account": "card-1", "statementItem": {"amount": 100}}
        }))
        .unwrap();
        assert_eq!(payload.account(), Some("card-1"));
    }
}
