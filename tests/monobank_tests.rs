use anyhow::Result;
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use chrono_tz::Europe::Kyiv;
use run_club_bot::database::{connection::DatabaseManager, models::*};
use run_club_bot::services::monobank::{
    payer_chat_id, ChatIdProvider, MonobankApi, MonobankError, StatementEntry, TransactionData,
};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

// 2025-01-01 10:00:00 UTC, noon in Kyiv
const NEW_YEAR_NOON: i64 = 1735725600;

async fn setup_test_db() -> Result<(DatabaseManager, TempDir)> {
    let temp_dir = tempdir()?;
    let database_url = format!("sqlite:{}", temp_dir.path().join("bank.db").display());
    let db_manager = DatabaseManager::new(&database_url).await?;
    db_manager.run_migrations().await?;
    Ok((db_manager, temp_dir))
}

/// Serves a fake personal API on a random local port.
async fn spawn_fake_monobank() -> String {
    async fn client_info(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        match headers.get("X-Token").and_then(|v| v.to_str().ok()) {
            Some("good-token") => Ok(Json(json!({
                "clientId": "abc",
                "name": "Клуб",
                "accounts": [
                    { "id": "acc-1", "type": "black", "maskedPan": ["537541******1234"] },
                    { "id": "acc-2", "maskedPan": [] }
                ]
            }))),
            Some("busy-token") => Err(StatusCode::TOO_MANY_REQUESTS),
            _ => Err(StatusCode::FORBIDDEN),
        }
    }

    async fn statement(Path((account, from, to)): Path<(String, i64, i64)>) -> Json<Value> {
        Json(json!([{
            "id": format!("{account}-{from}-{to}"),
            "time": NEW_YEAR_NOON,
            "description": "Внесок",
            "amount": 25000,
            "balance": 125000,
            "commissionRate": 0
        }]))
    }

    async fn webhook(Json(body): Json<Value>) -> StatusCode {
        if body["webHookUrl"].is_string() {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        }
    }

    let app = Router::new()
        .route("/personal/client-info", get(client_info))
        .route("/personal/statement/:account/:from/:to", get(statement))
        .route("/personal/webhook", post(webhook));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake Monobank");
    let address = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{address}")
}

#[test]
fn test_income_message() {
    let transaction = TransactionData::from_payload(&json!({
        "account": "card",
        "statementItem": {
            "id": "tx-1",
            "time": NEW_YEAR_NOON,
            "description": "Від: Олена <3",
            "comment": "Внесок user_id: 555",
            "amount": 15050,
            "balance": 100000,
            "commissionRate": 0
        }
    }));

    assert_eq!(transaction.amount, 150.5);
    assert_eq!(transaction.balance, 1000.0);
    assert_eq!(transaction.receipt_id, "-x-x-");

    let message = transaction.format_message(Kyiv);
    assert!(message.starts_with("✅ Зараз відбулось надходження!"));
    assert!(message.contains("📅 01.01.2025 🕘 12:00:00"));
    assert!(message.contains("Від: Олена &lt;3"));
    assert!(message.contains("💰 Сума: <b>150.50</b>"));
    assert!(message.contains("💵 Баланс: <b>1000.00</b>"));

    assert_eq!(payer_chat_id(Some(&transaction.comment)), Some(555));
    assert!(transaction.format_payer_message(Kyiv).contains("✅ Ваш внесок отримано!"));
}

#[test]
fn test_expense_message_uses_receipt() {
    let transaction = TransactionData::from_payload(&json!({
        "statementItem": {
            "time": NEW_YEAR_NOON,
            "description": "Спортмагазин",
            "amount": -99900,
            "balance": 1000,
            "receiptId": "XXXX-1234"
        }
    }));

    let message = transaction.format_message(Kyiv);
    assert!(message.starts_with("🔻 Щойно були витрачені кошти!"));
    assert!(message.contains("🛍 Кому: Спортмагазин"));
    assert!(message.contains(">XXXX-1234</a>"));
    assert!(message.contains("💬 ---"));
}

#[test]
fn test_top_level_fields_and_defaults() {
    // Statement endpoint items have no statementItem wrapper
    let transaction = TransactionData::from_payload(&json!({ "id": "plain-id", "amount": "500" }));
    assert_eq!(transaction.receipt_id, "plain-id");
    assert_eq!(transaction.amount, 5.0);
    assert_eq!(transaction.description, "Не зазначено");

    // An empty statementItem falls back to the top level as well
    let transaction = TransactionData::from_payload(&json!({ "statementItem": {}, "amount": 100 }));
    assert_eq!(transaction.amount, 1.0);
}

#[test]
fn test_payer_chat_id() {
    assert_eq!(payer_chat_id(Some("USER_ID:  123456")), Some(123456));
    assert_eq!(payer_chat_id(Some("на кросівки")), None);
    assert_eq!(payer_chat_id(None), None);
}

#[test]
fn test_statement_entry() {
    let entry = StatementEntry::from_item(
        &json!({ "time": NEW_YEAR_NOON, "amount": 1000, "balance": 2000, "commissionRate": 5 }),
        Kyiv,
    );
    assert_eq!(entry.time, "01.01.2025 12:00:00");
    assert_eq!(entry.amount, 10.0);
    assert_eq!(entry.commission, 5.0);
}

#[tokio::test]
async fn test_chat_id_provider() -> Result<()> {
    let (db, _temp_dir) = setup_test_db().await?;
    let client = MonoBankClient::create(&db.pool, "Клуб", "token").await?;
    MonoBankCard::create(&db.pool, client.id, "with-chat", Some(-100777), true).await?;
    MonoBankCard::create(&db.pool, client.id, "no-chat", None, true).await?;
    MonoBankCard::create(&db.pool, client.id, "disabled", Some(-100888), false).await?;

    let admins = [11, 22];
    let provider = ChatIdProvider::new(&db.pool, &admins);

    assert_eq!(provider.chat_ids("with-chat").await?, Some(vec![-100777]));
    assert_eq!(provider.chat_ids("no-chat").await?, Some(vec![11, 22]));
    assert_eq!(provider.chat_ids("disabled").await?, None);
    assert_eq!(provider.chat_ids("unknown").await?, None);

    Ok(())
}

#[tokio::test]
async fn test_api_client_against_fake_server() {
    let base_url = spawn_fake_monobank().await;

    let api = MonobankApi::with_base_url("good-token", &base_url);
    let cards = api.credit_card_ids().await.unwrap();
    assert_eq!(
        cards,
        vec![
            ("acc-1".to_string(), "black - 537541******1234".to_string()),
            ("acc-2".to_string(), "Unknown type - Unknown maskedPan".to_string()),
        ]
    );

    let items = api
        .statements_between(
            "acc-1",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            Kyiv,
        )
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    // Local midnight in Kyiv is 22:00 UTC the day before
    assert_eq!(items[0]["id"], "acc-1-1735682400-1738360799");

    assert!(api.setup_webhook("https://club.example.com/bank/webhook/monobank/").await.unwrap());
}

#[tokio::test]
async fn test_api_errors() {
    let base_url = spawn_fake_monobank().await;

    let forbidden = MonobankApi::with_base_url("bad-token", &base_url).client_info().await;
    assert!(matches!(forbidden, Err(MonobankError::Api { status, .. }) if status.as_u16() == 403));

    let busy = MonobankApi::with_base_url("busy-token", &base_url).client_info().await;
    assert!(matches!(busy, Err(MonobankError::TooManyRequests)));
}
