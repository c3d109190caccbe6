use anyhow::{anyhow, Context, Result};
use run_club_bot::config::Config;
use run_club_bot::database::connection::DatabaseManager;
use run_club_bot::database::models::{ClubUser, MonoBankCard, MonoBankClient};
use run_club_bot::services::monobank::MonobankApi;
use std::env;
use std::io;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("migrate");

    match command {
        "migrate" | "up" => run_migrations().await,
        "check" => check_database().await,
        "reset" => reset_database().await,
        "staff" => set_staff(&args[1..]).await,
        "bank-client" => add_bank_client(&args[1..]).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {command}");
            print_help();
            std::process::exit(1);
        }
    }
}

fn sqlite_path(database_url: &str) -> Option<&str> {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
}

async fn connect(config: &Config) -> Result<DatabaseManager> {
    DatabaseManager::new(&config.database_url)
        .await
        .map_err(|e| anyhow!("Failed to connect to database: {}", e))
}

async fn run_migrations() -> Result<()> {
    println!("🏃 Run Club Bot - Database Migration Tool");
    println!("=========================================");

    let config = Config::from_env()?;
    println!("📊 Database URL: {}", mask_url(&config.database_url));

    if let Some(parent) = sqlite_path(&config.database_url).and_then(|p| Path::new(p).parent()) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            println!("📁 Creating directory: {}", parent.display());
            std::fs::create_dir_all(parent)?;
        }
    }

    println!("🚀 Running database migrations...");
    let db_manager = connect(&config).await?;
    if let Err(e) = db_manager.run_migrations().await {
        eprintln!("❌ Migration failed: {e}");
        std::process::exit(1);
    }

    println!("✅ Migrations completed successfully!");
    println!("\n🎯 The club database is ready!");
    Ok(())
}

async fn check_database() -> Result<()> {
    println!("🔍 Checking database connection and schema...");

    let config = Config::from_env()?;
    println!("📊 Database URL: {}", mask_url(&config.database_url));

    let db_manager = connect(&config).await?;
    match check_tables(&db_manager).await {
        Ok(tables) if tables.is_empty() => {
            println!("⚠️  The database is empty");
            println!("💡 Try running 'migrate up' to create the schema");
        }
        Ok(tables) => {
            println!("✅ Database connection successful!");
            println!("📋 Found tables:");
            for table in tables {
                println!("  • {table}");
            }
            let members = ClubUser::count_active(&db_manager.pool).await?;
            println!("👥 Active members: {members}");
        }
        Err(e) => {
            println!("⚠️  Database check failed: {e}");
            println!("💡 Try running 'migrate up' to create the schema");
        }
    }

    Ok(())
}

async fn reset_database() -> Result<()> {
    println!("⚠️  WARNING: This will delete ALL club data: members, trainings, payments!");
    println!("🤔 Are you sure you want to continue? (yes/no)");

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if input.trim().to_lowercase() != "yes" {
        println!("❌ Reset cancelled.");
        return Ok(());
    }

    let config = Config::from_env()?;
    let db_path = sqlite_path(&config.database_url)
        .ok_or_else(|| anyhow!("Reset is only supported for SQLite databases"))?;
    if Path::new(db_path).exists() {
        std::fs::remove_file(db_path)?;
        println!("🗑️  Deleted database file: {db_path}");
    }

    println!("🔄 Recreating database schema...");
    run_migrations().await?;
    println!("✅ Database reset completed!");
    Ok(())
}

/// `staff <telegram_id> [on|off]`: the flag that unlocks training creation and chronoposts.
async fn set_staff(args: &[String]) -> Result<()> {
    let telegram_id: i64 = args
        .first()
        .ok_or_else(|| anyhow!("Usage: migrate staff <telegram_id> [on|off]"))?
        .parse()
        .context("telegram_id must be a number")?;
    let enabled = match args.get(1).map(String::as_str) {
        None | Some("on") => true,
        Some("off") => false,
        Some(other) => return Err(anyhow!("Expected 'on' or 'off', got '{}'", other)),
    };

    let config = Config::from_env()?;
    let db_manager = connect(&config).await?;
    let member = ClubUser::find_by_telegram_id(&db_manager.pool, telegram_id)
        .await?
        .ok_or_else(|| anyhow!("No member with Telegram ID {}; they must /start the bot first", telegram_id))?;

    ClubUser::set_staff(&db_manager.pool, member.id, enabled).await?;
    println!(
        "✅ {} is {} staff",
        member.full_name(),
        if enabled { "now" } else { "no longer" }
    );
    Ok(())
}

/// `bank-client <name> <token>`: stores a Monobank client and every card its token can see.
async fn add_bank_client(args: &[String]) -> Result<()> {
    let (Some(name), Some(token)) = (args.first(), args.get(1)) else {
        return Err(anyhow!("Usage: migrate bank-client <name> <token>"));
    };

    println!("🔍 Checking the token with Monobank...");
    // client-info is rate limited, so the card listing doubles as the token check
    let cards = MonobankApi::new(token)
        .credit_card_ids()
        .await
        .map_err(|e| anyhow!("Monobank rejected the token: {}", e))?;

    let config = Config::from_env()?;
    let db_manager = connect(&config).await?;
    let client = MonoBankClient::create(&db_manager.pool, name, token).await?;
    println!("✅ Client '{}' saved with id {}", client.name, client.id);

    for (card_id, label) in cards {
        MonoBankCard::create(&db_manager.pool, client.id, &card_id, None, true).await?;
        println!("  💳 {label} ({card_id})");
    }
    println!("💡 Payment notices go to the bot admins until a chat is set for a card");
    Ok(())
}

async fn check_tables(db_manager: &DatabaseManager) -> Result<Vec<String>> {
    let tables = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '_sqlx%' ORDER BY name",
    )
    .fetch_all(&db_manager.pool)
    .await?;

    Ok(tables)
}

fn mask_url(url: &str) -> String {
    match sqlite_path(url).and_then(|path| Path::new(path).file_name()) {
        Some(filename) => format!("sqlite:.../{}", filename.to_string_lossy()),
        None => url.to_string(),
    }
}

fn print_help() {
    println!("🏃 Run Club Bot - Database Migration Tool");
    println!();
    println!("USAGE:");
    println!("    migrate [COMMAND] [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    migrate, up                  Run database migrations (default)");
    println!("    check                        Check database connection and schema");
    println!("    reset                        Reset database (SQLite only) - DESTRUCTIVE!");
    println!("    staff <telegram_id> [on|off] Grant or revoke staff rights");
    println!("    bank-client <name> <token>   Register a Monobank client and its cards");
    println!("    help                         Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    DATABASE_URL        Database connection string (default: sqlite:./data/run_club.db)");
    println!("    TELEGRAM_BOT_TOKEN  Required by the shared configuration loader");
    println!();
    println!("EXAMPLES:");
    println!("    migrate                          # Run migrations");
    println!("    migrate staff 123456789          # Make a coach staff");
    println!("    migrate bank-client Клуб uXyz... # Track club card payments");
    println!();
}
