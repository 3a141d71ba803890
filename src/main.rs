use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use anyhow::Result;
use clap::Parser;
use log::info;

use tradeledger::application::TradingService;
use tradeledger::auth::Argon2Verifier;
use tradeledger::http;
use tradeledger::quotes::HttpQuoteProvider;

#[derive(Parser)]
#[command(name = "tradeledger", about = "Simulated stock-trading ledger service")]
struct Args {
    /// Path to the SQLite database file (created if missing)
    #[arg(long, default_value = "finance.db")]
    database: String,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Base URL of the quote provider API
    #[arg(long, env = "QUOTE_API_URL", default_value = "https://cloud.iexapis.com/stable")]
    quote_url: String,

    /// Quote provider API key
    #[arg(long, env = "QUOTE_API_KEY")]
    quote_api_key: String,

    /// Timeout for quote lookups, in seconds
    #[arg(long, default_value_t = 5)]
    quote_timeout_secs: u64,
}

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let quotes = Arc::new(HttpQuoteProvider::new(
        args.quote_url,
        args.quote_api_key,
        Duration::from_secs(args.quote_timeout_secs),
    )?);

    let service = TradingService::init(&args.database, quotes, Arc::new(Argon2Verifier)).await?;
    info!("database ready at {}", args.database);

    let data = web::Data::new(service);
    info!("listening on {}:{}", args.bind, args.port);
    HttpServer::new(move || App::new().app_data(data.clone()).configure(http::configure))
        .bind((args.bind, args.port))?
        .run()
        .await?;

    Ok(())
}
