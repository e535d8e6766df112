// crates/gateway-client/src/main.rs
//! Command-line front end for the gateway client.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gateway_client::{
    Client, ClientConfig, Contract, HistoricalDataRequest, LoggingHandler, TickEvent,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "gateway-cli")]
#[clap(about = "Query a trading-data gateway from the terminal")]
struct Cli {
    /// Gateway address (overrides GATEWAY_ADDR)
    #[clap(short, long)]
    address: Option<String>,

    /// Client id (overrides GATEWAY_CLIENT_ID; random when unset)
    #[clap(short, long)]
    client_id: Option<i32>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the gateway clock
    Time,

    /// List managed accounts
    Accounts,

    /// Look up contract details for a stock
    Details {
        symbol: String,
        #[clap(long, default_value = "SMART")]
        exchange: String,
        #[clap(long, default_value = "USD")]
        currency: String,
    },

    /// Fetch historical bars for a stock
    History {
        symbol: String,
        #[clap(long, default_value = "1 D")]
        duration: String,
        #[clap(long, default_value = "1 hour")]
        bar_size: String,
        #[clap(long, default_value = "TRADES")]
        what_to_show: String,
    },

    /// Stream quotes for a stock
    Ticks {
        symbol: String,
        /// Stop after this many updates
        #[clap(short = 'n', long, default_value = "20")]
        count: usize,
        /// Request a one-off snapshot
        #[clap(long)]
        snapshot: bool,
    },

    /// Stream the order book for a stock
    Depth {
        symbol: String,
        #[clap(long, default_value = "5")]
        rows: usize,
        /// Stop after this many updates
        #[clap(short = 'n', long, default_value = "20")]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ClientConfig::from_env().context("reading configuration")?;
    if let Some(address) = cli.address {
        config.address = address;
    }
    if let Some(client_id) = cli.client_id {
        config.client_id = Some(client_id);
    }

    info!(address = %config.address, "connecting");
    let client = Client::connect(config, Arc::new(LoggingHandler))
        .await
        .context("connecting to gateway")?;

    let result = run(&client, cli.command).await;
    client.close().await;
    result
}

async fn run(client: &Client, command: Command) -> Result<()> {
    match command {
        Command::Time => {
            println!("{}", client.current_time().await?);
        }
        Command::Accounts => {
            for account in client.managed_accounts().await? {
                println!("{account}");
            }
        }
        Command::Details {
            symbol,
            exchange,
            currency,
        } => {
            let contract = Contract::stock(symbol, exchange, currency);
            for details in client.contract_details(&contract).await? {
                println!(
                    "{} {} {} con_id={} min_tick={} {}",
                    details.contract.symbol,
                    details.contract.sec_type,
                    details.contract.primary_exchange,
                    details.contract.con_id,
                    details.min_tick,
                    details.long_name
                );
            }
        }
        Command::History {
            symbol,
            duration,
            bar_size,
            what_to_show,
        } => {
            let contract = Contract::stock(symbol, "SMART", "USD");
            let request = HistoricalDataRequest {
                duration,
                bar_size,
                what_to_show,
                ..Default::default()
            };
            for bar in client.historical_data(&contract, &request).await? {
                println!(
                    "{} O={} H={} L={} C={} V={}",
                    bar.time, bar.open, bar.high, bar.low, bar.close, bar.volume
                );
            }
        }
        Command::Ticks {
            symbol,
            count,
            snapshot,
        } => {
            let contract = Contract::stock(symbol, "SMART", "USD");
            let mut ticks = client.market_data(&contract, "", snapshot)?;
            for _ in 0..count {
                match tokio::time::timeout(Duration::from_secs(30), ticks.next()).await {
                    Ok(Some(event)) => print_tick(&event),
                    Ok(None) | Err(_) => break,
                }
            }
            if let Some(err) = ticks.last_error() {
                anyhow::bail!("stream ended: {err}");
            }
        }
        Command::Depth {
            symbol,
            rows,
            count,
        } => {
            let contract = Contract::stock(symbol, "SMART", "USD");
            let mut depth = client.market_depth(&contract, rows, false)?;
            for _ in 0..count {
                match tokio::time::timeout(Duration::from_secs(30), depth.next()).await {
                    Ok(Some(book)) => {
                        let top = book.top();
                        println!(
                            "bids={} asks={} spread={:?} mid={:?}",
                            book.bids.len(),
                            book.asks.len(),
                            top.spread(),
                            top.mid()
                        );
                    }
                    Ok(None) | Err(_) => break,
                }
            }
            if let Some(err) = depth.last_error() {
                anyhow::bail!("stream ended: {err}");
            }
        }
    }
    Ok(())
}

fn print_tick(event: &TickEvent) {
    match event {
        TickEvent::Price {
            tick_type,
            price,
            size,
            ..
        } => println!("price[{tick_type}] {price} x {size}"),
        TickEvent::Size { tick_type, size } => println!("size[{tick_type}] {size}"),
        TickEvent::Generic { tick_type, value } => println!("generic[{tick_type}] {value}"),
        TickEvent::String { tick_type, value } => println!("string[{tick_type}] {value}"),
        TickEvent::MarketDataType(kind) => println!("market data type {kind}"),
        TickEvent::RequestParams {
            min_tick,
            bbo_exchange,
            ..
        } => println!("params min_tick={min_tick} bbo={bbo_exchange}"),
    }
}
