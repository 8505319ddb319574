use anyhow::Context;
use clap::{Parser, Subcommand};
use fvgbot::config::{BotConfig, LoggingConfig, DEFAULT_CONFIG_PATH};
use fvgbot::execution::Controller;
use fvgbot::{BybitClient, Exchange};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fvgbot", about = "Fair value gap trading bot for Bybit spot")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Interactive prompt (default)
    Run,
    /// Start trading right away and run until Ctrl+C
    Start,
    /// Print wallet balances and exit
    Balance,
}

const HELP: &str = "\
Commands:
  start    start the trading loop and order reaper
  stop     stop both loops
  status   show whether the loops are running
  balance  show wallet balances
  help     show this message
  exit     stop everything and quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = BotConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config))?;
    setup_logging(&config.logging)?;

    tracing::info!(
        symbol = %config.trading.symbol,
        interval = %config.trading.interval,
        base_url = %config.exchange.base_url,
        "fvgbot starting"
    );

    let client = Arc::new(BybitClient::new(&config.exchange)?);
    let mut controller = Controller::new(client, config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_prompt(&mut controller).await?,
        Command::Start => {
            controller.start()?;
            tokio::signal::ctrl_c().await?;
            tracing::info!("Ctrl+C received, shutting down");
            controller.stop().await;
        }
        Command::Balance => print_balances(controller.exchange().as_ref()).await?,
    }

    Ok(())
}

/// Log to stderr, or to `logging.file` when set so records stay off the prompt
fn setup_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

async fn run_prompt<E: Exchange + 'static>(controller: &mut Controller<E>) -> anyhow::Result<()> {
    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!(">>> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            // stdin closed
            controller.stop().await;
            break;
        };

        match line.trim() {
            "" => {}
            "start" => match controller.start() {
                Ok(()) => println!("Bot started"),
                Err(e) => println!("{}", e),
            },
            "stop" => {
                if controller.stop().await {
                    println!("Bot stopped");
                } else {
                    println!("Bot is not running");
                }
            }
            "status" => println!("Bot is {}", controller.status()),
            "balance" => {
                if let Err(e) = print_balances(controller.exchange().as_ref()).await {
                    println!("Can't get balances: {}", e);
                }
            }
            "help" => println!("{}", HELP),
            "exit" | "quit" => {
                controller.stop().await;
                break;
            }
            other => println!("Unknown command: {} (try help)", other),
        }
    }

    Ok(())
}

async fn print_balances<E: Exchange>(exchange: &E) -> fvgbot::Result<()> {
    let balances = exchange.fetch_balances().await?;
    if balances.is_empty() {
        println!("Wallet is empty");
    }
    for balance in balances {
        println!("{:>8}: {}", balance.coin, balance.wallet_balance);
    }
    Ok(())
}
