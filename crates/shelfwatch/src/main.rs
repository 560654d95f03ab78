//! Interactive shelf watcher.
//!
//! Registers product and order watches at a prompt while a background
//! loop re-checks everything on a fixed interval and pushes Telegram
//! alerts on restocks and order status changes.

mod commands;

use std::io::Write as IoWrite;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use engine::{
    EngineConfig, Scheduler, WatchMonitor, WatchRegistry, WatchService, WatchStore, WatchedProduct,
};
use notify::Notifier;
use resolver::{EntityResolver, HttpResolver, StockStatus};

use commands::Command;

/// Watches shop listings for restocks and orders for status changes.
#[derive(Debug, Parser)]
#[command(name = "shelfwatch")]
#[command(about = "Watches shop listings for restocks and orders for status changes")]
#[command(version)]
struct Cli {
    /// File the watch list is persisted to
    #[arg(long, env = "SHELFWATCH_DATA_FILE", default_value = "watches.json")]
    data_file: PathBuf,

    /// Seconds between scheduled check passes
    #[arg(
        long,
        env = "SHELFWATCH_INTERVAL_SECS",
        default_value = "120",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,

    /// Base URL of the shop
    #[arg(
        long,
        env = "SHELFWATCH_SHOP_BASE",
        default_value = "https://www.vatanbilgisayar.com"
    )]
    shop_base: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "shelfwatch=debug,engine=debug,notify=debug,resolver=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let resolver: Arc<dyn EntityResolver> = Arc::new(
        HttpResolver::with_base(cli.shop_base.clone()).context("Failed to build HTTP client")?,
    );
    let notifier = Arc::new(Notifier::from_env());
    if !notifier.has_channel() {
        println!(
            "{}",
            "Telegram is not configured (set TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID); alerts will only be logged."
                .yellow()
        );
    }

    let config = EngineConfig {
        data_file: cli.data_file.clone(),
        check_interval: Duration::from_secs(cli.interval),
        ..EngineConfig::default()
    };

    let registry = Arc::new(WatchRegistry::new());
    let store = WatchStore::new(&config.data_file);
    let service = WatchService::new(Arc::clone(&registry), store, Arc::clone(&resolver));
    let monitor = Arc::new(WatchMonitor::new(
        Arc::clone(&registry),
        Arc::clone(&resolver),
        Arc::clone(&notifier),
        &config,
    ));

    match service.load().await {
        Ok((products, orders)) if products + orders > 0 => {
            println!(
                "{}",
                format!(
                    "Loaded {products} product(s) and {orders} order(s) from {}",
                    config.data_file.display()
                )
                .green()
            );
        }
        Ok(_) => {}
        Err(e) => {
            println!(
                "{}",
                format!("Could not load the watch list: {e}. Starting empty.").yellow()
            );
        }
    }

    let cancel = CancellationToken::new();
    let scheduler = Scheduler::new(Arc::clone(&monitor), config.check_interval, cancel.clone());
    let scheduler_task = tokio::spawn(scheduler.run());
    info!(
        interval_secs = cli.interval,
        data_file = %config.data_file.display(),
        "Watch loop started"
    );

    // One listener for the whole session, so Ctrl-C lands even while a
    // command is in flight.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    run_repl(
        BufReader::new(tokio::io::stdin()),
        &service,
        &registry,
        &monitor,
        &cancel,
    )
    .await?;

    cancel.cancel();
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "Scheduler task panicked");
    }
    println!("{}", "Goodbye!".green());
    Ok(())
}

async fn run_repl<R>(
    input: R,
    service: &WatchService,
    registry: &WatchRegistry,
    monitor: &WatchMonitor,
    cancel: &CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    print_help();

    loop {
        // A Ctrl-C during the previous command lands here.
        if cancel.is_cancelled() {
            break;
        }

        print!("> ");
        std::io::stdout().flush().context("Failed to flush prompt")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            () = cancel.cancelled() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            // EOF quits like an explicit quit would.
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match commands::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("❌ {}", message.red());
                continue;
            }
        };

        match command {
            Command::Product { url } => add_product(service, &url).await,
            Command::Order {
                tracking_number,
                contact_email,
            } => add_order(service, &tracking_number, &contact_email).await,
            Command::Check => run_check(monitor, cancel).await,
            Command::List => list_watches(registry).await,
            Command::Remove { key } => remove_watch(service, &key).await,
            Command::Clear => clear_screen(),
            Command::Help => print_help(),
            Command::Quit => break,
        }
    }

    Ok(())
}

async fn add_product(service: &WatchService, url: &str) {
    println!("{}", "🔄 Adding product, fetching the listing...".cyan());
    match service.register_product(url).await {
        Ok(product) => {
            println!("✅ {}", "Product added:".green());
            println!("   Name : {}", product.name);
            println!("   Link : {}", product.url.dimmed());
        }
        Err(e) => println!("❌ {}", format!("Failed to add product: {e}").red()),
    }
}

async fn add_order(service: &WatchService, tracking_number: &str, contact_email: &str) {
    println!(
        "{}",
        "🔄 Adding order, fetching the current status...".cyan()
    );
    match service.register_order(tracking_number, contact_email).await {
        Ok(order) => {
            println!("✅ {}", "Order added:".green());
            println!("   Order # : {}", order.tracking_number);
            println!("   Status  : {}", order.status_label());
        }
        Err(e) => println!("❌ {}", format!("Failed to add order: {e}").red()),
    }
}

async fn run_check(monitor: &WatchMonitor, cancel: &CancellationToken) {
    println!("{}", "🔄 Checking every watch now...".cyan());
    let summary = monitor.run_pass(cancel).await;
    let started = summary.started_at.with_timezone(&chrono::Local);
    println!(
        "✅ {}",
        format!(
            "Check started at {}: {summary}",
            started.format("%H:%M:%S")
        )
        .green()
    );
}

async fn list_watches(registry: &WatchRegistry) {
    let products = registry.products().await;
    let orders = registry.orders().await;

    if products.is_empty() && orders.is_empty() {
        println!("{}", "Nothing is being watched yet.".dimmed());
        return;
    }

    if !products.is_empty() {
        println!("{}", "📦 Products".bold());
        for product in &products {
            if product.name.is_empty() {
                println!("   {} [{}]", product.url, stock_cell(product));
            } else {
                println!("   {} [{}]", product.name, stock_cell(product));
                println!("      {}", product.url.dimmed());
            }
        }
    }

    if !orders.is_empty() {
        println!("{}", "🚚 Orders".bold());
        for order in &orders {
            let status = order.status.as_deref().unwrap_or("Unknown");
            println!(
                "   {} ({}) [{}]",
                order.tracking_number,
                order.contact_email.dimmed(),
                status
            );
        }
    }
}

fn stock_cell(product: &WatchedProduct) -> colored::ColoredString {
    match product.stock {
        Some(StockStatus::InStock) => "In stock".green(),
        Some(StockStatus::OutOfStock) => "Out of stock".red(),
        Some(StockStatus::Unknown) | None => "Unknown".dimmed(),
    }
}

async fn remove_watch(service: &WatchService, key: &str) {
    let removed = service.unwatch(key).await;
    if removed > 0 {
        println!("✅ {}", format!("Removed {removed} watch(es).").green());
    } else {
        println!("{}", format!("Nothing matched '{key}'.").yellow());
    }
}

fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
    let _ = std::io::stdout().flush();
}

fn print_help() {
    println!("{}", "Commands".bold());
    println!("   product <url>                 watch a listing for a restock");
    println!("   order <tracking-no> <email>   watch an order for status changes");
    println!("   check                         run a check pass now");
    println!("   list                          show everything being watched");
    println!("   remove <url-or-tracking-no>   stop watching");
    println!("   clear                         clear the screen");
    println!("   quit                          exit");
}
