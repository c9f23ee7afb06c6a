use std::path::PathBuf;

use anyhow::{Context, Result};
use asset_sync::config::SyncConfig;
use asset_sync::sync::{BarsUpdateParams, SyncOutcome, TickUpdateParams};
use asset_sync::tz::parse_day_or_ts;
use asset_sync::TickFeed;
use clap::{Args, Parser, Subcommand};
use market_data_ingestor::models::{granularity::Granularity, time_of_day::TimeOfDay};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Asset Sync CLI")]
struct Cli {
    /// TOML configuration; defaults and environment apply without it.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fetch missing bars into the cache.
    Bars(BarsArgs),
    /// Fetch missing tick days into the cache.
    Ticks(TicksArgs),
    /// Summarize stored bars.
    ShowBars(ShowBarsArgs),
    /// Count stored ticks.
    ShowTicks(ShowTicksArgs),
}

#[derive(Args)]
struct BarsArgs {
    #[arg(long)]
    symbol: String,
    /// D, W or intraday minutes 1..60.
    #[arg(long, default_value = "D")]
    granularity: Granularity,
    /// YYYY-MM-DD (local day) or RFC-3339.
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
}

#[derive(Args)]
struct FeedArgs {
    #[arg(long)]
    trades: bool,
    #[arg(long)]
    quotes: bool,
}

impl FeedArgs {
    /// Neither flag means both feeds.
    fn flags(&self) -> (bool, bool) {
        if !self.trades && !self.quotes {
            (true, true)
        } else {
            (self.trades, self.quotes)
        }
    }
}

#[derive(Args)]
struct TicksArgs {
    #[arg(long)]
    symbol: String,
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[command(flatten)]
    feed: FeedArgs,
    /// Start of the daily window, hh:mm[:ss].
    #[arg(long, default_value = "00:00:00")]
    start: TimeOfDay,
    /// End of the daily window, hh:mm[:ss].
    #[arg(long, default_value = "23:59:59")]
    end: TimeOfDay,
}

#[derive(Args)]
struct ShowBarsArgs {
    #[arg(long)]
    symbol: String,
    #[arg(long, default_value = "D")]
    granularity: Granularity,
}

#[derive(Args)]
struct ShowTicksArgs {
    #[arg(long)]
    symbol: String,
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[command(flatten)]
    feed: FeedArgs,
}

fn report(outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::NothingToSync => println!("nothing to sync"),
        SyncOutcome::Synced { days } => println!("synced {days} day(s)"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let tz = config.time_zone()?;
    let orchestrator = config.build_orchestrator()?;

    match cli.cmd {
        Cmd::Bars(args) => {
            let params = BarsUpdateParams {
                symbol: args.symbol,
                granularity: args.granularity,
                from: parse_day_or_ts(&args.from, tz)?,
                to: parse_day_or_ts(&args.to, tz)?,
            };
            report(orchestrator.update_bars(params).await?);
        }
        Cmd::Ticks(args) => {
            let (trades, quotes) = args.feed.flags();
            let params = TickUpdateParams {
                symbol: args.symbol,
                from: parse_day_or_ts(&args.from, tz)?,
                to: parse_day_or_ts(&args.to, tz)?,
                start_time: args.start,
                end_time: args.end,
                trades,
                quotes,
            };
            report(orchestrator.update_ticks(params).await?);
        }
        Cmd::ShowBars(args) => {
            let bars = orchestrator
                .stored_bars(&args.symbol, args.granularity)
                .await?;
            println!("{} bar(s)", bars.len());
            if let (Some(first), Some(last)) = (bars.first(), bars.last()) {
                println!("first: {} close {}", first.timestamp, first.close);
                println!("last:  {} close {}", last.timestamp, last.close);
            }
        }
        Cmd::ShowTicks(args) => {
            let (trades, quotes) = args.feed.flags();
            let feed = TickFeed::from_flags(trades, quotes).context("no tick feed selected")?;
            let ticks = orchestrator
                .stored_ticks(
                    &args.symbol,
                    parse_day_or_ts(&args.from, tz)?,
                    parse_day_or_ts(&args.to, tz)?,
                    feed,
                )
                .await?;
            println!("{} tick(s)", ticks.len());
        }
    }

    Ok(())
}
