//! StockPulse CLI: scan, signal lookup, indicator dump, risk levels and
//! simulated holdings.
//!
//! Commands:
//! - `scan`: evaluate a watchlist and print ranked buy candidates
//! - `signal`: evaluate one instrument, with retry on transient failures
//! - `indicators`: latest value of every indicator for one instrument
//! - `risk`: target and stop levels for an entry price
//! - `portfolio add|close|review`: simulated trade log
//!
//! Logs go to stderr; `--json` output goes to stdout.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stockpulse_core::config::EvaluatorSection;
use stockpulse_core::data::{
    CachedProvider, CircuitBreaker, CsvProvider, PriceProvider, SyntheticProvider, Watchlist,
    YahooProvider,
};
use stockpulse_core::indicators::{range::weekly_potential, IndicatorKey, IndicatorSet};
use stockpulse_core::lookup::lookup_signal;
use stockpulse_core::notify::TracingSink;
use stockpulse_core::portfolio::{review_holdings, HoldingsStore, PortfolioReview};
use stockpulse_core::risk::{RiskEnvelope, RiskPolicy};
use stockpulse_core::screener::{ScanReport, Screener};
use stockpulse_core::signal::{Evaluation, Evaluator, PRESETS};
use stockpulse_core::{CoreError, ScanConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "stockpulse",
    about = "StockPulse CLI: technical signals, screening and risk levels"
)]
struct Cli {
    /// Path to a scan config TOML file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Named evaluator preset: screener, swing, analysis. Replaces the file's [evaluator].
    #[arg(long, global = true)]
    preset: Option<String>,

    /// Where price history comes from.
    #[arg(long, value_enum, global = true, default_value_t = ProviderKind::Yahoo)]
    provider: ProviderKind,

    /// Directory of {SYMBOL}.csv files (with --provider csv).
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Master seed (with --provider synthetic).
    #[arg(long, global = true, default_value_t = 42)]
    seed: u64,

    /// Calendar days of history to request. Overrides the config file.
    #[arg(long, global = true)]
    lookback_days: Option<u32>,

    /// Print machine-readable JSON on stdout.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Debug-level logging.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProviderKind {
    Yahoo,
    Csv,
    Synthetic,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a watchlist and rank the buy candidates.
    Scan {
        /// Watchlist TOML file. Defaults to OMXS30.
        #[arg(long, conflicts_with = "symbols")]
        watchlist: Option<PathBuf>,

        /// Comma-separated symbols instead of a watchlist file.
        #[arg(long)]
        symbols: Option<String>,

        /// Worker pool size.
        #[arg(long)]
        workers: Option<usize>,

        /// Drop buy results scoring below this.
        #[arg(long)]
        min_score: Option<f64>,

        /// Keep only the top N results.
        #[arg(long)]
        max_results: Option<usize>,

        /// Also list excluded instruments and why.
        #[arg(long, default_value_t = false)]
        show_excluded: bool,
    },
    /// Evaluate one instrument.
    Signal {
        symbol: String,
    },
    /// Latest value of every indicator for one instrument.
    Indicators {
        symbol: String,
    },
    /// Target and stop levels for an entry price.
    Risk {
        /// Entry price.
        #[arg(long)]
        price: f64,

        /// Latest ATR; required by the ATR policy.
        #[arg(long)]
        atr: Option<f64>,

        /// Use the ATR policy with these multipliers instead of the config's policy.
        #[arg(long, num_args = 2, value_names = ["K_TARGET", "K_STOP"])]
        atr_multipliers: Option<Vec<f64>>,
    },
    /// Simulated trade log.
    Portfolio {
        /// Holdings CSV file.
        #[arg(long, default_value = "portfolio.csv")]
        file: PathBuf,

        #[command(subcommand)]
        action: PortfolioAction,
    },
}

#[derive(Subcommand)]
enum PortfolioAction {
    /// Record a simulated buy.
    Add {
        ticker: String,

        /// Shares bought.
        #[arg(long)]
        quantity: f64,

        /// Entry price. Defaults to the latest close.
        #[arg(long)]
        price: Option<f64>,

        /// Entry date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Mark an open position closed.
    Close { ticker: String },
    /// Price, evaluate and size every open holding.
    Review,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    match &cli.command {
        Commands::Scan {
            watchlist,
            symbols,
            workers,
            min_score,
            max_results,
            show_excluded,
        } => {
            let mut config = config;
            if let Some(n) = workers {
                config.screener.max_workers = *n;
            }
            if let Some(s) = min_score {
                config.screener.min_score = *s;
            }
            if max_results.is_some() {
                config.screener.max_results = *max_results;
            }
            config.validate()?;
            let list = match (watchlist, symbols) {
                (Some(path), _) => Watchlist::from_file(path)
                    .with_context(|| format!("loading watchlist {}", path.display()))?,
                (None, Some(csv)) => Watchlist::from_symbols(csv),
                (None, None) => Watchlist::omxs30(),
            };
            run_scan(&cli, &config, &list, *show_excluded)
        }
        Commands::Signal { symbol } => run_signal(&cli, &config, symbol),
        Commands::Indicators { symbol } => run_indicators(&cli, &config, symbol),
        Commands::Risk {
            price,
            atr,
            atr_multipliers,
        } => {
            let policy = match atr_multipliers.as_deref() {
                Some([k_target, k_stop]) => RiskPolicy::Atr {
                    k_target: *k_target,
                    k_stop: *k_stop,
                },
                Some(_) => bail!("--atr-multipliers takes exactly two values"),
                None => config.risk,
            };
            let envelope = policy.compute(*price, *atr)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&envelope)?);
            } else {
                print_envelope(&envelope);
            }
            Ok(())
        }
        Commands::Portfolio { file, action } => {
            run_portfolio(&cli, &config, HoldingsStore::new(file), action)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "stockpulse=debug"
    } else {
        "stockpulse=info"
    };
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new(default)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Config file (or defaults) with CLI flags applied on top.
fn load_config(cli: &Cli) -> Result<ScanConfig> {
    let mut config = match &cli.config {
        Some(path) => ScanConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    if let Some(name) = &cli.preset {
        if !PRESETS.contains(&name.as_str()) {
            bail!("unknown preset '{name}'. Valid: {}", PRESETS.join(", "));
        }
        config.evaluator = EvaluatorSection {
            preset: Some(name.clone()),
            custom: None,
        };
    }
    if let Some(days) = cli.lookback_days {
        config.screener.lookback_days = days;
    }
    config.validate()?;
    Ok(config)
}

/// Yahoo's own HTTP retries during a scan. Single-instrument commands pass 0
/// and retry through `ScanConfig::retry`, so the two never stack.
const SCAN_HTTP_RETRIES: u32 = 3;

fn build_provider(
    cli: &Cli,
    config: &ScanConfig,
    http_retries: u32,
) -> Result<CachedProvider<Box<dyn PriceProvider>>> {
    let inner: Box<dyn PriceProvider> = match cli.provider {
        ProviderKind::Yahoo => {
            let breaker = Arc::new(CircuitBreaker::default_provider());
            let yahoo = YahooProvider::new(breaker).context("building Yahoo client")?;
            Box::new(yahoo.with_max_retries(http_retries))
        }
        ProviderKind::Csv => {
            if !cli.data_dir.is_dir() {
                bail!("data directory does not exist: {}", cli.data_dir.display());
            }
            Box::new(CsvProvider::new(&cli.data_dir))
        }
        ProviderKind::Synthetic => Box::new(SyntheticProvider::new(cli.seed, today())),
    };
    Ok(CachedProvider::new(
        inner,
        Duration::from_secs(config.cache_ttl_secs),
    ))
}

fn evaluator(config: &ScanConfig) -> Result<Evaluator> {
    Ok(Evaluator::new(config.evaluator_config()?)?)
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// ── scan ─────────────────────────────────────────────────────────────

fn run_scan(cli: &Cli, config: &ScanConfig, list: &Watchlist, show_excluded: bool) -> Result<()> {
    if list.is_empty() {
        bail!("watchlist '{}' is empty", list.name);
    }
    let provider = build_provider(cli, config, SCAN_HTTP_RETRIES)?;
    let screener = Screener::new(evaluator(config)?, config.risk, config.screener.clone())?;
    let report = screener.scan(&list.deduped(), &provider);

    let stats = provider.stats();
    tracing::debug!(hits = stats.hits, misses = stats.misses, "history cache");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_scan(&report, show_excluded);
    }
    Ok(())
}

fn print_scan(report: &ScanReport, show_excluded: bool) {
    println!();
    println!(
        "=== Scan: {} instruments, {} candidates, {} excluded ({} ms) ===",
        report.scanned,
        report.results.len(),
        report.exclusions.len(),
        report.elapsed_ms
    );
    println!("Config: {}", &report.config_fingerprint[..12.min(report.config_fingerprint.len())]);
    println!();
    if report.results.is_empty() {
        println!("No instruments met the buy criteria.");
    } else {
        println!(
            "{:<12} {:<20} {:>10} {:<11} {:>6} {:>8} {:>10} {:>10}",
            "Symbol", "Name", "Price", "Verdict", "Score", "Weekly", "Target", "Stop"
        );
        println!("{}", "-".repeat(94));
        for r in &report.results {
            let (target, stop) = r
                .signal
                .risk
                .map(|e| (format!("{:.2}", e.target), format!("{:.2}", e.stop)))
                .unwrap_or_else(|| ("-".into(), "-".into()));
            println!(
                "{:<12} {:<20} {:>10.2} {:<11} {:>6.1} {:>8} {:>10} {:>10}",
                r.symbol,
                truncate(&r.name, 20),
                r.price,
                r.signal.verdict,
                r.signal.score,
                r.weekly_potential
                    .map(|w| format!("{w:.1}%"))
                    .unwrap_or_else(|| "-".into()),
                target,
                stop
            );
            println!("             {}", r.signal.reasons().join(", "));
        }
    }

    if show_excluded && !report.exclusions.is_empty() {
        println!();
        println!("--- Excluded ---");
        for e in &report.exclusions {
            println!("{:<12} {:?}: {}", e.symbol, e.cause, e.detail);
        }
    }
    println!();
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        s.chars().take(width.saturating_sub(1)).chain(['…']).collect()
    }
}

// ── signal / indicators ──────────────────────────────────────────────

fn run_signal(cli: &Cli, config: &ScanConfig, symbol: &str) -> Result<()> {
    let provider = build_provider(cli, config, 0)?;
    let evaluator = evaluator(config)?;
    let eval = lookup_signal(
        symbol,
        &provider,
        &evaluator,
        &config.risk,
        config.screener.lookback_days,
        &config.retry,
        &TracingSink,
    )
    .with_context(|| format!("no signal for {symbol}"))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&eval)?);
    } else {
        print_evaluation(&eval);
    }
    Ok(())
}

fn print_evaluation(eval: &Evaluation) {
    let s = &eval.signal;
    println!();
    println!("=== {} as of {} ===", s.symbol, s.as_of);
    println!("Price:          {:.2}", s.price);
    println!("Verdict:        {}", s.verdict);
    println!("Score:          {:.1} / {:.1}", s.score, s.max_score);
    if let Some(atr) = eval.atr {
        println!("ATR(14):        {atr:.2}");
    }
    if let Some(wp) = eval.weekly_potential {
        println!("Weekly range:   {wp:.1}%");
    }
    println!();
    if s.fired.is_empty() {
        println!("No rules fired.");
    }
    for f in &s.fired {
        println!("  [{:>4.1}] {}", f.weight, f.reason);
    }
    if let Some(env) = &s.risk {
        println!();
        print_envelope(env);
    }
    println!();
}

fn run_indicators(cli: &Cli, config: &ScanConfig, symbol: &str) -> Result<()> {
    let provider = build_provider(cli, config, 0)?;
    let symbol = symbol.trim().to_uppercase();
    let prices = config
        .retry
        .run(&symbol, || {
            provider
                .history(&symbol, config.screener.lookback_days)
                .map_err(CoreError::from)
        })
        .with_context(|| format!("fetching {symbol}"))?;
    if prices.is_empty() {
        bail!("no price history for {symbol}");
    }

    let set = IndicatorSet::compute_all(&prices);
    let snapshot = set.latest_snapshot();
    if cli.json {
        let out = serde_json::json!({
            "symbol": symbol,
            "as_of": set.as_of(),
            "bars": set.len(),
            "values": snapshot,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "=== {symbol}: {} bars, as of {} ===",
        set.len(),
        set.as_of().map(|d| d.to_string()).unwrap_or_default()
    );
    for (name, value) in &snapshot {
        match value {
            Some(v) => println!("{name:<14} {v:>12.4}"),
            None => println!("{name:<14} {:>12}", "(warm-up)"),
        }
    }
    if let Some(range) = set.latest(IndicatorKey::RangePct14) {
        println!("{:<14} {:>11.1}%", "weekly_pot", weekly_potential(range));
    }
    println!();
    Ok(())
}

fn print_envelope(env: &RiskEnvelope) {
    println!("Entry:          {:.2}", env.entry);
    println!(
        "Target:         {:.2} (+{:.2}%)",
        env.target,
        (env.target / env.entry - 1.0) * 100.0
    );
    println!(
        "Stop:           {:.2} (-{:.2}%)",
        env.stop,
        (1.0 - env.stop / env.entry) * 100.0
    );
    println!("Reward/Risk:    {:.2}", env.reward_risk());
}

// ── portfolio ────────────────────────────────────────────────────────

fn run_portfolio(
    cli: &Cli,
    config: &ScanConfig,
    store: HoldingsStore,
    action: &PortfolioAction,
) -> Result<()> {
    match action {
        PortfolioAction::Add {
            ticker,
            quantity,
            price,
            date,
            notes,
        } => {
            let entry_date = date
                .as_deref()
                .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
                .transpose()
                .context("--date must be YYYY-MM-DD")?
                .unwrap_or_else(today);
            let entry_price = match price {
                Some(p) => *p,
                None => {
                    let provider = build_provider(cli, config, 0)?;
                    let symbol = ticker.trim().to_uppercase();
                    let prices = config
                        .retry
                        .run(&symbol, || provider.history(&symbol, 10).map_err(CoreError::from))
                        .with_context(|| format!("fetching latest price for {symbol}"))?;
                    match prices.latest() {
                        Some(bar) => bar.close,
                        None => bail!("no recent price for {symbol}; pass --price"),
                    }
                }
            };
            let holding = store.open_position(ticker, entry_price, *quantity, entry_date, notes)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&holding)?);
            } else {
                println!(
                    "Bought {} x {} at {:.2} on {} ({})",
                    holding.quantity,
                    holding.ticker,
                    holding.entry_price,
                    holding.entry_date,
                    store.path().display()
                );
            }
            Ok(())
        }
        PortfolioAction::Close { ticker } => {
            let holding = store.close_position(ticker)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&holding)?);
            } else {
                println!("Closed {}", holding.ticker);
            }
            Ok(())
        }
        PortfolioAction::Review => {
            let holdings = store
                .open_holdings()
                .with_context(|| format!("reading {}", store.path().display()))?;
            if holdings.is_empty() {
                println!("No open positions in {}", store.path().display());
                return Ok(());
            }
            let provider = build_provider(cli, config, 0)?;
            let review = review_holdings(
                &holdings,
                &provider,
                &evaluator(config)?,
                &config.risk,
                &config.review_options(),
            )?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&review)?);
            } else {
                print_review(&review);
            }
            Ok(())
        }
    }
}

fn print_review(review: &PortfolioReview) {
    let opt = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into());
    println!();
    println!(
        "{:<12} {:>8} {:>10} {:>10} {:>10} {:>8} {:<11} {:>10} {:>10}",
        "Ticker", "Qty", "Entry", "Price", "P/L", "P/L %", "Verdict", "Target", "Stop"
    );
    println!("{}", "-".repeat(97));
    for row in &review.rows {
        let h = &row.holding;
        println!(
            "{:<12} {:>8} {:>10.2} {:>10} {:>10} {:>8} {:<11} {:>10} {:>10}",
            h.ticker,
            h.quantity,
            h.entry_price,
            opt(row.price),
            opt(row.pnl),
            opt(row.pnl_pct),
            row.verdict.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
            opt(row.risk.map(|e| e.target)),
            opt(row.risk.map(|e| e.stop)),
        );
        if let Some(err) = &row.error {
            println!("             {err}");
        }
    }
    println!();
    println!("Total cost:     {:.2}", review.total_cost);
    println!("Total value:    {:.2}", review.total_value);
    println!("Unrealized P/L: {:.2}", review.total_pnl());
    if !review.failed.is_empty() {
        println!(
            "WARNING: no price for {} (cost {:.2} left out of the totals)",
            review.failed.join(", "),
            review.unpriced_cost
        );
    }
    println!();
}
