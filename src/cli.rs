//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::domain::backtest::{BacktestConfig, run_backtest};
use crate::domain::config_validation::{
    parse_date, validate_backtest_config, validate_strategy_config,
};
use crate::domain::error::HulltrendError;
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::{SeriesKey, TIMESTAMP_FORMAT, Timeframe};
use crate::domain::resample::resample;
use crate::domain::service::SignalService;
use crate::domain::trend::{FAST_OFFSET, SLOW_OFFSET, TrendConfig, TrendEngine};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::notify_port::NotifyPort;
use crate::ports::state_port::StatePort;

#[derive(Parser, Debug)]
#[command(name = "hulltrend", about = "Dual-horizon Hull moving average trend signals")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll the latest signal for one or all instruments
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        instrument: Option<String>,
        #[arg(short, long, default_value = "4h")]
        timeframe: Timeframe,
        /// Record the current state without notifying
        #[arg(long)]
        prime: bool,
    },
    /// Simulate the signal over a bar history
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        instrument: String,
        #[arg(short, long, default_value = "4h")]
        timeframe: Timeframe,
        /// Print every closed trade to stdout
        #[arg(long)]
        trades: bool,
    },
    /// Print the HULL and TREND lines and per-bar state as CSV
    Lines {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        instrument: String,
        #[arg(short, long, default_value = "4h")]
        timeframe: Timeframe,
        /// Only the newest N bars
        #[arg(long)]
        tail: Option<usize>,
    },
    /// Aggregate bars into a coarser timeframe and write them as CSV
    Resample {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        instrument: String,
        #[arg(long, default_value = "1h")]
        from: Timeframe,
        #[arg(long)]
        to: Timeframe,
        /// Output directory (defaults to [csv] path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Signal {
            config,
            instrument,
            timeframe,
            prime,
        } => run_signal(&config, instrument.as_deref(), timeframe, prime),
        Command::Backtest {
            config,
            instrument,
            timeframe,
            trades,
        } => run_backtest_command(&config, &instrument, timeframe, trades),
        Command::Lines {
            config,
            instrument,
            timeframe,
            tail,
        } => run_lines(&config, &instrument, timeframe, tail),
        Command::Resample {
            config,
            instrument,
            from,
            to,
            output,
        } => run_resample(&config, &instrument, from, to, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, HulltrendError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn build_trend_config(adapter: &dyn ConfigPort) -> Result<TrendConfig, HulltrendError> {
    let defaults = TrendConfig::default();
    let source = match adapter.get_string("strategy", "source") {
        Some(s) => s.parse()?,
        None => defaults.source,
    };
    let variant = match adapter.get_string("strategy", "variant") {
        Some(tag) => tag.parse()?,
        None => defaults.variant,
    };
    let length = |key: &str, default: usize| -> Result<usize, HulltrendError> {
        let value = adapter.get_int("strategy", key, default as i64);
        usize::try_from(value)
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| HulltrendError::ConfigInvalid {
                section: "strategy".into(),
                key: key.into(),
                reason: format!("{key} must be at least 1"),
            })
    };

    Ok(TrendConfig {
        source,
        variant,
        fast_length: length("fast_length", defaults.fast_length)?,
        slow_length: length("slow_length", defaults.slow_length)?,
        suppress_ehma_warmup: adapter.get_bool(
            "strategy",
            "suppress_ehma_warmup",
            defaults.suppress_ehma_warmup,
        ),
    })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, HulltrendError> {
    let defaults = BacktestConfig::default();
    let fill_policy = match adapter.get_string("backtest", "fill_policy") {
        Some(s) => s.parse()?,
        None => defaults.fill_policy,
    };
    let exit_policy = match adapter.get_string("backtest", "exit_policy") {
        Some(s) => s.parse()?,
        None => defaults.exit_policy,
    };

    Ok(BacktestConfig {
        start: parse_date(adapter, "start_date")?,
        end: parse_date(adapter, "end_date")?,
        initial_capital: adapter.get_double("backtest", "initial_capital", defaults.initial_capital),
        position_size_pct: adapter.get_double(
            "backtest",
            "position_size_pct",
            defaults.position_size_pct,
        ),
        commission_pct: adapter.get_double("backtest", "commission_pct", defaults.commission_pct),
        fill_policy,
        exit_policy,
    })
}

fn build_engine(adapter: &dyn ConfigPort) -> Result<TrendEngine, HulltrendError> {
    validate_strategy_config(adapter)?;
    TrendEngine::new(build_trend_config(adapter)?)
}

/// `[csv] path` when set, otherwise the SQLite store.
pub fn open_data_port(adapter: &dyn ConfigPort) -> Result<Box<dyn DataPort>, HulltrendError> {
    if let Some(path) = adapter
        .get_string("csv", "path")
        .filter(|p| !p.trim().is_empty())
    {
        return Ok(Box::new(CsvAdapter::new(PathBuf::from(path))));
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        Ok(Box::new(SqliteAdapter::from_config(adapter)?))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        Err(HulltrendError::ConfigMissing {
            section: "csv".into(),
            key: "path".into(),
        })
    }
}

/// Tracker state store backed by `[sqlite] path`, shared across `signal` runs.
pub fn open_state_port(adapter: &dyn ConfigPort) -> Result<Box<dyn StatePort>, HulltrendError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;
        Ok(Box::new(SqliteAdapter::from_config(adapter)?))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = adapter;
        Err(HulltrendError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        })
    }
}

/// Webhook when `[webhook] url` is set, otherwise the log.
pub fn open_notifier(adapter: &dyn ConfigPort) -> Result<Box<dyn NotifyPort>, HulltrendError> {
    if adapter.get_string("webhook", "url").is_some() {
        #[cfg(feature = "webhook")]
        {
            use crate::adapters::webhook_adapter::WebhookNotifier;
            return Ok(Box::new(WebhookNotifier::from_config(adapter)?));
        }

        #[cfg(not(feature = "webhook"))]
        {
            tracing::warn!("[webhook] url is set but the webhook feature is disabled; logging only");
        }
    }
    Ok(Box::new(LogNotifier))
}

fn run_signal(
    config_path: &Path,
    instrument: Option<&str>,
    timeframe: Timeframe,
    prime: bool,
) -> Result<ExitCode, HulltrendError> {
    let adapter = load_config(config_path)?;
    let engine = build_engine(&adapter)?;
    let store = open_state_port(&adapter)?;
    let data = open_data_port(&adapter)?;

    let instruments = match instrument {
        Some(i) => vec![i.to_string()],
        None => data.list_instruments(timeframe)?,
    };
    if instruments.is_empty() {
        eprintln!("No instruments found for timeframe {timeframe}");
        return Ok(ExitCode::SUCCESS);
    }

    let notifier = open_notifier(&adapter)?;
    let mut service = SignalService::new(data, engine, store, notifier);

    let mut exit = ExitCode::SUCCESS;
    for instrument in instruments {
        let key = SeriesKey::new(instrument, timeframe);
        if prime {
            match service.prime(&key) {
                Ok(Some(record)) => println!(
                    "{}\t{}\t{}\tprimed",
                    key,
                    record.state,
                    record.bar_timestamp.format(TIMESTAMP_FORMAT)
                ),
                Ok(None) => println!("{key}\t-\t-\tinsufficient history"),
                Err(e) => {
                    eprintln!("error: {key}: {e}");
                    exit = (&e).into();
                }
            }
            continue;
        }

        match service.poll(&key) {
            Ok(Some(event)) => println!(
                "{}\t{}\t{}\t{}",
                key,
                event.state,
                event.bar_timestamp.format(TIMESTAMP_FORMAT),
                if event.is_transition {
                    "transition"
                } else {
                    "unchanged"
                }
            ),
            Ok(None) => println!("{key}\t-\t-\tinsufficient history"),
            Err(e) => {
                eprintln!("error: {key}: {e}");
                exit = (&e).into();
            }
        }
    }
    Ok(exit)
}

fn run_backtest_command(
    config_path: &Path,
    instrument: &str,
    timeframe: Timeframe,
    show_trades: bool,
) -> Result<ExitCode, HulltrendError> {
    let adapter = load_config(config_path)?;
    let engine = build_engine(&adapter)?;
    validate_backtest_config(&adapter)?;
    let bt_config = build_backtest_config(&adapter)?;

    let key = SeriesKey::new(instrument, timeframe);
    let bars = open_data_port(&adapter)?.get_bars(instrument, timeframe, None)?;
    if bars.is_empty() {
        eprintln!("No bars found for {key}");
        return Ok(ExitCode::SUCCESS);
    }

    let frame = engine.evaluate(&key.to_string(), &bars)?;
    let config = engine.config();
    eprintln!(
        "Running backtest: {} {} bars, {} fast {} slow {}",
        key,
        bars.len(),
        config.variant,
        config.fast_length,
        config.slow_length,
    );

    let result = run_backtest(&frame, &bt_config);
    let metrics = Metrics::compute(&result.portfolio);

    eprintln!("\n=== Results ===");
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Avg Win:          {:.2}", metrics.avg_win);
    eprintln!("Avg Loss:         {:.2}", metrics.avg_loss);
    eprintln!("Avg Hold:         {:.1}h", metrics.avg_trade_hours);
    eprintln!("Final Equity:     {:.2}", result.portfolio.equity);

    if let Some(position) = result.open_position() {
        let last_close = frame.closes.last().copied().unwrap_or(position.entry_price);
        eprintln!(
            "Open Position:    {} {:.4} @ {:.2} since {} (marked {:.2})",
            position.direction,
            position.quantity,
            position.entry_price,
            position.entry_time.format(TIMESTAMP_FORMAT),
            result.portfolio.mark_to_market(last_close),
        );
    }

    if show_trades {
        for trade in &result.portfolio.closed_trades {
            println!(
                "{}\t{}\t{:.2}\t{}\t{:.2}\t{:.2}\t{:?}",
                trade.direction,
                trade.entry_time.format(TIMESTAMP_FORMAT),
                trade.entry_price,
                trade.exit_time.format(TIMESTAMP_FORMAT),
                trade.exit_price,
                trade.pnl,
                trade.exit_reason,
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_lines(
    config_path: &Path,
    instrument: &str,
    timeframe: Timeframe,
    tail: Option<usize>,
) -> Result<ExitCode, HulltrendError> {
    let adapter = load_config(config_path)?;
    let engine = build_engine(&adapter)?;
    let key = SeriesKey::new(instrument, timeframe);
    let bars = open_data_port(&adapter)?.get_bars(instrument, timeframe, None)?;
    let frame = engine.evaluate(&key.to_string(), &bars)?;

    let fmt = |v: Option<f64>| v.map(|x| format!("{x:.4}")).unwrap_or_default();
    let start = tail.map_or(0, |n| frame.len().saturating_sub(n));

    let mut wtr = csv::Writer::from_writer(io::stdout().lock());
    wtr.write_record(["timestamp", "close", "hull", "trend", "hull_slope", "trend_slope", "state"])
        .map_err(io::Error::from)?;
    for t in start..frame.len() {
        wtr.write_record([
            frame.timestamps[t].format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.4}", frame.closes[t]),
            fmt(frame.hull.get(t)),
            fmt(frame.trend.get(t)),
            frame
                .hull
                .slope(t, FAST_OFFSET)
                .map(|s| s.as_str())
                .unwrap_or_default()
                .to_string(),
            frame
                .trend
                .slope(t, SLOW_OFFSET)
                .map(|s| s.as_str())
                .unwrap_or_default()
                .to_string(),
            frame.states[t]
                .map(|s| s.as_str())
                .unwrap_or_default()
                .to_string(),
        ])
        .map_err(io::Error::from)?;
    }
    wtr.flush()?;
    Ok(ExitCode::SUCCESS)
}

fn run_resample(
    config_path: &Path,
    instrument: &str,
    from: Timeframe,
    to: Timeframe,
    output: Option<&Path>,
) -> Result<ExitCode, HulltrendError> {
    if to.duration() <= from.duration() {
        return Err(HulltrendError::ConfigInvalid {
            section: "resample".into(),
            key: "to".into(),
            reason: format!("{to} is not coarser than {from}"),
        });
    }

    let adapter = load_config(config_path)?;
    let bars = open_data_port(&adapter)?.get_bars(instrument, from, None)?;
    let series = SeriesKey::new(instrument, from).to_string();
    let out = resample(&series, &bars, to)?;

    let dir = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(adapter.require_string("csv", "path")?),
    };
    let path = CsvAdapter::new(dir).write_bars(instrument, to, &out)?;
    eprintln!(
        "Resampled {} {} bars into {} {} bars: {}",
        bars.len(),
        from,
        out.len(),
        to,
        path.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn run_validate(config_path: &Path) -> Result<ExitCode, HulltrendError> {
    let adapter = load_config(config_path)?;
    validate_strategy_config(&adapter)?;
    validate_backtest_config(&adapter)?;

    let trend = build_trend_config(&adapter)?;
    let bt = build_backtest_config(&adapter)?;

    eprintln!("\nStrategy:");
    eprintln!("  source:        {:?}", trend.source);
    eprintln!("  variant:       {}", trend.variant);
    eprintln!("  fast_length:   {}", trend.fast_length);
    eprintln!("  slow_length:   {}", trend.slow_length);
    eprintln!(
        "  warm-up:       {} bars",
        trend.variant.warmup(trend.fast_length.max(trend.slow_length))
    );

    eprintln!("\nBacktest:");
    let date = |d: Option<chrono::NaiveDateTime>| {
        d.map(|d| d.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    };
    eprintln!("  range:         {} to {}", date(bt.start), date(bt.end));
    eprintln!("  capital:       {:.2}", bt.initial_capital);
    eprintln!("  position size: {}%", bt.position_size_pct);
    eprintln!("  commission:    {}%", bt.commission_pct);
    eprintln!("  fill policy:   {:?}", bt.fill_policy);
    eprintln!("  exit policy:   {:?}", bt.exit_policy);

    eprintln!("\nConfiguration is valid.");
    Ok(ExitCode::SUCCESS)
}
