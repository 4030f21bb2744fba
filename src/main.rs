use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use fibrange::prelude::*;
use prettytable::{Cell, Row, Table};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fibrange")]
#[command(about = "An intraday fibonacci range-retracement backtester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a backtest
    Run {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        //risk a constant percent instead of the drawdown rule
        #[arg(long)]
        fixed_risk: Option<f64>,

        //output path for trades csv
        #[arg(long)]
        output_trades_csv: Option<PathBuf>,

        //output path for equity curve csv
        #[arg(long)]
        output_equity_csv: Option<PathBuf>,

        //write the effective configuration as json
        #[arg(long)]
        save_config: Option<PathBuf>,
    },

    //run one backtest per drawdown threshold
    Sweep {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        //comma separated thresholds (eg -0.03,-0.05,-0.1)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        thresholds: Vec<f64>,
    },

    //plan the orders for the last day in the data
    Plan {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        strategy: StrategyArgs,

        //current account balance (defaults to the initial balance)
        #[arg(long)]
        balance: Option<f64>,

        //account high-water mark (defaults to the balance)
        #[arg(long)]
        peak: Option<f64>,

        //current bid (defaults to the last close)
        #[arg(long)]
        bid: Option<f64>,

        //current ask (defaults to the bid)
        #[arg(long)]
        ask: Option<f64>,
    },
}

#[derive(Args)]
struct InputArgs {
    //path to csv data file
    #[arg(long)]
    data: PathBuf,

    //json strategy configuration (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    //first date to trade, earlier bars only warm up the trend filter
    #[arg(long)]
    from: Option<NaiveDate>,
}

//overrides applied on top of the configuration
#[derive(Args)]
struct StrategyArgs {
    //symbol to trade (eg eurusd)
    #[arg(long)]
    symbol: Option<String>,

    //range window start hour
    #[arg(long)]
    range_start: Option<u32>,

    //range window end hour (exclusive)
    #[arg(long)]
    range_end: Option<u32>,

    //comma separated fibonacci levels (eg 0.618,0.786)
    #[arg(long, value_delimiter = ',')]
    fibo: Option<Vec<f64>>,

    //stop distance in points
    #[arg(long)]
    sl_points: Option<f64>,

    //partial target ratio
    #[arg(long)]
    partial_rr: Option<f64>,

    //disable the partial stage
    #[arg(long)]
    no_partial: bool,

    //final target ratio
    #[arg(long)]
    final_rr: Option<f64>,

    //allowed weekdays (eg mon,tue,wed,fri or 0,1,2,4)
    #[arg(long)]
    weekdays: Option<String>,

    //ema period for the fill filter
    #[arg(long)]
    ema: Option<usize>,

    //ema filter mode (with, reverse)
    #[arg(long, default_value = "with")]
    ema_mode: String,

    //check the stop before targets inside a bar
    #[arg(long)]
    stop_first: bool,

    //drop positions still open at the end of history
    #[arg(long)]
    exclude_unresolved: bool,

    //initial account balance
    #[arg(long)]
    initial_balance: Option<f64>,

    //percent risked while drawdown is above the threshold
    #[arg(long)]
    base_risk: Option<f64>,

    //percent risked at or below the threshold
    #[arg(long)]
    reduced_risk: Option<f64>,

    //drawdown threshold as a negative fraction (eg -0.05)
    #[arg(long, allow_hyphen_values = true)]
    dd_threshold: Option<f64>,
}

impl StrategyArgs {
    fn apply(&self, config: &mut StrategyConfig) -> Result<()> {
        if let Some(symbol) = &self.symbol {
            config.instrument.symbol = symbol.to_uppercase();
        }
        if let Some(start) = self.range_start {
            config.range_start_hour = start;
        }
        if let Some(end) = self.range_end {
            config.range_end_hour = end;
        }
        if let Some(levels) = &self.fibo {
            config.fibo_levels = levels.clone();
        }
        if let Some(points) = self.sl_points {
            config.sl_points = points;
        }
        if let Some(partial) = self.partial_rr {
            config.targets.partial_rr = Some(partial);
        }
        if self.no_partial {
            config.targets.partial_rr = None;
        }
        if let Some(target) = self.final_rr {
            config.targets.final_rr = target;
        }
        if let Some(raw) = &self.weekdays {
            let days = parse_weekdays(raw)
                .ok_or_else(|| anyhow::anyhow!("Invalid weekday list: {}", raw))?;
            config.allowed_weekdays = Some(days);
        }
        if let Some(period) = self.ema {
            let mode = TrendMode::parse(&self.ema_mode)
                .ok_or_else(|| anyhow::anyhow!("Unknown ema mode: {}", self.ema_mode))?;
            config.trend_filter = Some(TrendFilterConfig { period, mode });
        }
        if self.stop_first {
            config.intrabar_priority = IntrabarPriority::StopFirst;
        }
        if self.exclude_unresolved {
            config.unresolved_policy = UnresolvedPolicy::Exclude;
        }
        if let Some(balance) = self.initial_balance {
            config.initial_balance = balance;
        }
        if let Some(base) = self.base_risk {
            config.risk.base_risk = base;
        }
        if let Some(reduced) = self.reduced_risk {
            config.risk.reduced_risk = reduced;
        }
        if let Some(threshold) = self.dd_threshold {
            config.risk.dd_threshold = threshold;
        }

        config.validate()?;
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            strategy,
            fixed_risk,
            output_trades_csv,
            output_equity_csv,
            save_config,
        } => {
            let (config, bars) = prepare(&input, &strategy)?;
            if let Some(path) = &save_config {
                config.to_json_file(path)?;
                println!("Configuration saved to {:?}\n", path);
            }
            run_backtest(
                config,
                bars,
                input.from,
                fixed_risk,
                output_trades_csv,
                output_equity_csv,
            )?;
        }
        Commands::Sweep {
            input,
            strategy,
            thresholds,
        } => {
            let (config, bars) = prepare(&input, &strategy)?;
            run_sweep(config, bars, input.from, &thresholds)?;
        }
        Commands::Plan {
            input,
            strategy,
            balance,
            peak,
            bid,
            ask,
        } => {
            let (config, bars) = prepare(&input, &strategy)?;
            run_plan(config, bars, balance, peak, bid, ask)?;
        }
    }

    Ok(())
}

//loads configuration and bars for any subcommand
fn prepare(input: &InputArgs, strategy: &StrategyArgs) -> Result<(StrategyConfig, Vec<Bar>)> {
    let mut config = match &input.config {
        Some(path) => StrategyConfig::from_json_file(path)?,
        None => StrategyConfig::default(),
    };
    strategy.apply(&mut config).context("Invalid strategy configuration")?;

    println!("Loading data from {:?}...", input.data);
    let bars = CsvBarSource::new(&input.data).fetch(&config.instrument.symbol, None, None)?;

    let (first, last) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => anyhow::bail!("No bars found in {:?}", input.data),
    };

    println!("Loaded {} bars for {}", bars.len(), config.instrument.symbol);
    println!("Date range: {} to {}\n", first, last);

    Ok((config, bars))
}

fn build_engine(
    config: StrategyConfig,
    bars: Vec<Bar>,
    from: Option<NaiveDate>,
) -> Result<BacktestEngine> {
    let engine = BacktestEngine::new(config, bars)?;
    Ok(match from {
        Some(date) => engine.trading_from(date),
        None => engine,
    })
}

fn run_backtest(
    config: StrategyConfig,
    bars: Vec<Bar>,
    from: Option<NaiveDate>,
    fixed_risk: Option<f64>,
    output_trades_csv: Option<PathBuf>,
    output_equity_csv: Option<PathBuf>,
) -> Result<()> {
    println!("Fibonacci Range Backtester");
    println!("==========================\n");

    print_config(&config);

    let mut engine = build_engine(config, bars, from)?;
    if let Some(percent) = fixed_risk {
        if !(percent > 0.0) {
            anyhow::bail!("--fixed-risk must be positive, got {}", percent);
        }
        println!("Risk: fixed {}%\n", percent);
        engine = engine.with_risk_policy(Arc::new(FixedRisk { percent }));
    }

    println!("Running backtest...\n");
    let result = engine.run();

    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();

    println!();
    print_run_stats(&result.stats);

    if let Some(path) = output_trades_csv {
        save_trades_csv(result.ledger.trades(), &path)?;
        println!("\nTrades saved to {:?}", path);
    }

    if let Some(path) = output_equity_csv {
        save_equity_csv(&result.equity_curve, &path)?;
        println!("Equity curve saved to {:?}", path);
    }

    Ok(())
}

fn run_sweep(
    config: StrategyConfig,
    bars: Vec<Bar>,
    from: Option<NaiveDate>,
    thresholds: &[f64],
) -> Result<()> {
    println!("Drawdown Threshold Sweep");
    println!("========================\n");

    print_config(&config);

    let results: Vec<(f64, BacktestResult)> = thresholds
        .par_iter()
        .map(|&threshold| -> Result<(f64, BacktestResult)> {
            let mut config = config.clone();
            config.risk.dd_threshold = threshold;
            let engine = build_engine(config, bars.clone(), from)
                .context(format!("Threshold {}", threshold))?;
            Ok((threshold, engine.run()))
        })
        .collect::<Result<_>>()?;

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("DD Threshold"),
        Cell::new("Trades"),
        Cell::new("Final Balance"),
        Cell::new("Return"),
        Cell::new("Max Drawdown"),
        Cell::new("Profit Factor"),
        Cell::new("Expectancy"),
    ]));

    for (threshold, result) in &results {
        let s = &result.summary;
        table.add_row(Row::new(vec![
            Cell::new(&format!("{:.2}%", threshold * 100.0)),
            Cell::new(&format!("{}", s.num_trades)),
            Cell::new(&format!("${:.2}", s.final_balance)),
            Cell::new(&format!("{:.2}%", s.total_return_pct * 100.0)),
            Cell::new(&format!("{:.2}%", s.max_drawdown * 100.0)),
            Cell::new(&format!("{:.3}", s.profit_factor)),
            Cell::new(&format!("{:.3}R", s.expectancy_r)),
        ]));
    }

    table.printstd();
    Ok(())
}

fn run_plan(
    config: StrategyConfig,
    bars: Vec<Bar>,
    balance: Option<f64>,
    peak: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
) -> Result<()> {
    let balance = balance.unwrap_or(config.initial_balance);
    let account = AccountState {
        balance,
        peak_balance: peak.unwrap_or(balance).max(balance),
    };

    let (date, day) = day_ranges(&bars)
        .pop()
        .ok_or_else(|| anyhow::anyhow!("No trading day in the data"))?;

    println!("Session Plan for {}", date);
    println!("=======================\n");
    println!(
        "Balance: ${:.2} (peak ${:.2}, drawdown {:.2}%)\n",
        account.balance,
        account.peak_balance,
        account.drawdown() * 100.0
    );

    let risk = DrawdownRisk::from_config(&config.risk);
    let plan = plan_session(&config, &bars, day, &account, &risk)
        .context(format!("Failed to size orders for {}", date))?;

    let (session, risk_percent, requests) = match plan {
        SessionPlan::Skipped(reason) => {
            println!("No orders: {}", reason.as_str());
            return Ok(());
        }
        SessionPlan::Ready {
            session,
            risk_percent,
            requests,
        } => (session, risk_percent, requests),
    };

    println!(
        "Range: {:.5} @ {} / {:.5} @ {} -> {}",
        session.range_high,
        session.range_high_time.format("%H:%M"),
        session.range_low,
        session.range_low_time.format("%H:%M"),
        session.side.as_str()
    );
    println!("Risk: {}%  Expires: {}\n", risk_percent, session.force_close_time);

    let bid = bid
        .or_else(|| bars.last().map(|bar| bar.close))
        .ok_or_else(|| anyhow::anyhow!("No price to quote the plan against"))?;
    let quote = Quote {
        bid,
        ask: ask.unwrap_or(bid).max(bid),
    };
    println!("Quote: {:.5} / {:.5}\n", quote.bid, quote.ask);

    let mut gateway = PaperGateway::new();
    gateway.set_quote(&config.instrument.symbol, quote);
    let submission = submit_plan(requests, &mut gateway)?;

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Ticket"),
        Cell::new("Side"),
        Cell::new("Volume"),
        Cell::new("Entry"),
        Cell::new("Stop"),
        Cell::new("Take Profit"),
        Cell::new("At Risk"),
        Cell::new("Comment"),
    ]));

    for (ticket, request) in gateway.working_orders() {
        let at_risk = config
            .instrument
            .pnl_from_price_move((request.price - request.stop_loss).abs(), request.volume);
        table.add_row(Row::new(vec![
            Cell::new(&format!("{}", ticket)),
            Cell::new(request.side.as_str()),
            Cell::new(&format!("{:.2}", request.volume)),
            Cell::new(&format!("{:.5}", request.price)),
            Cell::new(&format!("{:.5}", request.stop_loss)),
            Cell::new(&format!("{:.5}", request.take_profit)),
            Cell::new(&format!("${:.2}", at_risk)),
            Cell::new(&request.comment),
        ]));
    }

    table.printstd();
    println!("\n{} order(s) placed", submission.tickets.len());
    for request in &submission.through_market {
        println!(
            "Skipped {} {:.5}: already through the market ({})",
            request.side.as_str(),
            request.price,
            request.comment
        );
    }

    Ok(())
}

fn print_config(config: &StrategyConfig) {
    let window_end = NaiveTime::from_hms_opt(config.range_end_hour % 24, 0, 0)
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "24:00".to_string());

    println!(
        "Instrument: {} ({} digits, point {})",
        config.instrument.symbol, config.instrument.digits, config.instrument.point
    );
    println!(
        "Range window: {:02}:00 - {}",
        config.range_start_hour, window_end
    );
    println!("Fibonacci levels: {:?}", config.fibo_levels);
    match config.targets.partial_rr {
        Some(partial) => println!(
            "Stop: {} points, partial 1:{}, final 1:{}",
            config.sl_points, partial, config.targets.final_rr
        ),
        None => println!(
            "Stop: {} points, final 1:{}",
            config.sl_points, config.targets.final_rr
        ),
    }
    if let Some(filter) = config.trend_filter {
        println!("Trend filter: EMA {} ({:?})", filter.period, filter.mode);
    }
    println!(
        "Risk: {}% / {}% below {:.2}% drawdown",
        config.risk.base_risk,
        config.risk.reduced_risk,
        config.risk.dd_threshold * 100.0
    );
    println!("Initial balance: ${:.2}\n", config.initial_balance);
}

fn print_run_stats(stats: &RunStats) {
    let mut table = Table::new();
    table.add_row(Row::new(vec![Cell::new("Run"), Cell::new("Count")]));

    let rows = [
        ("Days", stats.days),
        ("Sessions", stats.sessions),
        ("Orders", stats.orders),
        ("Canceled", stats.canceled),
        ("Filtered", stats.filtered),
        ("Unresolved (excluded)", stats.unresolved_excluded),
    ];
    for (name, count) in rows {
        table.add_row(Row::new(vec![Cell::new(name), Cell::new(&format!("{}", count))]));
    }
    for (reason, count) in &stats.skipped {
        table.add_row(Row::new(vec![
            Cell::new(&format!("Skipped: {}", reason.as_str())),
            Cell::new(&format!("{}", count)),
        ]));
    }

    table.printstd();
}

fn save_trades_csv(trades: &[Trade], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create {:?}", path))?;

    for trade in trades {
        writer.serialize(trade)?;
    }

    writer.flush()?;
    Ok(())
}

fn save_equity_csv(equity_curve: &[EquityPoint], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create {:?}", path))?;

    for point in equity_curve {
        writer.serialize(point)?;
    }

    writer.flush()?;
    Ok(())
}
