//! Hepple CLI - Command-line interface for Hepple Analytics
//!
//! Commands:
//! - replay: Drive a tracker with recorded host signals (virtual time)
//! - stats: Print aggregate statistics from a store
//! - export: Write the raw event log as JSON
//! - visits: Print page visits reconstructed from the log
//! - doctor: Diagnose store health and configuration
//! - clear: Erase the event log (identity is kept)

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use hepple_analytics::signal::{parse_signal_ndjson, Signal};
use hepple_analytics::storage::{FileStore, KeyValueStore};
use hepple_analytics::{
    AggregateStats, ManualClock, PageVisit, StorageError, SystemClock, Tracker, TrackerConfig,
    TrackerError, PRODUCER_NAME, TRACKER_VERSION,
};

/// Hepple - On-device behavioral event tracker
#[derive(Parser)]
#[command(name = "hepple")]
#[command(author = "Hepple Spirits")]
#[command(version = TRACKER_VERSION)]
#[command(about = "Capture, store and summarize storefront interaction events", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Store directory
    #[arg(short, long)]
    store: PathBuf,

    /// Tracker configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the storage key namespace
    #[arg(long)]
    namespace: Option<String>,

    /// Override the log capacity
    #[arg(long)]
    max_events: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded signals (NDJSON of timed signals) through a tracker
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// Output the replay summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print aggregate statistics
    Stats {
        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the raw event log as JSON
    Export {
        #[command(flatten)]
        store: StoreArgs,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Print page visits reconstructed from the log
    Visits {
        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose store health and configuration
    Doctor {
        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Erase the event log and visit checkpoint
    Clear {
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), HeppleCliError> {
    match cli.command {
        Commands::Replay { input, store, json } => cmd_replay(&input, &store, json),
        Commands::Stats { store, json } => cmd_stats(&store, json),
        Commands::Export { store, output } => cmd_export(&store, &output),
        Commands::Visits { store, json } => cmd_visits(&store, json),
        Commands::Doctor { store, json } => cmd_doctor(&store, json),
        Commands::Clear { store } => cmd_clear(&store),
    }
}

fn load_config(args: &StoreArgs) -> Result<TrackerConfig, HeppleCliError> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_toml_str(&fs::read_to_string(path)?)?,
        None => TrackerConfig::default(),
    };
    if let Some(namespace) = &args.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(max_events) = args.max_events {
        config.max_events = max_events;
    }
    config.validate()?;
    Ok(config)
}

fn open_tracker(args: &StoreArgs) -> Result<Tracker<FileStore, SystemClock>, HeppleCliError> {
    let config = load_config(args)?;
    let store = FileStore::open(&args.store)?;
    Ok(Tracker::new(config, store, SystemClock)?)
}

fn cmd_replay(input: &Path, args: &StoreArgs, json: bool) -> Result<(), HeppleCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let signals = parse_signal_ndjson(&input_data)?;
    let Some(first) = signals.first() else {
        return Err(HeppleCliError::NoSignals);
    };

    let config = load_config(args)?;
    let store = FileStore::open(&args.store)?;
    let clock = ManualClock::new(first.at_ms);
    let mut tracker = Tracker::new(config, store, clock.clone())?;

    let events_before = tracker.raw_data().len();
    let mut started = false;
    for timed in &signals {
        clock.set(timed.at_ms);
        match &timed.signal {
            Signal::Navigate { path } if !started => tracker.start(path),
            signal => tracker.handle(signal),
        }
        if matches!(timed.signal, Signal::Navigate { .. }) {
            started = true;
        }
    }
    tracker.poll();

    let report = ReplayReport {
        signals: signals.len(),
        events_before,
        events_after: tracker.raw_data().len(),
        user_id: tracker.user_id(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Replay Report");
        println!("=============");
        println!("Signals replayed: {}", report.signals);
        println!("Events before:    {}", report.events_before);
        println!("Events after:     {}", report.events_after);
        println!("User ID:          {}", report.user_id);
    }

    Ok(())
}

fn cmd_stats(args: &StoreArgs, json: bool) -> Result<(), HeppleCliError> {
    let tracker = open_tracker(args)?;
    let stats = tracker.aggregated_data();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &AggregateStats) {
    println!("Aggregate Statistics");
    println!("====================");
    println!("Events:           {}", stats.total_events);
    println!("Page views:       {}", stats.total_views);
    println!("Sessions:         {}", stats.total_sessions);
    println!("Avg view time:    {:.1}s", stats.avg_view_time);
    println!("Avg scroll depth: {:.1}%", stats.avg_scroll_depth);

    let sections = [
        ("Page visits", &stats.page_visits),
        ("Clicks", &stats.click_frequency),
        ("Hovers", &stats.hover_frequency),
    ];
    for (title, counts) in sections {
        if counts.is_empty() {
            continue;
        }
        println!("\n{}:", title);
        let mut sorted: Vec<(&String, &u64)> = counts.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (key, count) in sorted {
            println!("  {:>5}  {}", count, key);
        }
    }
}

fn cmd_export(args: &StoreArgs, output: &Path) -> Result<(), HeppleCliError> {
    let tracker = open_tracker(args)?;
    let json = tracker.export_json()?;

    if output.to_string_lossy() == "-" {
        println!("{}", json);
    } else {
        fs::write(output, json)?;
    }
    Ok(())
}

fn cmd_visits(args: &StoreArgs, json: bool) -> Result<(), HeppleCliError> {
    let tracker = open_tracker(args)?;
    let visits = tracker.page_visits();

    if json {
        println!("{}", serde_json::to_string_pretty(&visits)?);
        return Ok(());
    }

    println!("Page Visits");
    println!("===========");
    if visits.is_empty() {
        println!("(none)");
    }
    for visit in &visits {
        println!("{}", format_visit(visit));
    }
    Ok(())
}

fn format_visit(visit: &PageVisit) -> String {
    let started = DateTime::<Utc>::from_timestamp_millis(visit.started_at)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| visit.started_at.to_string());
    let view_time = visit
        .view_time_secs
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "open".to_string());
    format!(
        "{}  {}  {:<20} time={} scroll={:.0}% clicks={} hovers={}",
        started, visit.user_id, visit.path, view_time, visit.max_scroll, visit.clicks, visit.hovers
    )
}

fn cmd_doctor(args: &StoreArgs, json: bool) -> Result<(), HeppleCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "tracker_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Tracker version {}", TRACKER_VERSION),
    });

    let config = match load_config(args) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Namespace '{}', capacity {} events",
                    config.namespace, config.max_events
                ),
            });
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            });
            None
        }
    };

    if let Some(config) = config {
        if !args.store.exists() {
            checks.push(DoctorCheck {
                name: "store".to_string(),
                status: CheckStatus::Warning,
                message: "Store directory does not exist yet".to_string(),
            });
        } else {
            match FileStore::open(&args.store) {
                Ok(store) => doctor_store_checks(&store, &config, &mut checks),
                Err(e) => checks.push(DoctorCheck {
                    name: "store".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot open store: {}", e),
                }),
            }
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input <file> to replay)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay --input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: TRACKER_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Hepple Doctor Report");
        println!("====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(HeppleCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn doctor_store_checks(store: &FileStore, config: &TrackerConfig, checks: &mut Vec<DoctorCheck>) {
    checks.push(match store.get_item(&config.uid_key()) {
        Ok(Some(id)) => DoctorCheck {
            name: "identity".to_string(),
            status: CheckStatus::Ok,
            message: format!("Identity {}", id.trim()),
        },
        Ok(None) => DoctorCheck {
            name: "identity".to_string(),
            status: CheckStatus::Warning,
            message: "No identity yet (created on first event)".to_string(),
        },
        Err(e) => DoctorCheck {
            name: "identity".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read identity: {}", e),
        },
    });

    checks.push(match store.get_item(&config.log_key()) {
        Ok(Some(raw)) => match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(events) if events.len() > config.max_events => DoctorCheck {
                name: "event_log".to_string(),
                status: CheckStatus::Warning,
                message: format!(
                    "{} events exceed capacity {}; oldest are dropped on next write",
                    events.len(),
                    config.max_events
                ),
            },
            Ok(events) => DoctorCheck {
                name: "event_log".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} events (capacity {})", events.len(), config.max_events),
            },
            Err(e) => DoctorCheck {
                name: "event_log".to_string(),
                status: CheckStatus::Error,
                message: format!("Corrupt event log, it will read as empty: {}", e),
            },
        },
        Ok(None) => DoctorCheck {
            name: "event_log".to_string(),
            status: CheckStatus::Ok,
            message: "Event log is empty".to_string(),
        },
        Err(e) => DoctorCheck {
            name: "event_log".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read event log: {}", e),
        },
    });

    if let Ok(Some(_)) = store.get_item(&config.visit_key()) {
        checks.push(DoctorCheck {
            name: "visit_checkpoint".to_string(),
            status: CheckStatus::Warning,
            message: "Unfinished visit found; it is recovered on next start".to_string(),
        });
    }
}

fn cmd_clear(args: &StoreArgs) -> Result<(), HeppleCliError> {
    let mut tracker = open_tracker(args)?;
    let removed = tracker.raw_data().len();
    tracker.clear()?;
    println!("Cleared {} events from {}", removed, args.store.display());
    Ok(())
}

// Error types

#[derive(Debug)]
enum HeppleCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    NoSignals,
    DoctorFailed,
}

impl From<io::Error> for HeppleCliError {
    fn from(e: io::Error) -> Self {
        HeppleCliError::Io(e)
    }
}

impl From<TrackerError> for HeppleCliError {
    fn from(e: TrackerError) -> Self {
        HeppleCliError::Tracker(e)
    }
}

impl From<StorageError> for HeppleCliError {
    fn from(e: StorageError) -> Self {
        HeppleCliError::Tracker(TrackerError::Storage(e))
    }
}

impl From<serde_json::Error> for HeppleCliError {
    fn from(e: serde_json::Error) -> Self {
        HeppleCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HeppleCliError> for CliError {
    fn from(e: HeppleCliError) -> Self {
        match e {
            HeppleCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HeppleCliError::Tracker(TrackerError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Fix the configuration file or flags".to_string()),
            },
            HeppleCliError::Tracker(TrackerError::ConfigFormat(e)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check TOML syntax".to_string()),
            },
            HeppleCliError::Tracker(TrackerError::ParseError(msg)) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be a timed signal, e.g. {\"at_ms\":0,\"signal\":\"navigate\",\"path\":\"/\"}".to_string()),
            },
            HeppleCliError::Tracker(e) => CliError {
                code: "TRACKER_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'hepple doctor' for details".to_string()),
            },
            HeppleCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            HeppleCliError::NoSignals => CliError {
                code: "NO_SIGNALS".to_string(),
                message: "No signals found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            HeppleCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ReplayReport {
    signals: usize,
    events_before: usize,
    events_after: usize,
    user_id: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
