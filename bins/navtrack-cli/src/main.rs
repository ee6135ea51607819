//! Command-line tools for the navtrack GPS tracking system.
//!
//! Subcommands cover the day-to-day workflow: listen to a live NMEA UDP
//! stream, record it to CSV, analyze or trim recordings, and send ad-hoc
//! positions through the resilient send path.

mod storage;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use navtrack_core::{AppConfig, FixSink, FixStore, GpsFix, SinkError, Statistics, Track};
use navtrack_net::{
    scheduler, CircuitBreakerConfig, NmeaReceiver, NmeaSender, ResilientClient, RetryConfig,
};
use navtrack_nmea::{generate_rmc, safe_parse, RmcTemplate};

use storage::{filter_by_range, CsvStorage};

#[derive(Parser)]
#[command(name = "navtrack", version, about = "GPS position tracking over UDP NMEA streams")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Directory holding recorded CSV files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen to a live NMEA stream and print decoded fixes.
    Listen {
        /// Listen port; defaults to the configured receive port.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Record a live NMEA stream to a CSV file.
    Record {
        /// Recording duration in seconds.
        #[arg(long, default_value_t = 60)]
        duration: u64,

        #[arg(long)]
        port: Option<u16>,

        /// Output CSV filename inside the data directory.
        #[arg(long, default_value = "gps_positions.csv")]
        output: String,
    },

    /// Show statistics for a recorded CSV file.
    Stats {
        #[arg(long)]
        file: String,
    },

    /// Copy the rows of a recording that fall within a date range.
    Filter {
        #[arg(long)]
        file: String,

        /// Inclusive start date (YYYY-MM-DD).
        #[arg(long)]
        from: String,

        /// Inclusive end date (YYYY-MM-DD).
        #[arg(long)]
        to: String,

        #[arg(long)]
        output: String,
    },

    /// Drop rows older than N days from a recording.
    Prune {
        #[arg(long)]
        file: String,

        #[arg(long)]
        days: i64,
    },

    /// List recorded CSV files.
    List,

    /// Send one or more positions as RMC sentences.
    Send {
        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lon: f64,

        /// Number of sentences to send.
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Pause between sentences in milliseconds.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

/// Prints each committed fix as it arrives.
struct ConsoleSink;

impl FixSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn on_fix(&self, fix: &GpsFix) -> Result<(), SinkError> {
        println!(
            "{}  {:.6}, {:.6}  alt {:.1} m",
            fix.timestamp.format("%H:%M:%S"),
            fix.latitude,
            fix.longitude,
            fix.altitude
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Command::Listen { port } => listen(&config, port).await,
        Command::Record {
            duration,
            port,
            output,
        } => record(&config, &cli.data_dir, duration, port, &output).await,
        Command::Stats { file } => stats(&cli.data_dir, &file),
        Command::Filter {
            file,
            from,
            to,
            output,
        } => filter(&cli.data_dir, &file, &from, &to, &output),
        Command::Prune { file, days } => prune(&cli.data_dir, &file, days),
        Command::List => list(&cli.data_dir),
        Command::Send {
            lat,
            lon,
            count,
            interval_ms,
        } => send(&config, lat, lon, count, interval_ms).await,
    }
}

/// Wire a bound receiver to decode sentences into the store.
fn attach_decoder(receiver: &mut NmeaReceiver, store: Arc<FixStore>) {
    receiver.register_callback(move |text, _peer| {
        if let Some(info) = safe_parse(text, true).and_then(|s| s.position_info()) {
            let mut fix = GpsFix::new(info.latitude, info.longitude, info.altitude.unwrap_or(0.0));
            fix.satellites = info.num_satellites;
            fix.quality = info.gps_quality;
            store.add(fix);
        }
    });
}

async fn listen(config: &AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    let store = Arc::new(FixStore::new(config.gps.max_stored_positions));
    store.register_sink(Arc::new(ConsoleSink));

    let port = port.unwrap_or(config.network.receive_port);
    let bind: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let mut receiver = NmeaReceiver::bind(bind, config.network.buffer_size).await?;
    attach_decoder(&mut receiver, store.clone());

    let handle = receiver.handle();
    let task = tokio::spawn(receiver.run());

    let stats_store = store.clone();
    let ticker = scheduler::spawn_periodic(Duration::from_secs(10), move || {
        let stats = stats_store.statistics();
        info!(
            received = stats.total_received,
            stored = stats.stored_positions,
            distance_m = stats.total_distance,
            "listening"
        );
    });

    println!("Listening on {bind}. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    ticker.cancel();
    handle.stop();
    task.await?;

    print_statistics(&store.statistics())
}

async fn record(
    config: &AppConfig,
    data_dir: &PathBuf,
    duration: u64,
    port: Option<u16>,
    output: &str,
) -> anyhow::Result<()> {
    let store = Arc::new(FixStore::new(config.gps.max_stored_positions));
    store.register_sink(Arc::new(ConsoleSink));

    let port = port.unwrap_or(config.network.receive_port);
    let bind: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let mut receiver = NmeaReceiver::bind(bind, config.network.buffer_size).await?;
    attach_decoder(&mut receiver, store.clone());

    let handle = receiver.handle();
    let stop_handle = handle.clone();
    let stopper = scheduler::spawn_after(Duration::from_secs(duration), async move {
        stop_handle.stop();
    });

    println!("Recording for {duration} s on port {port} -> {output}");
    let mut task = tokio::spawn(receiver.run());
    tokio::select! {
        result = &mut task => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Recording stopped early");
            handle.stop();
            task.await?;
        }
    }
    stopper.cancel();

    let fixes = store.positions(None);
    if fixes.is_empty() {
        println!("No positions recorded");
        return Ok(());
    }

    let storage = CsvStorage::new(data_dir)?;
    let path = storage.save_fixes(&fixes, output, false)?;
    println!("Saved {} positions to {}", fixes.len(), path.display());
    Ok(())
}

fn stats(data_dir: &PathBuf, file: &str) -> anyhow::Result<()> {
    let storage = CsvStorage::new(data_dir)?;
    let fixes = storage.load_fixes(file)?;
    let track = Track::from_fixes(file, fixes);

    println!("File:      {file}");
    println!("Positions: {}", track.fixes.len());
    println!(
        "Distance:  {:.1} m ({:.3} km)",
        track.total_distance(),
        track.total_distance() / 1000.0
    );
    println!("Duration:  {:.1} s", track.duration_seconds());
    println!("Avg speed: {:.2} m/s", track.average_speed());

    let bounds = track.bounds();
    println!(
        "Bounds:    lat [{:.6}, {:.6}]  lon [{:.6}, {:.6}]",
        bounds.min_lat, bounds.max_lat, bounds.min_lon, bounds.max_lon
    );
    Ok(())
}

fn filter(data_dir: &PathBuf, file: &str, from: &str, to: &str, output: &str) -> anyhow::Result<()> {
    let storage = CsvStorage::new(data_dir)?;
    let fixes = storage.load_fixes(file)?;
    let total = fixes.len();

    let from = parse_day_bound(from, false)?;
    let to = parse_day_bound(to, true)?;
    let kept = filter_by_range(fixes, from, to);

    println!("Kept {} of {total} positions", kept.len());
    if !kept.is_empty() {
        let path = storage.save_fixes(&kept, output, false)?;
        println!("Written to {}", path.display());
    }
    Ok(())
}

fn prune(data_dir: &PathBuf, file: &str, days: i64) -> anyhow::Result<()> {
    let storage = CsvStorage::new(data_dir)?;
    let fixes = storage.load_fixes(file)?;
    let total = fixes.len();

    let cutoff = Utc::now() - chrono::Duration::days(days);
    let kept: Vec<GpsFix> = fixes.into_iter().filter(|fix| fix.timestamp >= cutoff).collect();
    let removed = total - kept.len();

    if kept.is_empty() {
        // Rewrite with just the header is pointless; drop the file instead
        std::fs::remove_file(storage.path_of(file))
            .with_context(|| format!("removing emptied file {file}"))?;
        println!("Removed all {total} positions, file deleted");
        return Ok(());
    }

    storage.save_fixes(&kept, file, false)?;
    println!("Removed {removed} positions older than {days} days, {} kept", kept.len());
    Ok(())
}

fn list(data_dir: &PathBuf) -> anyhow::Result<()> {
    let storage = CsvStorage::new(data_dir)?;
    let files = storage.list_files()?;
    if files.is_empty() {
        println!("No recordings in {}", data_dir.display());
        return Ok(());
    }
    for (name, size) in files {
        println!("{size:>10}  {name}");
    }
    Ok(())
}

async fn send(
    config: &AppConfig,
    lat: f64,
    lon: f64,
    count: u32,
    interval_ms: u64,
) -> anyhow::Result<()> {
    let dest: SocketAddr = format!("{}:{}", config.network.udp_address, config.network.udp_port)
        .parse()
        .context("invalid send destination")?;
    let sender = NmeaSender::new(dest);
    let client = ResilientClient::new(
        RetryConfig::from(&config.retry),
        CircuitBreakerConfig::from(&config.circuit),
    );

    for i in 0..count {
        let sentence = generate_rmc(lat, lon, &RmcTemplate::default())?;
        client
            .execute_with_retry(|| sender.send_message(&sentence))
            .await?;
        println!("Sent to {dest}: {sentence}");

        if i + 1 < count {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    let stats = client.stats();
    info!(
        attempts = stats.total_attempts,
        successful = stats.successful,
        "send complete"
    );
    Ok(())
}

fn print_statistics(stats: &Statistics) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Parse a `YYYY-MM-DD` day bound; end bounds extend to the end of day.
fn parse_day_bound(raw: &str, end_of_day: bool) -> anyhow::Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
    } else {
        NaiveTime::MIN
    };
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}
