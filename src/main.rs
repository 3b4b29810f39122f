use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod camera;
mod config;
mod pool;
mod probe;
mod record;
mod stats;

use camera::RtspConnector;
use config::{Config, DEFAULT_CONFIG_PATH};
use pool::StreamWorkerPool;
use record::{run_base_id, FileSegmentOpener, SegmentScheduler};
use stats::{CheckResult, RunSummary, StreamStat};

#[derive(Parser)]
#[command(name = "rtspwatch")]
#[command(about = "RTSP stream health checks, analysis, inspection and recording")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that every configured stream delivers RTP
    Health {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Measure loss, bitrate and frame types of every configured stream
    Analyze {
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Watch one stream live until Ctrl-C
    Inspect { url: String },
    /// Record the H.264 track of one stream to MPEG-TS segments
    Record {
        url: String,
        /// Segment length; 0 or less records a single file
        #[arg(long, allow_negative_numbers = true)]
        segment_secs: Option<i64>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "rtspwatch=debug" } else { "rtspwatch=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    match cli.command {
        Command::Health { json } => run_health(Config::load_from(&cli.config)?, json).await?,
        Command::Analyze { json } => run_analyze(Config::load_from(&cli.config)?, json).await?,
        Command::Inspect { url } => {
            let config = Config::load_or_default(&cli.config)?;
            let connector = RtspConnector::new(config.rtsp.transport);
            let interval = Duration::from_secs(config.inspect.report_interval_secs);
            probe::inspect_stream(&connector, &url, interval, shutdown_signal()).await?;
        }
        Command::Record {
            url,
            segment_secs,
            output_dir,
        } => {
            let config = Config::load_or_default(&cli.config)?;
            let segment_secs = segment_secs.unwrap_or(config.record.segment_secs);
            let output_dir = output_dir.unwrap_or(config.record.output_dir);
            let base = run_base_id(&chrono::Local::now());
            tracing::info!(dir = %output_dir.display(), base = %base, segment_secs, "recording to");

            let opener = FileSegmentOpener::new(output_dir, base, segment_secs > 0);
            let scheduler = SegmentScheduler::new(opener, segment_secs);
            let connector = RtspConnector::new(config.rtsp.transport);
            probe::record_stream(&connector, &url, scheduler, shutdown_signal()).await?;
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn run_health(config: Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let targets = config.require_streams()?;
    let connector = Arc::new(RtspConnector::new(config.rtsp.transport));
    let window = Duration::from_secs(config.health.check_secs);
    let pool = StreamWorkerPool::new(config.health.parallel);
    tracing::info!(streams = targets.len(), parallel = pool.limit(), "checking streams");

    let reports = pool
        .run(targets, |target| {
            let connector = Arc::clone(&connector);
            async move { probe::check_stream(connector.as_ref(), &target, window).await }
        })
        .await;

    let mut summary = RunSummary::default();
    let mut results = Vec::with_capacity(reports.len());
    for report in reports {
        let result = match report.outcome {
            Ok(result) => result,
            Err(e) => CheckResult::failed(&report.target, format!("task aborted: {e}")),
        };
        summary.record(result.success);
        if !json {
            println!("{result}");
        }
        results.push(result);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    tracing::info!(
        streams = summary.streams,
        healthy = summary.healthy,
        failed = summary.failed,
        "health check complete"
    );
    Ok(())
}

async fn run_analyze(config: Config, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let targets = config.require_streams()?;
    let connector = Arc::new(RtspConnector::new(config.rtsp.transport));
    let window = Duration::from_secs(config.monitor.duration_secs);
    let pool = StreamWorkerPool::new(config.monitor.parallel);
    tracing::info!(
        streams = targets.len(),
        parallel = pool.limit(),
        secs = window.as_secs(),
        "analyzing streams"
    );

    let reports = pool
        .run(targets, |target| {
            let connector = Arc::clone(&connector);
            async move { probe::analyze_stream(connector.as_ref(), &target, window).await }
        })
        .await;

    let mut summary = RunSummary::default();
    let mut entries = Vec::with_capacity(reports.len());
    for report in reports {
        let (stat, error) = match report.outcome {
            Ok(Ok(stat)) => (stat, None),
            Ok(Err(e)) => (StreamStat::empty(&report.target), Some(e.to_string())),
            Err(e) => (StreamStat::empty(&report.target), Some(e.to_string())),
        };
        summary.record(error.is_none() && stat.total_packets > 0);

        if json {
            let mut entry = serde_json::to_value(&stat)?;
            if let (Some(error), Some(map)) = (error, entry.as_object_mut()) {
                map.insert("error".into(), serde_json::Value::String(error));
            }
            entries.push(entry);
        } else {
            match error {
                Some(error) => println!("{stat} / FAIL {error}"),
                None => println!("{stat}"),
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    }
    tracing::info!(
        streams = summary.streams,
        healthy = summary.healthy,
        failed = summary.failed,
        "analysis complete"
    );
    Ok(())
}
