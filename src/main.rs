use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use linkscope::channel::MAX_CHANNELS;
use linkscope::generate::{self, DumpSpec};
use linkscope::manual::{DEFAULT_PERIOD_MS, ManualConfig};
use linkscope::packet::to_hex;
use linkscope::{
    ChannelSelector, Config, IngestReport, ManualPacket, Monitor, PacingMode, Scheduler, Session,
    Topology, TracingSink, WhitelistEntry,
};

#[derive(Parser, Debug)]
#[command(name = "linkscope")]
#[command(about = "Replay telemetry link dumps and watch channels and topology")]
#[command(version)]
struct Args {
    /// Verbose logging: packet rows and channel samples (default: false)
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a link dump with its recorded timing
    Replay {
        /// Path to the dump file
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        view: ViewArgs,

        /// Rate limit in packets per second (default: replay with recorded timing)
        #[arg(short, long)]
        rate: Option<u64>,

        /// Replay as fast as the file can be read
        #[arg(long)]
        no_pacing: bool,

        /// Periodically inject a manual packet, SRC:DST:DATA in hex
        #[arg(long)]
        inject: Option<String>,

        /// Period of injected packets in milliseconds
        #[arg(long)]
        inject_period: Option<u64>,
    },
    /// Decode a whole dump at once and print the resulting views
    Inspect {
        /// Path to the dump file
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Generate a synthetic link dump
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "link.dump")]
        output: PathBuf,

        /// Number of frames to write
        #[arg(short, long, default_value = "1000")]
        frames: usize,

        /// Number of nodes on the link
        #[arg(short, long, default_value = "4")]
        nodes: u8,

        /// Random seed for a reproducible dump
        #[arg(short, long)]
        seed: Option<u64>,
    },
}

#[derive(clap::Args, Debug)]
struct ViewArgs {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Whitelist entry SRC:DST, hex or '*' (repeatable, replaces the configured list)
    #[arg(short, long = "allow")]
    allow: Vec<WhitelistEntry>,

    /// Channel to plot, SRC->DST (up to 4, replaces the configured channels)
    #[arg(short = 'C', long = "channel")]
    channels: Vec<ChannelSelector>,

    /// Samples kept per channel
    #[arg(short, long)]
    window: Option<usize>,
}

impl ViewArgs {
    /// Configuration file values with command line overrides applied
    fn resolve(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        if !self.allow.is_empty() {
            config.whitelist = self.allow.clone();
        }
        if !self.channels.is_empty() {
            config.channels = self.channels.clone();
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        config.validate()?;
        Ok(config)
    }
}

fn build_monitor(session: &Session, config: &Config) -> Result<Arc<Monitor>> {
    let monitor = Monitor::new(
        session.log().clone(),
        config.window,
        Box::new(TracingSink::default()),
    );
    for (slot, selector) in config.channel_slots().into_iter().enumerate() {
        monitor.select(slot, selector)?;
    }
    Ok(Arc::new(monitor))
}

fn log_summary(title: &str, report: Option<&IngestReport>, topology: &Topology, monitor: &Monitor) {
    info!("======= {} =======", title);
    match report {
        Some(report) => {
            info!("Source: {}", report.source);
            info!("Ended: {}", report.end);
            info!("Total time: {:.2} seconds", report.elapsed.as_secs_f64());
            info!("Bytes read: {}", report.bytes_read);
            info!("Frames decoded: {}", report.frames_decoded);
            info!("Packets accepted: {}", report.accepted);
            info!("Packets rejected: {}", report.rejected);
        }
        None => warn!("No ingestion report available"),
    }

    let nodes: Vec<String> = topology.nodes.iter().map(|&n| to_hex(n)).collect();
    info!("Nodes ({}): {}", nodes.len(), nodes.join(" "));
    for link in &topology.links {
        info!("Link: {} - {}", to_hex(link.a), to_hex(link.b));
    }

    let views = monitor.refresh_channels();
    for slot in 0..MAX_CHANNELS {
        if let Some(selector) = views.selectors[slot] {
            info!(
                "Channel {} {}: {:?}",
                slot + 1,
                selector,
                views.series[slot].chronological()
            );
        }
    }
    info!("{}", "=".repeat(title.len() + 16));
}

/// Resolves once the worker is done with its source, or never when `forever`
async fn ingestion_finished(session: &Session, forever: bool) {
    loop {
        if !forever && !session.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn replay(
    file: PathBuf,
    view: ViewArgs,
    rate: Option<u64>,
    no_pacing: bool,
    inject: Option<String>,
    inject_period: Option<u64>,
) -> Result<()> {
    let mut config = view.resolve()?;
    if rate.is_some() {
        config.pacing.rate = rate;
    }
    if no_pacing {
        config.pacing.enabled = false;
    }
    if let Some(inject) = inject {
        let packet = ManualPacket::parse(&inject)?;
        config.manual = Some(ManualConfig {
            source: to_hex(packet.source),
            destination: to_hex(packet.destination),
            data: to_hex(packet.data),
            period_ms: inject_period.unwrap_or(DEFAULT_PERIOD_MS),
        });
        config.validate()?;
    }

    info!("Starting link replay");
    info!("Dump file: {}", file.display());
    let entries: Vec<String> = config.whitelist.iter().map(|e| e.to_string()).collect();
    info!("Whitelist: {}", entries.join(", "));

    let session = Arc::new(Session::new(config.whitelist(), config.pacing.mode()));
    session
        .start_file(&file)
        .with_context(|| format!("Failed to start reading {}", file.display()))?;

    let monitor = build_monitor(&session, &config)?;
    let mut scheduler = Scheduler::new();
    {
        let monitor = monitor.clone();
        scheduler.every("channels", config.refresh.channels(), move || {
            monitor.refresh_rows();
            monitor.refresh_channels();
        });
    }
    {
        let monitor = monitor.clone();
        scheduler.every("topology", config.refresh.topology(), move || {
            monitor.refresh_topology();
        });
    }
    {
        // Statistics reporting
        let log = session.log().clone();
        let mut last_len = 0usize;
        let mut last_time = Instant::now();
        scheduler.every("stats", Duration::from_secs(5), move || {
            let len = log.len();
            let now = Instant::now();
            let elapsed = now.duration_since(last_time).as_secs_f64();
            let pps = len.saturating_sub(last_len) as f64 / elapsed.max(f64::EPSILON);
            info!("Progress: {} packets in log - Rate: {:.0} pps", len, pps);
            last_len = len;
            last_time = now;
        });
    }
    let manual_running = match &config.manual {
        Some(manual) => {
            let packet = manual.packet()?;
            let period = manual.period_ms;
            let session = session.clone();
            info!("Injecting {:?} every {} ms", packet, period);
            scheduler.every("manual", Duration::from_millis(period), move || {
                session.inject(&packet, period);
            });
            true
        }
        None => false,
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, shutting down...");
        }
        _ = ingestion_finished(&session, manual_running) => {}
    }

    let report = {
        let session = session.clone();
        tokio::task::spawn_blocking(move || session.stop())
            .await
            .context("Ingestion worker could not be joined")?
    };
    scheduler.shutdown().await;

    // Last refresh so the final packets reach the sink
    monitor.refresh_rows();
    let topology = monitor.refresh_topology();
    log_summary("REPLAY SUMMARY", report.as_ref(), &topology, &monitor);

    info!("Link replay shutdown complete");
    Ok(())
}

async fn inspect(file: PathBuf, view: ViewArgs) -> Result<()> {
    let config = view.resolve()?;
    let session = Arc::new(Session::new(config.whitelist(), PacingMode::Unpaced));
    session
        .start_file(&file)
        .with_context(|| format!("Failed to start reading {}", file.display()))?;

    let report = {
        let session = session.clone();
        tokio::task::spawn_blocking(move || session.wait())
            .await
            .context("Ingestion worker could not be joined")?
    };

    let monitor = build_monitor(&session, &config)?;
    monitor.refresh_rows();
    let topology = monitor.refresh_topology();
    let directed: Vec<String> = topology.directed.iter().map(|s| s.to_string()).collect();
    info!("Selectable channels: {}", directed.join(" "));
    log_summary("INSPECT SUMMARY", report.as_ref(), &topology, &monitor);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging with smart defaults
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match args.command {
        Commands::Replay {
            file,
            view,
            rate,
            no_pacing,
            inject,
            inject_period,
        } => replay(file, view, rate, no_pacing, inject, inject_period).await?,
        Commands::Inspect { file, view } => inspect(file, view).await?,
        Commands::Generate {
            output,
            frames,
            nodes,
            seed,
        } => {
            let spec = DumpSpec {
                frames,
                nodes,
                seed,
                ..DumpSpec::default()
            };
            let written = generate::write_dump(&output, &spec)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Generated {} frames into {}", written, output.display());
        }
    }

    Ok(())
}
