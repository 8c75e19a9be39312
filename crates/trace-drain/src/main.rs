//! trace-drain - Periodic transfer of Cassandra/Scylla trace sessions into InfluxDB
//!
//! # Usage
//!
//! ```bash
//! # Drain on the configured interval until Ctrl+C
//! trace-drain -c trace-drain.yaml
//!
//! # Override the contact points without a config file
//! TRACE_DRAIN_HOSTS=10.0.4.95,10.0.4.96 trace-drain --influx-url http://influx:8086
//!
//! # Single cycle
//! trace-drain -c trace-drain.yaml once
//!
//! # Validate configuration
//! trace-drain -c trace-drain.yaml validate
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trace_drain::{
    CqlTraceSource, CycleRunner, DrainConfig, InfluxSink, KeywordClassifier, PointSink,
    TraceSource, Transformer,
};

#[derive(Parser)]
#[command(name = "trace-drain")]
#[command(version, about = "Drain Cassandra trace sessions into InfluxDB")]
struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Source contact points, comma separated
    #[arg(long, env = "TRACE_DRAIN_HOSTS", value_delimiter = ',')]
    hosts: Option<Vec<String>>,

    /// Source keyspace
    #[arg(long)]
    keyspace: Option<String>,

    /// InfluxDB base URL
    #[arg(long)]
    influx_url: Option<String>,

    /// InfluxDB database
    #[arg(long)]
    database: Option<String>,

    /// Seconds between drain cycles
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Points per write request
    #[arg(long)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain on a fixed interval until interrupted (default)
    Run,
    /// Run a single drain cycle and exit
    Once,
    /// Check connectivity to the source cluster and InfluxDB
    Check,
    /// Validate configuration and print a summary
    Validate,
    /// Print the configuration JSON schema
    Schema {
        /// Output format (json, yaml)
        #[arg(long, default_value = "json")]
        format: String,
    },
}

impl Cli {
    /// Defaults, then the config file, then flags
    fn load_config(&self) -> Result<DrainConfig> {
        let mut config = match self.config {
            Some(ref path) => DrainConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => DrainConfig::default(),
        };

        if let Some(ref hosts) = self.hosts {
            config.source.hosts = hosts.iter().map(|h| h.trim().to_string()).collect();
        }
        if let Some(ref keyspace) = self.keyspace {
            config.source.keyspace = keyspace.clone();
        }
        if let Some(ref url) = self.influx_url {
            config.sink.url = url.clone();
        }
        if let Some(ref database) = self.database {
            config.sink.database = database.clone();
        }
        if let Some(secs) = self.interval_secs {
            config.pipeline.interval_secs = secs;
        }
        if let Some(size) = self.batch_size {
            config.pipeline.batch_size = size;
        }

        config.check().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Schema { ref format }) = cli.command {
        init_logging(cli.verbose, "info");
        return show_schema(format);
    }

    let config = cli.load_config()?;
    init_logging(cli.verbose, &config.log_level);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Once => run_once(config).await,
        Commands::Check => check_connectivity(config).await,
        Commands::Validate => validate_config(&config),
        Commands::Schema { .. } => unreachable!(), // handled above
    }
}

fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Open both stores and wire up the runner
async fn build_runner(config: &DrainConfig) -> Result<CycleRunner> {
    let source = CqlTraceSource::connect(&config.source)
        .await
        .context("Failed to connect to trace source")?;
    let sink = InfluxSink::new(&config.sink).context("Failed to create InfluxDB client")?;

    let transformer = Transformer::new(
        config.sink.measurement.clone(),
        config.pipeline.classify_on,
        Arc::new(KeywordClassifier::new(config.pipeline.keywords.clone())),
    );

    Ok(CycleRunner::new(Arc::new(source), Arc::new(sink))
        .with_transformer(transformer)
        .with_batch_size(config.pipeline.batch_size)
        .with_interval(config.pipeline.interval()))
}

async fn run(config: DrainConfig) -> Result<()> {
    info!("Starting trace-drain");
    info!(
        hosts = ?config.source.hosts,
        keyspace = %config.source.keyspace,
        table = %config.source.table,
        sink = %config.sink.url,
        database = %config.sink.database,
        "Pipeline configured"
    );

    let runner = build_runner(&config).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal (Ctrl+C)");
            Ok(())
        }
        result = runner.run() => {
            if let Err(ref e) = result {
                error!(error = %e, "Fatal error, shutting down");
            }
            result.context("Drain cycle failed")
        }
    }
}

async fn run_once(config: DrainConfig) -> Result<()> {
    let runner = build_runner(&config).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal (Ctrl+C)");
            Ok(())
        }
        result = runner.run_cycle() => {
            let report = result.context("Drain cycle failed")?;
            println!(
                "Read {} record(s): {} written in {} batch(es), {} failed, {} discarded, {} rejected{}",
                report.records_read,
                report.points_written,
                report.batches_written,
                report.points_failed,
                report.records_discarded,
                report.points_rejected,
                if report.truncated { "" } else { " (source NOT truncated)" },
            );
            Ok(())
        }
    }
}

async fn check_connectivity(config: DrainConfig) -> Result<()> {
    println!("Running connectivity checks...\n");
    let mut all_passed = true;

    print!("Source ({:?})... ", config.source.hosts);
    match CqlTraceSource::connect(&config.source).await {
        Ok(source) => match source.check().await {
            Ok(()) => println!("✓ connected"),
            Err(e) => {
                println!("✗ failed: {}", e);
                all_passed = false;
            }
        },
        Err(e) => {
            println!("✗ failed: {}", e);
            all_passed = false;
        }
    }

    print!("Sink ({})... ", config.sink.url);
    match InfluxSink::new(&config.sink) {
        Ok(sink) => match sink.check().await {
            Ok(()) => println!("✓ reachable"),
            Err(e) => {
                println!("✗ failed: {}", e);
                all_passed = false;
            }
        },
        Err(e) => {
            println!("✗ failed: {}", e);
            all_passed = false;
        }
    }

    println!();
    if all_passed {
        println!("✓ All checks passed");
        Ok(())
    } else {
        anyhow::bail!("Some connectivity checks failed")
    }
}

fn validate_config(config: &DrainConfig) -> Result<()> {
    println!("✓ Configuration valid!\n");

    println!("Source:");
    println!("  Hosts:");
    for host in &config.source.hosts {
        println!("    - {}", host);
    }
    println!("  Table: {}.{}", config.source.keyspace, config.source.table);
    println!("  Consistency: {:?}", config.source.consistency);
    println!("  Page size: {}", config.source.page_size);
    println!(
        "  Timeouts: connect {}ms, request {}ms, truncate {}ms",
        config.source.connection_timeout_ms,
        config.source.request_timeout_ms,
        config.source.truncate_timeout_ms
    );
    println!(
        "  Auth: {}",
        if config.source.username.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    println!("Sink:");
    println!("  URL: {}", config.sink.url);
    println!("  Database: {}", config.sink.database);
    println!("  Measurement: {}", config.sink.measurement);
    if let Some(ref rp) = config.sink.retention_policy {
        println!("  Retention policy: {}", rp);
    }
    println!("  Timeout: {}ms", config.sink.timeout_ms);
    println!();

    println!("Pipeline:");
    println!("  Interval: {}s", config.pipeline.interval_secs);
    println!("  Batch size: {}", config.pipeline.batch_size);
    println!("  Classify on: {}", config.pipeline.classify_on);
    println!("  Keywords: {}", config.pipeline.keywords.join(", "));

    Ok(())
}

fn show_schema(format: &str) -> Result<()> {
    let schema = DrainConfig::json_schema();

    match format {
        "yaml" => println!("{}", serde_yaml::to_string(&schema)?),
        _ => println!("{}", serde_json::to_string_pretty(&schema)?),
    }

    Ok(())
}
