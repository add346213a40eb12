use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use product_exporter::adapter::http::{HttpBackend, HttpBackendConfig};
use product_exporter::codec::{self, StorageRow};
use product_exporter::config;
use product_exporter::domain::ProductRecord;
use product_exporter::pipeline::PipelineOrchestrator;
use product_exporter::producer::ListProducer;

#[derive(Parser)]
#[command(name = "product-exporter", about = "Stage-then-merge product export worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export records from a local NDJSON file into the warehouse target table.
    Export {
        /// NDJSON file with one product record per line.
        #[arg(long, env = "APP_INPUT_FILE")]
        input: PathBuf,
    },
    /// Run the synthetic performance probe and report elapsed milliseconds.
    Probe {
        /// Number of synthetic records (defaults to APP_PROBE_SIZE).
        #[arg(long)]
        size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Use JSON format if RUST_LOG_FORMAT=json, otherwise use human-readable format
    let use_json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(true);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().flatten_event(true).with_current_span(true))
            .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
            .init();
    }

    let settings = config::get_configuration()
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;
    info!("Loaded settings");

    let backend = HttpBackend::new(HttpBackendConfig {
        base_url: settings.warehouse_url.clone(),
        poll_interval: Duration::from_millis(500),
    })
    .context("failed to build warehouse client")?;
    let exporter = PipelineOrchestrator::new(
        Arc::new(backend),
        settings.destination()?,
        &settings.export_file_path,
    );

    let outcome = match cli.command {
        Command::Export { input } => {
            let records = read_records(&input).await?;
            info!(count = records.len(), "loaded input records");
            let mut producer = ListProducer::new(records);
            exporter.export(&mut producer).await
        }
        Command::Probe { size } => {
            let count = size.unwrap_or(settings.probe_size);
            exporter.probe(probe_template(), count).await
        }
    };

    if outcome.success {
        info!(
            run_id = %outcome.run_id,
            rows = outcome.rows_produced,
            dropped = outcome.rows_dropped,
            elapsed_ms = outcome.elapsed_ms,
            "run succeeded"
        );
        Ok(())
    } else {
        error!(run_id = %outcome.run_id, failure = ?outcome.failure, "run failed");
        std::process::exit(1);
    }
}

async fn read_records(path: &Path) -> anyhow::Result<Vec<ProductRecord>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: StorageRow = serde_json::from_str(line)
            .with_context(|| format!("malformed record on line {}", number + 1))?;
        records.push(codec::from_storage_row(&row));
    }
    Ok(records)
}

fn probe_template() -> ProductRecord {
    ProductRecord {
        title: "probe product".to_string(),
        article: "PROBE-0".to_string(),
        description_content: "synthetic record for the performance probe".to_string(),
        main_category_title: "Probe".to_string(),
        category_tree: "Probe".to_string(),
        image: String::new(),
        producer_title: "probe".to_string(),
        ..ProductRecord::default()
    }
}
