use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{info, LevelFilter};
use serde_json::{json, Value};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

use cloud_auditor::cache::Snapshot;
use cloud_auditor::catalog::{default_catalog, load_catalog};
use cloud_auditor::cli::{Args, Commands};
use cloud_auditor::collectors::CollectorRegistry;
use cloud_auditor::config::{load_or_create_config, CollectorConfig};
use cloud_auditor::engine::CollectionEngine;
use cloud_auditor::rules::run_all;
use cloud_auditor::transport::AwsTransport;
use cloud_auditor::utils::report::{findings_table, security_report};
use cloud_auditor::utils::summary::create_run_summary;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    match &args.command {
        Commands::Collect { output, catalog, services } => {
            let config = load_or_create_config(args.config.as_deref())?;
            collect(&config, output.as_deref(), catalog.as_deref(), services.as_deref())
        }
        Commands::Scan { source, security_report, include_source } => {
            scan(source, *security_report, *include_source)
        }
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            CollectorConfig::create_default_config_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
        Commands::InitCatalog { path } => {
            info!("Writing built-in call catalog to {}", path.display());
            default_catalog().to_file().save_to_yaml_file(path)?;
            Ok(())
        }
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(log_level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .context("Failed to initialize logger")?;
    Ok(())
}

/// Run the engine and write the snapshot
fn collect(
    config: &CollectorConfig,
    output: Option<&Path>,
    catalog_path: Option<&Path>,
    services: Option<&[String]>,
) -> Result<()> {
    let mut catalog = load_catalog(catalog_path.or(config.catalog.as_deref()))?;
    if let Some(services) = services {
        info!("Restricting collection to: {}", services.join(", "));
        catalog = catalog.restrict_to(services);
    }

    let transport_config = config.transport_config();
    let transport = Arc::new(AwsTransport::new(&transport_config).context("Failed to create AWS transport")?);
    let engine = CollectionEngine::new(
        catalog,
        config.region_catalog(),
        config.limits,
        transport,
        transport_config,
        CollectorRegistry::with_defaults(),
    )
    .context("Invalid call catalog")?;

    info!("Starting collection");
    let started = Utc::now();
    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    let snapshot = runtime.block_on(engine.run());
    let finished = Utc::now();

    info!("Run summary:\n{}", create_run_summary(&snapshot, started, finished)?);

    let rendered = serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;
    match output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
            info!("Snapshot written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Evaluate every rule over a snapshot file
fn scan(source: &Path, security: bool, include_source: bool) -> Result<()> {
    let content = fs::read_to_string(source)
        .with_context(|| format!("Unable to read source file: {}", source.display()))?;
    let value: Value = serde_json::from_str(&content).context("File is not valid JSON")?;
    let snapshot = Snapshot::from_json(&value)?;

    let results = run_all(&snapshot, include_source);
    if include_source {
        let rendered: Vec<Value> = results
            .iter()
            .map(|result| json!({"plugin": result.rule.title, "category": result.rule.category, "output": result.output}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else if security {
        println!(
            "Running security report. This may take a few minutes...\n\
             For more details on the results, run the scan again without the --security-report argument."
        );
        print!("{}", security_report(&results));
    } else {
        print!("{}", findings_table(&results));
    }
    Ok(())
}
