mod boundary;
mod config;
mod registry;
mod worker;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand, ValueEnum};
use fairscope_core::{
    AuditError, AuditOptions, AuditRequest, DatasetType, Severity, load_csv, report_json_schema,
    request_json_schema,
};
use fairscope_metrics::{
    AuditEngine, AuditOutcome, AuditSummary, render_report, worst_severity, write_weighted_csv,
};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use boundary::WorkerBoundary;
use config::{ConfigError, DEFAULT_CONFIG_PATH, load_or_create_config};
use registry::{
    LogSink, RunContext, init_logging, start_run, write_json_atomic, write_markdown,
    write_report,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{} error: {}", .0.kind(), .0)]
    Audit(#[from] AuditError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("strict mode: {0}")]
    Strict(String),
}

#[derive(Parser, Debug)]
#[command(name = "fairscope", version, about = "Fairscope bias audit CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Audit a CSV file and record the run.
    Audit(AuditArgs),
    /// Read a JSON request on stdin and write the report to stdout.
    Worker,
    /// Print the JSON Schema of the request or report contract.
    Schema(SchemaArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DatasetTypeArg {
    Training,
    ModelOutcome,
}

impl From<DatasetTypeArg> for DatasetType {
    fn from(value: DatasetTypeArg) -> Self {
        match value {
            DatasetTypeArg::Training => DatasetType::Training,
            DatasetTypeArg::ModelOutcome => DatasetType::ModelOutcome,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemaKind {
    Request,
    Report,
}

#[derive(Args, Debug)]
struct AuditArgs {
    /// CSV file with a header row.
    input: PathBuf,
    /// Outcome column name.
    #[arg(long)]
    outcome: String,
    /// Protected attribute(s), comma-separated or repeated.
    #[arg(long, value_delimiter = ',', required = true)]
    protected: Vec<String>,
    /// Whether the outcome is ground truth or a model prediction.
    #[arg(long, value_enum, default_value = "training")]
    dataset_type: DatasetTypeArg,
    /// Privileged value or reference category, as ATTRIBUTE=VALUE.
    #[arg(long = "reference", value_name = "ATTRIBUTE=VALUE", value_parser = parse_reference)]
    references: Vec<(String, String)>,
    /// Outcome value(s) counted as favorable.
    #[arg(long = "positive", value_name = "LABEL")]
    positive_labels: Vec<String>,
    /// Configuration file; created with defaults when missing.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Optional extra output path for report.json.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Run the computation in a child worker process.
    #[arg(long, default_value_t = false)]
    isolate: bool,
    /// Timeout in seconds; defaults to the configured worker timeout.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Fail when any headline metric is in the high band.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    #[arg(long, value_enum, default_value = "request")]
    kind: SchemaKind,
    /// Write to a file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn parse_reference(raw: &str) -> Result<(String, String), String> {
    let (attribute, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ATTRIBUTE=VALUE, got '{raw}'"))?;
    let (attribute, value) = (attribute.trim(), value.trim());
    if attribute.is_empty() || value.is_empty() {
        return Err(format!("expected ATTRIBUTE=VALUE, got '{raw}'"));
    }
    Ok((attribute.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Audit(args) => run_audit(args).await,
        Command::Worker => run_worker().await,
        Command::Schema(args) => run_schema(args),
    }
}

async fn run_audit(args: AuditArgs) -> Result<(), CliError> {
    let AuditArgs {
        input,
        outcome,
        protected,
        dataset_type,
        references,
        positive_labels,
        config: config_path,
        run_dir,
        out,
        isolate,
        timeout_secs,
        strict,
    } = args;

    let config = load_or_create_config(&config_path)?;
    let isolate = isolate || config.worker.isolate;
    let timeout_secs = timeout_secs.unwrap_or(config.worker.timeout_secs);
    if timeout_secs == 0 {
        return Err(CliError::InvalidArgument(
            "timeout must be at least one second".to_string(),
        ));
    }

    let protected: Vec<&str> = protected.iter().map(String::as_str).collect();
    let mut options = AuditOptions::new(outcome, &protected, dataset_type.into());
    for (attribute, value) in &references {
        options = options.with_reference(attribute, value);
    }
    options.positive_labels = if positive_labels.is_empty() {
        config.outcome.positive_labels.clone()
    } else {
        positive_labels
    };
    options.attributes = config.attributes.clone();

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        input: input.clone(),
        config_path,
        isolate,
        strict,
        timeout_secs,
        run_dir,
        options: options.clone(),
        thresholds: config.thresholds.clone(),
    };

    let run_paths = start_run(&run_ctx)?;
    init_logging(LogSink::RunFile(&run_paths.logs_path))?;

    tracing::info!(event = "run_started", run_id = %run_id, input = %input.display(), isolate);
    let timer = Instant::now();

    let text = tokio::fs::read_to_string(&input).await?;
    let dataset = load_csv(&text)?;
    tracing::info!(event = "dataset_loaded", rows = dataset.len(), columns = dataset.columns().len());

    let timeout = Duration::from_secs(timeout_secs);
    let (report, weights) = if isolate {
        let request = AuditRequest::from_dataset(&dataset, options);
        let report = WorkerBoundary::current(timeout)?.run(&request).await?;
        (report, None)
    } else {
        let AuditOutcome {
            report,
            weights,
            summary,
        } = run_in_process(dataset.clone(), options, timeout).await?;
        log_summary(&summary);
        (report, weights)
    };

    write_report(&run_paths, &report, out.as_deref())?;
    tracing::info!(event = "report_written", path = %run_paths.report_path.display());

    let markdown = render_report(&report, &config.thresholds);
    write_markdown(&run_paths, &markdown)?;
    tracing::info!(event = "markdown_written", path = %run_paths.markdown_path.display());

    if let Some(weights) = &weights {
        let bytes = write_weighted_csv(&run_paths.reweighed_path, &dataset, weights)?;
        tracing::info!(
            event = "reweighed_written",
            path = %run_paths.reweighed_path.display(),
            bytes
        );
    }

    println!("{}", run_paths.root.display());

    let worst = worst_severity(&report, &config.thresholds);
    if strict && worst == Severity::High {
        tracing::warn!(event = "run_finished", status = "strict_violation");
        return Err(CliError::Strict(format!(
            "high-severity bias detected; see {}",
            run_paths.markdown_path.display()
        )));
    }

    tracing::info!(
        event = "run_finished",
        status = "success",
        worst = worst.as_str(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(())
}

fn log_summary(summary: &AuditSummary) {
    tracing::info!(
        event = "audit_summary",
        rows = summary.rows,
        rows_missing_outcome = summary.rows_missing_outcome,
        favorable = ?summary.favorable_labels,
        resolved = summary.attributes_resolved,
        failed = summary.attributes_failed,
        passthrough = summary.passthrough_columns,
        sweeps = summary.reweighing_sweeps,
        converged = summary.reweighing_converged,
        empty_cells = summary.empty_cells,
        duration_ms = summary.duration_ms as u64
    );
}

async fn run_in_process(
    dataset: fairscope_core::Dataset,
    options: AuditOptions,
    timeout: Duration,
) -> Result<AuditOutcome, AuditError> {
    let task = tokio::task::spawn_blocking(move || AuditEngine::default().run(&dataset, &options));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => Err(AuditError::computation(
            format!("audit task failed: {err}"),
            None,
        )),
        Err(_) => Err(AuditError::computation(
            format!("audit timed out after {}s", timeout.as_secs()),
            None,
        )),
    }
}

async fn run_worker() -> Result<(), CliError> {
    init_logging(LogSink::Stderr)?;

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;

    let result = worker::respond(&input, &AuditEngine::default());
    if let Err(err) = &result {
        tracing::warn!(event = "worker_failed", kind = err.kind().as_str(), error = %err);
    }
    let response = worker::encode_response(&result)?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(response.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let schema = match args.kind {
        SchemaKind::Request => request_json_schema(),
        SchemaKind::Report => report_json_schema(),
    };
    match args.out {
        Some(path) => write_json_atomic(&path, &schema)?,
        None => println!("{}", serde_json::to_string_pretty(&schema)?),
    }
    Ok(())
}
