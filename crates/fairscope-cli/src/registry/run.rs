use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use fairscope_core::{AuditOptions, BiasReport, REPORT_VERSION, SeverityThresholds};

use super::RegistryResult;
use super::staged::{write_json_atomic, write_text_atomic};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub input: PathBuf,
    pub config_path: PathBuf,
    pub isolate: bool,
    pub strict: bool,
    pub timeout_secs: u64,
    pub run_dir: PathBuf,
    pub options: AuditOptions,
    pub thresholds: SeverityThresholds,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub report_version: String,
    pub input: String,
    pub config_path: String,
    pub isolate: bool,
    pub strict: bool,
    pub timeout_secs: u64,
    pub options: AuditOptions,
    pub thresholds: SeverityThresholds,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub report_path: PathBuf,
    pub markdown_path: PathBuf,
    pub reweighed_path: PathBuf,
    pub logs_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        report_version: REPORT_VERSION.to_string(),
        input: ctx.input.display().to_string(),
        config_path: ctx.config_path.display().to_string(),
        isolate: ctx.isolate,
        strict: ctx.strict,
        timeout_secs: ctx.timeout_secs,
        options: ctx.options.clone(),
        thresholds: ctx.thresholds.clone(),
        git: collect_git_info(),
    };
    write_json_atomic(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new().create(true).append(true).open(&logs_path)?;

    Ok(RunPaths {
        report_path: root.join("report.json"),
        markdown_path: root.join("report.md"),
        reweighed_path: root.join("reweighed.csv"),
        logs_path,
        root,
    })
}

/// Write `report.json` into the run directory and, when requested, to `out`.
pub fn write_report(
    paths: &RunPaths,
    report: &BiasReport,
    out_path: Option<&Path>,
) -> RegistryResult<()> {
    write_json_atomic(&paths.report_path, report)?;
    if let Some(out_path) = out_path {
        write_json_atomic(out_path, report)?;
    }
    Ok(())
}

pub fn write_markdown(paths: &RunPaths, markdown: &str) -> RegistryResult<()> {
    write_text_atomic(&paths.markdown_path, markdown)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairscope_core::DatasetType;

    #[test]
    fn start_run_lays_out_artifacts() {
        let run_dir = std::env::temp_dir().join(format!("fairscope_runs_{}", uuid::Uuid::new_v4()));
        let ctx = RunContext {
            run_id: "abc".to_string(),
            started_at: Utc::now(),
            input: PathBuf::from("loans.csv"),
            config_path: PathBuf::from("fairscope.toml"),
            isolate: false,
            strict: true,
            timeout_secs: 30,
            run_dir: run_dir.clone(),
            options: AuditOptions::new("Outcome", &["Gender"], DatasetType::Training),
            thresholds: SeverityThresholds::default(),
        };

        let paths = start_run(&ctx).expect("start run");
        assert!(paths.root.starts_with(&run_dir));
        assert!(paths.root.to_string_lossy().ends_with("__run_abc"));
        assert!(paths.logs_path.exists());

        let config: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(paths.root.join("config.json")).expect("config"),
        )
        .expect("json");
        assert_eq!(config["run_id"], "abc");
        assert_eq!(config["options"]["outcomeColumn"], "Outcome");
        assert_eq!(config["strict"], true);

        let _ = std::fs::remove_dir_all(&run_dir);
    }
}
