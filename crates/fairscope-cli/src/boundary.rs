use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use fairscope_core::{AuditError, AuditRequest, BiasReport, ErrorMarker, Result};

/// Runs audits in a child `fairscope worker` process with a bounded timeout.
#[derive(Debug, Clone)]
pub struct WorkerBoundary {
    program: PathBuf,
    timeout: Duration,
}

impl WorkerBoundary {
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    /// Boundary around the currently running executable.
    pub fn current(timeout: Duration) -> Result<Self> {
        let program = std::env::current_exe().map_err(|err| {
            AuditError::computation(format!("cannot locate worker executable: {err}"), None)
        })?;
        Ok(Self::new(program, timeout))
    }

    /// Send `request` to a worker and read back the report. Every failure
    /// (spawn, timeout, non-zero exit, malformed output, reported error)
    /// surfaces as a computation error.
    pub async fn run(&self, request: &AuditRequest) -> Result<BiasReport> {
        let payload = serde_json::to_vec(request)?;
        let timeout = self.timeout;

        let result = tokio::time::timeout(timeout, async {
            let mut child = Command::new(&self.program)
                .arg("worker")
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|err| {
                    AuditError::computation(format!("failed to spawn worker: {err}"), None)
                })?;

            if let Some(mut stdin) = child.stdin.take() {
                // A worker that dies early closes the pipe; its exit status
                // carries the real failure.
                if let Err(err) = stdin.write_all(&payload).await {
                    tracing::warn!(event = "worker_stdin_failed", error = %err);
                }
                drop(stdin);
            }

            child.wait_with_output().await.map_err(|err| {
                AuditError::computation(format!("failed to collect worker output: {err}"), None)
            })
        })
        .await;

        let output = match result {
            Ok(output) => output?,
            Err(_) => {
                return Err(AuditError::computation(
                    format!("worker timed out after {}s", timeout.as_secs()),
                    None,
                ));
            }
        };

        interpret_worker_output(output.status.code(), &output.stdout, &output.stderr)
    }
}

/// Classify a finished worker's output.
pub fn interpret_worker_output(
    code: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<BiasReport> {
    let diagnostics = || diagnostics(code, stdout, stderr);

    if code != Some(0) {
        let status = code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(AuditError::computation(
            format!("worker exited with status {status}"),
            Some(diagnostics()),
        ));
    }

    let value: serde_json::Value = serde_json::from_slice(stdout).map_err(|err| {
        AuditError::computation(format!("malformed worker output: {err}"), Some(diagnostics()))
    })?;

    if let Some(error) = value.get("error") {
        let message = match serde_json::from_value::<ErrorMarker>(error.clone()) {
            Ok(marker) => format!("worker reported {} error: {}", marker.kind, marker.message),
            Err(_) => format!("worker reported error: {error}"),
        };
        return Err(AuditError::computation(message, Some(diagnostics())));
    }

    serde_json::from_value(value).map_err(|err| {
        AuditError::computation(
            format!("worker output is not a bias report: {err}"),
            Some(diagnostics()),
        )
    })
}

fn diagnostics(code: Option<i32>, stdout: &[u8], stderr: &[u8]) -> String {
    let code = code
        .map(|code| code.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "exit code: {code}\n--- stderr ---\n{}\n--- stdout ---\n{}",
        String::from_utf8_lossy(stderr).trim_end(),
        String::from_utf8_lossy(stdout).trim_end()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairscope_core::ErrorKind;

    fn report_json() -> String {
        serde_json::json!({
            "original": {
                "Gender": {
                    "statistical_parity_difference": 0.0,
                    "disparate_impact": 1.0,
                    "privileged": {"group": "Male", "size": 1, "favorable": 1, "favorable_rate": 1.0},
                    "unprivileged": {"group": "Female", "size": 1, "favorable": 1, "favorable_rate": 1.0}
                },
                "outcome_rates": {},
                "raw_data": {}
            },
            "reweighed": null,
            "datasetType": "modelOutcome"
        })
        .to_string()
    }

    #[test]
    fn successful_output_parses_into_report() {
        let report = interpret_worker_output(Some(0), report_json().as_bytes(), b"")
            .expect("report");
        assert!(report.reweighed.is_none());
        assert!(report.original.attributes.contains_key("Gender"));
    }

    #[test]
    fn error_payload_maps_to_computation_error() {
        let stdout = br#"{"error":{"kind":"schema","message":"dataset has zero data rows"}}"#;
        let err = interpret_worker_output(Some(0), stdout, b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
        assert!(err.to_string().contains("dataset has zero data rows"));
    }

    #[test]
    fn non_zero_exit_keeps_diagnostics() {
        let err = interpret_worker_output(Some(101), b"", b"thread 'main' panicked").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
        let diagnostics = err.diagnostics().expect("diagnostics");
        assert!(diagnostics.contains("exit code: 101"));
        assert!(diagnostics.contains("panicked"));
    }

    #[test]
    fn malformed_output_is_a_computation_error() {
        let err = interpret_worker_output(Some(0), b"{\"original\": ", b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
        let err = interpret_worker_output(Some(0), b"[]", b"").unwrap_err();
        assert!(err.to_string().contains("not a bias report"));
    }

    #[tokio::test]
    async fn missing_executable_is_a_computation_error() {
        let boundary = WorkerBoundary::new(
            PathBuf::from("/nonexistent/fairscope-worker"),
            Duration::from_secs(5),
        );
        let request = AuditRequest {
            rows: Vec::new(),
            options: fairscope_core::AuditOptions::new(
                "Outcome",
                &["Gender"],
                fairscope_core::DatasetType::Training,
            ),
        };
        let err = boundary.run(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
    }
}
