//! Route traces captured when a target stops answering.
//!
//! The trace is produced by an external `mtr` run and written to one file per
//! incident.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;
use tokio::process::Command;

use crate::monitor::Target;

/// Trace capture and persistence errors. Never fatal.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit { program: String, status: ExitStatus },
    #[error("cannot create trace dir {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write trace file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Output of one trace run.
///
/// On failure `output` already carries an explanatory prefix followed by
/// whatever the tool printed before it failed.
#[derive(Debug)]
pub struct TraceReport {
    pub output: String,
    pub error: Option<TraceError>,
}

/// Produces a route trace towards an address.
#[async_trait]
pub trait Tracer: Send + Sync {
    async fn capture(&self, address: &str) -> TraceReport;
}

/// Runs `mtr` in report mode: wide, AS lookup, 10 cycles.
///
/// Stdout and stderr are captured on separate pipes. The report holds all of
/// stdout followed by all of stderr, not their interleaving in time.
#[derive(Debug, Clone)]
pub struct MtrTracer {
    program: String,
    args: Vec<String>,
}

impl Default for MtrTracer {
    fn default() -> Self {
        Self::with_command("mtr", &["-rwbzc", "10"])
    }
}

impl MtrTracer {
    /// Use another program; the address is appended as the last argument.
    pub fn with_command(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Tracer for MtrTracer {
    async fn capture(&self, address: &str) -> TraceReport {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(address)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(source) => {
                return failed_report(
                    TraceError::Spawn {
                        program: self.program.clone(),
                        source,
                    },
                    "",
                )
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return failed_report(
                TraceError::Exit {
                    program: self.program.clone(),
                    status: output.status,
                },
                &text,
            );
        }

        TraceReport {
            output: text,
            error: None,
        }
    }
}

fn failed_report(error: TraceError, partial: &str) -> TraceReport {
    TraceReport {
        output: format!("mtr error: {}\n\n{}", error, partial),
        error: Some(error),
    }
}

/// `mtr/` next to the running executable, or relative to the working
/// directory if the executable path is unknown.
pub fn default_trace_dir() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("mtr"))
            .unwrap_or_else(|| PathBuf::from("mtr")),
        Err(e) => {
            tracing::warn!("cannot determine executable path for mtr dir: {}", e);
            PathBuf::from("mtr")
        }
    }
}

/// File name for an incident: `<timestamp>_<name>_<family>_<port>.txt`.
pub fn trace_file_name(at: &DateTime<Tz>, target: &Target) -> String {
    static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE_CHARS.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid regex"));

    let name = target.name.as_deref().unwrap_or("target");
    format!(
        "{}_{}_{}_{}.txt",
        at.format("%Y-%m-%d_%H-%M-%S"),
        re.replace_all(name, "_"),
        target.family,
        target.port
    )
}

/// Write a trace to `dir`, creating the directory if needed.
pub async fn persist(
    dir: &Path,
    output: &str,
    at: &DateTime<Tz>,
    target: &Target,
) -> Result<PathBuf, TraceError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| TraceError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

    let path = dir.join(trace_file_name(at, target));
    tokio::fs::write(&path, output)
        .await
        .map_err(|source| TraceError::Write {
            path: path.clone(),
            source,
        })?;

    Ok(path)
}
