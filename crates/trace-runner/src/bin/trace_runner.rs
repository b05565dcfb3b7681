use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use jam_stf_core::accumulate::NoopPvm;
use jam_stf_core::config::ProtocolConfig;
use jam_stf_core::crypto::MockBandersnatch;
use jam_stf_trace_runner::env::LOG_FORMAT;
use jam_stf_trace_runner::tracing::{setup_logger, LogFormat, LoggingConfig};
use jam_stf_trace_runner::Trace;
use jam_stf_pvm::Interpreter13;

/// Replays one or more conformance traces against the importer and exits non-zero if any
/// trace's post-state/root does not match.
#[derive(Parser, Debug)]
struct Cli {
    /// Path to a trace JSON file, or a directory of `*.json` trace files.
    path: PathBuf,

    /// Use the full-size protocol configuration instead of the tiny one
    /// conformance vectors commonly use.
    #[arg(long)]
    full_config: bool,

    /// Use the real PVM sandbox instead of the no-op stub for accumulation.
    #[arg(long)]
    real_pvm: bool,
}

fn trace_paths(root: &PathBuf) -> std::io::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.clone()]);
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = LOG_FORMAT.default("plain".to_string()).value.parse().unwrap_or(LogFormat::Plain);
    setup_logger(LoggingConfig::default().use_format(format));

    let config = if cli.full_config { ProtocolConfig::full() } else { ProtocolConfig::tiny() };
    let vrf = MockBandersnatch;
    let noop = NoopPvm;
    let real = Interpreter13;

    let paths = match trace_paths(&cli.path) {
        Ok(paths) => paths,
        Err(err) => {
            tracing::error!(path = %cli.path.display(), %err, "failed to list trace files");
            return ExitCode::FAILURE;
        }
    };

    if paths.is_empty() {
        tracing::warn!(path = %cli.path.display(), "no trace files found");
        return ExitCode::SUCCESS;
    }

    let mut failures = 0usize;
    for path in &paths {
        let outcome = std::fs::read_to_string(path)
            .map_err(anyhow_err)
            .and_then(|contents| serde_json::from_str::<Trace>(&contents).map_err(anyhow_err))
            .and_then(|trace| {
                if cli.real_pvm {
                    jam_stf_trace_runner::run(&trace, &config, &vrf, &real).map_err(anyhow_err)
                } else {
                    jam_stf_trace_runner::run(&trace, &config, &vrf, &noop).map_err(anyhow_err)
                }
            });

        match outcome {
            Ok(()) => tracing::info!(path = %path.display(), "trace passed"),
            Err(err) => {
                failures += 1;
                tracing::error!(path = %path.display(), %err, "trace failed");
            }
        }
    }

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn anyhow_err<E: std::fmt::Display>(err: E) -> String {
    err.to_string()
}
