//! sdfgd daemon
//!
//! Serves the editor operations over HTTP, backed by a toolkit worker
//! process.

use anyhow::Context;
use clap::Parser;
use sdfgd_core::into_envelope;
use sdfgd_ops::{Operations, TransformationsRequest};
use sdfgd_server::{serve, DaemonConfig, DEFAULT_PORT};
use serde_json::Value;
use std::io::Read;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sdfgd")]
#[command(about = "Editor daemon for stateful dataflow multigraphs", long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "SDFGD_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to
    #[arg(long, env = "SDFGD_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Toolkit worker executable
    #[arg(long, env = "SDFGD_WORKER")]
    worker: Option<String>,

    /// Argument passed to the worker (repeatable)
    #[arg(
        long = "worker-arg",
        env = "SDFGD_WORKER_ARGS",
        value_delimiter = ' ',
        allow_hyphen_values = true
    )]
    worker_args: Vec<String>,

    /// Keep serialization metadata in returned graphs
    #[arg(long, env = "SDFGD_STORE_METADATA")]
    store_metadata: bool,

    /// Per-request toolkit timeout in seconds
    #[arg(long, env = "SDFGD_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Print the transformations applicable to an SDFG (read from FILE or
    /// stdin) and exit
    #[arg(long, value_name = "FILE", num_args = 0..=1)]
    transformations: Option<Option<PathBuf>>,
}

impl Cli {
    fn config(&self) -> DaemonConfig {
        let mut config = DaemonConfig::new()
            .with_port(self.port)
            .with_host(self.host)
            .with_store_metadata(self.store_metadata);
        if let Some(worker) = &self.worker {
            config = config.with_worker(worker, self.worker_args.iter().cloned());
        } else if !self.worker_args.is_empty() {
            let worker = config.worker.clone();
            config = config.with_worker(worker, self.worker_args.iter().cloned());
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let one_shot = cli.transformations.is_some();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if one_shot {
        // stdout carries the listing.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = cli.config();
    let client = Arc::new(
        config
            .toolkit_builder()
            .build()
            .await
            .with_context(|| format!("Failed to start toolkit worker '{}'", config.worker))?,
    );
    client
        .initialize()
        .await
        .context("Toolkit worker handshake failed")?;

    let ops = Arc::new(Operations::new(client.clone()).with_options(config.serialize_options()));

    let result = match cli.transformations {
        Some(source) => list_transformations(&ops, source).await,
        None => serve(ops, config.socket_addr(), shutdown_signal())
            .await
            .context("Daemon failed"),
    };

    if let Err(e) = client.close().await {
        tracing::debug!(error = %e, "Toolkit worker did not shut down cleanly");
    }
    result
}

async fn list_transformations(ops: &Operations, source: Option<PathBuf>) -> anyhow::Result<()> {
    let text = match source {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            text
        }
    };

    let request = TransformationsRequest {
        sdfg: Value::String(text),
        selected_elements: Vec::new(),
        permissive: false,
    };
    let envelope = into_envelope(ops.transformations(request).await);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// The CLI with every `SDFGD_*` fallback switched off, so results do
    /// not depend on the test process environment.
    fn command_without_env() -> clap::Command {
        Cli::command().mut_args(|arg| arg.env(Option::<&str>::None))
    }

    fn parse(args: &[&str]) -> Cli {
        let matches = command_without_env()
            .try_get_matches_from(std::iter::once("sdfgd").chain(args.iter().copied()))
            .unwrap();
        Cli::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn test_parse_ignores_environment() {
        assert!(Cli::command()
            .get_arguments()
            .any(|arg| arg.get_env().is_some()));
        assert!(command_without_env()
            .get_arguments()
            .all(|arg| arg.get_env().is_none()));
    }

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).config();
        assert_eq!(config, DaemonConfig::new());
    }

    #[test]
    fn test_port_and_worker() {
        let config = parse(&[
            "--port",
            "5555",
            "--worker",
            "/opt/venv/bin/python",
            "--worker-arg",
            "-m",
            "--worker-arg",
            "custom_worker",
            "--timeout-secs",
            "30",
        ])
        .config();
        assert_eq!(config.port, 5555);
        assert_eq!(config.worker, "/opt/venv/bin/python");
        assert_eq!(config.worker_args, vec!["-m", "custom_worker"]);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_worker_args_without_worker_keep_default_command() {
        let config = parse(&["--worker-arg=-m", "--worker-arg=other_worker"]).config();
        assert_eq!(config.worker, "python");
        assert_eq!(config.worker_args, vec!["-m", "other_worker"]);
    }

    #[rstest]
    #[case(&[], None)]
    #[case(&["--transformations"], Some(None))]
    #[case(&["--transformations", "program.sdfg"], Some(Some(PathBuf::from("program.sdfg"))))]
    fn test_transformations_flag(
        #[case] args: &[&str],
        #[case] expected: Option<Option<PathBuf>>,
    ) {
        assert_eq!(parse(args).transformations, expected);
    }

    #[test]
    fn test_invalid_port() {
        assert!(Cli::try_parse_from(["sdfgd", "--port", "not-a-port"]).is_err());
    }
}
