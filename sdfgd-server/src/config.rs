//! Daemon configuration.

use sdfgd_toolkit::{SerializeOptions, ToolkitClientBuilder, DEFAULT_WORKER, DEFAULT_WORKER_ARGS};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port the editor expects the daemon on.
pub const DEFAULT_PORT: u16 = 5000;

/// Address the daemon binds to by default. Only local editors connect.
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Everything needed to start the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Listen port.
    pub port: u16,
    /// Toolkit worker executable.
    pub worker: String,
    /// Toolkit worker arguments.
    pub worker_args: Vec<String>,
    /// Extra environment for the worker.
    pub worker_env: HashMap<String, String>,
    /// Keep serialization metadata in returned graphs.
    pub store_metadata: bool,
    /// Per-request toolkit timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            worker: DEFAULT_WORKER.to_string(),
            worker_args: DEFAULT_WORKER_ARGS.iter().map(|s| s.to_string()).collect(),
            worker_env: HashMap::new(),
            store_metadata: false,
            timeout: None,
        }
    }
}

impl DaemonConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the bind address.
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Set the worker command and its arguments.
    pub fn with_worker<I, S>(mut self, command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.worker = command.into();
        self.worker_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable for the worker.
    pub fn with_worker_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.worker_env.insert(key.into(), value.into());
        self
    }

    /// Keep serialization metadata in returned graphs.
    pub fn with_store_metadata(mut self, store: bool) -> Self {
        self.store_metadata = store;
        self
    }

    /// Set the per-request toolkit timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Socket address to listen on.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Serialization settings for toolkit calls.
    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            store_metadata: self.store_metadata,
        }
    }

    /// Builder for the toolkit client this configuration describes.
    pub fn toolkit_builder(&self) -> ToolkitClientBuilder {
        let mut builder = ToolkitClientBuilder::new()
            .command(&self.worker)
            .args(&self.worker_args);
        for (key, value) in &self.worker_env {
            builder = builder.env(key, value);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::new();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:5000");
        assert_eq!(config.worker, "python");
        assert_eq!(config.worker_args, vec!["-m", "dace_worker"]);
        assert!(!config.serialize_options().store_metadata);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_builder_chain() {
        let config = DaemonConfig::new()
            .with_port(5555)
            .with_host(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .with_worker("/opt/venv/bin/python", ["-m", "custom_worker"])
            .with_worker_env("DACE_compiler_cpu_executable", "clang++")
            .with_store_metadata(true)
            .with_timeout(Duration::from_secs(30));

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:5555");
        assert_eq!(config.worker_args, vec!["-m", "custom_worker"]);
        assert_eq!(
            config.worker_env.get("DACE_compiler_cpu_executable").map(String::as_str),
            Some("clang++")
        );
        assert!(config.serialize_options().store_metadata);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }
}
