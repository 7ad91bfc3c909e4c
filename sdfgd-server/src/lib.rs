//! # sdfgd-server
//!
//! HTTP front end of the sdfgd daemon.
//!
//! One route per editor operation. Request bodies are JSON; every answer is
//! the operation envelope with status 200, including failures and bodies
//! that do not decode.
//!
//! ## Example
//!
//! ```ignore
//! use sdfgd_server::{serve, DaemonConfig};
//!
//! let config = DaemonConfig::new().with_port(5000);
//! serve(Arc::new(ops), config.socket_addr(), shutdown).await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod server;

pub use config::{DaemonConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use server::{router, serve, ServerError, INVALID_REQUEST, LIVENESS};
