//! # sdfgd - Editor Daemon for Stateful Dataflow Multigraphs
//!
//! sdfgd sits between a graphical SDFG editor and the compiler toolkit. The
//! editor posts whole serialized graphs; the daemon decodes them, performs
//! the requested operation and answers with either a result object or an
//! `{"error": {"message", "details"}}` envelope.
//!
//! ## Quick Start
//!
//! ```ignore
//! use sdfgd::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DaemonConfig::new().with_port(5000);
//!     let client = config.toolkit_builder().build().await?;
//!     client.initialize().await?;
//!
//!     let ops = Operations::new(Arc::new(client)).with_options(config.serialize_options());
//!     serve(Arc::new(ops), config.socket_addr(), async {}).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`sdfgd_core`] - graph arena, element addressing, error envelope
//! - [`sdfgd_toolkit`] - process boundary to the compiler toolkit
//! - [`sdfgd_ops`] - every editor operation
//! - [`sdfgd_server`] - HTTP routes and daemon configuration
//!
//! ## Addressing
//!
//! Elements are named by `graph/state/node/edge` paths such as `"1/0/3/-1"`,
//! where `-1` marks an unset level. Addresses are positional and only valid
//! against the graph they were computed from.

#![warn(missing_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Graph arena, addressing and errors.
pub use sdfgd_core as core;

/// Toolkit process boundary.
pub use sdfgd_toolkit as toolkit;

/// Editor operations.
pub use sdfgd_ops as ops;

/// HTTP front end.
pub use sdfgd_server as server;

// ============================================================================
// Flat Re-exports
// ============================================================================

pub use sdfgd_core::{
    into_envelope, Address, CoreError, ElementRef, OperationError, Outcome, Resolved, Sdfg,
};
pub use sdfgd_ops::Operations;
pub use sdfgd_server::{router, serve, DaemonConfig, ServerError};
pub use sdfgd_toolkit::{SerializeOptions, Toolkit, ToolkitClient, ToolkitError};

/// Prelude for common imports.
pub mod prelude {
    pub use sdfgd_core::prelude::*;
    pub use sdfgd_ops::{Operations, SdfgResponse};
    pub use sdfgd_server::{router, serve, DaemonConfig, ServerError};
    pub use sdfgd_toolkit::{SerializeOptions, Toolkit, ToolkitClient, ToolkitError};
    pub use std::sync::Arc;
}
