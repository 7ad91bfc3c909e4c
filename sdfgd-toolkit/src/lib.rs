//! # sdfgd-toolkit
//!
//! The process boundary between the daemon and the external compiler
//! toolkit.
//!
//! Pattern matching, symbolic analysis and code generation are owned by the
//! toolkit. The daemon reaches them through the [`Toolkit`] trait, which the
//! [`ToolkitClient`] implements by speaking line-delimited JSON-RPC 2.0 to a
//! worker process.
//!
//! ## Core Concepts
//!
//! - **[`Toolkit`]**: everything the daemon asks of the toolkit
//! - **[`ToolkitClient`]**: JSON-RPC implementation over a transport
//! - **[`ToolkitTransport`]**: transport abstraction (stdio, in-memory)
//! - **[`SerializeOptions`]**: per-call serialization settings
//!
//! ## Feature Flags
//!
//! - `mock`: expose `MockToolkit` for tests in downstream crates
//!
//! ## Example
//!
//! ```ignore
//! use sdfgd_toolkit::{SerializeOptions, Toolkit, ToolkitClient};
//!
//! let client = ToolkitClient::builder()
//!     .command("python")
//!     .args(["-m", "dace_worker"])
//!     .build()
//!     .await?;
//! client.initialize().await?;
//!
//! let rewritten = client
//!     .apply_transformation(&sdfg, &transformation, SerializeOptions::default())
//!     .await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod toolkit;
pub mod transport;
pub mod types;

pub use client::{ToolkitClient, ToolkitClientBuilder, DEFAULT_WORKER, DEFAULT_WORKER_ARGS};
pub use error::{ToolkitError, ToolkitResult};
#[cfg(any(test, feature = "mock"))]
pub use toolkit::MockToolkit;
pub use toolkit::Toolkit;
pub use transport::{MemoryTransport, StdioTransport, ToolkitTransport};
pub use types::{
    AnalysisKind, AnalysisMap, AnalysisRequest, CacheParams, CompileResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, NodeLocator, PatternMatches, RequestId,
    SerializeOptions, SubgraphSelection, ToolkitInfo,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        AnalysisKind, AnalysisRequest, SerializeOptions, Toolkit, ToolkitClient, ToolkitError,
        ToolkitResult,
    };
}
