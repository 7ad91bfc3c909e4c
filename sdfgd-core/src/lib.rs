//! # sdfgd-core
//!
//! Graph model and element addressing for the sdfgd daemon.
//!
//! The editor and the daemon exchange whole graphs as JSON on every request,
//! so no object identity survives a round trip. This crate provides the
//! pieces that make positional identity work:
//!
//! - **[`Sdfg`]**: a nested graph-of-graphs flattened into an arena of
//!   [`Subgraph`]s, decoded from and encoded back to the editor's JSON form
//! - **[`Address`]**: the `graph/state/node/edge` path naming one element
//! - **[`ElementRef`]**: the closed set of addressable element kinds
//! - **[`Resolved`]**: an element together with its container
//! - **[`OperationError`]**: the `{"error": {message, details}}` envelope
//!
//! ## Example
//!
//! ```ignore
//! use sdfgd_core::{Address, Sdfg};
//!
//! let sdfg = Sdfg::from_json_str(&payload)?;
//! let resolved = sdfg.resolve_str("0/2/5/-1")?;
//! assert_eq!(sdfg.address_of(&resolved.element).to_string(), "0/2/5/-1");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![recursion_limit = "256"]

pub mod address;
pub mod envelope;
pub mod error;
pub mod graph;

pub use address::{Address, ElementRef, Resolved, SEPARATOR};
pub use envelope::{
    into_envelope, load_sdfg, load_sdfg_lenient, OperationError, Outcome, INVALID_SDFG,
    PARSE_FAILED,
};
pub use error::{CoreError, CoreResult, ErrorDetails};
pub use graph::{Edge, Fields, GraphId, Node, NodeLocation, Sdfg, State, Subgraph};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        into_envelope, load_sdfg, Address, CoreError, CoreResult, ElementRef, ErrorDetails,
        GraphId, NodeLocation, OperationError, Outcome, Resolved, Sdfg,
    };
}
