//! Compiling a graph stored on disk.

use crate::{fail, Operations};
use flate2::read::GzDecoder;
use sdfgd_core::{CoreError, CoreResult, Fields, Outcome, Sdfg};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;

const LOAD_FAILED: &str = "Failed to load the provided SDFG file path";
const COMPILE_FAILED: &str = "Failed to compile the SDFG";
const NO_INSTRUMENTATION: &str = "No_Instrumentation";

/// Request to compile a graph file.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileRequest {
    /// Path of the serialized graph.
    pub path: PathBuf,
    /// Turn off all instrumentation before compiling.
    #[serde(default)]
    pub suppress_instrumentation: bool,
}

/// The produced shared library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResponse {
    /// Library path.
    pub filename: String,
}

/// Set every graph, state and node, nested graphs included, to
/// `No_Instrumentation`.
pub fn strip_instrumentation(sdfg: &mut Sdfg) {
    for graph in sdfg.graphs_mut() {
        set_instrument(graph.attributes_mut());
        for state in &mut graph.states {
            set_instrument(state.attributes_mut());
            for node in &mut state.nodes {
                set_instrument(node.attributes_mut());
            }
        }
    }
}

/// Decode a graph file, plain JSON or gzip-compressed (`.sdfgz`).
pub fn decode_graph_file(bytes: &[u8]) -> CoreResult<Sdfg> {
    let plain = bytes
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .map_or(true, |&b| b == b'{');
    if plain {
        return Sdfg::from_value(serde_json::from_slice(bytes)?);
    }

    let mut text = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut text)?;
    Sdfg::from_value(serde_json::from_slice(&text)?)
}

fn set_instrument(attributes: &mut Fields) {
    attributes.insert(
        "instrument".to_string(),
        Value::String(NO_INSTRUMENTATION.to_string()),
    );
}

impl Operations {
    /// Load a graph file, optionally strip instrumentation, and compile it.
    pub async fn compile_from_file(&self, request: CompileRequest) -> Outcome<CompileResponse> {
        let bytes = tokio::fs::read(&request.path)
            .await
            .map_err(CoreError::from)
            .map_err(fail(LOAD_FAILED))?;
        let mut sdfg = decode_graph_file(&bytes).map_err(fail(LOAD_FAILED))?;

        if request.suppress_instrumentation {
            strip_instrumentation(&mut sdfg);
        }

        tracing::info!(path = %request.path.display(), "Compiling SDFG");
        let result = self
            .toolkit
            .compile(&sdfg.to_value(), self.options)
            .await
            .map_err(fail(COMPILE_FAILED))?;
        Ok(CompileResponse {
            filename: result.filename,
        })
    }
}
