//! The seam to the external compiler toolkit.

use crate::error::ToolkitResult;
use crate::types::{
    AnalysisMap, AnalysisRequest, CompileResult, NodeLocator, PatternMatches, SerializeOptions,
    SubgraphSelection,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Everything the daemon asks of the toolkit.
///
/// Graph rewriting, symbolic analysis and code generation live behind this
/// trait. Graphs cross it in their editor JSON form; every graph-producing
/// call serializes its result according to the given [`SerializeOptions`].
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Toolkit: Send + Sync {
    /// Every pattern transformation applicable anywhere in the graph.
    async fn pattern_matches(
        &self,
        sdfg: &Value,
        permissive: bool,
        options: SerializeOptions,
    ) -> ToolkitResult<PatternMatches>;

    /// Subgraph transformations applicable to a selection.
    async fn subgraph_transformations(
        &self,
        sdfg: &Value,
        selection: &SubgraphSelection,
        options: SerializeOptions,
    ) -> ToolkitResult<PatternMatches>;

    /// Apply one serialized transformation and return the rewritten graph.
    async fn apply_transformation(
        &self,
        sdfg: &Value,
        transformation: &Value,
        options: SerializeOptions,
    ) -> ToolkitResult<Value>;

    /// Expand one library node, or all of them when `node` is `None`.
    async fn expand_library_nodes(
        &self,
        sdfg: &Value,
        node: Option<NodeLocator>,
        options: SerializeOptions,
    ) -> ToolkitResult<Value>;

    /// Replace symbols with constant values.
    async fn specialize(
        &self,
        sdfg: &Value,
        symbols: &Map<String, Value>,
        options: SerializeOptions,
    ) -> ToolkitResult<Value>;

    /// Run a static analysis. Keys of the result are element addresses.
    async fn analyze(&self, request: &AnalysisRequest) -> ToolkitResult<AnalysisMap>;

    /// Metadata for every serializable property type.
    async fn property_metadata(&self) -> ToolkitResult<Value>;

    /// Compile a graph and return the produced library.
    async fn compile(&self, sdfg: &Value, options: SerializeOptions) -> ToolkitResult<CompileResult>;

    /// Import user transformation modules so later calls can match them.
    async fn load_custom_transformations(&self, paths: &[PathBuf]) -> ToolkitResult<()>;
}
