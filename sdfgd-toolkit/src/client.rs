//! JSON-RPC client for the toolkit worker.

use crate::error::{ToolkitError, ToolkitResult};
use crate::toolkit::Toolkit;
use crate::transport::{StdioTransport, ToolkitTransport};
use crate::types::{
    methods, AnalysisMap, AnalysisRequest, CompileResult, GraphParams, GraphResult,
    InitializeParams, JsonRpcNotification, JsonRpcRequest, LoadParams, NodeLocator,
    PatternMatches, RequestId, SerializeOptions, SubgraphSelection, ToolkitInfo,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default worker program.
pub const DEFAULT_WORKER: &str = "python";

/// Default worker arguments.
pub const DEFAULT_WORKER_ARGS: [&str; 2] = ["-m", "dace_worker"];

/// Client for a toolkit worker.
///
/// # Example
///
/// ```ignore
/// use sdfgd_toolkit::{Toolkit, ToolkitClient, SerializeOptions};
///
/// let client = ToolkitClient::builder().build().await?;
/// client.initialize().await?;
///
/// let matches = client
///     .pattern_matches(&sdfg, false, SerializeOptions::default())
///     .await?;
/// ```
pub struct ToolkitClient {
    transport: Arc<dyn ToolkitTransport>,
    request_id: AtomicI64,
    timeout: Option<Duration>,
    info: Mutex<Option<ToolkitInfo>>,
}

impl ToolkitClient {
    /// Create a new client with a transport.
    pub fn new(transport: impl ToolkitTransport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            request_id: AtomicI64::new(1),
            timeout: None,
            info: Mutex::new(None),
        }
    }

    /// Create a builder.
    pub fn builder() -> ToolkitClientBuilder {
        ToolkitClientBuilder::new()
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Handshake with the worker.
    pub async fn initialize(&self) -> ToolkitResult<ToolkitInfo> {
        let params = InitializeParams {
            client: "sdfgd".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let info: ToolkitInfo = self.call(methods::INITIALIZE, params).await?;
        tracing::info!(
            toolkit = %info.name,
            version = %info.version,
            capabilities = ?info.capabilities,
            "Connected to toolkit worker"
        );
        *self.info.lock() = Some(info.clone());
        Ok(info)
    }

    /// Worker identification, once initialized.
    pub fn info(&self) -> Option<ToolkitInfo> {
        self.info.lock().clone()
    }

    /// Ask the worker to exit and close the transport.
    pub async fn close(&self) -> ToolkitResult<()> {
        if self.transport.is_connected() {
            let notification = JsonRpcNotification::new(methods::SHUTDOWN);
            if let Err(e) = self.transport.notify(&notification).await {
                tracing::debug!(error = %e, "Shutdown notification failed");
            }
        }
        self.transport.close().await
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn next_id(&self) -> RequestId {
        RequestId::Number(self.request_id.fetch_add(1, Ordering::SeqCst))
    }

    fn require(&self, capability: Option<&str>, what: &str) -> ToolkitResult<()> {
        let (Some(capability), Some(info)) = (capability, self.info.lock().clone()) else {
            return Ok(());
        };
        if info.supports(capability) {
            Ok(())
        } else {
            Err(ToolkitError::Unsupported(what.to_string()))
        }
    }

    async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> ToolkitResult<R> {
        let request = JsonRpcRequest::new(self.next_id(), method).with_params(params)?;
        tracing::debug!(method, id = ?request.id, "Toolkit request");

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.request(&request))
                .await
                .map_err(|_| ToolkitError::Timeout)??,
            None => self.transport.request(&request).await?,
        };

        if let Some(error) = response.error {
            return Err(error.into());
        }

        let result = response.result.ok_or(ToolkitError::NoResult)?;
        serde_json::from_value(result).map_err(ToolkitError::from)
    }

    async fn call_graph<T: Serialize>(
        &self,
        method: &str,
        sdfg: &Value,
        options: SerializeOptions,
        extra: T,
    ) -> ToolkitResult<Value> {
        let params = GraphParams {
            sdfg,
            options,
            extra,
        };
        let result: GraphResult = self.call(method, params).await?;
        Ok(result.sdfg)
    }
}

#[async_trait]
impl Toolkit for ToolkitClient {
    async fn pattern_matches(
        &self,
        sdfg: &Value,
        permissive: bool,
        options: SerializeOptions,
    ) -> ToolkitResult<PatternMatches> {
        let params = GraphParams {
            sdfg,
            options,
            extra: json!({ "permissive": permissive }),
        };
        self.call(methods::PATTERN_MATCHES, params).await
    }

    async fn subgraph_transformations(
        &self,
        sdfg: &Value,
        selection: &SubgraphSelection,
        options: SerializeOptions,
    ) -> ToolkitResult<PatternMatches> {
        let params = GraphParams {
            sdfg,
            options,
            extra: json!({ "selection": selection }),
        };
        self.call(methods::SUBGRAPH_TRANSFORMATIONS, params).await
    }

    async fn apply_transformation(
        &self,
        sdfg: &Value,
        transformation: &Value,
        options: SerializeOptions,
    ) -> ToolkitResult<Value> {
        self.call_graph(
            methods::APPLY_TRANSFORMATION,
            sdfg,
            options,
            json!({ "transformation": transformation }),
        )
        .await
    }

    async fn expand_library_nodes(
        &self,
        sdfg: &Value,
        node: Option<NodeLocator>,
        options: SerializeOptions,
    ) -> ToolkitResult<Value> {
        self.call_graph(
            methods::EXPAND_LIBRARY_NODES,
            sdfg,
            options,
            json!({ "node": node }),
        )
        .await
    }

    async fn specialize(
        &self,
        sdfg: &Value,
        symbols: &Map<String, Value>,
        options: SerializeOptions,
    ) -> ToolkitResult<Value> {
        self.call_graph(methods::SPECIALIZE, sdfg, options, json!({ "symbols": symbols }))
            .await
    }

    async fn analyze(&self, request: &AnalysisRequest) -> ToolkitResult<AnalysisMap> {
        self.require(request.kind.capability(), request.kind.describe())?;
        self.call(methods::ANALYZE, request).await
    }

    async fn property_metadata(&self) -> ToolkitResult<Value> {
        self.call(methods::PROPERTY_METADATA, Value::Null).await
    }

    async fn compile(&self, sdfg: &Value, options: SerializeOptions) -> ToolkitResult<CompileResult> {
        let params = GraphParams {
            sdfg,
            options,
            extra: Map::new(),
        };
        self.call(methods::COMPILE, params).await
    }

    async fn load_custom_transformations(&self, paths: &[PathBuf]) -> ToolkitResult<()> {
        let _: Value = self
            .call(methods::LOAD_CUSTOM_TRANSFORMATIONS, LoadParams { paths })
            .await?;
        Ok(())
    }
}

/// Builder for stdio toolkit clients.
pub struct ToolkitClientBuilder {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
}

impl Default for ToolkitClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolkitClientBuilder {
    /// Create a builder for the default worker.
    pub fn new() -> Self {
        Self {
            command: DEFAULT_WORKER.to_string(),
            args: DEFAULT_WORKER_ARGS.iter().map(|s| s.to_string()).collect(),
            env: HashMap::new(),
            timeout: None,
        }
    }

    /// Set the worker program. Clears the default arguments.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self.args.clear();
        self
    }

    /// Add a worker argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several worker arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Set an environment variable for the worker.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Bound every request by `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Spawn the worker and build the client.
    pub async fn build(self) -> ToolkitResult<ToolkitClient> {
        let transport = StdioTransport::spawn(&self.command, &self.args, &self.env).await?;
        let client = ToolkitClient::new(transport);
        Ok(match self.timeout {
            Some(timeout) => client.with_timeout(timeout),
            None => client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use crate::types::{AnalysisKind, JsonRpcError, JsonRpcResponse};
    use pretty_assertions::assert_eq;

    fn info(capabilities: &[&str]) -> ToolkitInfo {
        ToolkitInfo {
            name: "dace".into(),
            version: "0.16.1".into(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_initialize_stores_info() {
        let transport = MemoryTransport::new();
        transport.push_response(JsonRpcResponse::success(1, info(&["work_depth"])));

        let client = ToolkitClient::new(transport.clone());
        assert!(client.info().is_none());
        let result = client.initialize().await.unwrap();
        assert_eq!(result.name, "dace");
        assert_eq!(client.info(), Some(result));

        let requests = transport.requests();
        assert_eq!(requests[0].method, "initialize");
        assert_eq!(requests[0].params.as_ref().unwrap()["client"], "sdfgd");
    }

    #[tokio::test]
    async fn test_apply_transformation_params() {
        let transport = MemoryTransport::new();
        transport.push_response(JsonRpcResponse::success(1, json!({"sdfg": {"type": "SDFG"}})));

        let client = ToolkitClient::new(transport.clone());
        let sdfg = json!({"type": "SDFG", "nodes": [], "edges": []});
        let xform = json!({"transformation": "MapTiling", "sdfg_id": 0});
        let result = client
            .apply_transformation(&sdfg, &xform, SerializeOptions::default())
            .await
            .unwrap();
        assert_eq!(result, json!({"type": "SDFG"}));

        let params = transport.requests()[0].params.clone().unwrap();
        assert_eq!(
            params,
            json!({
                "sdfg": sdfg,
                "options": {"store_metadata": false},
                "transformation": xform,
            })
        );
    }

    #[tokio::test]
    async fn test_remote_exception_surfaces() {
        let transport = MemoryTransport::new();
        transport.push_response(JsonRpcResponse::error(
            1,
            JsonRpcError::exception("ValueError", "Invalid state"),
        ));

        let client = ToolkitClient::new(transport);
        let err = client
            .expand_library_nodes(&json!({}), None, SerializeOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.remote_type(), Some("ValueError"));
    }

    #[tokio::test]
    async fn test_missing_result() {
        let transport = MemoryTransport::new();
        transport.push_response(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: RequestId::Number(1),
            result: None,
            error: None,
        });
        let client = ToolkitClient::new(transport);
        let err = client.property_metadata().await.unwrap_err();
        assert!(matches!(err, ToolkitError::NoResult));
    }

    #[tokio::test]
    async fn test_analysis_requires_capability() {
        let transport = MemoryTransport::new();
        transport.push_response(JsonRpcResponse::success(1, info(&[])));
        let client = ToolkitClient::new(transport.clone());
        client.initialize().await.unwrap();

        let request = AnalysisRequest::new(AnalysisKind::Depth, json!({}));
        let err = client.analyze(&request).await.unwrap_err();
        assert!(matches!(err, ToolkitError::Unsupported(ref what) if what == "depth"));
        // Nothing was sent after the handshake.
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_analysis_result_map() {
        let transport = MemoryTransport::new();
        transport.push_response(JsonRpcResponse::success(
            1,
            json!({"0/-1/-1/-1": "2*N", "0/0/-1/-1": "N"}),
        ));
        let client = ToolkitClient::new(transport);
        let map = client
            .analyze(&AnalysisRequest::new(AnalysisKind::ArithmeticOps, json!({})))
            .await
            .unwrap();
        assert_eq!(map.get("0/-1/-1/-1").map(String::as_str), Some("2*N"));
    }

    #[tokio::test]
    async fn test_next_id() {
        let client = ToolkitClient::new(MemoryTransport::new());
        let (RequestId::Number(a), RequestId::Number(b)) = (client.next_id(), client.next_id())
        else {
            panic!("Expected numeric IDs");
        };
        assert_eq!(b, a + 1);
    }

    #[tokio::test]
    async fn test_close_sends_shutdown() {
        let transport = MemoryTransport::new();
        let client = ToolkitClient::new(transport.clone());
        client.close().await.unwrap();
        assert!(!client.is_connected());
        assert_eq!(transport.notifications()[0].method, "shutdown");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        // `sleep` never answers.
        let client = ToolkitClient::builder()
            .command("sleep")
            .arg("5")
            .timeout(Duration::from_millis(50))
            .build()
            .await
            .unwrap();
        let err = client.property_metadata().await.unwrap_err();
        assert!(matches!(err, ToolkitError::Timeout));
        client.close().await.unwrap();
    }

    #[test]
    fn test_builder_defaults() {
        let builder = ToolkitClientBuilder::new();
        assert_eq!(builder.command, "python");
        assert_eq!(builder.args, vec!["-m", "dace_worker"]);

        let builder = builder.command("worker").args(["--a", "--b"]).env("K", "V");
        assert_eq!(builder.args.len(), 2);
        assert_eq!(builder.env.get("K").map(String::as_str), Some("V"));
    }
}
