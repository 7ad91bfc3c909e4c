//! HTTP routes of the daemon.
//!
//! Every POST route takes a JSON body, runs one operation and answers with
//! the operation envelope. Failures are reported inside the envelope with
//! status 200; the editor never looks at the status code.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use sdfgd_core::{into_envelope, OperationError, Outcome};
use sdfgd_ops::{
    insert_element, remove_elements, AddTransformationsRequest, AnalyzeRequest,
    ApplyTransformationRequest, ApplyTransformationsRequest, CompileRequest,
    ExpandLibraryNodeRequest, InsertRequest, OperationalIntensityRequest, Operations,
    ReapplyHistoryRequest, RemoveRequest, SpecializeRequest, TransformationsRequest,
};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Message of the envelope returned for unusable request bodies.
pub const INVALID_REQUEST: &str = "Invalid request";

/// Liveness answer of `GET /`.
pub const LIVENESS: &str = "success!";

/// Server error types.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("Failed to bind to address {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The server loop failed.
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

type Ops = State<Arc<Operations>>;
type Body<T> = Result<Json<T>, JsonRejection>;

/// Build the router for all editor routes.
pub fn router(ops: Arc<Operations>) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/transformations", post(transformations))
        .route("/apply_transformation", post(apply_transformation))
        .route("/apply_transformations", post(apply_transformations))
        .route("/expand_library_node", post(expand_library_node))
        .route("/reapply_history_until", post(reapply_history_until))
        .route("/specialize_sdfg", post(specialize_sdfg))
        .route("/add_transformations", post(add_transformations))
        .route("/get_arith_ops", post(get_arith_ops))
        .route("/get_work", post(get_work))
        .route("/get_depth", post(get_depth))
        .route("/get_avg_parallelism", post(get_avg_parallelism))
        .route("/get_operational_intensity", post(get_operational_intensity))
        .route("/insert_sdfg_element", post(insert_sdfg_element))
        .route("/remove_sdfg_elements", post(remove_sdfg_elements))
        .route("/get_metadata", get(get_metadata))
        .route("/compile_sdfg_from_file", post(compile_sdfg_from_file))
        .layer(TraceLayer::new_for_http())
        .with_state(ops)
}

/// Serve the router on `addr` until `shutdown` resolves.
pub async fn serve<F>(ops: Arc<Operations>, addr: SocketAddr, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    tracing::info!(%addr, "sdfgd listening");

    axum::serve(listener, router(ops))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("sdfgd stopped");
    Ok(())
}

/// Run `op` on a decoded body and wrap the outcome in the envelope.
async fn dispatch<T, R, F, Fut>(body: Body<T>, op: F) -> Json<Value>
where
    F: FnOnce(T) -> Fut,
    Fut: Future<Output = Outcome<R>>,
    R: Serialize,
{
    match body {
        Ok(Json(request)) => Json(into_envelope(op(request).await)),
        Err(rejection) => Json(invalid_request(&rejection).to_value()),
    }
}

fn invalid_request(rejection: &JsonRejection) -> OperationError {
    let kind = match rejection {
        JsonRejection::JsonDataError(_) => "JsonDataError",
        JsonRejection::JsonSyntaxError(_) => "JsonSyntaxError",
        JsonRejection::MissingJsonContentType(_) => "MissingJsonContentType",
        _ => "BytesRejection",
    };
    let err = OperationError::new(INVALID_REQUEST, format!("{kind}: {}", rejection.body_text()));
    tracing::warn!(details = %err.details, "Rejected request body");
    err
}

// Handlers

/// GET / - Liveness check
async fn liveness() -> &'static str {
    LIVENESS
}

/// POST /transformations - List applicable transformations
async fn transformations(State(ops): Ops, body: Body<TransformationsRequest>) -> Json<Value> {
    dispatch(body, |req| async move { ops.transformations(req).await }).await
}

/// POST /apply_transformation - Apply one transformation
async fn apply_transformation(
    State(ops): Ops,
    body: Body<ApplyTransformationRequest>,
) -> Json<Value> {
    dispatch(body, |req| async move { ops.apply_transformation(req).await }).await
}

/// POST /apply_transformations - Apply transformations in order
async fn apply_transformations(
    State(ops): Ops,
    body: Body<ApplyTransformationsRequest>,
) -> Json<Value> {
    dispatch(body, |req| async move { ops.apply_transformations(req).await }).await
}

/// POST /expand_library_node - Expand one or all library nodes
async fn expand_library_node(
    State(ops): Ops,
    body: Body<ExpandLibraryNodeRequest>,
) -> Json<Value> {
    dispatch(body, |req| async move { ops.expand_library_node(req).await }).await
}

/// POST /reapply_history_until - Rewind to a history point
async fn reapply_history_until(
    State(ops): Ops,
    body: Body<ReapplyHistoryRequest>,
) -> Json<Value> {
    dispatch(body, |req| async move { ops.reapply_history_until(req).await }).await
}

/// POST /specialize_sdfg - Replace symbols with constants
async fn specialize_sdfg(State(ops): Ops, body: Body<SpecializeRequest>) -> Json<Value> {
    dispatch(body, |req| async move { ops.specialize(req).await }).await
}

/// POST /add_transformations - Load user transformation modules
async fn add_transformations(
    State(ops): Ops,
    body: Body<AddTransformationsRequest>,
) -> Json<Value> {
    dispatch(body, |req| async move { ops.add_transformations(req).await }).await
}

/// POST /get_arith_ops - Arithmetic operation counts
async fn get_arith_ops(State(ops): Ops, body: Body<AnalyzeRequest>) -> Json<Value> {
    dispatch(body, |req| async move { ops.arith_ops(req).await }).await
}

/// POST /get_work - Work analysis
async fn get_work(State(ops): Ops, body: Body<AnalyzeRequest>) -> Json<Value> {
    dispatch(body, |req| async move { ops.work(req).await }).await
}

/// POST /get_depth - Depth analysis
async fn get_depth(State(ops): Ops, body: Body<AnalyzeRequest>) -> Json<Value> {
    dispatch(body, |req| async move { ops.depth(req).await }).await
}

/// POST /get_avg_parallelism - Average parallelism analysis
async fn get_avg_parallelism(State(ops): Ops, body: Body<AnalyzeRequest>) -> Json<Value> {
    dispatch(body, |req| async move { ops.avg_parallelism(req).await }).await
}

/// POST /get_operational_intensity - Operational intensity analysis
async fn get_operational_intensity(
    State(ops): Ops,
    body: Body<OperationalIntensityRequest>,
) -> Json<Value> {
    dispatch(body, |req| async move { ops.operational_intensity(req).await }).await
}

/// POST /insert_sdfg_element - Insert a graph element
async fn insert_sdfg_element(body: Body<InsertRequest>) -> Json<Value> {
    dispatch(body, |req| async move { insert_element(req) }).await
}

/// POST /remove_sdfg_elements - Remove graph elements
async fn remove_sdfg_elements(body: Body<RemoveRequest>) -> Json<Value> {
    dispatch(body, |req| async move { remove_elements(req) }).await
}

/// GET /get_metadata - Property metadata
async fn get_metadata(State(ops): Ops) -> Json<Value> {
    Json(into_envelope(ops.metadata().await))
}

/// POST /compile_sdfg_from_file - Compile a graph file
async fn compile_sdfg_from_file(State(ops): Ops, body: Body<CompileRequest>) -> Json<Value> {
    dispatch(body, |req| async move { ops.compile_from_file(req).await }).await
}
