//! Transformation history playback.

use crate::{fail, reject, Operations, SdfgResponse};
use sdfgd_core::{load_sdfg_lenient, CoreError, Outcome, Sdfg};
use serde::Deserialize;
use serde_json::Value;

const REPLAY_FAILED: &str = "Failed to play back the transformation history";

/// Request to rewind a graph to a point in its history.
#[derive(Debug, Clone, Deserialize)]
pub struct ReapplyHistoryRequest {
    /// The graph carrying `orig_sdfg` and `transformation_hist`.
    pub sdfg: Value,
    /// Index of the last history entry to apply.
    pub index: usize,
}

/// English ordinal for a 1-based position: `1st`, `12th`, `22nd`.
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 100, n % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

impl Operations {
    /// Replay history entries `0..=index` against the recorded original graph.
    pub async fn reapply_history_until(
        &self,
        request: ReapplyHistoryRequest,
    ) -> Outcome<SdfgResponse> {
        let sdfg = load_sdfg_lenient(request.sdfg)?;
        let attributes = sdfg.root().attributes();

        let Some(original) = attributes
            .and_then(|a| a.get("orig_sdfg"))
            .filter(|v| !v.is_null())
            .cloned()
        else {
            return reject(REPLAY_FAILED, "No original SDFG recorded");
        };
        let history = attributes
            .and_then(|a| a.get("transformation_hist"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if request.index >= history.len() {
            return reject(
                REPLAY_FAILED,
                format!(
                    "IndexError: History index {} out of range for {} entries",
                    request.index,
                    history.len()
                ),
            );
        }

        let original = match original {
            Value::String(text) => serde_json::from_str(&text)
                .map_err(CoreError::from)
                .map_err(fail(REPLAY_FAILED))?,
            other => other,
        };
        let mut current_graph = Sdfg::from_value(original).map_err(fail(REPLAY_FAILED))?;
        let mut current = current_graph.to_value();

        for (i, entry) in history[..=request.index].iter().enumerate() {
            let message = format!("{REPLAY_FAILED}, failed at {} history point", ordinal(i + 1));
            current = self.apply_one(current, &current_graph, entry, &message).await?;
            if i < request.index {
                current_graph = Sdfg::from_value(current.clone()).map_err(fail(message))?;
            }
        }

        tracing::info!(steps = request.index + 1, "Replayed transformation history");
        Ok(SdfgResponse { sdfg: current })
    }
}
