//! Property metadata for the editor's property panes.

use crate::{fail, Operations};
use sdfgd_core::Outcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const METADATA_FAILED: &str = "Failed to load metadata";

/// Property metadata, keyed by element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataResponse {
    /// Per-type property descriptions plus the `__reverse_type_lookup__` and
    /// `__libs__` tables.
    pub meta_dict: Value,
}

impl Operations {
    /// Property metadata. Fetched from the toolkit on first use and cached
    /// for the lifetime of these operations; a failed fetch is retried on
    /// the next call.
    pub async fn metadata(&self) -> Outcome<MetadataResponse> {
        let meta_dict = self
            .metadata
            .get_or_try_init(|| async {
                tracing::debug!("Fetching property metadata");
                self.toolkit.property_metadata().await
            })
            .await
            .map_err(fail(METADATA_FAILED))?;
        Ok(MetadataResponse {
            meta_dict: meta_dict.clone(),
        })
    }
}
