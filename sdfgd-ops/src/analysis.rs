//! Symbolic analyses, run by the toolkit and keyed by element address.

use crate::{fail, reject, Operations};
use sdfgd_core::{load_sdfg_lenient, Outcome, Sdfg};
use sdfgd_toolkit::{AnalysisKind, AnalysisMap, AnalysisRequest, CacheParams, ToolkitError};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

const DEFAULT_CACHE_PARAMS: &str = "1024 64";

/// Request for an analysis that only takes symbol assumptions.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    /// The graph.
    pub sdfg: Value,
    /// Whitespace separated assumptions, e.g. `"N>0 M==N"`.
    #[serde(default)]
    pub assumptions: String,
}

/// Request for operational intensity.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationalIntensityRequest {
    /// The graph.
    pub sdfg: Value,
    /// Cache size and line size in bytes, e.g. `"1024 64"`.
    #[serde(rename = "cacheParams", default = "default_cache_params")]
    pub cache_params: String,
    /// Whitespace separated `SYMBOL==value` pairs.
    #[serde(default)]
    pub assumptions: String,
}

fn default_cache_params() -> String {
    DEFAULT_CACHE_PARAMS.to_string()
}

/// Analysis results keyed by element address, under the key the editor
/// expects for the analysis kind.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResponse {
    /// The analysis that produced the map.
    pub kind: AnalysisKind,
    /// Address to symbolic expression.
    pub values: AnalysisMap,
}

impl AnalysisResponse {
    /// Response key for this analysis.
    pub fn key(&self) -> &'static str {
        match self.kind {
            AnalysisKind::ArithmeticOps | AnalysisKind::Work => "arithOpsMap",
            AnalysisKind::Depth => "depthMap",
            AnalysisKind::AverageParallelism => "avgParallelismMap",
            AnalysisKind::OperationalIntensity => "opInMap",
        }
    }
}

impl Serialize for AnalysisResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key(), &self.values)?;
        map.end()
    }
}

fn failure_message(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::ArithmeticOps => "Failed to analyze arithmetic operations",
        AnalysisKind::Work => "Failed to analyze work",
        AnalysisKind::Depth => "Failed to analyze depth",
        AnalysisKind::AverageParallelism => "Failed to analyze average parallelism",
        AnalysisKind::OperationalIntensity => "Failed to analyze operational intensity",
    }
}

fn unsupported_message(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::OperationalIntensity => {
            "Toolkit does not support operational intensity analysis"
        }
        _ => "Toolkit does not support work depth analysis",
    }
}

impl Operations {
    /// Arithmetic operation counts per element, after memlet propagation.
    /// Exponentiation is rendered as `^`.
    pub async fn arith_ops(&self, request: AnalyzeRequest) -> Outcome<AnalysisResponse> {
        let mut response = self
            .analyze(AnalysisKind::ArithmeticOps, request.sdfg, |req| {
                req.with_assumptions(split_assumptions(&request.assumptions))
            })
            .await?;
        for value in response.values.values_mut() {
            *value = value.replace("**", "^");
        }
        Ok(response)
    }

    /// Total work per element.
    pub async fn work(&self, request: AnalyzeRequest) -> Outcome<AnalysisResponse> {
        self.work_depth(AnalysisKind::Work, request).await
    }

    /// Critical path depth per element.
    pub async fn depth(&self, request: AnalyzeRequest) -> Outcome<AnalysisResponse> {
        self.work_depth(AnalysisKind::Depth, request).await
    }

    /// Average parallelism per element.
    pub async fn avg_parallelism(&self, request: AnalyzeRequest) -> Outcome<AnalysisResponse> {
        self.work_depth(AnalysisKind::AverageParallelism, request).await
    }

    /// Operational intensity per element under a cache model. Assumptions
    /// must all be concrete `SYMBOL==value` pairs.
    pub async fn operational_intensity(
        &self,
        request: OperationalIntensityRequest,
    ) -> Outcome<AnalysisResponse> {
        let kind = AnalysisKind::OperationalIntensity;
        let symbol_values = match parse_symbol_values(&request.assumptions) {
            Ok(values) => values,
            Err(details) => return reject(failure_message(kind), details),
        };
        let cache = match parse_cache_params(&request.cache_params) {
            Ok(cache) => cache,
            Err(details) => return reject(failure_message(kind), details),
        };

        self.analyze(kind, request.sdfg, |req| {
            req.with_symbol_values(symbol_values).with_cache(cache)
        })
        .await
    }

    async fn work_depth(
        &self,
        kind: AnalysisKind,
        request: AnalyzeRequest,
    ) -> Outcome<AnalysisResponse> {
        self.analyze(kind, request.sdfg, |req| {
            req.with_assumptions(split_assumptions(&request.assumptions))
        })
        .await
    }

    async fn analyze<F>(
        &self,
        kind: AnalysisKind,
        sdfg: Value,
        build: F,
    ) -> Outcome<AnalysisResponse>
    where
        F: FnOnce(AnalysisRequest) -> AnalysisRequest,
    {
        let sdfg = load_sdfg_lenient(sdfg)?;
        let request = build(AnalysisRequest::new(kind, sdfg.to_value()));

        let values = match self.toolkit.analyze(&request).await {
            Ok(values) => values,
            Err(ToolkitError::Unsupported(_)) => {
                return reject(
                    unsupported_message(kind),
                    "Please update the toolkit to a newer version",
                );
            }
            Err(e) => return Err(fail(failure_message(kind))(e)),
        };

        warn_unresolved(&sdfg, kind, &values);
        Ok(AnalysisResponse { kind, values })
    }
}

fn split_assumptions(assumptions: &str) -> Vec<String> {
    assumptions.split_whitespace().map(str::to_string).collect()
}

fn parse_symbol_values(assumptions: &str) -> Result<BTreeMap<String, i64>, String> {
    assumptions
        .split_whitespace()
        .map(|pair| -> Result<(String, i64), String> {
            let (symbol, value) = pair.split_once("==").ok_or_else(|| {
                format!("ValueError: Assumption '{pair}' is not of the form SYMBOL==value")
            })?;
            let value = value
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("ValueError: Invalid value for '{symbol}': {e}"))?;
            Ok((symbol.trim().to_string(), value))
        })
        .collect()
}

fn parse_cache_params(params: &str) -> Result<CacheParams, String> {
    let mut parts = params.split_whitespace();
    let mut next = |what: &str| -> Result<u64, String> {
        let part = parts
            .next()
            .ok_or_else(|| format!("IndexError: Cache parameters are missing the {what}"))?;
        part.parse()
            .map_err(|e| format!("ValueError: Invalid cache {what} '{part}': {e}"))
    };
    let size = next("size")?;
    let line_size = next("line size")?;
    Ok(CacheParams { size, line_size })
}

/// Keys are addresses into the analyzed graph. One that does not resolve
/// points at a toolkit that numbers elements differently.
fn warn_unresolved(sdfg: &Sdfg, kind: AnalysisKind, values: &AnalysisMap) {
    let unresolved = values
        .keys()
        .filter(|key| sdfg.resolve_str(key).is_err())
        .count();
    if unresolved > 0 {
        tracing::warn!(
            analysis = kind.describe(),
            unresolved,
            "Analysis returned keys that do not address an element"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{idle, ops, sample};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use sdfgd_core::OperationError;
    use sdfgd_toolkit::{JsonRpcError, MockToolkit};
    use serde_json::json;

    fn analysis(pairs: &[(&str, &str)]) -> AnalysisMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn request(assumptions: &str) -> AnalyzeRequest {
        AnalyzeRequest {
            sdfg: sample(),
            assumptions: assumptions.to_string(),
        }
    }

    #[tokio::test]
    async fn test_arith_ops_rewrites_powers() {
        let mut mock = MockToolkit::new();
        mock.expect_analyze()
            .withf(|req| req.kind == AnalysisKind::ArithmeticOps)
            .returning(|_| Ok(analysis(&[("0/-1/-1/-1", "2*N**2"), ("0/1/1/-1", "N**2")])));

        let response = ops(mock).arith_ops(request("")).await.unwrap();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"arithOpsMap": {"0/-1/-1/-1": "2*N^2", "0/1/1/-1": "N^2"}})
        );
    }

    #[rstest]
    #[case(AnalysisKind::Work, "arithOpsMap")]
    #[case(AnalysisKind::Depth, "depthMap")]
    #[case(AnalysisKind::AverageParallelism, "avgParallelismMap")]
    #[tokio::test]
    async fn test_work_depth_keys(#[case] kind: AnalysisKind, #[case] key: &str) {
        let mut mock = MockToolkit::new();
        mock.expect_analyze()
            .withf(move |req| {
                req.kind == kind && req.assumptions == vec!["N>0".to_string(), "M==N".to_string()]
            })
            .times(1)
            .returning(|_| Ok(analysis(&[("0/-1/-1/-1", "N")])));

        let ops = ops(mock);
        let req = request("  N>0   M==N ");
        let response = match kind {
            AnalysisKind::Work => ops.work(req).await,
            AnalysisKind::Depth => ops.depth(req).await,
            _ => ops.avg_parallelism(req).await,
        }
        .unwrap();
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ key: {"0/-1/-1/-1": "N"} }));
    }

    #[tokio::test]
    async fn test_unsupported_toolkit() {
        let mut mock = MockToolkit::new();
        mock.expect_analyze()
            .returning(|_| Err(ToolkitError::Unsupported("depth".to_string())));

        let err = ops(mock).depth(request("")).await.unwrap_err();
        assert_eq!(
            err,
            OperationError::new(
                "Toolkit does not support work depth analysis",
                "Please update the toolkit to a newer version"
            )
        );
    }

    #[tokio::test]
    async fn test_analysis_failure() {
        let mut mock = MockToolkit::new();
        mock.expect_analyze()
            .returning(|_| Err(JsonRpcError::exception("ZeroDivisionError", "division by zero").into()));

        let err = ops(mock).avg_parallelism(request("")).await.unwrap_err();
        assert_eq!(
            err,
            OperationError::new(
                "Failed to analyze average parallelism",
                "ZeroDivisionError: division by zero"
            )
        );
    }

    #[tokio::test]
    async fn test_operational_intensity_parameters() {
        let mut mock = MockToolkit::new();
        mock.expect_analyze()
            .withf(|req| {
                req.kind == AnalysisKind::OperationalIntensity
                    && req.symbol_values.get("N") == Some(&32)
                    && req.cache
                        == Some(CacheParams {
                            size: 2048,
                            line_size: 32,
                        })
            })
            .times(1)
            .returning(|_| Ok(analysis(&[("0/1/-1/-1", "0.25")])));

        let response = ops(mock)
            .operational_intensity(OperationalIntensityRequest {
                sdfg: sample(),
                cache_params: "2048 32".to_string(),
                assumptions: "N==32".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"opInMap": {"0/1/-1/-1": "0.25"}})
        );
    }

    #[test]
    fn test_operational_intensity_defaults() {
        let request: OperationalIntensityRequest =
            serde_json::from_value(json!({"sdfg": sample()})).unwrap();
        assert_eq!(request.cache_params, "1024 64");
        assert_eq!(
            parse_cache_params(&request.cache_params).unwrap(),
            CacheParams {
                size: 1024,
                line_size: 64
            }
        );
    }

    #[rstest]
    #[case("N>0", "1024 64")]
    #[case("N==many", "1024 64")]
    #[case("", "1024")]
    #[case("", "big 64")]
    #[tokio::test]
    async fn test_operational_intensity_rejects_bad_input(
        #[case] assumptions: &str,
        #[case] cache_params: &str,
    ) {
        let err = idle()
            .operational_intensity(OperationalIntensityRequest {
                sdfg: sample(),
                cache_params: cache_params.to_string(),
                assumptions: assumptions.to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Failed to analyze operational intensity");
    }

    #[tokio::test]
    async fn test_operational_intensity_unsupported() {
        let mut mock = MockToolkit::new();
        mock.expect_analyze()
            .returning(|_| Err(ToolkitError::Unsupported("operational intensity".to_string())));
        let err = ops(mock)
            .operational_intensity(OperationalIntensityRequest {
                sdfg: sample(),
                cache_params: DEFAULT_CACHE_PARAMS.to_string(),
                assumptions: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Toolkit does not support operational intensity analysis");
    }

    #[tokio::test]
    async fn test_invalid_graph_short_circuits() {
        let err = idle()
            .work(AnalyzeRequest {
                sdfg: json!({"nodes": 3}),
                assumptions: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "Failed to parse the provided SDFG");
    }
}
