//! Deterministic offline backend.
//!
//! Stands in for the external service in tests and development. Scores are
//! derived from token overlap between the profile and opportunity text plus
//! a stable per-dimension hash offset, so identical inputs always produce
//! identical payloads. The fingerprint cache and the idempotence invariants
//! require exactly that from a backend under test.

use std::collections::BTreeSet;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use grantscout_core::{CancelSignal, ToolError};

use crate::backend::{InferenceBackend, InferenceRequest, InferenceResponse};

type Responder = dyn Fn(&InferenceRequest) -> Value + Send + Sync;

pub struct OfflineBackend {
    responder: Option<Box<Responder>>,
}

impl OfflineBackend {
    /// The heuristic backend: dimension scores from text overlap.
    pub fn heuristic() -> Self {
        Self { responder: None }
    }

    /// A backend that answers with a caller-supplied function, for tests
    /// that need exact payloads.
    pub fn with_responder(
        responder: impl Fn(&InferenceRequest) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(responder)),
        }
    }

    fn heuristic_payload(request: &InferenceRequest) -> Value {
        let input = &request.input;
        let profile_text = gather_text(input.get("profile"));
        let opportunity_text = gather_text(input.get("opportunity"));
        let overlap = jaccard(&profile_text, &opportunity_text);

        let opportunity_id = input
            .get("opportunity")
            .and_then(|o| o.get("id"))
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let dimensions: Vec<String> = input
            .get("dimensions")
            .and_then(|d| d.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let mut scored = Map::new();
        for dimension in dimensions {
            // Stable perturbation in [0, 0.2) keeps dimensions distinct
            // without breaking determinism.
            let wobble = (fnv1a(&format!("{dimension}:{opportunity_id}")) % 200) as f64 / 1_000.0;
            let raw = (overlap * 0.8 + wobble).clamp(0.0, 1.0);
            scored.insert(
                dimension,
                json!({
                    "raw": (raw * 1_000.0).round() / 1_000.0,
                    "data_quality": 0.85,
                }),
            );
        }

        json!({ "dimensions": Value::Object(scored) })
    }
}

#[async_trait]
impl InferenceBackend for OfflineBackend {
    async fn generate(
        &self,
        request: InferenceRequest,
        cancel: &CancelSignal,
    ) -> Result<InferenceResponse, ToolError> {
        cancel.check()?;
        let started = Instant::now();
        let payload = match &self.responder {
            Some(responder) => responder(&request),
            None => Self::heuristic_payload(&request),
        };
        Ok(InferenceResponse {
            payload,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn name(&self) -> &str {
        "offline"
    }
}

/// Lower-cased word set across every string in a JSON subtree.
fn gather_text(value: Option<&Value>) -> BTreeSet<String> {
    let mut words = BTreeSet::new();
    fn walk(value: &Value, words: &mut BTreeSet<String>) {
        match value {
            Value::String(s) => {
                for word in s.split(|c: char| !c.is_alphanumeric()) {
                    if word.len() > 2 {
                        words.insert(word.to_lowercase());
                    }
                }
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, words)),
            Value::Object(map) => map.values().for_each(|v| walk(v, words)),
            _ => {}
        }
    }
    if let Some(value) = value {
        walk(value, &mut words);
    }
    words
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

fn fnv1a(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
