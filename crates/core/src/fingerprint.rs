//! Deterministic tool-result cache keys.
//!
//! A fingerprint hashes (tool id, tool version, canonical input payload).
//! Canonicalization sorts object keys recursively so that two JSON payloads
//! with equal content but different key order hash identically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 digest of a tool invocation, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint for an invocation.
    pub fn compute(tool_id: &str, tool_version: &str, input: &Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tool_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(tool_version.as_bytes());
        hasher.update([0u8]);
        write_canonical(&mut hasher, input);
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(64);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Feed a canonical rendering of `value` into the hasher: objects with keys
/// sorted, arrays in order, scalars via their serde_json display form.
fn write_canonical(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Object(map) => {
            hasher.update(b"{");
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                hasher.update(key.as_bytes());
                hasher.update(b":");
                write_canonical(hasher, &map[key]);
                hasher.update(b",");
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                write_canonical(hasher, item);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        Value::String(s) => {
            hasher.update(b"\"");
            hasher.update(s.as_bytes());
            hasher.update(b"\"");
        }
        other => hasher.update(other.to_string().as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(
            Fingerprint::compute("t", "1.0.0", &a),
            Fingerprint::compute("t", "1.0.0", &b)
        );
    }

    #[test]
    fn identity_components_matter() {
        let input = json!({"q": 1});
        let base = Fingerprint::compute("t", "1.0.0", &input);
        assert_ne!(base, Fingerprint::compute("t", "1.0.1", &input));
        assert_ne!(base, Fingerprint::compute("u", "1.0.0", &input));
        assert_ne!(base, Fingerprint::compute("t", "1.0.0", &json!({"q": 2})));
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(
            Fingerprint::compute("t", "1", &json!([1, 2])),
            Fingerprint::compute("t", "1", &json!([2, 1]))
        );
    }

    #[test]
    fn repeated_computation_is_stable() {
        let input = json!({"states": ["VA"], "revenue_min": 500000});
        let a = Fingerprint::compute("bmf_filter", "1.0.0", &input);
        let b = Fingerprint::compute("bmf_filter", "1.0.0", &input);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }
}
