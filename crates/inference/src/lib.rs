//! External inference client
//!
//! Billable tools call an inference service through the
//! [`InferenceBackend`] trait: a prompt rendered from a template plus the
//! tool's structured input, answered by a JSON payload conforming to the
//! tool's declared output schema. The HTTP backend talks to the real
//! service; the offline backend produces deterministic payloads for tests
//! and development so the funnel stays runnable without network access.

mod backend;
mod http;
mod offline;
mod prompt;

pub use backend::{InferenceBackend, InferenceRequest, InferenceResponse};
pub use http::{HttpInferenceBackend, HttpInferenceConfig};
pub use offline::OfflineBackend;
pub use prompt::PromptTemplate;
