//! Deep-intelligence sub-tools and their fan-out/fan-in orchestrator.

mod financial;
mod historical;
mod network;
mod orchestrator;
mod premium;
mod risk;
mod schedule_i;

pub use financial::FinancialIntelTool;
pub use historical::HistoricalFundingTool;
pub use network::NetworkIntelTool;
pub use orchestrator::{DeepIntelTool, IntelDeadlines};
pub use premium::{PolicyContextTool, StrategicConsultingTool};
pub use risk::RiskIntelTool;
pub use schedule_i::ScheduleIAnalyzerTool;

use serde_json::{json, Value};

use grantscout_core::ToolError;

/// Common input shape for sub-tools keyed by sponsor EIN.
pub(crate) fn sponsor_ein(input: &Value) -> Result<String, ToolError> {
    input
        .get("sponsor_ein")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| ToolError::invalid_arguments("sponsor_ein is required"))
}

pub(crate) fn ein_input_schema() -> Value {
    json!({
        "type": "object",
        "required": ["sponsor_ein"],
        "properties": {
            "sponsor_ein": {"type": "string"},
            "extended": {"type": "boolean"}
        },
        "additionalProperties": false
    })
}

pub(crate) fn object_output_schema() -> Value {
    json!({"type": "object"})
}
