//! Two-pass screening funnel: fast mass-screen, thorough follow-up.

mod fast;
mod funnel;
mod thorough;

pub use fast::FastScreenTool;
pub use funnel::ScreenFunnelTool;
pub use thorough::ThoroughScreenTool;

use serde_json::Value;

use grantscout_core::{Opportunity, Profile, SourceChannel, ToolError, Track};
use grantscout_scoring::{DimensionInput, DimensionInputs};

/// Stage track for an opportunity's source channel.
pub(crate) fn track_for(channel: SourceChannel) -> Track {
    match channel {
        SourceChannel::Federal => Track::Federal,
        SourceChannel::State => Track::State,
        SourceChannel::Commercial => Track::Commercial,
        SourceChannel::Foundation => Track::Foundation,
    }
}

pub(crate) fn profile_from(input: &Value) -> Result<Profile, ToolError> {
    serde_json::from_value(
        input
            .get("profile")
            .cloned()
            .ok_or_else(|| ToolError::invalid_arguments("profile is required"))?,
    )
    .map_err(|e| ToolError::invalid_arguments(format!("bad profile: {e}")))
}

pub(crate) fn opportunity_from(input: &Value) -> Result<Opportunity, ToolError> {
    serde_json::from_value(
        input
            .get("opportunity")
            .cloned()
            .ok_or_else(|| ToolError::invalid_arguments("opportunity is required"))?,
    )
    .map_err(|e| ToolError::invalid_arguments(format!("bad opportunity: {e}")))
}

/// Parse `{"dimensions": {name: {"raw": r, "data_quality": q}}}` from an
/// inference payload into scorer inputs.
pub(crate) fn dimension_inputs_from(payload: &Value) -> Result<DimensionInputs, ToolError> {
    let dimensions = payload
        .get("dimensions")
        .and_then(|d| d.as_object())
        .ok_or_else(|| {
            ToolError::invalid_arguments("inference payload missing 'dimensions' object")
        })?;

    let mut inputs = DimensionInputs::new();
    for (name, value) in dimensions {
        let raw = value.get("raw").and_then(|v| v.as_f64()).ok_or_else(|| {
            ToolError::invalid_arguments(format!("dimension '{name}' missing raw score"))
        })?;
        let data_quality = value
            .get("data_quality")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5);
        inputs.insert(
            name.clone(),
            DimensionInput {
                raw: raw.clamp(0.0, 1.0),
                data_quality: data_quality.clamp(0.0, 1.0),
            },
        );
    }
    Ok(inputs)
}
