//! Structured log events observed by operators.
//!
//! Every invocation path emits these through `tracing` with a stable
//! `event` field so the presentation layer can index by correlation id.

use uuid::Uuid;

use crate::error::ErrorKind;

pub fn tool_started(tool_id: &str, version: &str, correlation_id: Uuid) {
    tracing::info!(
        event = "tool_started",
        tool = %tool_id,
        version = %version,
        correlation_id = %correlation_id,
        "tool execution started"
    );
}

pub fn tool_cached(tool_id: &str, version: &str, correlation_id: Uuid) {
    tracing::info!(
        event = "tool_cached",
        tool = %tool_id,
        version = %version,
        correlation_id = %correlation_id,
        "returning cached result"
    );
}

pub fn tool_succeeded(tool_id: &str, correlation_id: Uuid, cost: f64, latency_ms: u64) {
    tracing::info!(
        event = "tool_succeeded",
        tool = %tool_id,
        correlation_id = %correlation_id,
        cost = cost,
        latency_ms = latency_ms,
        "tool execution succeeded"
    );
}

pub fn tool_failed(tool_id: &str, correlation_id: Uuid, kind: ErrorKind, message: &str) {
    tracing::warn!(
        event = "tool_failed",
        tool = %tool_id,
        correlation_id = %correlation_id,
        kind = kind.as_str(),
        message = %message,
        "tool execution failed"
    );
}

pub fn budget_denied(tool_id: &str, correlation_id: Uuid, cost: f64) {
    tracing::warn!(
        event = "budget_denied",
        tool = %tool_id,
        correlation_id = %correlation_id,
        cost = cost,
        "cost reservation denied"
    );
}

pub fn workflow_step_transition(run_id: &str, step_id: &str, from: &str, to: &str) {
    tracing::info!(
        event = "workflow_step_transition",
        run = %run_id,
        step = %step_id,
        from = %from,
        to = %to,
        "workflow step transition"
    );
}
