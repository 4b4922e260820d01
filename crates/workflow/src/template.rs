//! Input templating: substitute prior-step outputs and run inputs.
//!
//! A string that is exactly one `{{...}}` reference resolves to the
//! referenced JSON value with its original type; references embedded in a
//! longer string are stringified in place. References are
//! `inputs.<path>` or `steps.<id>.output.<path>`, with numeric path
//! segments indexing into arrays.

use std::collections::HashMap;

use serde_json::Value;

use grantscout_core::ToolError;

/// Resolve a template against the run inputs and the outputs of the step's
/// ancestors. Any unresolvable reference fails with `MissingInput`.
pub fn resolve_template(
    template: &Value,
    inputs: &Value,
    ancestor_outputs: &HashMap<String, Value>,
) -> Result<Value, ToolError> {
    match template {
        Value::String(text) => resolve_string(text, inputs, ancestor_outputs),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_template(item, inputs, ancestor_outputs))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(key.clone(), resolve_template(value, inputs, ancestor_outputs)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_string(
    text: &str,
    inputs: &Value,
    ancestor_outputs: &HashMap<String, Value>,
) -> Result<Value, ToolError> {
    let trimmed = text.trim();
    // Whole-string reference keeps the referenced value's type.
    if let Some(reference) = as_sole_reference(trimmed) {
        return lookup(reference, inputs, ancestor_outputs);
    }

    // Otherwise substitute each reference as a string fragment.
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(ToolError::missing_input(&rest[start..]));
        };
        let reference = after[..end].trim();
        let value = lookup(reference, inputs, ancestor_outputs)?;
        match value {
            Value::String(s) => out.push_str(&s),
            other => out.push_str(&other.to_string()),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

fn as_sole_reference(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

fn lookup(
    reference: &str,
    inputs: &Value,
    ancestor_outputs: &HashMap<String, Value>,
) -> Result<Value, ToolError> {
    let mut segments = reference.split('.');
    let root = segments.next().unwrap_or_default();
    match root {
        "inputs" => walk(inputs, segments, reference),
        "steps" => {
            let step_id = segments
                .next()
                .ok_or_else(|| ToolError::missing_input(reference))?;
            let output = ancestor_outputs
                .get(step_id)
                .ok_or_else(|| ToolError::missing_input(reference))?;
            match segments.next() {
                Some("output") => walk(output, segments, reference),
                // Bare `steps.<id>` is shorthand for the whole output.
                None => Ok(output.clone()),
                Some(_) => Err(ToolError::missing_input(reference)),
            }
        }
        _ => Err(ToolError::missing_input(reference)),
    }
}

fn walk<'a>(
    value: &Value,
    segments: impl Iterator<Item = &'a str>,
    reference: &str,
) -> Result<Value, ToolError> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| ToolError::missing_input(reference))?,
            Value::Array(items) => {
                let index: usize = segment
                    .parse()
                    .map_err(|_| ToolError::missing_input(reference))?;
                items
                    .get(index)
                    .ok_or_else(|| ToolError::missing_input(reference))?
            }
            _ => return Err(ToolError::missing_input(reference)),
        };
    }
    Ok(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantscout_core::ErrorKind;
    use serde_json::json;

    fn outputs() -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert(
            "screen".to_string(),
            json!({
                "recommended": [
                    {"opportunity_id": "opp-9", "overall": 0.81}
                ],
                "count": 1
            }),
        );
        map
    }

    #[test]
    fn whole_string_reference_keeps_type() {
        let template = json!({
            "first": "{{steps.screen.output.recommended.0}}",
            "count": "{{steps.screen.output.count}}",
            "profile": "{{inputs.profile}}"
        });
        let resolved = resolve_template(
            &template,
            &json!({"profile": {"id": "p1"}}),
            &outputs(),
        )
        .unwrap();

        assert_eq!(resolved["first"]["opportunity_id"], "opp-9");
        assert_eq!(resolved["count"], json!(1));
        assert_eq!(resolved["profile"], json!({"id": "p1"}));
    }

    #[test]
    fn embedded_references_stringify() {
        let template = json!("best is {{steps.screen.output.recommended.0.opportunity_id}} at {{steps.screen.output.recommended.0.overall}}");
        let resolved = resolve_template(&template, &json!({}), &outputs()).unwrap();
        assert_eq!(resolved, json!("best is opp-9 at 0.81"));
    }

    #[test]
    fn unresolvable_reference_is_missing_input() {
        let err = resolve_template(
            &json!("{{steps.ghost.output.x}}"),
            &json!({}),
            &outputs(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);

        let err = resolve_template(
            &json!("{{steps.screen.output.recommended.9}}"),
            &json!({}),
            &outputs(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);

        let err =
            resolve_template(&json!("{{inputs.absent}}"), &json!({}), &outputs()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);
    }

    #[test]
    fn non_reference_values_pass_through() {
        let template = json!({"mode": "both", "threshold": 0.5, "flags": [true, null]});
        let resolved = resolve_template(&template, &json!({}), &HashMap::new()).unwrap();
        assert_eq!(resolved, template);
    }

    #[test]
    fn unterminated_reference_fails() {
        let err = resolve_template(&json!("{{inputs.x"), &json!({"x": 1}), &HashMap::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);
    }
}
