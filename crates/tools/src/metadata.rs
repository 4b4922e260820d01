//! Declarative tool metadata files.
//!
//! One TOML file per tool with sections `[tool]`, `[schemas]`, `[cost]`,
//! and `[dependencies]`. Discovery scans the configured directory and
//! fails startup on a duplicate identifier, a schema that does not
//! compile, or a loop in the declared dependency graph.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use grantscout_core::{Capability, CostModel, ToolMetadata};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("duplicate tool identifier '{0}'")]
    DuplicateId(String),

    #[error("tool '{tool}': invalid {which} schema: {message}")]
    InvalidSchema {
        tool: String,
        which: &'static str,
        message: String,
    },

    #[error("dependency loop through '{0}'")]
    DependencyLoop(String),

    #[error("tool '{tool}' depends on unknown tool '{dependency}'")]
    UnknownDependency { tool: String, dependency: String },
}

#[derive(Debug, Deserialize)]
struct MetadataFile {
    tool: ToolSection,
    schemas: SchemaSection,
    #[serde(default)]
    cost: CostSection,
    #[serde(default)]
    dependencies: DependencySection,
}

#[derive(Debug, Deserialize)]
struct ToolSection {
    id: String,
    version: String,
    description: String,
    capability: Capability,
    #[serde(default)]
    cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SchemaSection {
    /// Inline JSON Schema documents.
    input: String,
    output: String,
}

#[derive(Debug, Default, Deserialize)]
struct CostSection {
    #[serde(default)]
    per_call: f64,
}

#[derive(Debug, Default, Deserialize)]
struct DependencySection {
    #[serde(default)]
    requires: Vec<String>,
}

/// Parse a single metadata file.
pub fn metadata_from_file(path: &Path) -> Result<ToolMetadata, DiscoveryError> {
    let raw = std::fs::read_to_string(path).map_err(|e| DiscoveryError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let file: MetadataFile = toml::from_str(&raw).map_err(|e| DiscoveryError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let input_schema = parse_schema(&file.tool.id, "input", &file.schemas.input)?;
    let output_schema = parse_schema(&file.tool.id, "output", &file.schemas.output)?;

    Ok(ToolMetadata {
        id: file.tool.id,
        version: file.tool.version,
        description: file.tool.description,
        capability: file.tool.capability,
        cost: CostModel {
            per_call: file.cost.per_call,
        },
        input_schema,
        output_schema,
        dependencies: file.dependencies.requires,
        cache_ttl_secs: file.tool.cache_ttl_secs,
    })
}

fn parse_schema(tool: &str, which: &'static str, raw: &str) -> Result<Value, DiscoveryError> {
    let schema: Value = serde_json::from_str(raw).map_err(|e| DiscoveryError::InvalidSchema {
        tool: tool.to_string(),
        which,
        message: e.to_string(),
    })?;
    // Compile once here so a broken schema fails discovery, not the first
    // invocation.
    jsonschema::JSONSchema::compile(&schema).map_err(|e| DiscoveryError::InvalidSchema {
        tool: tool.to_string(),
        which,
        message: e.to_string(),
    })?;
    Ok(schema)
}

/// Scan a directory of metadata files. Returns metadata keyed by id.
pub fn discover_metadata_dir(dir: &Path) -> Result<HashMap<String, ToolMetadata>, DiscoveryError> {
    let entries = std::fs::read_dir(dir).map_err(|e| DiscoveryError::Io {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut discovered: HashMap<String, ToolMetadata> = HashMap::new();
    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("toml"))
        .collect();
    paths.sort();

    for path in paths {
        let metadata = metadata_from_file(&path)?;
        if discovered.contains_key(&metadata.id) {
            return Err(DiscoveryError::DuplicateId(metadata.id));
        }
        discovered.insert(metadata.id.clone(), metadata);
    }

    check_dependencies(&discovered)?;
    tracing::info!(tools = discovered.len(), dir = %dir.display(), "tool discovery complete");
    Ok(discovered)
}

/// Reject unknown dependencies and loops in the declared graph.
fn check_dependencies(tools: &HashMap<String, ToolMetadata>) -> Result<(), DiscoveryError> {
    for (id, metadata) in tools {
        for dependency in &metadata.dependencies {
            if !tools.contains_key(dependency) {
                return Err(DiscoveryError::UnknownDependency {
                    tool: id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    // Iterative DFS with a three-color marking.
    let mut finished: HashSet<&str> = HashSet::new();
    for start in tools.keys() {
        if finished.contains(start.as_str()) {
            continue;
        }
        let mut on_path: Vec<&str> = Vec::new();
        let mut on_path_set: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];

        while let Some((node, next_child)) = stack.pop() {
            if next_child == 0 {
                on_path.push(node);
                on_path_set.insert(node);
            }
            let deps = &tools[node].dependencies;
            if next_child < deps.len() {
                stack.push((node, next_child + 1));
                let child = deps[next_child].as_str();
                if on_path_set.contains(child) {
                    return Err(DiscoveryError::DependencyLoop(child.to_string()));
                }
                if !finished.contains(child) {
                    stack.push((child, 0));
                }
            } else {
                on_path.pop();
                on_path_set.remove(node);
                finished.insert(node);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tool(dir: &Path, id: &str, requires: &[&str]) {
        let requires = requires
            .iter()
            .map(|r| format!("\"{r}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let body = format!(
            r#"[tool]
id = "{id}"
version = "1.0.0"
description = "test tool"
capability = "pure"

[schemas]
input = '{{"type": "object"}}'
output = '{{"type": "object"}}'

[cost]
per_call = 0.0

[dependencies]
requires = [{requires}]
"#
        );
        let mut file = std::fs::File::create(dir.join(format!("{id}.toml"))).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn discovers_and_links_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        write_tool(dir.path(), "fast_screen", &[]);
        write_tool(dir.path(), "screen_funnel", &["fast_screen"]);

        let tools = discover_metadata_dir(dir.path()).unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools["screen_funnel"].dependencies, vec!["fast_screen"]);
    }

    #[test]
    fn dependency_loop_fails_discovery() {
        let dir = tempfile::tempdir().unwrap();
        write_tool(dir.path(), "a", &["b"]);
        write_tool(dir.path(), "b", &["a"]);
        assert!(matches!(
            discover_metadata_dir(dir.path()).unwrap_err(),
            DiscoveryError::DependencyLoop(_)
        ));
    }

    #[test]
    fn unknown_dependency_fails_discovery() {
        let dir = tempfile::tempdir().unwrap();
        write_tool(dir.path(), "a", &["ghost"]);
        assert!(matches!(
            discover_metadata_dir(dir.path()).unwrap_err(),
            DiscoveryError::UnknownDependency { .. }
        ));
    }

    #[test]
    fn invalid_schema_fails_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"[tool]
id = "broken"
version = "1.0.0"
description = "broken schema"
capability = "pure"

[schemas]
input = 'not json'
output = '{"type": "object"}'
"#;
        std::fs::write(dir.path().join("broken.toml"), body).unwrap();
        assert!(matches!(
            discover_metadata_dir(dir.path()).unwrap_err(),
            DiscoveryError::InvalidSchema { which: "input", .. }
        ));
    }

    #[test]
    fn self_dependency_is_a_loop() {
        let dir = tempfile::tempdir().unwrap();
        write_tool(dir.path(), "a", &["a"]);
        assert!(matches!(
            discover_metadata_dir(dir.path()).unwrap_err(),
            DiscoveryError::DependencyLoop(_)
        ));
    }
}
