//! Tool framework and the analytic tool set
//!
//! The registry owns the lookup table from string identifiers to tool
//! implementations; tools never hold references to each other and compose
//! through [`ToolInvoker`] by identifier. Discovery reads declarative TOML
//! metadata files, failing startup on duplicate identifiers, invalid
//! schemas, or dependency loops. Every invocation goes through the same
//! path: schema validation, fingerprint cache, budget gate, execution with
//! deadline, output validation, and structured events.

pub mod analysis;
pub mod intel;
pub mod metadata;
pub mod registry;
pub mod screen;
pub mod tracker;

pub use metadata::{discover_metadata_dir, metadata_from_file, DiscoveryError};
pub use registry::{InvokeOptions, RegistryConfig, ToolInvoker, ToolRegistry};
pub use tracker::{ToolCallRecord, ToolCallTracker};
