//! Error types for render pipeline resolution.

use thiserror::Error;

/// Configuration errors detected while ordering renders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The dependency graph contains a cycle through the listed renders.
    #[error("render dependencies form a cycle through: {}", names.join(", "))]
    Cycle {
        /// Renders that could not be ordered, in registration order.
        names: Vec<String>,
    },
    /// A render depends on a name that was never registered.
    #[error("render {render} depends on unregistered render {dependency}")]
    UnknownDependency {
        /// Render declaring the dependency.
        render: String,
        /// Missing dependency name.
        dependency: String,
    },
}
