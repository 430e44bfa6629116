//! Declarative MobileNetV2 layer-graph definitions.
//!
//! Builders here emit a named, ordered [`NetSpec`] wired by layer-name
//! references; no tensor computation happens on this side. The consuming
//! framework materializes and runs the graph.

pub mod error;
pub mod graph;
pub mod model;

pub use error::{GraphError, Result};
pub use graph::*;
pub use model::*;
