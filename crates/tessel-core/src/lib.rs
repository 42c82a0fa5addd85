//! Core intermediate representation and planning for tessel.
//!
//! This crate provides the foundational abstractions the rest of tessel
//! builds on:
//! - The tensor dataflow graph (`Graph`, `Tensor`, `OpNode`) with
//!   bidirectional producer/consumer links
//! - The `Operator` trait with safe downcasting for rewrite passes
//! - `Pass` and `RewriteRule` traits for graph transformations
//! - Shape inference and arena memory planning over the whole graph

pub mod broadcast;
pub mod graph;
pub mod ids;
mod inference;
mod memory;
pub mod operator;
pub mod pass;
pub mod tensor;
pub mod types;

// Re-export commonly used types
pub use broadcast::broadcast_shape;
pub use graph::{Graph, GraphConfig};
pub use ids::{Fuid, IdGenerator, OpId, TensorId};
pub use operator::{OpNode, Operator};
pub use pass::{Pass, RewriteRule, Stage};
pub use tensor::{Blob, Tensor};
pub use types::{DataType, Shape};

pub use tessel_runtime::{Allocator, CpuRuntime, DevicePtr, Runtime, RuntimeError};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tessel-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Tensor {0} not found")]
    TensorNotFound(TensorId),

    #[error("Operator {0:?} not found")]
    OperatorNotFound(OpId),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Shape inference error: {0}")]
    ShapeInference(String),

    #[error("Graph contains a cycle through operators {0:?}")]
    Cycle(Vec<u64>),

    #[error("Runtime mismatch: {0}")]
    RuntimeMismatch(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
