//! Compiler passes for graph rewriting, shape inference and memory planning.

mod matmul_transpose_fusion;
mod memory_planning;
mod rewrite;
mod shape_inference;
mod transpose_elimination;

pub use matmul_transpose_fusion::MatMulTransposeFusion;
pub use memory_planning::MemoryPlanningPass;
pub use rewrite::RewritePass;
pub use shape_inference::ShapeInferencePass;
pub use transpose_elimination::TransposeElimination;
