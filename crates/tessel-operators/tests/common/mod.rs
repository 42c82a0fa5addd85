//! Common test utilities for operator tests.

use std::sync::Arc;
use tessel_core::{DataType, Graph, Operator, Shape};
use tessel_runtime::CpuRuntime;

/// An empty graph on a fresh CPU runtime.
pub fn graph() -> Graph {
    Graph::new(Arc::new(CpuRuntime::new()))
}

/// Run an operator's shape inference on standalone input shapes.
pub fn infer(op: &mut dyn Operator, inputs: &[&[usize]]) -> tessel_core::Result<Vec<Shape>> {
    op.infer_shapes(inputs)
}

/// Add one f32 tensor per shape.
pub fn f32_inputs(graph: &mut Graph, shapes: &[&[usize]]) -> Vec<tessel_core::TensorId> {
    shapes
        .iter()
        .map(|shape| graph.add_tensor(shape.to_vec(), DataType::F32))
        .collect()
}
