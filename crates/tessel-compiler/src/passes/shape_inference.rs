//! Shape inference pass.

use tessel_core::{Graph, Pass, Result, Stage};

/// Pass that sorts the graph and propagates shapes through it.
///
/// Sorting first guarantees every operator sees its inputs' final shapes,
/// including after rewrites reordered producers.
#[derive(Debug, Default)]
pub struct ShapeInferencePass;

impl ShapeInferencePass {
    pub fn new() -> Self {
        Self
    }
}

impl Pass for ShapeInferencePass {
    fn name(&self) -> &str {
        "shape_inference"
    }

    fn stage(&self) -> Stage {
        Stage::Inference
    }

    fn run(&self, graph: &mut Graph) -> Result<bool> {
        let before: Vec<Vec<usize>> = graph.tensors().map(|t| t.shape().to_vec()).collect();
        graph.topo_sort()?;
        graph.shape_infer()?;
        Ok(graph.tensors().map(|t| t.shape()).ne(before.iter().map(Vec::as_slice)))
    }
}
