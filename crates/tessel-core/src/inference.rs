//! Whole-graph shape inference.

use crate::graph::Graph;
use crate::{Error, Result};

impl Graph {
    /// Propagate shapes through the graph.
    ///
    /// Operators run in the stored order, so callers that changed the graph
    /// should [`topo_sort`](Graph::topo_sort) first. An output whose inferred
    /// shape differs from its current one is updated on the tensor of the same
    /// family, looked up by fuid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeInference`] naming the failing operator.
    pub fn shape_infer(&mut self) -> Result<()> {
        for op in self.order.clone() {
            let (inputs, outputs) = {
                let node = self.op(op)?;
                (node.inputs.clone(), node.outputs.clone())
            };
            let shapes = self.input_shapes(&inputs)?;
            let shape_refs: Vec<&[usize]> = shapes.iter().map(Vec::as_slice).collect();

            let node = self.op_mut(op)?;
            let (name, guid) = (node.name().to_string(), node.guid);
            let inferred = node.kind.infer_shapes(&shape_refs).map_err(|e| {
                Error::ShapeInference(format!("{name} {guid}: {e}"))
            })?;

            if inferred.len() != outputs.len() {
                return Err(Error::ShapeInference(format!(
                    "{name} {guid}: inferred {} output shapes for {} outputs",
                    inferred.len(),
                    outputs.len()
                )));
            }

            for (output, shape) in outputs.into_iter().zip(inferred) {
                let fuid = self.tensor(output)?.fuid;
                let target = self.tensor_by_fuid(fuid).unwrap_or(output);
                let tensor = self.tensor_mut(target)?;
                if tensor.shape != shape {
                    tracing::trace!(
                        op = %name,
                        tensor = %target,
                        from = ?tensor.shape,
                        to = ?shape,
                        "shape updated"
                    );
                    tensor.shape = shape;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{DataType, Shape};
    use crate::{Error, Graph, Operator, Result};
    use std::any::Any;
    use std::sync::Arc;
    use tessel_runtime::CpuRuntime;

    /// Collapses the first input into one dimension.
    #[derive(Debug)]
    struct Flatten;

    impl Operator for Flatten {
        fn name(&self) -> &str {
            "Flatten"
        }

        fn infer_shapes(&mut self, inputs: &[&[usize]]) -> Result<Vec<Shape>> {
            Ok(vec![vec![inputs[0].iter().product()]])
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl Operator for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn infer_shapes(&mut self, _inputs: &[&[usize]]) -> Result<Vec<Shape>> {
            Err(Error::Shape("always fails".to_string()))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_shape_infer_updates_changed_outputs() {
        let mut graph = Graph::new(Arc::new(CpuRuntime::new()));
        let x = graph.add_tensor([2, 3], DataType::F32);
        let y = graph.add_tensor([1], DataType::F32);
        graph.add_op(Flatten, &[x], &[y]).unwrap();

        graph.shape_infer().unwrap();
        assert_eq!(graph.tensor(y).unwrap().shape(), &[6]);
    }

    #[test]
    fn test_shape_infer_propagates_in_order() {
        let mut graph = Graph::new(Arc::new(CpuRuntime::new()));
        let x = graph.add_tensor([4, 4], DataType::F32);
        let y = graph.add_tensor([1], DataType::F32);
        let z = graph.add_tensor([1], DataType::F32);
        graph.add_op(Flatten, &[y], &[z]).unwrap();
        graph.add_op(Flatten, &[x], &[y]).unwrap();

        graph.topo_sort().unwrap();
        graph.shape_infer().unwrap();
        assert_eq!(graph.tensor(z).unwrap().shape(), &[16]);
    }

    #[test]
    fn test_shape_infer_reports_operator() {
        let mut graph = Graph::new(Arc::new(CpuRuntime::new()));
        let x = graph.add_tensor([2], DataType::F32);
        let y = graph.add_tensor([2], DataType::F32);
        graph.add_op(Broken, &[x], &[y]).unwrap();

        let err = graph.shape_infer().unwrap_err();
        assert!(matches!(&err, Error::ShapeInference(msg) if msg.starts_with("Broken")));
        assert_eq!(graph.tensor(y).unwrap().shape(), &[2]);
    }

    #[test]
    fn test_shape_infer_rejects_output_count_mismatch() {
        let mut graph = Graph::new(Arc::new(CpuRuntime::new()));
        let x = graph.add_tensor([2], DataType::F32);
        let a = graph.add_tensor([2], DataType::F32);
        let b = graph.add_tensor([2], DataType::F32);
        graph.add_op(Flatten, &[x], &[a, b]).unwrap();

        assert!(matches!(graph.shape_infer(), Err(Error::ShapeInference(_))));
    }
}
