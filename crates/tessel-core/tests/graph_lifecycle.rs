//! Build, validate, infer and plan a small graph through the public API.

use std::any::Any;
use std::sync::Arc;
use tessel_core::{
    DataType, Error, Graph, Operator, Result, Shape, broadcast_shape,
};
use tessel_runtime::CpuRuntime;

/// Elementwise binary operator with broadcasting.
#[derive(Debug)]
struct Add;

impl Operator for Add {
    fn name(&self) -> &str {
        "Add"
    }

    fn infer_shapes(&mut self, inputs: &[&[usize]]) -> Result<Vec<Shape>> {
        if inputs.len() != 2 {
            return Err(Error::Shape(format!(
                "Add expects 2 inputs, got {}",
                inputs.len()
            )));
        }
        Ok(vec![broadcast_shape(inputs[0], inputs[1])?])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn test_build_infer_and_plan() {
    let runtime = Arc::new(CpuRuntime::new());
    let mut graph = Graph::new(runtime.clone());

    let a = graph.add_tensor([4, 1], DataType::F32);
    let b = graph.add_tensor([1, 3], DataType::F32);
    let (first, sum) = graph.add_op_with_outputs(Add, &[a, b]).unwrap();
    let c = graph.add_tensor([4, 3], DataType::F32);
    let (second, out) = graph.add_op_with_outputs(Add, &[sum[0], c]).unwrap();

    graph.check_valid().unwrap();
    assert_eq!(graph.tensor(sum[0]).unwrap().shape(), &[4, 3]);
    assert_eq!(graph.successors(first), vec![second]);
    assert_eq!(graph.inputs(), vec![a, b, c]);
    assert_eq!(graph.outputs(), out);

    graph.shape_infer().unwrap();
    graph.data_malloc().unwrap();

    let ranges: Vec<_> = graph
        .tensors()
        .map(|t| {
            let blob = t.blob().unwrap();
            blob.offset..blob.offset + t.bytes()
        })
        .collect();
    for (i, x) in ranges.iter().enumerate() {
        for y in &ranges[i + 1..] {
            assert!(x.end <= y.start || y.end <= x.start, "{x:?} overlaps {y:?}");
        }
    }

    let (used, peak) = graph.memory_summary();
    assert_eq!(used, peak);
    assert_eq!(runtime.allocation_count(), 1);
    assert!(graph.to_string().contains("offset 0"));
}

#[test]
fn test_reshaped_input_propagates() {
    let mut graph = Graph::new(Arc::new(CpuRuntime::new()));
    let a = graph.add_tensor([2, 5], DataType::F32);
    let b = graph.add_tensor([1, 5], DataType::F32);
    let (_, out) = graph.add_op_with_outputs(Add, &[a, b]).unwrap();

    // Swap `a` for a batched tensor.
    let wide = graph.add_tensor([7, 2, 5], DataType::F32);
    let op = graph.tensor(out[0]).unwrap().source().unwrap();
    graph.replace_input(op, 0, wide).unwrap();
    graph.remove_tensor(a).unwrap();

    graph.check_valid().unwrap();
    graph.shape_infer().unwrap();
    assert_eq!(graph.tensor(out[0]).unwrap().shape(), &[7, 2, 5]);
}

#[test]
fn test_incompatible_broadcast_is_fatal() {
    let mut graph = Graph::new(Arc::new(CpuRuntime::new()));
    let a = graph.add_tensor([2, 3], DataType::F32);
    let b = graph.add_tensor([4, 3], DataType::F32);

    assert!(matches!(
        graph.add_op_with_outputs(Add, &[a, b]),
        Err(Error::Shape(_))
    ));
    assert_eq!(graph.op_count(), 0);
}
