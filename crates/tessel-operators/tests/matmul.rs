//! Tests for the MatMul operator.

mod common;

use common::{f32_inputs, graph, infer};
use tessel_core::Error;
use tessel_operators::MatMul;

#[test]
fn test_matmul_2d() {
    let mut op = MatMul::new(false, false);
    let shapes = infer(&mut op, &[&[3, 4], &[4, 5]]).unwrap();
    assert_eq!(shapes, vec![vec![3, 5]]);
    assert_eq!(op.mnk(), [3, 5, 4]);
}

#[test]
fn test_matmul_transpose_flags() {
    // A^T: [4, 3] -> [3, 4]
    let mut op = MatMul::new(true, false);
    assert_eq!(infer(&mut op, &[&[4, 3], &[4, 5]]).unwrap(), vec![vec![3, 5]]);

    // B^T: [5, 4] -> [4, 5]
    let mut op = MatMul::new(false, true);
    assert_eq!(infer(&mut op, &[&[3, 4], &[5, 4]]).unwrap(), vec![vec![3, 5]]);

    let mut op = MatMul::new(true, true);
    assert_eq!(infer(&mut op, &[&[4, 3], &[5, 4]]).unwrap(), vec![vec![3, 5]]);
    assert_eq!(op.mnk(), [3, 5, 4]);
}

#[test]
fn test_matmul_broadcasts_batch_axes() {
    let mut op = MatMul::new(false, false);
    let shapes = infer(&mut op, &[&[8, 4, 1, 16, 32], &[8, 1, 5, 32, 10]]).unwrap();
    assert_eq!(shapes, vec![vec![8, 4, 5, 16, 10]]);

    let mut op = MatMul::new(false, true);
    let shapes = infer(&mut op, &[&[1, 2, 7], &[6, 9, 7]]).unwrap();
    assert_eq!(shapes, vec![vec![6, 2, 9]]);
}

#[test]
fn test_matmul_rejects_contracted_mismatch() {
    let mut op = MatMul::new(false, false);
    let err = infer(&mut op, &[&[3, 4], &[5, 6]]).unwrap_err();
    assert!(matches!(err, Error::Shape(msg) if msg.contains("K dimensions")));

    // Valid without the flag, invalid with it.
    let mut op = MatMul::new(true, false);
    assert!(infer(&mut op, &[&[3, 4], &[4, 5]]).is_err());
}

#[test]
fn test_matmul_rejects_rank() {
    let mut op = MatMul::new(false, false);
    assert!(infer(&mut op, &[&[4], &[4]]).is_err());
    assert!(infer(&mut op, &[&[2, 3, 4], &[4, 5]]).is_err());
    assert!(infer(&mut op, &[&[2, 3]]).is_err());
}

#[test]
fn test_matmul_rejects_incompatible_batch() {
    let mut op = MatMul::new(false, false);
    let err = infer(&mut op, &[&[2, 3, 4], &[3, 4, 5]]).unwrap_err();
    assert!(matches!(err, Error::Shape(_)));
}

#[test]
fn test_matmul_in_graph() {
    let mut graph = graph();
    let inputs = f32_inputs(&mut graph, &[&[2, 3], &[3, 4]]);
    let (op, outputs) = graph
        .add_op_with_outputs(MatMul::new(false, false), &inputs)
        .unwrap();

    assert_eq!(graph.tensor(outputs[0]).unwrap().shape(), &[2, 4]);

    let node = graph.op(op).unwrap();
    assert_eq!(node.as_kind::<MatMul>().unwrap().mnk(), [2, 4, 3]);
    assert_eq!(
        node.to_string(),
        format!(
            "Matmul([A,B],A={},B={},C={},mnk=[2,4,3])",
            inputs[0], inputs[1], outputs[0]
        )
    );
}

#[test]
fn test_matmul_describe_flags() {
    let mut graph = graph();
    let inputs = f32_inputs(&mut graph, &[&[3, 2], &[4, 3]]);
    let (op, _) = graph
        .add_op_with_outputs(MatMul::new(true, true), &inputs)
        .unwrap();

    assert!(graph.op(op).unwrap().to_string().starts_with("Matmul([A^T,B^T],"));
}
