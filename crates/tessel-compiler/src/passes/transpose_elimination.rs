//! Redundant transpose elimination.

use tessel_core::{Graph, OpId, Result, RewriteRule, TensorId};
use tessel_operators::Transpose;

/// Removes a Transpose that undoes the Transpose feeding it.
///
/// Matches `y = T2(T1(x))` where applying T1's permutation and then T2's is
/// the identity. Every consumer of `y` is rewired to read `x`, and T2 is
/// deleted. T1 is deleted too when T2 was its only consumer; otherwise it
/// stays for the others.
///
/// `y` must have at least one consumer: a pair ending in a graph output is
/// left alone.
#[derive(Debug, Default)]
pub struct TransposeElimination;

impl TransposeElimination {
    pub fn new() -> Self {
        Self
    }
}

/// The single input and output of a transpose operator.
fn transpose_io(graph: &Graph, op: OpId) -> Result<Option<(&Transpose, TensorId, TensorId)>> {
    let node = graph.op(op)?;
    let Some(transpose) = node.as_kind::<Transpose>() else {
        return Ok(None);
    };
    match (node.inputs(), node.outputs()) {
        (&[input], &[output]) => Ok(Some((transpose, input, output))),
        _ => Ok(None),
    }
}

impl RewriteRule for TransposeElimination {
    fn name(&self) -> &str {
        "transpose_elimination"
    }

    fn match_and_splice(&self, graph: &mut Graph, op: OpId) -> Result<Option<Vec<OpId>>> {
        let Some((second, mid, output)) = transpose_io(graph, op)? else {
            return Ok(None);
        };
        let Some(first_op) = graph.tensor(mid)?.source() else {
            return Ok(None);
        };
        let Some((first, input, _)) = transpose_io(graph, first_op)? else {
            return Ok(None);
        };
        if !first.cancels(second) || graph.tensor(output)?.targets().is_empty() {
            return Ok(None);
        }

        graph.replace_all_uses(output, input)?;

        let mut dead = vec![op];
        if graph.tensor(mid)?.targets() == [op] {
            dead.push(first_op);
        }
        Ok(Some(dead))
    }
}
