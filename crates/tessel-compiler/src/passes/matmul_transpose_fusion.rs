//! MatMul–Transpose fusion.

use tessel_core::{Graph, OpId, Result, RewriteRule};
use tessel_operators::{MatMul, Transpose};

/// Folds a trailing-axes Transpose into a MatMul's transpose flag.
///
/// Matches a MatMul with both flags unset whose left and/or right operand is
/// produced by a Transpose that swaps the last two axes and keeps every
/// leading axis in place. Each side is checked on its own: the MatMul reads
/// the Transpose's input directly and sets the flag for that side.
///
/// A Transpose whose output is still read elsewhere survives; otherwise it is
/// deleted.
#[derive(Debug, Default)]
pub struct MatMulTransposeFusion;

impl MatMulTransposeFusion {
    pub fn new() -> Self {
        Self
    }
}

impl RewriteRule for MatMulTransposeFusion {
    fn name(&self) -> &str {
        "matmul_transpose_fusion"
    }

    fn match_and_splice(&self, graph: &mut Graph, op: OpId) -> Result<Option<Vec<OpId>>> {
        let node = graph.op(op)?;
        let Some(matmul) = node.as_kind::<MatMul>() else {
            return Ok(None);
        };
        if matmul.trans_a() || matmul.trans_b() || node.inputs().len() != 2 {
            return Ok(None);
        }
        let operands = node.inputs().to_vec();

        let mut fused = Vec::new();
        for (slot, operand) in operands.into_iter().enumerate() {
            let Some(source) = graph.tensor(operand)?.source() else {
                continue;
            };
            let transpose = graph.op(source)?;
            let &[input] = transpose.inputs() else {
                continue;
            };
            if !transpose
                .as_kind::<Transpose>()
                .is_some_and(Transpose::swaps_last_two)
            {
                continue;
            }

            graph.replace_input(op, slot, input)?;
            if let Some(matmul) = graph.op_mut(op)?.as_kind_mut::<MatMul>() {
                match slot {
                    0 => matmul.set_trans_a(true),
                    _ => matmul.set_trans_b(true),
                }
            }
            fused.push((source, operand));
        }

        if fused.is_empty() {
            return Ok(None);
        }

        let mut dead = Vec::new();
        for (transpose, output) in fused {
            if graph.tensor(output)?.targets().is_empty() && !dead.contains(&transpose) {
                dead.push(transpose);
            }
        }
        Ok(Some(dead))
    }
}
