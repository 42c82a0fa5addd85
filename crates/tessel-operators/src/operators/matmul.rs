//! Matrix multiplication operator.

use std::any::Any;
use std::fmt;
use tessel_core::{Error, Operator, Result, Shape, TensorId, broadcast_shape};

/// Batched matrix multiplication `C = op(A) × op(B)`.
///
/// `op(X)` is `X`, or `X` with its last two axes swapped when the operand's
/// transpose flag is set:
/// - op(A): [...batch..., M, K]
/// - op(B): [...batch..., K, N]
/// - C: [...broadcast batch..., M, N]
///
/// Both operands must have the same rank, at least 2. Batch axes broadcast
/// pairwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatMul {
    trans_a: bool,
    trans_b: bool,

    // Recorded by the last shape inference.
    m: usize,
    n: usize,
    k: usize,
}

impl MatMul {
    pub fn new(trans_a: bool, trans_b: bool) -> Self {
        Self {
            trans_a,
            trans_b,
            ..Self::default()
        }
    }

    /// Whether A is read with its last two axes swapped.
    pub fn trans_a(&self) -> bool {
        self.trans_a
    }

    /// Whether B is read with its last two axes swapped.
    pub fn trans_b(&self) -> bool {
        self.trans_b
    }

    pub fn set_trans_a(&mut self, trans_a: bool) {
        self.trans_a = trans_a;
    }

    pub fn set_trans_b(&mut self, trans_b: bool) {
        self.trans_b = trans_b;
    }

    /// `[m, n, k]` from the last shape inference; zeros before the first.
    pub fn mnk(&self) -> [usize; 3] {
        [self.m, self.n, self.k]
    }
}

impl Operator for MatMul {
    fn name(&self) -> &str {
        "MatMul"
    }

    fn infer_shapes(&mut self, inputs: &[&[usize]]) -> Result<Vec<Shape>> {
        let &[a, b] = inputs else {
            return Err(Error::Shape(format!(
                "MatMul requires two inputs, got {}",
                inputs.len()
            )));
        };

        if a.len() != b.len() || a.len() < 2 {
            return Err(Error::Shape(format!(
                "MatMul requires operands of equal rank >= 2, got A: {:?}, B: {:?}",
                a, b
            )));
        }

        let rank = a.len();
        let (m, k_a) = if self.trans_a {
            (a[rank - 1], a[rank - 2])
        } else {
            (a[rank - 2], a[rank - 1])
        };
        let (k_b, n) = if self.trans_b {
            (b[rank - 1], b[rank - 2])
        } else {
            (b[rank - 2], b[rank - 1])
        };

        if k_a != k_b {
            return Err(Error::Shape(format!(
                "MatMul K dimensions must match, got A: {:?} (trans_a={}), B: {:?} (trans_b={})",
                a, self.trans_a, b, self.trans_b
            )));
        }

        let mut output = broadcast_shape(&a[..rank - 2], &b[..rank - 2])?;
        output.extend([m, n]);

        self.m = m;
        self.n = n;
        self.k = k_a;
        Ok(vec![output])
    }

    fn describe(
        &self,
        f: &mut fmt::Formatter<'_>,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> fmt::Result {
        let id = |ids: &[TensorId], i: usize| match ids.get(i) {
            Some(id) => id.to_string(),
            None => "?".to_string(),
        };
        write!(
            f,
            "Matmul([{},{}],A={},B={},C={},mnk=[{},{},{}])",
            if self.trans_a { "A^T" } else { "A" },
            if self.trans_b { "B^T" } else { "B" },
            id(inputs, 0),
            id(inputs, 1),
            id(outputs, 0),
            self.m,
            self.n,
            self.k
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
