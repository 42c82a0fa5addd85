//! Shape manipulation operators.

use std::any::Any;
use std::fmt;
use tessel_core::{Error, Operator, Result, Shape, TensorId};

/// Transpose operator - permutes tensor axes.
///
/// Output axis `i` is input axis `perm[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transpose {
    perm: Vec<usize>,
}

impl Transpose {
    pub fn new(perm: impl Into<Vec<usize>>) -> Self {
        Self { perm: perm.into() }
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    /// Whether this transpose leaves every axis in place.
    pub fn is_identity(&self) -> bool {
        is_identity_perm(&self.perm)
    }

    /// The single permutation equivalent to applying `self`, then `next`.
    ///
    /// Returns `None` if the ranks differ or `next` names an axis out of
    /// range.
    pub fn then(&self, next: &Transpose) -> Option<Vec<usize>> {
        if self.perm.len() != next.perm.len() {
            return None;
        }
        next.perm
            .iter()
            .map(|&axis| self.perm.get(axis).copied())
            .collect()
    }

    /// Whether applying `next` after `self` restores the original axis order.
    pub fn cancels(&self, next: &Transpose) -> bool {
        self.then(next).is_some_and(|perm| is_identity_perm(&perm))
    }

    /// Whether this transpose swaps the last two axes and keeps every
    /// leading axis in place.
    pub fn swaps_last_two(&self) -> bool {
        let rank = self.perm.len();
        rank >= 2
            && is_identity_perm(&self.perm[..rank - 2])
            && self.perm[rank - 2] == rank - 1
            && self.perm[rank - 1] == rank - 2
    }
}

fn is_identity_perm(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(i, &axis)| i == axis)
}

impl Operator for Transpose {
    fn name(&self) -> &str {
        "Transpose"
    }

    fn infer_shapes(&mut self, inputs: &[&[usize]]) -> Result<Vec<Shape>> {
        let &[input] = inputs else {
            return Err(Error::Shape(format!(
                "Transpose requires one input, got {}",
                inputs.len()
            )));
        };

        if self.perm.len() != input.len() {
            return Err(Error::Shape(format!(
                "Transpose perm {:?} does not match input rank {}",
                self.perm,
                input.len()
            )));
        }
        let mut seen = vec![false; input.len()];
        for &axis in &self.perm {
            match seen.get_mut(axis) {
                Some(seen) if !*seen => *seen = true,
                _ => {
                    return Err(Error::Shape(format!(
                        "Transpose perm {:?} is not a permutation",
                        self.perm
                    )));
                }
            }
        }

        Ok(vec![self.perm.iter().map(|&axis| input[axis]).collect()])
    }

    fn describe(
        &self,
        f: &mut fmt::Formatter<'_>,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> fmt::Result {
        write!(
            f,
            "Transpose(perm={:?},input={:?},output={:?})",
            self.perm,
            inputs.iter().map(TensorId::get).collect::<Vec<_>>(),
            outputs.iter().map(TensorId::get).collect::<Vec<_>>()
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
