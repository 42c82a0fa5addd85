//! Broadcasting helper for batch dimensions.

use crate::{Error, Result};

/// Compute the NumPy-style broadcast of two shapes.
///
/// - Shapes are aligned from the rightmost dimension
/// - Dimensions match if they are equal or one of them is 1
/// - Missing dimensions in the shorter shape count as 1
///
/// # Example
///
/// ```text
/// broadcast_shape(&[8, 4, 1], &[8, 1, 5]) -> [8, 4, 5]
/// broadcast_shape(&[2, 3, 4], &[3, 4])    -> [2, 3, 4]
/// ```
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let rank = a.len().max(b.len());
    let dim = |shape: &[usize], i: usize| {
        let pad = rank - shape.len();
        if i < pad { 1 } else { shape[i - pad] }
    };

    (0..rank)
        .map(|i| match (dim(a, i), dim(b, i)) {
            (da, db) if da == db => Ok(da),
            (1, db) => Ok(db),
            (da, 1) => Ok(da),
            _ => Err(Error::Shape(format!(
                "Cannot broadcast shapes {a:?} and {b:?} at dimension {i}"
            ))),
        })
        .collect()
}
