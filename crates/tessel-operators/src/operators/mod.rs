//! Operator implementations.

mod matmul;
mod shape;

pub use matmul::MatMul;
pub use shape::Transpose;
