//! Operator kinds for tessel.
//!
//! # Operators
//!
//! - Matrix operations ([`MatMul`], with transpose flags on either operand)
//! - Shape manipulation ([`Transpose`])
//!
//! Both implement [`tessel_core::Operator`]; rewrite passes find them by
//! downcasting an operator node's kind.

pub mod operators;

pub use operators::{MatMul, Transpose};
