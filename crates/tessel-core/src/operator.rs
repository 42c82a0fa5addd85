//! Operator trait for extensible operator kinds.

use crate::Result;
use crate::ids::{OpId, TensorId};
use crate::types::Shape;
use std::any::Any;
use std::fmt;

/// Trait for implementing operator kinds.
///
/// An operator kind carries the attributes specific to one operation
/// (e.g. a permutation for Transpose, transpose flags for MatMul) and knows
/// how to derive output shapes from input shapes. Graph wiring (inputs,
/// outputs, neighbors) lives in [`OpNode`], not here.
///
/// Rewrite passes recognise kinds by downcasting through
/// [`as_any`](Operator::as_any); a kind a pass does not know simply fails to
/// downcast and is left alone.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct Relu;
///
/// impl Operator for Relu {
///     fn name(&self) -> &str {
///         "Relu"
///     }
///
///     fn infer_shapes(&mut self, inputs: &[&[usize]]) -> Result<Vec<Shape>> {
///         Ok(vec![inputs[0].to_vec()])
///     }
///
///     fn as_any(&self) -> &dyn Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn Any { self }
/// }
/// ```
pub trait Operator: fmt::Debug + 'static {
    /// Get the operator name (e.g., "MatMul", "Transpose").
    fn name(&self) -> &str;

    /// Compute output shapes from input shapes.
    ///
    /// Takes `&mut self` so kinds can cache dimensions derived from their
    /// inputs (MatMul records m, n and k).
    fn infer_shapes(&mut self, inputs: &[&[usize]]) -> Result<Vec<Shape>>;

    /// Render this operator for graph dumps.
    fn describe(
        &self,
        f: &mut fmt::Formatter<'_>,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> fmt::Result {
        write!(
            f,
            "{}(inputs={:?}, outputs={:?})",
            self.name(),
            inputs.iter().map(TensorId::get).collect::<Vec<_>>(),
            outputs.iter().map(TensorId::get).collect::<Vec<_>>()
        )
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Operator {
    /// Whether this operator is of kind `T`.
    pub fn is<T: Operator>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Downcast to a concrete kind.
    pub fn downcast_ref<T: Operator>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcast to a concrete kind, mutably.
    pub fn downcast_mut<T: Operator>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// An operator placed in a graph: its kind plus ordered tensor lists.
#[derive(Debug)]
pub struct OpNode {
    pub(crate) id: OpId,
    pub(crate) guid: u64,
    pub(crate) kind: Box<dyn Operator>,
    pub(crate) inputs: Vec<TensorId>,
    pub(crate) outputs: Vec<TensorId>,
}

impl OpNode {
    /// Graph index of this operator.
    pub fn id(&self) -> OpId {
        self.id
    }

    /// Unique id used in dumps and diagnostics.
    pub fn guid(&self) -> u64 {
        self.guid
    }

    /// Get the operator name.
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn kind(&self) -> &dyn Operator {
        self.kind.as_ref()
    }

    pub fn kind_mut(&mut self) -> &mut dyn Operator {
        self.kind.as_mut()
    }

    /// Downcast the kind to `T`.
    pub fn as_kind<T: Operator>(&self) -> Option<&T> {
        self.kind.downcast_ref::<T>()
    }

    /// Downcast the kind to `T`, mutably.
    pub fn as_kind_mut<T: Operator>(&mut self) -> Option<&mut T> {
        self.kind.downcast_mut::<T>()
    }

    /// Input tensor ids, in operand order.
    pub fn inputs(&self) -> &[TensorId] {
        &self.inputs
    }

    /// Output tensor ids, in result order.
    pub fn outputs(&self) -> &[TensorId] {
        &self.outputs
    }
}

impl fmt::Display for OpNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.describe(f, &self.inputs, &self.outputs)
    }
}
