//! Tensors: typed, shaped values flowing between operators.

use crate::ids::{Fuid, OpId, TensorId};
use crate::types::{DataType, num_elements};
use std::fmt;
use std::sync::Arc;
use tessel_runtime::{DevicePtr, Runtime};

/// Memory bound to a tensor once the graph's arena is planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob {
    /// Byte offset inside the arena.
    pub offset: usize,

    /// Device address (`arena base + offset`).
    pub ptr: DevicePtr,
}

/// A tensor in a [`Graph`](crate::Graph).
///
/// Links to operators are non-owning ids; the graph keeps them consistent
/// with the operators' input and output lists.
#[derive(Debug, Clone)]
pub struct Tensor {
    pub(crate) id: TensorId,
    pub(crate) fuid: Fuid,
    pub(crate) shape: Vec<usize>,
    pub(crate) dtype: DataType,

    /// Producing operator; `None` for graph inputs.
    pub(crate) source: Option<OpId>,

    /// Consuming operators, without duplicates; empty for graph outputs.
    pub(crate) targets: Vec<OpId>,

    pub(crate) blob: Option<Blob>,
    pub(crate) runtime: Arc<dyn Runtime>,
}

impl Tensor {
    pub(crate) fn new(
        id: TensorId,
        fuid: Fuid,
        shape: Vec<usize>,
        dtype: DataType,
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        Self {
            id,
            fuid,
            shape,
            dtype,
            source: None,
            targets: Vec::new(),
            blob: None,
            runtime,
        }
    }

    /// Guid of this tensor object.
    pub fn id(&self) -> TensorId {
        self.id
    }

    /// Family id shared with every copy of this tensor.
    pub fn fuid(&self) -> Fuid {
        self.fuid
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        num_elements(&self.shape)
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the tensor's data in bytes.
    pub fn bytes(&self) -> usize {
        self.len() * self.dtype.size()
    }

    /// The operator producing this tensor, if any.
    pub fn source(&self) -> Option<OpId> {
        self.source
    }

    /// The operators consuming this tensor.
    pub fn targets(&self) -> &[OpId] {
        &self.targets
    }

    /// Memory bound by planning, if any.
    pub fn blob(&self) -> Option<Blob> {
        self.blob
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    /// No producer: the value is fed in from outside the graph.
    pub fn is_graph_input(&self) -> bool {
        self.source.is_none()
    }

    /// No consumers: the value leaves the graph.
    pub fn is_graph_output(&self) -> bool {
        self.targets.is_empty()
    }

    pub(crate) fn add_target(&mut self, op: OpId) {
        if !self.targets.contains(&op) {
            self.targets.push(op);
        }
    }

    pub(crate) fn remove_target(&mut self, op: OpId) {
        self.targets.retain(|&t| t != op);
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor {}, Fuid {}, shape {:?}, dtype {}",
            self.id, self.fuid, self.shape, self.dtype
        )?;
        if let Some(blob) = self.blob {
            write!(f, ", offset {}, ptr {}", blob.offset, blob.ptr)?;
        }
        Ok(())
    }
}
