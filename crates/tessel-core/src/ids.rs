//! Identifiers for tensors and operators.

use petgraph::graph::NodeIndex;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Identifier for an operator in a [`Graph`](crate::Graph).
///
/// Backed by the graph's stable node index: removing other operators never
/// invalidates it.
pub type OpId = NodeIndex;

/// Globally unique identifier of one tensor object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(u64);

impl TensorId {
    /// Get the underlying value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Family identifier: shared by every copy of the same logical tensor.
///
/// Imported copies of a tensor keep their family id, so two graphs can tell
/// they describe the same value even though the objects differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fuid(u64);

impl Fuid {
    /// Get the underlying value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues identifiers for one graph-building scope.
///
/// Cloning yields a handle to the same counter, so sibling graphs that share
/// a generator never hand out colliding ids.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: Rc<Cell<u64>>,
}

impl IdGenerator {
    /// Create a fresh generator.
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        let id = self.last.get() + 1;
        self.last.set(id);
        id
    }

    /// Issue a tensor guid.
    pub fn tensor_id(&self) -> TensorId {
        TensorId(self.bump())
    }

    /// Issue a tensor family id.
    pub fn fuid(&self) -> Fuid {
        Fuid(self.bump())
    }

    /// Issue an operator guid.
    pub fn op_guid(&self) -> u64 {
        self.bump()
    }
}
