//! Tensor dataflow graph.
//!
//! The graph is a directed graph where:
//! - **Operators** (`OpNode`) are petgraph nodes; a petgraph edge `a -> b`
//!   means some output of `a` is an input of `b` (predecessor/successor)
//! - **Tensors** (`Tensor`) live in a side-table keyed by [`TensorId`] and
//!   record their producing operator (source) and consuming operators
//!   (targets)
//!
//! All links are ids, never owning references. Every mutation goes through
//! the methods here, which keep the tensor links, the operators' input and
//! output lists, and the petgraph edges in agreement.

use crate::ids::{Fuid, IdGenerator, OpId, TensorId};
use crate::operator::{OpNode, Operator};
use crate::tensor::Tensor;
use crate::types::DataType;
use crate::{Error, Result};
use petgraph::Direction;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tessel_runtime::{Allocator, DEFAULT_ALIGNMENT, Runtime};

/// Graph-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Alignment, in bytes, of every tensor placed in the arena.
    pub alignment: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
        }
    }
}

// ──────────────────────────────── Graph ──────────────────────────────────

/// A tensor computation graph bound to one runtime.
#[derive(Debug)]
pub struct Graph {
    runtime: Arc<dyn Runtime>,
    ids: IdGenerator,

    /// All tensors, in creation order.
    pub(crate) tensors: BTreeMap<TensorId, Tensor>,

    /// Operators; edges are predecessor -> successor links.
    ops: StableGraph<OpNode, ()>,

    /// Operator order (insertion order until sorted).
    pub(crate) order: Vec<OpId>,

    pub(crate) allocator: Allocator,

    /// Whether `order` is known to be topological.
    sorted: bool,
}

impl Graph {
    /// Create an empty graph with the default configuration.
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self {
            allocator: Allocator::new(runtime.clone()),
            runtime,
            ids: IdGenerator::new(),
            tensors: BTreeMap::new(),
            ops: StableGraph::new(),
            order: Vec::new(),
            sorted: false,
        }
    }

    /// Create an empty graph with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured alignment is invalid.
    pub fn with_config(runtime: Arc<dyn Runtime>, config: GraphConfig) -> Result<Self> {
        let allocator = Allocator::with_alignment(runtime.clone(), config.alignment)?;
        Ok(Self {
            allocator,
            ..Self::new(runtime)
        })
    }

    /// Issue ids from a shared generator instead of a private one.
    ///
    /// Graphs that exchange tensors through [`import_tensor`](Self::import_tensor)
    /// should share a generator so family ids never collide.
    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub fn id_generator(&self) -> &IdGenerator {
        &self.ids
    }

    /// The allocator planning this graph's arena.
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// `(used, peak)` bytes of the arena.
    pub fn memory_summary(&self) -> (usize, usize) {
        (self.allocator.used(), self.allocator.peak())
    }

    // ── Tensor access ──

    /// Get a tensor.
    pub fn tensor(&self, id: TensorId) -> Result<&Tensor> {
        self.tensors.get(&id).ok_or(Error::TensorNotFound(id))
    }

    pub(crate) fn tensor_mut(&mut self, id: TensorId) -> Result<&mut Tensor> {
        self.tensors.get_mut(&id).ok_or(Error::TensorNotFound(id))
    }

    /// Iterate over all tensors in creation order.
    pub fn tensors(&self) -> impl Iterator<Item = &Tensor> {
        self.tensors.values()
    }

    /// Get the number of tensors.
    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    /// Find the tensor of a family, if this graph holds one.
    pub fn tensor_by_fuid(&self, fuid: Fuid) -> Option<TensorId> {
        self.tensors
            .values()
            .find(|tensor| tensor.fuid == fuid)
            .map(|tensor| tensor.id)
    }

    /// Tensors with no producer.
    pub fn inputs(&self) -> Vec<TensorId> {
        self.tensors
            .values()
            .filter(|tensor| tensor.is_graph_input())
            .map(|tensor| tensor.id)
            .collect()
    }

    /// Tensors with no consumer.
    pub fn outputs(&self) -> Vec<TensorId> {
        self.tensors
            .values()
            .filter(|tensor| tensor.is_graph_output())
            .map(|tensor| tensor.id)
            .collect()
    }

    // ── Operator access ──

    /// Get an operator.
    pub fn op(&self, id: OpId) -> Result<&OpNode> {
        self.ops.node_weight(id).ok_or(Error::OperatorNotFound(id))
    }

    /// Get an operator mutably (to change kind attributes).
    pub fn op_mut(&mut self, id: OpId) -> Result<&mut OpNode> {
        self.ops.node_weight_mut(id).ok_or(Error::OperatorNotFound(id))
    }

    /// Whether `id` names an operator of this graph.
    pub fn contains_op(&self, id: OpId) -> bool {
        self.ops.contains_node(id)
    }

    /// Iterate over operators in the current order.
    pub fn operators(&self) -> impl Iterator<Item = &OpNode> {
        self.order
            .iter()
            .filter_map(|&id| self.ops.node_weight(id))
    }

    /// Operator ids in the current order.
    pub fn op_order(&self) -> &[OpId] {
        &self.order
    }

    /// Get the number of operators.
    pub fn op_count(&self) -> usize {
        self.ops.node_count()
    }

    /// Operators producing this operator's inputs, ordered by guid.
    pub fn predecessors(&self, id: OpId) -> Vec<OpId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Operators consuming this operator's outputs, ordered by guid.
    pub fn successors(&self, id: OpId) -> Vec<OpId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: OpId, direction: Direction) -> Vec<OpId> {
        let mut neighbors: Vec<OpId> = self.ops.neighbors_directed(id, direction).collect();
        neighbors.sort_by_key(|&n| self.ops.node_weight(n).map(|node| node.guid));
        neighbors
    }

    /// Whether the operator order is known to be topological.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    fn op_label(&self, id: OpId) -> String {
        match self.ops.node_weight(id) {
            Some(node) => format!("{} {}", node.name(), node.guid),
            None => format!("{id:?}"),
        }
    }

    // ── Graph mutation ──

    /// Add a new tensor and return its id.
    pub fn add_tensor(&mut self, shape: impl Into<Vec<usize>>, dtype: DataType) -> TensorId {
        let id = self.ids.tensor_id();
        let fuid = self.ids.fuid();
        let tensor = Tensor::new(id, fuid, shape.into(), dtype, self.runtime.clone());
        self.tensors.insert(id, tensor);
        self.sorted = false;
        id
    }

    /// Add a detached copy of a tensor from another graph.
    ///
    /// The copy keeps the family id, shape and data type but none of the
    /// links or bound memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor belongs to a different runtime.
    pub fn import_tensor(&mut self, tensor: &Tensor) -> Result<TensorId> {
        if !Arc::ptr_eq(&tensor.runtime, &self.runtime) {
            return Err(Error::RuntimeMismatch(format!(
                "cannot add tensor {} from runtime '{}' to a graph on runtime '{}'",
                tensor.id,
                tensor.runtime.name(),
                self.runtime.name()
            )));
        }
        let id = self.ids.tensor_id();
        let copy = Tensor::new(
            id,
            tensor.fuid,
            tensor.shape.clone(),
            tensor.dtype,
            self.runtime.clone(),
        );
        self.tensors.insert(id, copy);
        self.sorted = false;
        Ok(id)
    }

    /// Add an operator and connect it to its tensors and neighbors.
    ///
    /// Every input registers the operator as a target and links it behind the
    /// input's producer; every output takes the operator as its source and
    /// links it in front of the output's existing consumers.
    ///
    /// # Errors
    ///
    /// Returns an error if a tensor is unknown, an output already has a
    /// producer, or a tensor is both an input and an output.
    pub fn add_op(
        &mut self,
        kind: impl Operator,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> Result<OpId> {
        self.add_boxed_op(Box::new(kind), inputs, outputs)
    }

    /// Add an operator whose output tensors are created from its inferred
    /// shapes. Outputs take the data type of the first input.
    pub fn add_op_with_outputs(
        &mut self,
        kind: impl Operator,
        inputs: &[TensorId],
    ) -> Result<(OpId, Vec<TensorId>)> {
        let mut kind: Box<dyn Operator> = Box::new(kind);
        let shapes = self.input_shapes(inputs)?;
        let shape_refs: Vec<&[usize]> = shapes.iter().map(Vec::as_slice).collect();
        let output_shapes = kind.infer_shapes(&shape_refs)?;

        let dtype = match inputs.first() {
            Some(&first) => self.tensor(first)?.dtype,
            None => {
                return Err(Error::InvalidGraph(format!(
                    "{} has no inputs to derive an output data type from",
                    kind.name()
                )));
            }
        };

        let outputs: Vec<TensorId> = output_shapes
            .into_iter()
            .map(|shape| self.add_tensor(shape, dtype))
            .collect();
        let id = self.add_boxed_op(kind, inputs, &outputs)?;
        Ok((id, outputs))
    }

    /// Add an already boxed operator kind.
    pub fn add_boxed_op(
        &mut self,
        kind: Box<dyn Operator>,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> Result<OpId> {
        for &tensor in inputs.iter().chain(outputs) {
            self.tensor(tensor)?;
        }
        for (i, &output) in outputs.iter().enumerate() {
            if inputs.contains(&output) || outputs[..i].contains(&output) {
                return Err(Error::InvalidGraph(format!(
                    "{}: tensor {output} is used twice as input/output",
                    kind.name()
                )));
            }
            if let Some(source) = self.tensor(output)?.source {
                return Err(Error::InvalidGraph(format!(
                    "{}: tensor {output} is already produced by {}",
                    kind.name(),
                    self.op_label(source)
                )));
            }
        }

        let guid = self.ids.op_guid();
        let id = self.ops.add_node(OpNode {
            id: OpId::default(),
            guid,
            kind,
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
        });
        if let Some(node) = self.ops.node_weight_mut(id) {
            node.id = id;
        }
        self.order.push(id);
        self.sorted = false;

        for &input in inputs {
            let source = {
                let tensor = self.tensor_mut(input)?;
                tensor.add_target(id);
                tensor.source
            };
            if let Some(source) = source {
                self.ops.update_edge(source, id, ());
            }
        }
        for &output in outputs {
            let targets = {
                let tensor = self.tensor_mut(output)?;
                tensor.source = Some(id);
                tensor.targets.clone()
            };
            for target in targets {
                self.ops.update_edge(id, target, ());
            }
        }

        tracing::trace!(op = %self.op_label(id), "operator added");
        Ok(id)
    }

    /// Remove an operator, disconnecting it from its tensors and neighbors.
    ///
    /// Its output tensors stay in the graph, now without a producer.
    pub fn remove_operator(&mut self, id: OpId) -> Result<()> {
        let node = self.ops.remove_node(id).ok_or(Error::OperatorNotFound(id))?;

        for input in &node.inputs {
            if let Some(tensor) = self.tensors.get_mut(input) {
                tensor.remove_target(id);
            }
        }
        for output in &node.outputs {
            if let Some(tensor) = self.tensors.get_mut(output) {
                if tensor.source == Some(id) {
                    tensor.source = None;
                }
            }
        }
        self.order.retain(|&op| op != id);
        self.sorted = false;

        tracing::trace!(op = node.name(), guid = node.guid, "operator removed");
        Ok(())
    }

    /// Remove a tensor that no operator references anymore.
    ///
    /// # Errors
    ///
    /// Returns an error if the tensor still has a producer or consumers.
    pub fn remove_tensor(&mut self, id: TensorId) -> Result<()> {
        let tensor = self.tensor(id)?;
        if let Some(source) = tensor.source {
            return Err(Error::InvalidGraph(format!(
                "cannot remove tensor {id}: still produced by {}",
                self.op_label(source)
            )));
        }
        if let Some(&target) = tensor.targets.first() {
            return Err(Error::InvalidGraph(format!(
                "cannot remove tensor {id}: still consumed by {}",
                self.op_label(target)
            )));
        }
        self.tensors.remove(&id);
        self.sorted = false;
        Ok(())
    }

    /// Make input slot `index` of `op` read `tensor` instead.
    ///
    /// Targets and predecessor links of both the old and the new tensor are
    /// updated; the old tensor keeps `op` as a target only if another slot
    /// still reads it.
    pub fn replace_input(&mut self, op: OpId, index: usize, tensor: TensorId) -> Result<()> {
        self.tensor(tensor)?;
        let label = self.op_label(op);
        let node = self.ops.node_weight_mut(op).ok_or(Error::OperatorNotFound(op))?;
        let slot = node.inputs.get_mut(index).ok_or_else(|| {
            Error::InvalidGraph(format!("{label} has no input {index}"))
        })?;
        let old = std::mem::replace(slot, tensor);
        if old == tensor {
            return Ok(());
        }
        let still_reads_old = node.inputs.contains(&old);

        if !still_reads_old {
            if let Some(old_tensor) = self.tensors.get_mut(&old) {
                old_tensor.remove_target(op);
            }
        }
        self.tensor_mut(tensor)?.add_target(op);
        self.relink_predecessors(op)?;
        self.sorted = false;
        Ok(())
    }

    /// Redirect every consumer of `old` to read `new`. Returns the number of
    /// input slots rewritten.
    pub fn replace_all_uses(&mut self, old: TensorId, new: TensorId) -> Result<usize> {
        self.tensor(new)?;
        let consumers = self.tensor(old)?.targets.clone();

        let mut rewritten = 0;
        for consumer in consumers {
            let slots: Vec<usize> = self
                .op(consumer)?
                .inputs
                .iter()
                .enumerate()
                .filter(|&(_, &input)| input == old)
                .map(|(slot, _)| slot)
                .collect();
            for slot in slots {
                self.replace_input(consumer, slot, new)?;
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    /// Recompute the incoming edges of `op` from the producers of its inputs.
    fn relink_predecessors(&mut self, op: OpId) -> Result<()> {
        let desired: HashSet<OpId> = self
            .op(op)?
            .inputs
            .iter()
            .filter_map(|input| self.tensors.get(input).and_then(|t| t.source))
            .collect();

        let stale: Vec<_> = self
            .ops
            .edges_directed(op, Direction::Incoming)
            .filter(|edge| !desired.contains(&edge.source()))
            .map(|edge| edge.id())
            .collect();
        for edge in stale {
            self.ops.remove_edge(edge);
        }
        for source in desired {
            self.ops.update_edge(source, op, ());
        }
        Ok(())
    }

    // ── Graph queries ──

    /// Reorder operators topologically.
    ///
    /// Each round scans the operators in their current order and places every
    /// operator whose inputs are all graph inputs or produced by an already
    /// placed operator, so independent operators keep their relative order.
    /// The result is cached until the next structural change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cycle`] if a round places nothing.
    pub fn topo_sort(&mut self) -> Result<()> {
        if self.sorted {
            return Ok(());
        }

        let mut placed: HashSet<OpId> = HashSet::with_capacity(self.order.len());
        let mut sorted = Vec::with_capacity(self.order.len());

        while sorted.len() < self.order.len() {
            let mut progressed = false;
            for &op in &self.order {
                if placed.contains(&op) {
                    continue;
                }
                let ready = self.op(op)?.inputs.iter().all(|input| {
                    match self.tensors.get(input).and_then(|t| t.source) {
                        Some(source) => placed.contains(&source),
                        None => true,
                    }
                });
                if ready {
                    placed.insert(op);
                    sorted.push(op);
                    progressed = true;
                }
            }

            if !progressed {
                let stuck = self
                    .order
                    .iter()
                    .filter(|op| !placed.contains(op))
                    .filter_map(|&op| self.ops.node_weight(op).map(|node| node.guid))
                    .collect();
                return Err(Error::Cycle(stuck));
            }
        }

        self.order = sorted;
        self.sorted = true;
        Ok(())
    }

    /// Check the structural invariants of the graph.
    ///
    /// - every tensor has a producer or a consumer, and those operators exist
    ///   and list the tensor among their outputs / inputs
    /// - every operator's tensors exist
    /// - predecessor/successor links are exactly the links induced by shared
    ///   tensors
    /// - no two tensors share a family id
    ///
    /// A failure means a caller or a rewrite pass corrupted the graph.
    pub fn check_valid(&self) -> Result<()> {
        for tensor in self.tensors.values() {
            let id = tensor.id;
            if tensor.source.is_none() && tensor.targets.is_empty() {
                return Err(Error::InvalidGraph(format!(
                    "tensor {id} has neither a source nor targets"
                )));
            }
            if let Some(source) = tensor.source {
                let node = self.op(source).map_err(|_| {
                    Error::InvalidGraph(format!("tensor {id} source {source:?} is not in the graph"))
                })?;
                if !node.outputs.contains(&id) {
                    return Err(Error::InvalidGraph(format!(
                        "tensor {id} names {} as source, which does not output it",
                        self.op_label(source)
                    )));
                }
            }
            for &target in &tensor.targets {
                let node = self.op(target).map_err(|_| {
                    Error::InvalidGraph(format!("tensor {id} target {target:?} is not in the graph"))
                })?;
                if !node.inputs.contains(&id) {
                    return Err(Error::InvalidGraph(format!(
                        "tensor {id} names {} as target, which does not read it",
                        self.op_label(target)
                    )));
                }
            }
        }

        if self.order.len() != self.ops.node_count() {
            return Err(Error::InvalidGraph(format!(
                "operator order lists {} operators but the graph holds {}",
                self.order.len(),
                self.ops.node_count()
            )));
        }

        for node in self.operators() {
            let label = self.op_label(node.id);
            for tensor in node.inputs.iter().chain(&node.outputs) {
                if !self.tensors.contains_key(tensor) {
                    return Err(Error::InvalidGraph(format!(
                        "{label} references tensor {tensor}, which is not in the graph"
                    )));
                }
            }
            for input in &node.inputs {
                if !self.tensors[input].targets.contains(&node.id) {
                    return Err(Error::InvalidGraph(format!(
                        "{label} reads tensor {input}, which does not list it as a target"
                    )));
                }
            }

            let induced: HashSet<OpId> = node
                .inputs
                .iter()
                .filter_map(|input| self.tensors[input].source)
                .collect();
            let linked: HashSet<OpId> = self
                .ops
                .neighbors_directed(node.id, Direction::Incoming)
                .collect();
            if induced != linked {
                return Err(Error::InvalidGraph(format!(
                    "{label} predecessors {:?} disagree with its input producers {:?}",
                    linked, induced
                )));
            }
        }

        let mut fuids = HashSet::with_capacity(self.tensors.len());
        for tensor in self.tensors.values() {
            if !fuids.insert(tensor.fuid) {
                return Err(Error::InvalidGraph(format!(
                    "tensor {} repeats family id {}",
                    tensor.id, tensor.fuid
                )));
            }
        }

        Ok(())
    }

    /// Shapes of the given tensors.
    pub(crate) fn input_shapes(&self, inputs: &[TensorId]) -> Result<Vec<Vec<usize>>> {
        inputs
            .iter()
            .map(|&input| self.tensor(input).map(|t| t.shape.clone()))
            .collect()
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guid = |op: &OpId| self.ops.node_weight(*op).map(|node| node.guid);

        writeln!(f, "Graph Tensors:")?;
        for tensor in self.tensors.values() {
            let source = match tensor.source.as_ref().and_then(guid) {
                Some(source) => source.to_string(),
                None => "None".to_string(),
            };
            let targets: Vec<u64> = tensor.targets.iter().filter_map(guid).collect();
            writeln!(f, "{tensor}, source {source}, targets {targets:?}")?;
        }

        writeln!(f, "Graph operators:")?;
        for node in self.operators() {
            let preds: Vec<u64> = self.predecessors(node.id).iter().filter_map(guid).collect();
            let succs: Vec<u64> = self.successors(node.id).iter().filter_map(guid).collect();
            writeln!(
                f,
                "OP {}, pred {:?}, succ {:?}, {}",
                node.guid, preds, succs, node
            )?;
        }

        write!(f, "{}", self.allocator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Shape;
    use std::any::Any;
    use tessel_runtime::CpuRuntime;

    /// Elementwise mock: every output has the first input's shape.
    #[derive(Debug)]
    struct Mock;

    impl Operator for Mock {
        fn name(&self) -> &str {
            "Mock"
        }

        fn infer_shapes(&mut self, inputs: &[&[usize]]) -> Result<Vec<Shape>> {
            Ok(vec![inputs[0].to_vec()])
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn graph() -> Graph {
        Graph::new(Arc::new(CpuRuntime::new()))
    }

    #[test]
    fn test_create_empty_graph() {
        let graph = graph();
        assert_eq!(graph.op_count(), 0);
        assert_eq!(graph.tensor_count(), 0);
        assert!(graph.check_valid().is_ok());
    }

    #[test]
    fn test_add_tensor() {
        let mut graph = graph();
        let id = graph.add_tensor([1, 2, 3], DataType::F32);

        let tensor = graph.tensor(id).unwrap();
        assert_eq!(tensor.shape(), &[1, 2, 3]);
        assert_eq!(tensor.bytes(), 24);
        assert!(tensor.is_graph_input());
        assert!(tensor.is_graph_output());
        assert_eq!(graph.tensor_by_fuid(tensor.fuid()), Some(id));
    }

    #[test]
    fn test_add_op_connects_both_directions() {
        let mut graph = graph();
        let t0 = graph.add_tensor([2], DataType::F32);
        let t1 = graph.add_tensor([2], DataType::F32);
        let t2 = graph.add_tensor([2], DataType::F32);

        // Consumer first, so the producer has to link forward.
        let b = graph.add_op(Mock, &[t1], &[t2]).unwrap();
        let a = graph.add_op(Mock, &[t0], &[t1]).unwrap();

        assert_eq!(graph.tensor(t1).unwrap().source(), Some(a));
        assert_eq!(graph.tensor(t1).unwrap().targets(), &[b]);
        assert_eq!(graph.successors(a), vec![b]);
        assert_eq!(graph.predecessors(b), vec![a]);
        assert!(!graph.is_sorted());
        graph.check_valid().unwrap();
    }

    #[test]
    fn test_add_op_rejects_second_producer() {
        let mut graph = graph();
        let t0 = graph.add_tensor([2], DataType::F32);
        let t1 = graph.add_tensor([2], DataType::F32);
        graph.add_op(Mock, &[t0], &[t1]).unwrap();

        let err = graph.add_op(Mock, &[t0], &[t1]).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
        assert_eq!(graph.op_count(), 1);
    }

    #[test]
    fn test_add_op_with_outputs() {
        let mut graph = graph();
        let x = graph.add_tensor([4, 5], DataType::I64);
        let (op, outputs) = graph.add_op_with_outputs(Mock, &[x]).unwrap();

        assert_eq!(outputs.len(), 1);
        let y = graph.tensor(outputs[0]).unwrap();
        assert_eq!(y.shape(), &[4, 5]);
        assert_eq!(y.dtype(), DataType::I64);
        assert_eq!(y.source(), Some(op));
    }

    #[test]
    fn test_remove_operator() {
        let mut graph = graph();
        let t0 = graph.add_tensor([2, 2], DataType::F32);
        let t1 = graph.add_tensor([2, 2], DataType::F32);
        let t2 = graph.add_tensor([2, 2], DataType::F32);
        let a = graph.add_op(Mock, &[t0], &[t1]).unwrap();
        let b = graph.add_op(Mock, &[t1], &[t2]).unwrap();

        graph.remove_operator(b).unwrap();

        assert_eq!(graph.op_count(), 1);
        assert!(graph.tensor(t1).unwrap().targets().is_empty());
        assert_eq!(graph.tensor(t2).unwrap().source(), None);
        assert!(graph.successors(a).is_empty());
        assert_eq!(graph.op_order(), &[a]);

        // t2 is now dangling until it is removed.
        assert!(graph.check_valid().is_err());
        graph.remove_tensor(t2).unwrap();
        graph.check_valid().unwrap();
    }

    #[test]
    fn test_remove_tensor_still_referenced() {
        let mut graph = graph();
        let t0 = graph.add_tensor([2], DataType::F32);
        let t1 = graph.add_tensor([2], DataType::F32);
        graph.add_op(Mock, &[t0], &[t1]).unwrap();

        assert!(graph.remove_tensor(t0).is_err());
        assert!(graph.remove_tensor(t1).is_err());
        assert_eq!(graph.tensor_count(), 2);
    }

    #[test]
    fn test_replace_input_relinks_predecessors() {
        let mut graph = graph();
        let x = graph.add_tensor([3], DataType::F32);
        let y = graph.add_tensor([3], DataType::F32);
        let z = graph.add_tensor([3], DataType::F32);
        let w = graph.add_tensor([3], DataType::F32);
        let out = graph.add_tensor([3], DataType::F32);

        let a = graph.add_op(Mock, &[x], &[y]).unwrap();
        let b = graph.add_op(Mock, &[x], &[z]).unwrap();
        let c = graph.add_op(Mock, &[y, w], &[out]).unwrap();
        assert_eq!(graph.predecessors(c), vec![a]);

        graph.replace_input(c, 0, z).unwrap();

        assert_eq!(graph.predecessors(c), vec![b]);
        assert!(graph.successors(a).is_empty());
        assert!(graph.tensor(y).unwrap().targets().is_empty());
        assert_eq!(graph.tensor(z).unwrap().targets(), &[c]);
        graph.check_valid().unwrap();
    }

    #[test]
    fn test_replace_input_keeps_target_for_other_slot() {
        let mut graph = graph();
        let x = graph.add_tensor([3], DataType::F32);
        let y = graph.add_tensor([3], DataType::F32);
        let out = graph.add_tensor([3], DataType::F32);
        let op = graph.add_op(Mock, &[x, x], &[out]).unwrap();

        graph.replace_input(op, 1, y).unwrap();

        assert_eq!(graph.tensor(x).unwrap().targets(), &[op]);
        assert_eq!(graph.tensor(y).unwrap().targets(), &[op]);
        assert_eq!(graph.op(op).unwrap().inputs(), &[x, y]);
    }

    #[test]
    fn test_replace_all_uses() {
        let mut graph = graph();
        let x = graph.add_tensor([3], DataType::F32);
        let y = graph.add_tensor([3], DataType::F32);
        let o1 = graph.add_tensor([3], DataType::F32);
        let o2 = graph.add_tensor([3], DataType::F32);
        let c1 = graph.add_op(Mock, &[x, x], &[o1]).unwrap();
        let c2 = graph.add_op(Mock, &[x], &[o2]).unwrap();

        assert_eq!(graph.replace_all_uses(x, y).unwrap(), 3);

        assert!(graph.tensor(x).unwrap().targets().is_empty());
        assert_eq!(graph.tensor(y).unwrap().targets(), &[c1, c2]);
    }

    #[test]
    fn test_topological_order() {
        let mut graph = graph();
        let t0 = graph.add_tensor([2], DataType::F32);
        let t1 = graph.add_tensor([2], DataType::F32);
        let t2 = graph.add_tensor([2], DataType::F32);
        let t3 = graph.add_tensor([2], DataType::F32);

        let c = graph.add_op(Mock, &[t2], &[t3]).unwrap();
        let b = graph.add_op(Mock, &[t1], &[t2]).unwrap();
        let a = graph.add_op(Mock, &[t0], &[t1]).unwrap();

        graph.topo_sort().unwrap();
        assert_eq!(graph.op_order(), &[a, b, c]);
        assert!(graph.is_sorted());
    }

    #[test]
    fn test_topological_order_keeps_independent_order() {
        let mut graph = graph();
        let x = graph.add_tensor([2], DataType::F32);
        let y = graph.add_tensor([2], DataType::F32);
        let p = graph.add_tensor([2], DataType::F32);
        let q = graph.add_tensor([2], DataType::F32);
        let r = graph.add_tensor([2], DataType::F32);

        let join = graph.add_op(Mock, &[p, q], &[r]).unwrap();
        let first = graph.add_op(Mock, &[x], &[p]).unwrap();
        let second = graph.add_op(Mock, &[y], &[q]).unwrap();

        graph.topo_sort().unwrap();
        assert_eq!(graph.op_order(), &[first, second, join]);
    }

    #[test]
    fn test_topological_sort_detects_cycle() {
        let mut graph = graph();
        let x = graph.add_tensor([2], DataType::F32);
        let y = graph.add_tensor([2], DataType::F32);
        graph.add_op(Mock, &[x], &[y]).unwrap();
        graph.add_op(Mock, &[y], &[x]).unwrap();

        assert!(matches!(graph.topo_sort(), Err(Error::Cycle(ops)) if ops.len() == 2));
        assert!(!graph.is_sorted());
    }

    #[test]
    fn test_check_valid_rejects_dangling_tensor() {
        let mut graph = graph();
        let t0 = graph.add_tensor([2], DataType::F32);
        let t1 = graph.add_tensor([2], DataType::F32);
        graph.add_op(Mock, &[t0], &[t1]).unwrap();
        graph.check_valid().unwrap();

        graph.add_tensor([7], DataType::F32);
        assert!(matches!(graph.check_valid(), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_import_tensor_keeps_family() {
        let runtime: Arc<dyn Runtime> = Arc::new(CpuRuntime::new());
        let ids = IdGenerator::new();
        let mut source = Graph::new(runtime.clone()).with_id_generator(ids.clone());
        let mut target = Graph::new(runtime).with_id_generator(ids);

        let original = source.add_tensor([2, 8], DataType::F16);
        let copy = target
            .import_tensor(source.tensor(original).unwrap())
            .unwrap();

        let original = source.tensor(original).unwrap();
        let copy = target.tensor(copy).unwrap();
        assert_ne!(original.id(), copy.id());
        assert_eq!(original.fuid(), copy.fuid());
        assert_eq!(copy.shape(), &[2, 8]);
        assert_eq!(copy.dtype(), DataType::F16);
    }

    #[test]
    fn test_import_tensor_rejects_other_runtime() {
        let mut a = graph();
        let mut b = graph();
        let t = a.add_tensor([1], DataType::F32);

        let err = b.import_tensor(a.tensor(t).unwrap()).unwrap_err();
        assert!(matches!(err, Error::RuntimeMismatch(_)));
    }

    #[test]
    fn test_import_into_same_graph_repeats_fuid() {
        let mut graph = graph();
        let x = graph.add_tensor([2], DataType::F32);
        let y = graph.add_tensor([2], DataType::F32);
        graph.add_op(Mock, &[x], &[y]).unwrap();

        let dup = graph.import_tensor(&graph.tensor(x).unwrap().clone()).unwrap();
        graph.add_op(Mock, &[dup], &[]).unwrap();

        assert!(matches!(graph.check_valid(), Err(Error::InvalidGraph(msg)) if msg.contains("family")));
    }

    #[test]
    fn test_display() {
        let mut graph = graph();
        let t0 = graph.add_tensor([2], DataType::F32);
        let t1 = graph.add_tensor([2], DataType::F32);
        graph.add_op(Mock, &[t0], &[t1]).unwrap();

        let dump = graph.to_string();
        assert!(dump.starts_with("Graph Tensors:\n"));
        assert!(dump.contains("Graph operators:\n"));
        assert!(dump.contains("pred [], succ []"));
        assert!(dump.ends_with("Used memory: 0, peak memory: 0"));
    }
}
