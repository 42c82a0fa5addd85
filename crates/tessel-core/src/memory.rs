//! Arena memory planning.

use crate::Result;
use crate::graph::Graph;
use crate::ids::TensorId;
use crate::tensor::Blob;

impl Graph {
    /// Place every tensor in the graph's arena and bind it to memory.
    ///
    /// Sorts the graph, reserves one range per tensor object, materializes the
    /// arena with a single runtime request, then binds each tensor to
    /// `base + offset`. Ranges are never reused within one plan, so all
    /// placements are disjoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph has a cycle, if the arena was already
    /// materialized, or if the runtime cannot provide the buffer.
    #[tracing::instrument(skip_all, fields(tensors = self.tensor_count()))]
    pub fn data_malloc(&mut self) -> Result<()> {
        self.topo_sort()?;

        let mut offsets: Vec<(TensorId, usize)> = Vec::with_capacity(self.tensors.len());
        for tensor in self.tensors.values() {
            let offset = self.allocator.alloc(tensor.bytes())?;
            offsets.push((tensor.id, offset));
        }

        let base = self.allocator.materialize()?;
        for (id, offset) in offsets {
            let tensor = self.tensor_mut(id)?;
            tensor.blob = Some(Blob {
                offset,
                ptr: base.offset(offset),
            });
        }

        tracing::info!(
            used = self.allocator.used(),
            peak = self.allocator.peak(),
            "memory planned"
        );
        Ok(())
    }
}
