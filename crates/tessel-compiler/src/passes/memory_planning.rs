//! Memory planning pass.

use tessel_core::{Graph, Pass, Result, Stage};

/// Pass that places every tensor in the graph's arena.
#[derive(Debug, Default)]
pub struct MemoryPlanningPass;

impl MemoryPlanningPass {
    pub fn new() -> Self {
        Self
    }
}

impl Pass for MemoryPlanningPass {
    fn name(&self) -> &str {
        "memory_planning"
    }

    fn stage(&self) -> Stage {
        Stage::Planning
    }

    fn run(&self, graph: &mut Graph) -> Result<bool> {
        graph.data_malloc()?;
        Ok(true)
    }
}
