//! Graph optimizer and compilation pipeline for tessel.
//!
//! The compiler is organized as a pipeline of passes that run in stages:
//! 1. **Optimization** - Rewrite the graph (redundant transpose elimination,
//!    then MatMul–Transpose fusion)
//! 2. **Inference** - Sort the graph and propagate tensor shapes
//! 3. **Planning** - Place every tensor in one memory arena
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessel_compiler::compile;
//! use tessel_core::{CpuRuntime, DataType, Graph};
//! use tessel_operators::{MatMul, Transpose};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut graph = Graph::new(Arc::new(CpuRuntime::new()));
//! let a = graph.add_tensor([4, 8], DataType::F32);
//! let b = graph.add_tensor([16, 8], DataType::F32);
//! let (_, bt) = graph.add_op_with_outputs(Transpose::new([1, 0]), &[b])?;
//! graph.add_op_with_outputs(MatMul::new(false, false), &[a, bt[0]])?;
//!
//! compile(&mut graph)?;
//! println!("{graph}");
//! # Ok(())
//! # }
//! ```

pub mod passes;

pub use passes::{
    MatMulTransposeFusion, MemoryPlanningPass, RewritePass, ShapeInferencePass,
    TransposeElimination,
};

// Re-export commonly used types from tessel-core
pub use tessel_core::{Graph, Pass, RewriteRule, Stage};

use tessel_core::Result;

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Upper bound on how many times the optimization stage runs. Rounds stop
    /// early once no optimization pass changes the graph.
    pub max_optimize_rounds: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_optimize_rounds: 1,
        }
    }
}

/// Compiler pipeline with pluggable passes.
///
/// The pipeline runs in fixed stages: Optimization → Inference → Planning.
/// Built-in passes are registered in their respective stages, and custom
/// passes can be added via `add_pass()`.
pub struct CompilerPipeline {
    /// All passes to run, ordered by (stage, registration order).
    passes: Vec<Box<dyn Pass>>,

    config: PipelineConfig,
}

impl CompilerPipeline {
    /// Create a pipeline with built-in passes.
    ///
    /// The built-in passes are:
    /// - `transpose_elimination` (Optimization stage)
    /// - `matmul_transpose_fusion` (Optimization stage)
    /// - `ShapeInferencePass` (Inference stage)
    /// - `MemoryPlanningPass` (Planning stage)
    pub fn new(config: PipelineConfig) -> Self {
        let mut pipeline = Self::empty(config);

        // Elimination first: fusion matches against the transposes that survive it.
        pipeline.add_pass(RewritePass::new(TransposeElimination::new()));
        pipeline.add_pass(RewritePass::new(MatMulTransposeFusion::new()));
        pipeline.add_pass(ShapeInferencePass::new());
        pipeline.add_pass(MemoryPlanningPass::new());

        pipeline
    }

    /// Create a pipeline with no passes.
    pub fn empty(config: PipelineConfig) -> Self {
        Self {
            passes: Vec::new(),
            config,
        }
    }

    /// Add a custom pass to the pipeline.
    ///
    /// The pass will be inserted into the appropriate stage (determined by
    /// `pass.stage()`). Within a stage, passes run in the order they were
    /// registered.
    ///
    /// # Returns
    ///
    /// Returns a mutable reference to self for method chaining.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        // Stable, so registration order survives within a stage.
        self.passes.sort_by_key(|p| p.stage());
        self
    }

    /// Names of the registered passes, in run order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run only the Optimization stage.
    ///
    /// The stage is repeated until a round changes nothing or
    /// `max_optimize_rounds` rounds have run. Returns whether any pass
    /// changed the graph.
    #[tracing::instrument(skip_all, fields(ops = graph.op_count(), tensors = graph.tensor_count()))]
    pub fn optimize(&self, graph: &mut Graph) -> Result<bool> {
        let mut changed = false;
        for round in 0..self.config.max_optimize_rounds {
            let round_changed = self.run_stage(graph, Stage::Optimization)?;
            tracing::debug!(round, changed = round_changed, "optimization round");
            changed |= round_changed;
            if !round_changed {
                break;
            }
        }
        Ok(changed)
    }

    /// Run the full pipeline: optimization rounds, then every later stage
    /// once.
    #[tracing::instrument(skip_all, fields(ops = graph.op_count(), tensors = graph.tensor_count()))]
    pub fn compile(&self, graph: &mut Graph) -> Result<()> {
        self.optimize(graph)?;
        for stage in [Stage::Inference, Stage::Planning] {
            self.run_stage(graph, stage)?;
        }
        Ok(())
    }

    fn run_stage(&self, graph: &mut Graph, stage: Stage) -> Result<bool> {
        let mut changed = false;
        for pass in self.passes.iter().filter(|p| p.stage() == stage) {
            let _span =
                tracing::debug_span!("pass", name = pass.name(), stage = ?pass.stage()).entered();
            changed |= pass.run(graph)?;
        }
        Ok(changed)
    }
}

impl Default for CompilerPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

/// Optimize a graph with the built-in rewrite passes.
pub fn optimize(graph: &mut Graph) -> Result<bool> {
    CompilerPipeline::default().optimize(graph)
}

/// Optimize, infer shapes and plan memory with the default pipeline.
pub fn compile(graph: &mut Graph) -> Result<()> {
    CompilerPipeline::default().compile(graph)
}
