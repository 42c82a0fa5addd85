//! Compiler pass traits and stage definitions.

use crate::Result;
use crate::graph::Graph;
use crate::ids::OpId;

/// Compilation stage for organizing passes.
///
/// Passes are grouped into stages and run in a fixed order. Within each stage,
/// passes run in the order they were registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Graph rewriting (redundant operator removal, fusion).
    Optimization,

    /// Shape inference (propagate shapes through the graph).
    Inference,

    /// Memory planning (assign every tensor a place in the arena).
    Planning,
}

/// Trait for implementing compiler passes.
///
/// The `run()` method returns `Ok(true)` if the pass changed the graph, or
/// `Ok(false)` otherwise, so a driver can stop once the graph reaches a fixed
/// point.
pub trait Pass: Send + Sync {
    /// Get the pass name (used for logging and debugging).
    fn name(&self) -> &str;

    /// Get the compilation stage this pass belongs to.
    fn stage(&self) -> Stage;

    /// Run the pass on the given graph.
    fn run(&self, graph: &mut Graph) -> Result<bool>;
}

/// A match-and-splice rewrite anchored at one operator.
///
/// `match_and_splice` inspects the operator `op` (and its neighborhood). When
/// the pattern does not match it returns `None` and leaves the graph
/// untouched. When it matches, it rewires the surviving operators and returns
/// the operators that are now dead (possibly none); the driver deletes them,
/// together with their output tensors, after the whole scan.
///
/// Returned operators must no longer feed any surviving operator.
pub trait RewriteRule: Send + Sync {
    /// Get the rule name (used for logging and debugging).
    fn name(&self) -> &str;

    /// Try to rewrite the graph around `op`.
    fn match_and_splice(&self, graph: &mut Graph, op: OpId) -> Result<Option<Vec<OpId>>>;
}
