//! Driver applying one rewrite rule across a graph.

use std::collections::HashSet;
use tessel_core::{Graph, OpId, Pass, Result, RewriteRule, Stage};

/// Pass that applies a [`RewriteRule`] once to every operator.
///
/// Operators are offered to the rule in the current order. Operators that an
/// earlier match marked dead are skipped for the rest of the scan. Once the
/// scan completes, any producer whose outputs are read only by dead operators
/// is marked dead as well, repeatedly, so no spliced-out chain leaves a
/// dangling graph output behind. Dead operators are then removed, followed by
/// their output tensors.
pub struct RewritePass<R> {
    rule: R,
}

impl<R: RewriteRule> RewritePass<R> {
    /// Create a pass driving `rule`.
    pub fn new(rule: R) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    /// Extend `dead` with producers that only feed operators in `pending`.
    fn collect_dead_producers(
        &self,
        graph: &Graph,
        pending: &mut HashSet<OpId>,
        dead: &mut Vec<OpId>,
    ) -> Result<()> {
        let mut worklist = dead.clone();
        while let Some(op) = worklist.pop() {
            for producer in graph.predecessors(op) {
                if pending.contains(&producer) || !self.feeds_only(graph, producer, pending)? {
                    continue;
                }
                tracing::debug!(
                    rule = self.rule.name(),
                    op = graph.op(producer)?.guid(),
                    "producer left without consumers"
                );
                pending.insert(producer);
                dead.push(producer);
                worklist.push(producer);
            }
        }
        Ok(())
    }

    /// Whether every output of `op` is consumed, and only by operators in `pending`.
    fn feeds_only(&self, graph: &Graph, op: OpId, pending: &HashSet<OpId>) -> Result<bool> {
        for &output in graph.op(op)?.outputs() {
            let targets = graph.tensor(output)?.targets();
            if targets.is_empty() || !targets.iter().all(|t| pending.contains(t)) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<R: RewriteRule> Pass for RewritePass<R> {
    fn name(&self) -> &str {
        self.rule.name()
    }

    fn stage(&self) -> Stage {
        Stage::Optimization
    }

    fn run(&self, graph: &mut Graph) -> Result<bool> {
        let mut changed = false;
        let mut pending: HashSet<OpId> = HashSet::new();
        let mut dead: Vec<OpId> = Vec::new();

        for op in graph.op_order().to_vec() {
            if pending.contains(&op) || !graph.contains_op(op) {
                continue;
            }
            let guid = graph.op(op)?.guid();

            let Some(removed) = self.rule.match_and_splice(graph, op)? else {
                continue;
            };
            tracing::debug!(
                rule = self.rule.name(),
                op = guid,
                removed = removed.len(),
                "rewrite applied"
            );
            changed = true;
            for victim in removed {
                if pending.insert(victim) {
                    dead.push(victim);
                }
            }
        }

        self.collect_dead_producers(graph, &mut pending, &mut dead)?;

        let mut orphaned = Vec::new();
        for &op in &dead {
            orphaned.extend_from_slice(graph.op(op)?.outputs());
        }
        for op in dead {
            graph.remove_operator(op)?;
        }
        for tensor in orphaned {
            graph.remove_tensor(tensor)?;
        }

        Ok(changed)
    }
}
