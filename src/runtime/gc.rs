//! Garbage collection of symbolic expressions.
//!
//! The allocation set holds one strong reference for every expression ever
//! handed out. Collection gathers the expressions directly referenced by
//! the roots — shadow pages, registered expression regions, the call slots
//! and the solver session — and drops the registry references of everything
//! else. Children of live expressions survive through the parents'
//! reference counts even when their own registry entry goes away.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use tracing::debug;

use crate::expr::{expr_id, ExprId, ExprRef, SymExpr};
use crate::runtime::Runtime;
use crate::solver::Solver;

/// A contiguous array of expression slots in target memory (PHI tables and
/// the like), registered so the collector can treat it as a root.
#[derive(Debug, Clone, Copy)]
pub struct ExprRegion {
    pub start: *const *const SymExpr,
    pub length: usize,
}

/// The set of all expressions handed to instrumented code, plus the
/// registered expression regions.
#[derive(Default)]
pub struct AllocationSet {
    exprs: HashMap<ExprId, ExprRef>,
    regions: Vec<ExprRegion>,
}

impl AllocationSet {
    pub fn register(&mut self, expr: ExprRef) {
        self.exprs.entry(expr_id(&expr)).or_insert(expr);
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn contains(&self, id: ExprId) -> bool {
        self.exprs.contains_key(&id)
    }

    /// Recover the shared handle behind a raw pointer previously handed out.
    pub fn resolve(&self, raw: *const SymExpr) -> Option<ExprRef> {
        self.exprs.get(&ExprId(raw as usize)).cloned()
    }

    pub(crate) fn add_region(&mut self, region: ExprRegion) {
        self.regions.push(region);
    }

    pub fn regions(&self) -> &[ExprRegion] {
        &self.regions
    }
}

impl<S: Solver> Runtime<S> {
    /// Register a region of expression slots as a garbage collection root.
    ///
    /// # Safety
    ///
    /// The region must stay valid (readable, holding either nulls or
    /// pointers obtained from this runtime) for the rest of the run.
    pub unsafe fn register_expression_region(&mut self, start: *const *const SymExpr, length: usize) {
        self.allocated.add_region(ExprRegion { start, length });
    }

    /// Sweep the allocation set if it grew beyond the configured threshold.
    pub fn collect_garbage(&mut self) {
        if self.allocated.len() < self.config.gc_threshold {
            return;
        }

        let before = self.allocated.len();
        let reachable = self.reachable_expressions();

        let dropped = self
            .allocated
            .exprs
            .keys()
            .filter(|id| !reachable.contains(id))
            .copied()
            .collect_vec();
        for id in &dropped {
            self.allocated.exprs.remove(id);
        }

        self.gateway.solver_mut().expression_unreachable(&dropped);

        debug!(
            before,
            after = self.allocated.len(),
            "collected unreachable expressions"
        );
    }

    /// Expressions directly referenced by any root.
    fn reachable_expressions(&self) -> HashSet<ExprId> {
        let mut reachable: HashSet<ExprId> = HashSet::new();

        reachable.extend(self.shadow.expressions().map(expr_id));
        reachable.extend(self.slot_expressions().map(expr_id));
        reachable.extend(self.gateway.expressions().map(expr_id));

        for region in &self.allocated.regions {
            // Validity is guaranteed by register_expression_region's
            // contract.
            for i in 0..region.length {
                let slot = unsafe { *region.start.add(i) };
                if !slot.is_null() {
                    reachable.insert(ExprId(slot as usize));
                }
            }
        }

        reachable
    }
}
