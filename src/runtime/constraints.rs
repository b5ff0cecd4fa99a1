//! The constraint manager: branch-condition bookkeeping and test-case
//! mining.

use tracing::{debug, error};

use crate::consts::PRUNING_SITE_LIMIT;
use crate::expr::ExprRef;
use crate::runtime::Runtime;
use crate::solver::Solver;

impl<S: Solver> Runtime<S> {
    /// Record a branch condition with the direction the execution took, ask
    /// the solver for an input taking the other direction, and commit the
    /// taken direction to the path.
    pub fn push_path_constraint(
        &mut self,
        constraint: Option<ExprRef>,
        taken: bool,
        site_id: usize,
    ) {
        let Some(constraint) = constraint else {
            return;
        };

        // Constant folding stands in for solver-side simplification: a
        // condition that collapsed to a constant needs no query. Observing
        // the opposite constant would mean the execution took an impossible
        // branch.
        if let Some(value) = constraint.as_const_bool() {
            if value != taken {
                if cfg!(feature = "strict-branches") {
                    panic!("taken an impossible branch at site {site_id:#x}");
                }
                error!(site_id, "taken an impossible branch");
            }
            return;
        }

        if self.config.pruning && !self.visit_site(site_id) {
            debug!(site_id, "pruning hot branch site");
            return;
        }

        let negation = self.build(|b| b.bool_not(constraint.clone()));
        let diverging = if taken {
            negation.clone()
        } else {
            constraint.clone()
        };
        self.gateway.mine_alternative(diverging);

        let actual = if taken { constraint } else { negation };
        self.gateway.assert(actual);

        #[cfg(feature = "strict-branches")]
        {
            use crate::solver::SolverResult;
            assert!(
                self.gateway.check() != SolverResult::Unsat,
                "asserting infeasible path constraint"
            );
        }
    }

    /// Ask the solver for an alternative to the concrete value of a pointer
    /// or length argument. Asserting equality with the observed value keeps
    /// the path consistent while the negation query mines a test case.
    pub fn try_alternative(&mut self, value: u64, expr: Option<ExprRef>, site_id: usize) {
        let Some(expr) = expr else {
            return;
        };

        let constraint = self.build(|b| {
            let concrete = b.integer(u128::from(value), expr.bits());
            b.equal(expr.clone(), concrete)
        });
        self.push_path_constraint(Some(constraint), true, site_id);
    }

    /// Count a query site; returns false once the site is hot enough that
    /// pruning mode stops spending solver time on it.
    fn visit_site(&mut self, site_id: usize) -> bool {
        let count = self.site_counts.entry(site_id).or_insert(0);
        *count += 1;
        *count <= PRUNING_SITE_LIMIT
    }
}
