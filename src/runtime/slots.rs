//! Parameter and return slots: the symbolic counterpart of the calling
//! convention.
//!
//! The caller sets parameter slots before a call and clears the return slot;
//! the callee reads the parameters in its prologue and sets the return slot
//! before returning. Reading the return slot clears it, so a stale
//! expression can never leak across an uninstrumented callee.

use crate::expr::ExprRef;
use crate::runtime::Runtime;

impl<S> Runtime<S> {
    pub fn set_parameter_expression(&mut self, index: usize, expr: Option<ExprRef>) {
        self.params[index] = expr;
    }

    pub fn get_parameter_expression(&self, index: usize) -> Option<ExprRef> {
        self.params[index].clone()
    }

    pub fn set_return_expression(&mut self, expr: Option<ExprRef>) {
        self.return_value = expr;
    }

    /// Take the return expression, leaving the slot empty.
    pub fn get_return_expression(&mut self) -> Option<ExprRef> {
        self.return_value.take()
    }

    /// Slot contents, for the garbage collector's root set.
    pub(crate) fn slot_expressions(&self) -> impl Iterator<Item = &ExprRef> {
        self.params
            .iter()
            .chain(std::iter::once(&self.return_value))
            .filter_map(Option::as_ref)
    }
}
