//! Byte-order conversion hooks.

use crate::runtime::Runtime;
use crate::solver::Solver;

impl<S: Solver> Runtime<S> {
    /// `ntohl` is a byte swap on little-endian hosts and the identity on
    /// big-endian ones.
    pub fn wrap_ntohl(&mut self) {
        let Some(netlong) = self.get_parameter_expression(0) else {
            self.set_return_expression(None);
            return;
        };

        if cfg!(target_endian = "little") {
            let swapped = self.build(|b| b.bswap(netlong));
            self.set_return_expression(Some(swapped));
        } else {
            self.set_return_expression(Some(netlong));
        }
    }
}
