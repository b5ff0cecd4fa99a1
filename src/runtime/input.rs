//! Symbolic input bytes.

use crate::config::InputSource;
use crate::error::RuntimeError;
use crate::expr::ExprRef;
use crate::runtime::Runtime;
use crate::solver::Solver;

impl<S: Solver> Runtime<S> {
    /// The fresh variable standing for the input byte at `offset`. The
    /// concrete value observed there is recorded so mined test cases stay
    /// faithful to the bytes the solver left unconstrained.
    pub fn get_input_byte(&mut self, offset: usize, concrete: u8) -> ExprRef {
        self.gateway.record_input_byte(offset, concrete);
        self.build(|b| b.input_byte(offset))
    }

    /// User-facing entry: mark a memory region as symbolic input. Only
    /// meaningful when input comes from memory; the offset cursor advances
    /// across calls.
    ///
    /// # Safety
    ///
    /// `addr` must be readable for `length` bytes.
    pub unsafe fn user_make_symbolic(
        &mut self,
        addr: usize,
        length: usize,
    ) -> Result<(), RuntimeError> {
        if self.config.input != InputSource::Memory {
            return Err(RuntimeError::MakeSymbolicWithoutMemoryInput);
        }

        let offset = self.input_offset;
        self.make_symbolic(addr, length, offset);
        self.input_offset += length;
        Ok(())
    }
}
