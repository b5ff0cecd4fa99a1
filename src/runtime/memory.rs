//! Load/store propagation between real memory and the shadow.
//!
//! The functions reading target memory are unsafe: the addresses come from
//! the instrumented program and must be valid for the given length.

use crate::expr::ExprRef;
use crate::runtime::Runtime;
use crate::solver::Solver;

impl<S: Solver> Runtime<S> {
    pub fn is_concrete(&self, addr: usize, length: usize) -> bool {
        self.shadow.is_concrete(addr, length)
    }

    /// The expression describing `length` bytes at `addr`, or `None` if the
    /// whole range is concrete.
    ///
    /// # Safety
    ///
    /// `addr` must be readable for `length` bytes.
    pub unsafe fn read_memory(
        &mut self,
        addr: usize,
        length: usize,
        little_endian: bool,
    ) -> Option<ExprRef> {
        assert!(length > 0, "invalid query for zero-length memory region");

        if self.shadow.is_concrete(addr, length) {
            return None;
        }

        let mut result: Option<ExprRef> = None;
        for i in 0..length {
            let byte_addr = addr + i;
            let byte = match self.shadow.get(byte_addr).cloned() {
                Some(expr) => expr,
                None => {
                    let concrete = *(byte_addr as *const u8);
                    self.build(|b| b.integer(u128::from(concrete), 8))
                }
            };
            result = Some(match result {
                None => byte,
                // Later bytes are more significant on little-endian targets.
                Some(acc) if little_endian => self.build(|b| b.concat(byte, acc)),
                Some(acc) => self.build(|b| b.concat(acc, byte)),
            });
        }

        result
    }

    /// Write an expression (or concreteness) over `length` bytes at `addr`,
    /// slicing it into the per-byte shadow.
    pub fn write_memory(
        &mut self,
        addr: usize,
        length: usize,
        expr: Option<ExprRef>,
        little_endian: bool,
    ) {
        assert!(length > 0, "invalid query for zero-length memory region");

        let Some(expr) = expr else {
            if !self.shadow.is_concrete(addr, length) {
                self.shadow.fill(addr, length, None);
            }
            return;
        };

        for i in 0..length {
            let (first, last) = if little_endian {
                (8 * (i as u32 + 1) - 1, 8 * i as u32)
            } else {
                ((length - i) as u32 * 8 - 1, (length - i - 1) as u32 * 8)
            };
            let byte = self.build(|b| b.extract(expr.clone(), first, last));
            self.shadow.set(addr + i, Some(byte));
        }
    }

    /// Mirror a concrete `memcpy` in the shadow.
    pub fn memcpy(&mut self, dest: usize, src: usize, length: usize) {
        if length == 0 {
            return;
        }
        self.shadow.copy(dest, src, length);
    }

    /// Mirror a concrete `memmove` in the shadow. Copying through a buffer
    /// makes the overlap direction irrelevant.
    pub fn memmove(&mut self, dest: usize, src: usize, length: usize) {
        self.memcpy(dest, src, length);
    }

    /// Mirror a concrete `memset`: broadcast the value's expression, or
    /// concretize the range when the value is concrete.
    pub fn memset(&mut self, addr: usize, value: Option<ExprRef>, length: usize) {
        if length == 0 {
            return;
        }
        if value.is_none() && self.shadow.is_concrete(addr, length) {
            return;
        }

        let byte = value.map(|v| {
            if v.bits() == 8 {
                v
            } else {
                self.build(|b| b.trunc(v, 8))
            }
        });
        self.shadow.fill(addr, length, byte);
    }

    /// Fill the shadow of `[addr, addr+length)` with fresh input-byte
    /// variables starting at `input_offset`.
    ///
    /// # Safety
    ///
    /// `addr` must be readable for `length` bytes.
    pub unsafe fn make_symbolic(&mut self, addr: usize, length: usize, input_offset: usize) {
        for i in 0..length {
            let concrete = *((addr + i) as *const u8);
            let byte = self.get_input_byte(input_offset + i, concrete);
            self.shadow.set(addr + i, Some(byte));
        }
    }
}
