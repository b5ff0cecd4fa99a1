//! Hooks for the memory and string functions.

use crate::expr::ExprRef;
use crate::runtime::Runtime;
use crate::solver::Solver;
use crate::wrappers::{c_strlen, c_strnlen, sites};

impl<S: Solver> Runtime<S> {
    pub fn wrap_malloc(&mut self, size: u64) {
        let size_expr = self.get_parameter_expression(0);
        self.try_alternative(size, size_expr, sites::MALLOC);
        self.set_return_expression(None);
    }

    pub fn wrap_calloc(&mut self, nmemb: u64, size: u64) {
        let nmemb_expr = self.get_parameter_expression(0);
        self.try_alternative(nmemb, nmemb_expr, sites::CALLOC);
        let size_expr = self.get_parameter_expression(1);
        self.try_alternative(size, size_expr, sites::CALLOC);
        self.set_return_expression(None);
    }

    pub fn wrap_memcpy(&mut self, dest: usize, src: usize, n: usize) {
        for (index, value) in [(0, dest), (1, src), (2, n)] {
            let expr = self.get_parameter_expression(index);
            self.try_alternative(value as u64, expr, sites::MEMCPY);
        }

        self.memcpy(dest, src, n);
        let dest_expr = self.get_parameter_expression(0);
        self.set_return_expression(dest_expr);
    }

    pub fn wrap_memmove(&mut self, dest: usize, src: usize, n: usize) {
        for (index, value) in [(0, dest), (1, src), (2, n)] {
            let expr = self.get_parameter_expression(index);
            self.try_alternative(value as u64, expr, sites::MEMMOVE);
        }

        self.memmove(dest, src, n);
        let dest_expr = self.get_parameter_expression(0);
        self.set_return_expression(dest_expr);
    }

    pub fn wrap_memset(&mut self, addr: usize, n: usize) {
        let addr_expr = self.get_parameter_expression(0);
        self.try_alternative(addr as u64, addr_expr, sites::MEMSET);
        let n_expr = self.get_parameter_expression(2);
        self.try_alternative(n as u64, n_expr, sites::MEMSET);

        let value_expr = self.get_parameter_expression(1);
        self.memset(addr, value_expr, n);
        let addr_expr = self.get_parameter_expression(0);
        self.set_return_expression(addr_expr);
    }

    /// `bzero` concretizes the region: it is all zeros now.
    pub fn wrap_bzero(&mut self, addr: usize, n: usize) {
        self.set_return_expression(None);

        let addr_expr = self.get_parameter_expression(0);
        self.try_alternative(addr as u64, addr_expr, sites::BZERO);
        let n_expr = self.get_parameter_expression(1);
        self.try_alternative(n as u64, n_expr, sites::BZERO);

        self.shadow_mut().fill(addr, n, None);
    }

    /// `bcopy` is `memmove` with swapped arguments and no return value.
    pub fn wrap_bcopy(&mut self, src: usize, dest: usize, n: usize) {
        for (index, value) in [(0, src), (1, dest), (2, n)] {
            let expr = self.get_parameter_expression(index);
            self.try_alternative(value as u64, expr, sites::BCOPY);
        }

        self.memmove(dest, src, n);
        self.set_return_expression(None);
    }

    /// # Safety
    ///
    /// `src` must point at a valid C string readable up to `n` bytes.
    pub unsafe fn wrap_strncpy(&mut self, dest: usize, src: usize, n: usize) {
        for (index, value) in [(0, dest), (1, src), (2, n)] {
            let expr = self.get_parameter_expression(index);
            self.try_alternative(value as u64, expr, sites::STRNCPY);
        }

        self.set_return_expression(None);

        let copied = c_strnlen(src, n).min(n);
        if self.is_concrete(src, copied) && self.is_concrete(dest, n) {
            return;
        }

        self.shadow_mut().copy(dest, src, copied);
        if copied < n {
            // strncpy pads the destination with concrete NUL bytes.
            self.shadow_mut().fill(dest + copied, n - copied, None);
        }
    }

    /// Push one `byte != c` constraint per byte scanned before the match
    /// (or the terminator when there is none).
    ///
    /// # Safety
    ///
    /// `s` must point at a valid C string; `result` is the real call's
    /// return value (0 when no match was found).
    pub unsafe fn wrap_strchr(&mut self, s: usize, c: i32, result: usize) {
        let s_expr = self.get_parameter_expression(0);
        self.try_alternative(s as u64, s_expr, sites::STRCHR);
        let c_expr_param = self.get_parameter_expression(1);
        self.try_alternative(c as u64, c_expr_param.clone(), sites::STRCHR);

        self.set_return_expression(None);

        let length = if result != 0 {
            result - s
        } else {
            c_strlen(s)
        };

        if self.is_concrete(s, length) && c_expr_param.is_none() {
            return;
        }

        let c_expr = match c_expr_param {
            Some(expr) => self.build(|b| b.trunc(expr, 8)),
            None => self.build(|b| b.integer(c as u8 as u128, 8)),
        };

        for i in 0..length {
            let byte = match self.shadow().get(s + i).cloned() {
                Some(expr) => expr,
                None => {
                    let concrete = *((s + i) as *const u8);
                    self.build(|b| b.integer(u128::from(concrete), 8))
                }
            };
            let miss = self.build(|b| b.not_equal(byte, c_expr.clone()));
            self.push_path_constraint(Some(miss), true, sites::STRCHR);
        }
    }

    /// # Safety
    ///
    /// Both regions must be readable for `n` bytes.
    pub unsafe fn wrap_memcmp(&mut self, a: usize, b: usize, n: usize, result: i32) {
        self.compare_regions(a, b, n, result, sites::MEMCMP);
    }

    /// `bcmp` only reports equality, so its symbolic treatment is the same
    /// as for `memcmp`.
    ///
    /// # Safety
    ///
    /// Both regions must be readable for `n` bytes.
    pub unsafe fn wrap_bcmp(&mut self, a: usize, b: usize, n: usize, result: i32) {
        self.compare_regions(a, b, n, result, sites::BCMP);
    }

    /// The comparison result hinges on byte-wise equality of the regions.
    /// Accumulate the conjunction and push it with polarity `result == 0`,
    /// so the solver can mine an input flipping the comparison.
    unsafe fn compare_regions(&mut self, a: usize, b: usize, n: usize, result: i32, site: usize) {
        for (index, value) in [(0, a), (1, b), (2, n)] {
            let expr = self.get_parameter_expression(index);
            self.try_alternative(value as u64, expr, site);
        }

        self.set_return_expression(None);

        if n == 0 || (self.is_concrete(a, n) && self.is_concrete(b, n)) {
            return;
        }

        let mut all_equal: Option<ExprRef> = None;
        for i in 0..n {
            let byte_a = self.shadow_byte_or_concrete(a + i);
            let byte_b = self.shadow_byte_or_concrete(b + i);
            let eq = self.build(|builder| builder.equal(byte_a, byte_b));
            all_equal = Some(match all_equal {
                None => eq,
                Some(acc) => self.build(|builder| builder.bool_and(acc, eq)),
            });
        }

        self.push_path_constraint(all_equal, result == 0, site);
    }

    unsafe fn shadow_byte_or_concrete(&mut self, addr: usize) -> ExprRef {
        match self.shadow().get(addr).cloned() {
            Some(expr) => expr,
            None => {
                let concrete = *(addr as *const u8);
                self.build(|b| b.integer(u128::from(concrete), 8))
            }
        }
    }
}
