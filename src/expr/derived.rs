//! Operations derived from the primitive constructors: byte-granular
//! slicing, byte swaps, saturating and overflow-reporting arithmetic, funnel
//! shifts. These mirror what overflow- and saturation-style compiler
//! intrinsics need.

use super::{BinOp, CmpOp, ExprBuilder, ExprRef};

impl ExprBuilder {
    /// Slice `length` bytes starting `offset` bytes into the expression.
    ///
    /// With `little_endian` the bytes are reversed so that the result
    /// describes the value as it appears in memory.
    pub fn extract_bytes(
        &mut self,
        expr: ExprRef,
        offset: u64,
        length: u64,
        little_endian: bool,
    ) -> ExprRef {
        let total_bits = u64::from(expr.bits());
        assert!(total_bits % 8 == 0, "aggregate type contains partial bytes");

        if little_endian {
            let mut result = self.extract(
                expr.clone(),
                (total_bits - offset * 8 - 1) as u32,
                (total_bits - offset * 8 - 8) as u32,
            );
            for i in 1..length {
                let byte = self.extract(
                    expr.clone(),
                    (total_bits - (offset + i) * 8 - 1) as u32,
                    (total_bits - (offset + i + 1) * 8) as u32,
                );
                result = self.concat(byte, result);
            }
            result
        } else {
            self.extract(
                expr,
                (total_bits - offset * 8 - 1) as u32,
                (total_bits - (offset + length) * 8) as u32,
            )
        }
    }

    /// Byte-swap; defined for widths divisible by 16.
    pub fn bswap(&mut self, expr: ExprRef) -> ExprRef {
        let bits = expr.bits();
        assert!(bits % 16 == 0, "bswap is not applicable");
        let bytes = u64::from(bits / 8);
        self.extract_bytes(expr, 0, bytes, true)
    }

    /// Replace `to_insert` into `target` at a byte offset.
    pub fn insert_bytes(
        &mut self,
        target: ExprRef,
        to_insert: ExprRef,
        offset: u64,
        little_endian: bool,
    ) -> ExprRef {
        let bits_to_insert = u64::from(to_insert.bits());
        assert!(
            bits_to_insert % 8 == 0,
            "expression to insert contains partial bytes"
        );

        let before = (offset != 0).then(|| self.extract_bytes(target.clone(), 0, offset, false));
        let new_piece = if little_endian && bits_to_insert > 8 {
            self.bswap(to_insert)
        } else {
            to_insert
        };
        let after_len = u64::from(target.bits()) / 8 - offset - bits_to_insert / 8;
        let after = (after_len != 0).then(|| {
            self.extract_bytes(target, offset + bits_to_insert / 8, after_len, false)
        });

        let mut result = match before {
            Some(before) => self.concat(before, new_piece),
            None => new_piece,
        };
        if let Some(after) = after {
            result = self.concat(result, after);
        }
        result
    }

    /// A bit vector of `length` zero bytes.
    pub fn zero_bytes(&mut self, length: u64) -> ExprRef {
        assert!(length > 0, "zero-length byte vector");
        self.integer(0, (length * 8) as u32)
    }

    //
    // Saturating arithmetic
    //

    pub fn sadd_sat(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        let sum = self.bin(BinOp::Add, a.clone(), b.clone());
        self.signed_saturate(a, b, sum, BinOp::Add)
    }

    pub fn ssub_sat(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        let diff = self.bin(BinOp::Sub, a.clone(), b.clone());
        self.signed_saturate(a, b, diff, BinOp::Sub)
    }

    /// Saturate a signed operation: compute it one bit wider, then clamp to
    /// the min and max signed values of the original width.
    fn signed_saturate(&mut self, a: ExprRef, b: ExprRef, narrow: ExprRef, op: BinOp) -> ExprRef {
        let bits = a.bits();
        let min = self.min_signed_int(bits);
        let max = self.max_signed_int(bits);

        let wide_a = self.sext(a, 1);
        let wide_b = self.sext(b, 1);
        let wide = self.bin(op, wide_a, wide_b);

        let wide_min = self.sext(min.clone(), 1);
        let wide_max = self.sext(max.clone(), 1);
        let underflow = self.cmp(CmpOp::Sle, wide.clone(), wide_min);
        let overflow = self.cmp(CmpOp::Sge, wide, wide_max);

        let clamped_high = self.ite(overflow, max, narrow);
        self.ite(underflow, min, clamped_high)
    }

    pub fn uadd_sat(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        let bits = a.bits();
        let max = self.max_unsigned_int(bits);

        let wide_a = self.zext(a.clone(), 1);
        let wide_b = self.zext(b.clone(), 1);
        let wide = self.bin(BinOp::Add, wide_a, wide_b);

        // Overflow shows in the extra top bit.
        let top = self.extract(wide, bits, bits);
        let carried = self.bit_to_bool(top);
        let sum = self.bin(BinOp::Add, a, b);
        self.ite(carried, max, sum)
    }

    pub fn usub_sat(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        let bits = a.bits();
        let no_overflow = self.cmp(CmpOp::Uge, a.clone(), b.clone());
        let diff = self.bin(BinOp::Sub, a, b);
        let zero = self.integer(0, bits);
        self.ite(no_overflow, diff, zero)
    }

    fn shift_left_overflows(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        let shifted = self.bin(BinOp::Shl, a.clone(), b.clone());
        let round_trip = self.bin(BinOp::AShr, shifted, b);
        self.not_equal(round_trip, a)
    }

    pub fn sshl_sat(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        let bits = a.bits();
        let overflow = self.shift_left_overflows(a.clone(), b.clone());

        let sign = self.extract(a.clone(), bits - 1, bits - 1);
        let negative = self.bit_to_bool(sign);
        let min = self.min_signed_int(bits);
        let max = self.max_signed_int(bits);
        let saturated = self.ite(negative, min, max);

        let shifted = self.bin(BinOp::Shl, a, b);
        self.ite(overflow, saturated, shifted)
    }

    pub fn ushl_sat(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        let bits = a.bits();
        let overflow = self.shift_left_overflows(a.clone(), b.clone());
        let max = self.max_unsigned_int(bits);
        let shifted = self.bin(BinOp::Shl, a, b);
        self.ite(overflow, max, shifted)
    }

    //
    // Arithmetic with overflow
    //

    pub fn add_overflow(
        &mut self,
        a: ExprRef,
        b: ExprRef,
        is_signed: bool,
        little_endian: bool,
    ) -> ExprRef {
        let overflow = self.overflow_bit(BinOp::Add, a.clone(), b.clone(), is_signed);
        let result = self.bin(BinOp::Add, a, b);
        self.overflow_result(result, overflow, little_endian)
    }

    pub fn sub_overflow(
        &mut self,
        a: ExprRef,
        b: ExprRef,
        is_signed: bool,
        little_endian: bool,
    ) -> ExprRef {
        let overflow = self.overflow_bit(BinOp::Sub, a.clone(), b.clone(), is_signed);
        let result = self.bin(BinOp::Sub, a, b);
        self.overflow_result(result, overflow, little_endian)
    }

    pub fn mul_overflow(
        &mut self,
        a: ExprRef,
        b: ExprRef,
        is_signed: bool,
        little_endian: bool,
    ) -> ExprRef {
        let bits = a.bits();
        let overflow = if is_signed {
            // The widened product disagrees with the widened narrow product.
            let wide_a = self.sext(a.clone(), bits);
            let wide_b = self.sext(b.clone(), bits);
            let wide = self.bin(BinOp::Mul, wide_a, wide_b);
            let narrow = self.bin(BinOp::Mul, a.clone(), b.clone());
            let narrow_wide = self.sext(narrow, bits);
            self.not_equal(wide, narrow_wide)
        } else {
            // Any of the upper bits set marks an overflow.
            let wide_a = self.zext(a.clone(), bits);
            let wide_b = self.zext(b.clone(), bits);
            let wide = self.bin(BinOp::Mul, wide_a, wide_b);
            let upper = self.extract(wide, 2 * bits - 1, bits);
            let zero = self.integer(0, bits);
            self.not_equal(upper, zero)
        };
        let result = self.bin(BinOp::Mul, a, b);
        self.overflow_result(result, overflow, little_endian)
    }

    fn overflow_bit(&mut self, op: BinOp, a: ExprRef, b: ExprRef, is_signed: bool) -> ExprRef {
        let bits = a.bits();
        if is_signed {
            let wide_a = self.sext(a.clone(), 1);
            let wide_b = self.sext(b.clone(), 1);
            let wide = self.bin(op, wide_a, wide_b);
            let narrow = self.bin(op, a, b);
            let narrow_wide = self.sext(narrow, 1);
            self.not_equal(wide, narrow_wide)
        } else {
            let wide_a = self.zext(a, 1);
            let wide_b = self.zext(b, 1);
            let wide = self.bin(op, wide_a, wide_b);
            let top = self.extract(wide, bits, bits);
            self.bit_to_bool(top)
        }
    }

    /// The in-memory image of the `{iN, i1}` aggregate produced by
    /// overflow-reporting intrinsics: the result (byte-swapped when the
    /// target is little-endian), the overflow flag widened to a byte, and
    /// padding that brings the flag up to the integer's size.
    pub fn overflow_result(
        &mut self,
        result: ExprRef,
        overflow: ExprRef,
        little_endian: bool,
    ) -> ExprRef {
        let result_bits = result.bits();
        assert!(
            result_bits % 8 == 0,
            "arithmetic with overflow on integers of invalid length"
        );

        let result_mem = if little_endian {
            self.bswap(result)
        } else {
            result
        };
        let overflow_byte = self.bool_to_bit(overflow, 8);

        if result_bits == 8 {
            return self.concat(result_mem, overflow_byte);
        }

        let padding = self.zero_bytes(u64::from(result_bits) / 8 - 1);
        let tail = if little_endian {
            self.concat(overflow_byte, padding)
        } else {
            self.concat(padding, overflow_byte)
        };
        self.concat(result_mem, tail)
    }

    //
    // Funnel shifts and absolute value
    //

    pub fn funnel_shift_left(&mut self, a: ExprRef, b: ExprRef, c: ExprRef) -> ExprRef {
        let bits = c.bits();
        let joined = self.concat(a, b);
        let modulus = self.integer(u128::from(bits), bits);
        let shift = self.bin(BinOp::URem, c, modulus);
        let wide_shift = self.zext(shift, bits);
        let shifted = self.bin(BinOp::Shl, joined, wide_shift);
        self.extract(shifted, 2 * bits - 1, bits)
    }

    pub fn funnel_shift_right(&mut self, a: ExprRef, b: ExprRef, c: ExprRef) -> ExprRef {
        let bits = c.bits();
        let joined = self.concat(a, b);
        let modulus = self.integer(u128::from(bits), bits);
        let shift = self.bin(BinOp::URem, c, modulus);
        let wide_shift = self.zext(shift, bits);
        let shifted = self.bin(BinOp::LShr, joined, wide_shift);
        self.extract(shifted, bits - 1, 0)
    }

    pub fn abs(&mut self, expr: ExprRef) -> ExprRef {
        let bits = expr.bits();
        let zero = self.integer(0, bits);
        let non_negative = self.cmp(CmpOp::Sge, expr.clone(), zero.clone());
        let negated = self.bin(BinOp::Sub, zero, expr.clone());
        self.ite(non_negative, expr, negated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprKind;

    #[test]
    fn bswap_reverses_constant_bytes() {
        let mut b = ExprBuilder::new();
        let value = b.integer(0x0403_0201, 32);
        let swapped = b.bswap(value);
        assert_eq!(swapped.as_const_int(), Some((0x0102_0304, 32)));
    }

    #[test]
    fn bswap_is_an_involution_on_constants() {
        let mut b = ExprBuilder::new();
        let value = b.integer(0xcafe_beef, 32);
        let once = b.bswap(value.clone());
        let twice = b.bswap(once);
        assert_eq!(twice.as_const_int(), value.as_const_int());
    }

    #[test]
    #[should_panic(expected = "not applicable")]
    fn bswap_rejects_odd_widths() {
        let mut b = ExprBuilder::new();
        let value = b.integer(1, 24);
        b.bswap(value);
    }

    #[test]
    fn extract_bytes_big_endian_slices_constants() {
        let mut b = ExprBuilder::new();
        let value = b.integer(0x1122_3344, 32);
        let middle = b.extract_bytes(value, 1, 2, false);
        assert_eq!(middle.as_const_int(), Some((0x2233, 16)));
    }

    #[test]
    fn insert_bytes_replaces_a_slice() {
        let mut b = ExprBuilder::new();
        let target = b.integer(0xaabb_ccdd, 32);
        let piece = b.integer(0x11, 8);
        let patched = b.insert_bytes(target, piece, 2, false);
        assert_eq!(patched.as_const_int(), Some((0xaabb_11dd, 32)));
    }

    #[test]
    fn saturating_arithmetic_folds_on_constants() {
        let mut b = ExprBuilder::new();

        let big = b.integer(0x7f, 8);
        let one = b.integer(1, 8);
        let clamped = b.sadd_sat(big, one);
        assert_eq!(clamped.as_const_int(), Some((0x7f, 8)));

        let a = b.integer(0xf0, 8);
        let c = b.integer(0x20, 8);
        let clamped = b.uadd_sat(a, c);
        assert_eq!(clamped.as_const_int(), Some((0xff, 8)));

        let small = b.integer(3, 8);
        let large = b.integer(7, 8);
        let floored = b.usub_sat(small, large);
        assert_eq!(floored.as_const_int(), Some((0, 8)));
    }

    #[test]
    fn overflow_result_places_flag_by_endianness() {
        let mut b = ExprBuilder::new();
        let result = b.integer(0x1234, 16);
        let flag = b.bool_true();

        // Little endian: swapped result bytes, then flag, then padding.
        let le = b.overflow_result(result.clone(), flag.clone(), true);
        assert_eq!(le.bits(), 32);
        assert_eq!(le.as_const_int(), Some((0x3412_0100, 32)));

        // Big endian: result bytes, padding, then flag.
        let be = b.overflow_result(result, flag, false);
        assert_eq!(be.as_const_int(), Some((0x1234_0001, 32)));
    }

    #[test]
    fn funnel_shift_left_folds() {
        let mut b = ExprBuilder::new();
        let a = b.integer(0x12, 8);
        let c = b.integer(0x34, 8);
        let shift = b.integer(4, 8);
        let result = b.funnel_shift_left(a, c, shift);
        assert_eq!(result.as_const_int(), Some((0x23, 8)));
    }

    #[test]
    fn abs_negates_negative_constants() {
        let mut b = ExprBuilder::new();
        let minus_two = b.integer(0xfe, 8);
        let two = b.abs(minus_two);
        assert_eq!(two.as_const_int(), Some((2, 8)));

        let sym = b.input_byte(0);
        let abs = b.abs(sym);
        assert!(matches!(abs.kind(), ExprKind::Ite { .. }));
    }
}
