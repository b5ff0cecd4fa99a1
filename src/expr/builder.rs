use std::collections::HashMap;
use std::rc::Rc;

use super::{BinOp, BoolOp, CmpOp, ExprKind, ExprRef, FpBinOp, FpCmpOp, SymExpr};

/// Constructs expression nodes.
///
/// Constructors validate operand widths, fold constant operands into
/// canonical constant nodes and return shared handles. There is one builder
/// per runtime instance; constant nodes are interned per `(value, bits)`.
pub struct ExprBuilder {
    consts: HashMap<(u128, u32), ExprRef>,
    true_node: ExprRef,
    false_node: ExprRef,
    null_pointer: ExprRef,
    input_bytes: HashMap<usize, ExprRef>,
    ptr_bits: u32,
}

impl Default for ExprBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprBuilder {
    pub fn new() -> Self {
        let true_node = Rc::new(SymExpr::new(ExprKind::Bool { value: true }, 0));
        let false_node = Rc::new(SymExpr::new(ExprKind::Bool { value: false }, 0));
        let ptr_bits = usize::BITS;
        let null_pointer = Rc::new(SymExpr::new(ExprKind::Integer { value: 0 }, ptr_bits));

        Self {
            consts: HashMap::new(),
            true_node,
            false_node,
            null_pointer,
            input_bytes: HashMap::new(),
            ptr_bits,
        }
    }

    fn node(&self, kind: ExprKind, bits: u32) -> ExprRef {
        Rc::new(SymExpr::new(kind, bits))
    }

    //
    // Construction of simple values
    //

    pub fn integer(&mut self, value: u128, bits: u32) -> ExprRef {
        assert!(bits >= 1 && bits <= 128, "invalid integer width {bits}");
        let value = mask(value, bits);
        self.consts
            .entry((value, bits))
            .or_insert_with(|| Rc::new(SymExpr::new(ExprKind::Integer { value }, bits)))
            .clone()
    }

    pub fn integer128(&mut self, high: u64, low: u64) -> ExprRef {
        self.integer((u128::from(high) << 64) | u128::from(low), 128)
    }

    pub fn float(&self, value: f64, double: bool) -> ExprRef {
        self.node(ExprKind::Float { value }, if double { 64 } else { 32 })
    }

    pub fn null_pointer(&self) -> ExprRef {
        self.null_pointer.clone()
    }

    pub fn bool_true(&self) -> ExprRef {
        self.true_node.clone()
    }

    pub fn bool_false(&self) -> ExprRef {
        self.false_node.clone()
    }

    pub fn bool(&self, value: bool) -> ExprRef {
        if value {
            self.bool_true()
        } else {
            self.bool_false()
        }
    }

    /// The fresh variable for one input byte. Variables are cached so that
    /// every read of the same offset observes the same node.
    pub fn input_byte(&mut self, offset: usize) -> ExprRef {
        self.input_bytes
            .entry(offset)
            .or_insert_with(|| Rc::new(SymExpr::new(ExprKind::InputByte { offset }, 8)))
            .clone()
    }

    //
    // Integer arithmetic and shifts
    //

    pub fn bin(&mut self, op: BinOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        let bits = lhs.bits();
        assert!(bits > 0, "bit-vector operation on Boolean operand");
        assert_eq!(bits, rhs.bits(), "operand width mismatch in {op:?}");

        if let (Some((a, _)), Some((b, _))) = (lhs.as_const_int(), rhs.as_const_int()) {
            if let Some(folded) = fold_bin(op, a, b, bits) {
                return self.integer(folded, bits);
            }
        }

        self.node(ExprKind::Bin { op, lhs, rhs }, bits)
    }

    pub fn neg(&mut self, inner: ExprRef) -> ExprRef {
        let bits = inner.bits();
        assert!(bits > 0, "neg of Boolean operand");
        if let Some((v, _)) = inner.as_const_int() {
            return self.integer(v.wrapping_neg(), bits);
        }
        self.node(ExprKind::Neg { inner }, bits)
    }

    pub fn not(&mut self, inner: ExprRef) -> ExprRef {
        let bits = inner.bits();
        assert!(bits > 0, "bitwise not of Boolean operand");
        if let Some((v, _)) = inner.as_const_int() {
            return self.integer(!v, bits);
        }
        self.node(ExprKind::Not { inner }, bits)
    }

    //
    // Relations
    //

    pub fn cmp(&mut self, op: CmpOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        assert_eq!(lhs.bits(), rhs.bits(), "operand width mismatch in {op:?}");
        let bits = lhs.bits();

        if let (Some((a, _)), Some((b, _))) = (lhs.as_const_int(), rhs.as_const_int()) {
            return self.bool(fold_cmp(op, a, b, bits));
        }

        self.node(ExprKind::Cmp { op, lhs, rhs }, 0)
    }

    pub fn equal(&mut self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Eq, lhs, rhs)
    }

    pub fn not_equal(&mut self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Ne, lhs, rhs)
    }

    //
    // Boolean connectives
    //

    pub fn bool_bin(&mut self, op: BoolOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        assert!(lhs.is_bool() && rhs.is_bool(), "Boolean operation on bit vector");

        if let (Some(a), Some(b)) = (lhs.as_const_bool(), rhs.as_const_bool()) {
            let value = match op {
                BoolOp::And => a && b,
                BoolOp::Or => a || b,
                BoolOp::Xor => a ^ b,
            };
            return self.bool(value);
        }

        self.node(ExprKind::BoolBin { op, lhs, rhs }, 0)
    }

    pub fn bool_and(&mut self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.bool_bin(BoolOp::And, lhs, rhs)
    }

    pub fn bool_or(&mut self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.bool_bin(BoolOp::Or, lhs, rhs)
    }

    pub fn bool_xor(&mut self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        self.bool_bin(BoolOp::Xor, lhs, rhs)
    }

    pub fn bool_not(&mut self, inner: ExprRef) -> ExprRef {
        assert!(inner.is_bool(), "Boolean negation of bit vector");
        if let Some(v) = inner.as_const_bool() {
            return self.bool(!v);
        }
        self.node(ExprKind::BoolNot { inner }, 0)
    }

    pub fn ite(&mut self, cond: ExprRef, on_true: ExprRef, on_false: ExprRef) -> ExprRef {
        assert!(cond.is_bool(), "ite condition must be Boolean");
        assert_eq!(on_true.bits(), on_false.bits(), "ite arm width mismatch");

        if let Some(c) = cond.as_const_bool() {
            return if c { on_true } else { on_false };
        }

        let bits = on_true.bits();
        self.node(
            ExprKind::Ite {
                cond,
                on_true,
                on_false,
            },
            bits,
        )
    }

    //
    // Bit-array helpers
    //

    pub fn concat(&mut self, hi: ExprRef, lo: ExprRef) -> ExprRef {
        assert!(hi.bits() > 0 && lo.bits() > 0, "concat of Boolean operand");
        let bits = hi.bits() + lo.bits();

        if let (Some((a, _)), Some((b, wb))) = (hi.as_const_int(), lo.as_const_int()) {
            return self.integer((a << wb) | b, bits);
        }

        self.node(ExprKind::Concat { hi, lo }, bits)
    }

    /// Bits `last..=first` of the operand (inclusive, MSB-first).
    pub fn extract(&mut self, inner: ExprRef, first: u32, last: u32) -> ExprRef {
        assert!(first >= last, "extract with inverted bit range");
        assert!(first < inner.bits(), "extract beyond operand width");
        let bits = first - last + 1;

        if let Some((v, _)) = inner.as_const_int() {
            return self.integer(v >> last, bits);
        }

        self.node(ExprKind::Extract { inner, first, last }, bits)
    }

    /// Sign-extend by `added` additional bits.
    pub fn sext(&mut self, inner: ExprRef, added: u32) -> ExprRef {
        if added == 0 {
            return inner;
        }
        let from = inner.bits();
        assert!(from > 0, "sext of Boolean operand");
        let bits = from + added;

        if let Some((v, _)) = inner.as_const_int() {
            let extended = sign_extend(v, from) as u128;
            return self.integer(extended, bits);
        }

        self.node(ExprKind::SExt { inner }, bits)
    }

    /// Zero-extend by `added` additional bits.
    pub fn zext(&mut self, inner: ExprRef, added: u32) -> ExprRef {
        if added == 0 {
            return inner;
        }
        let from = inner.bits();
        assert!(from > 0, "zext of Boolean operand");
        let bits = from + added;

        if let Some((v, _)) = inner.as_const_int() {
            return self.integer(v, bits);
        }

        self.node(ExprKind::ZExt { inner }, bits)
    }

    /// Truncate to `bits`.
    pub fn trunc(&mut self, inner: ExprRef, bits: u32) -> ExprRef {
        assert!(bits > 0 && bits < inner.bits(), "invalid trunc target width");

        if let Some((v, _)) = inner.as_const_int() {
            return self.integer(v, bits);
        }

        self.node(ExprKind::Trunc { inner }, bits)
    }

    /// Widen a Boolean to a bit vector of the given width.
    pub fn bool_to_bit(&mut self, inner: ExprRef, bits: u32) -> ExprRef {
        assert!(inner.is_bool(), "bool_to_bit of bit vector");
        assert!(bits >= 1, "invalid bool_to_bit width");

        if let Some(v) = inner.as_const_bool() {
            return self.integer(u128::from(v), bits);
        }

        self.node(ExprKind::BoolToBit { inner }, bits)
    }

    /// Interpret a bit vector as a Boolean: true iff non-zero. Null-tolerant
    /// at the ABI layer; here the operand is always present.
    pub fn bit_to_bool(&mut self, inner: ExprRef) -> ExprRef {
        let bits = inner.bits();
        let zero = self.integer(0, bits);
        self.not_equal(inner, zero)
    }

    //
    // Floating-point operations
    //

    pub fn fp_bin(&mut self, op: FpBinOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        assert!(lhs.is_float() && rhs.is_float(), "fp operation on bit vector");
        assert_eq!(lhs.bits(), rhs.bits(), "fp operand width mismatch");
        let bits = lhs.bits();
        self.node(ExprKind::FpBin { op, lhs, rhs }, bits)
    }

    pub fn fp_abs(&mut self, inner: ExprRef) -> ExprRef {
        let bits = inner.bits();
        self.node(ExprKind::FpAbs { inner }, bits)
    }

    pub fn fp_neg(&mut self, inner: ExprRef) -> ExprRef {
        let bits = inner.bits();
        self.node(ExprKind::FpNeg { inner }, bits)
    }

    pub fn fp_is_nan(&mut self, inner: ExprRef) -> ExprRef {
        self.node(ExprKind::FpIsNan { inner }, 0)
    }

    pub fn fp_cmp_ordered(&mut self, op: FpCmpOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        assert_eq!(lhs.bits(), rhs.bits(), "fp operand width mismatch");
        self.node(
            ExprKind::FpCmp {
                op,
                ordered: true,
                lhs,
                rhs,
            },
            0,
        )
    }

    /// Unordered comparisons hold when either operand is NaN.
    pub fn fp_cmp_unordered(&mut self, op: FpCmpOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        let nan_lhs = self.fp_is_nan(lhs.clone());
        let nan_rhs = self.fp_is_nan(rhs.clone());
        let either_nan = self.bool_or(nan_lhs, nan_rhs);
        let ordered = self.fp_cmp_ordered(op, lhs, rhs);
        self.bool_or(either_nan, ordered)
    }

    /// Neither operand is NaN.
    pub fn fp_ordered(&mut self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        let unordered = self.fp_unordered(lhs, rhs);
        self.bool_not(unordered)
    }

    /// At least one operand is NaN.
    pub fn fp_unordered(&mut self, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
        let nan_lhs = self.fp_is_nan(lhs);
        let nan_rhs = self.fp_is_nan(rhs);
        self.bool_or(nan_lhs, nan_rhs)
    }

    pub fn int_to_float(&mut self, inner: ExprRef, double: bool, signed: bool) -> ExprRef {
        assert!(inner.bits() > 0, "int_to_float of Boolean operand");
        self.node(
            ExprKind::IntToFloat { inner, signed },
            if double { 64 } else { 32 },
        )
    }

    pub fn float_to_float(&mut self, inner: ExprRef, double: bool) -> ExprRef {
        self.node(ExprKind::FloatToFloat { inner }, if double { 64 } else { 32 })
    }

    pub fn bits_to_float(&mut self, inner: ExprRef, double: bool) -> ExprRef {
        let bits = if double { 64 } else { 32 };
        assert_eq!(inner.bits(), bits, "bits_to_float width mismatch");
        self.node(ExprKind::BitsToFloat { inner }, bits)
    }

    pub fn float_to_bits(&mut self, inner: ExprRef) -> ExprRef {
        let bits = inner.bits();
        self.node(ExprKind::FloatToBits { inner }, bits)
    }

    pub fn float_to_int(&mut self, inner: ExprRef, bits: u32, signed: bool) -> ExprRef {
        self.node(ExprKind::FloatToInt { inner, signed }, bits)
    }

    //
    // Bounds for saturating arithmetic
    //

    pub fn min_signed_int(&mut self, bits: u32) -> ExprRef {
        self.integer(1u128 << (bits - 1), bits)
    }

    pub fn max_signed_int(&mut self, bits: u32) -> ExprRef {
        self.integer(mask(u128::MAX, bits) >> 1, bits)
    }

    pub fn max_unsigned_int(&mut self, bits: u32) -> ExprRef {
        self.integer(mask(u128::MAX, bits), bits)
    }

    pub(crate) fn pointer_bits(&self) -> u32 {
        self.ptr_bits
    }
}

/// Named constructors matching the runtime interface one to one; the C ABI
/// layer and the tests read better against these than against the generic
/// `bin`/`cmp` entry points.
impl ExprBuilder {
    pub fn add(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::Add, a, b)
    }

    pub fn sub(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::Sub, a, b)
    }

    pub fn mul(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::Mul, a, b)
    }

    pub fn unsigned_div(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::UDiv, a, b)
    }

    pub fn signed_div(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::SDiv, a, b)
    }

    pub fn unsigned_rem(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::URem, a, b)
    }

    pub fn signed_rem(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::SRem, a, b)
    }

    pub fn shift_left(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::Shl, a, b)
    }

    pub fn logical_shift_right(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::LShr, a, b)
    }

    pub fn arithmetic_shift_right(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::AShr, a, b)
    }

    pub fn and(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::And, a, b)
    }

    pub fn or(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::Or, a, b)
    }

    pub fn xor(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.bin(BinOp::Xor, a, b)
    }

    pub fn signed_less_than(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Slt, a, b)
    }

    pub fn signed_less_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Sle, a, b)
    }

    pub fn signed_greater_than(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Sgt, a, b)
    }

    pub fn signed_greater_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Sge, a, b)
    }

    pub fn unsigned_less_than(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Ult, a, b)
    }

    pub fn unsigned_less_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Ule, a, b)
    }

    pub fn unsigned_greater_than(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Ugt, a, b)
    }

    pub fn unsigned_greater_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.cmp(CmpOp::Uge, a, b)
    }

    pub fn fp_add(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_bin(FpBinOp::Add, a, b)
    }

    pub fn fp_sub(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_bin(FpBinOp::Sub, a, b)
    }

    pub fn fp_mul(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_bin(FpBinOp::Mul, a, b)
    }

    pub fn fp_div(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_bin(FpBinOp::Div, a, b)
    }

    pub fn fp_rem(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_bin(FpBinOp::Rem, a, b)
    }

    pub fn float_ordered_greater_than(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_ordered(FpCmpOp::Gt, a, b)
    }

    pub fn float_ordered_greater_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_ordered(FpCmpOp::Ge, a, b)
    }

    pub fn float_ordered_less_than(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_ordered(FpCmpOp::Lt, a, b)
    }

    pub fn float_ordered_less_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_ordered(FpCmpOp::Le, a, b)
    }

    pub fn float_ordered_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_ordered(FpCmpOp::Eq, a, b)
    }

    pub fn float_ordered_not_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_ordered(FpCmpOp::Ne, a, b)
    }

    pub fn float_unordered_greater_than(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_unordered(FpCmpOp::Gt, a, b)
    }

    pub fn float_unordered_greater_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_unordered(FpCmpOp::Ge, a, b)
    }

    pub fn float_unordered_less_than(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_unordered(FpCmpOp::Lt, a, b)
    }

    pub fn float_unordered_less_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_unordered(FpCmpOp::Le, a, b)
    }

    pub fn float_unordered_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_unordered(FpCmpOp::Eq, a, b)
    }

    pub fn float_unordered_not_equal(&mut self, a: ExprRef, b: ExprRef) -> ExprRef {
        self.fp_cmp_unordered(FpCmpOp::Ne, a, b)
    }
}

fn mask(value: u128, bits: u32) -> u128 {
    if bits >= 128 {
        value
    } else {
        value & ((1u128 << bits) - 1)
    }
}

fn sign_extend(value: u128, bits: u32) -> i128 {
    let shift = 128 - bits;
    ((value << shift) as i128) >> shift
}

fn fold_bin(op: BinOp, a: u128, b: u128, bits: u32) -> Option<u128> {
    let sa = sign_extend(a, bits);
    let sb = sign_extend(b, bits);
    let value = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::UDiv => {
            if b == 0 {
                return None;
            }
            a / b
        }
        BinOp::SDiv => {
            if sb == 0 {
                return None;
            }
            sa.wrapping_div(sb) as u128
        }
        BinOp::URem => {
            if b == 0 {
                return None;
            }
            a % b
        }
        BinOp::SRem => {
            if sb == 0 {
                return None;
            }
            sa.wrapping_rem(sb) as u128
        }
        BinOp::Shl => {
            if b >= u128::from(bits) {
                return None;
            }
            a << b
        }
        BinOp::LShr => {
            if b >= u128::from(bits) {
                return None;
            }
            a >> b
        }
        BinOp::AShr => {
            if b >= u128::from(bits) {
                return None;
            }
            (sa >> b) as u128
        }
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
    };
    Some(mask(value, bits))
}

fn fold_cmp(op: CmpOp, a: u128, b: u128, bits: u32) -> bool {
    let sa = sign_extend(a, bits);
    let sb = sign_extend(b, bits);
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Ult => a < b,
        CmpOp::Ule => a <= b,
        CmpOp::Ugt => a > b,
        CmpOp::Uge => a >= b,
        CmpOp::Slt => sa < sb,
        CmpOp::Sle => sa <= sb,
        CmpOp::Sgt => sa > sb,
        CmpOp::Sge => sa >= sb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_canonical() {
        let mut b = ExprBuilder::new();
        let x = b.integer(42, 8);
        let y = b.integer(42, 8);
        let z = b.integer(42, 16);

        assert!(Rc::ptr_eq(&x, &y));
        assert!(!Rc::ptr_eq(&x, &z));
    }

    #[test]
    fn constant_values_are_masked() {
        let mut b = ExprBuilder::new();
        let x = b.integer(0x1ff, 8);
        assert_eq!(x.as_const_int(), Some((0xff, 8)));
    }

    #[test]
    fn widths_follow_operations() {
        let mut b = ExprBuilder::new();
        let x = b.input_byte(0);
        let y = b.input_byte(1);

        let cat = b.concat(x.clone(), y.clone());
        assert_eq!(cat.bits(), 16);

        let ext = b.extract(cat.clone(), 11, 4);
        assert_eq!(ext.bits(), 8);

        let sum = b.bin(BinOp::Add, x.clone(), y.clone());
        assert_eq!(sum.bits(), 8);

        let wide = b.sext(x.clone(), 24);
        assert_eq!(wide.bits(), 32);

        let rel = b.cmp(CmpOp::Ult, x, y);
        assert!(rel.is_bool());
    }

    #[test]
    #[should_panic(expected = "width mismatch")]
    fn mixed_widths_are_rejected() {
        let mut b = ExprBuilder::new();
        let x = b.input_byte(0);
        let y = b.zext(x.clone(), 8);
        b.bin(BinOp::Add, x, y);
    }

    #[test]
    fn constant_folding() {
        let mut b = ExprBuilder::new();
        let three = b.integer(3, 8);
        let five = b.integer(5, 8);

        let sum = b.bin(BinOp::Add, three.clone(), five.clone());
        assert_eq!(sum.as_const_int(), Some((8, 8)));

        let lt = b.cmp(CmpOp::Ult, three.clone(), five.clone());
        assert_eq!(lt.as_const_bool(), Some(true));

        // Signed comparison sees 0xff as -1.
        let minus_one = b.integer(0xff, 8);
        let slt = b.cmp(CmpOp::Slt, minus_one, three);
        assert_eq!(slt.as_const_bool(), Some(true));
    }

    #[test]
    fn input_bytes_are_cached() {
        let mut b = ExprBuilder::new();
        let x = b.input_byte(3);
        let y = b.input_byte(3);
        assert!(Rc::ptr_eq(&x, &y));
    }

    #[test]
    fn ite_folds_constant_condition() {
        let mut b = ExprBuilder::new();
        let t = b.bool_true();
        let x = b.input_byte(0);
        let y = b.input_byte(1);
        let picked = b.ite(t, x.clone(), y);
        assert!(Rc::ptr_eq(&picked, &x));
    }
}
