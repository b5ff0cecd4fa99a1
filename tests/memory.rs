//! Shadow memory and load/store propagation.

mod common;

use quickcheck_macros::quickcheck;

use symvm::expr::ExprKind;

use common::runtime;

#[test]
fn fully_concrete_reads_produce_no_expression() {
    let (mut rt, _dir) = runtime();
    let buf = [1u8, 2, 3, 4, 5, 6, 7, 8];
    let addr = buf.as_ptr() as usize;

    assert!(rt.is_concrete(addr, buf.len()));
    let read = unsafe { rt.read_memory(addr, buf.len(), true) };
    assert!(read.is_none());
}

#[test]
fn symbolic_write_then_read_reconstructs_the_value() {
    let (mut rt, _dir) = runtime();
    let buf = [0u8; 4];
    let addr = buf.as_ptr() as usize;

    let value = rt.build(|b| b.integer(0xdead_beef, 32));
    rt.write_memory(addr, 4, Some(value), true);

    assert!(!rt.is_concrete(addr, 4));
    let read = unsafe { rt.read_memory(addr, 4, true) }.expect("range is symbolic");
    assert_eq!(read.as_const_int(), Some((0xdead_beef, 32)));
}

#[quickcheck]
fn endianness_round_trip(value: u64, little_endian: bool) -> bool {
    let (mut rt, _dir) = runtime();
    let buf = [0u8; 8];
    let addr = buf.as_ptr() as usize;

    let expr = rt.build(|b| b.integer(u128::from(value), 64));
    rt.write_memory(addr, 8, Some(expr), little_endian);
    let read = unsafe { rt.read_memory(addr, 8, little_endian) }.expect("symbolic");

    read.as_const_int() == Some((u128::from(value), 64))
}

#[quickcheck]
fn bswap_converts_between_endiannesses(value: u32) -> bool {
    let (mut rt, _dir) = runtime();
    let buf = [0u8; 4];
    let addr = buf.as_ptr() as usize;

    let expr = rt.build(|b| b.integer(u128::from(value), 32));
    rt.write_memory(addr, 4, Some(expr), true);

    let big = unsafe { rt.read_memory(addr, 4, false) }.expect("symbolic");
    let little = unsafe { rt.read_memory(addr, 4, true) }.expect("symbolic");
    let swapped = rt.build(|b| b.bswap(big));

    swapped.as_const_int() == little.as_const_int()
}

#[quickcheck]
fn shadow_slots_always_hold_bytes(value: u64, length: u8) -> bool {
    let length = usize::from(length % 8) + 1;
    let (mut rt, _dir) = runtime();
    let buf = [0u8; 9];
    let addr = buf.as_ptr() as usize;

    let expr = rt.build(|b| b.integer(u128::from(value), 8 * length as u32));
    rt.write_memory(addr, length, Some(expr), true);

    rt.shadow()
        .iter(addr, length)
        .all(|slot| slot.map_or(true, |e| e.bits() == 8))
}

#[test]
fn mixed_reads_pull_concrete_bytes_from_memory() {
    let (mut rt, _dir) = runtime();
    let buf = [0x11u8, 0x22, 0x33, 0x44];
    let addr = buf.as_ptr() as usize;

    // Make only byte 2 symbolic; the rest fold in from real memory.
    unsafe { rt.make_symbolic(addr + 2, 1, 0) };

    let read = unsafe { rt.read_memory(addr, 4, true) }.expect("partially symbolic");
    assert_eq!(read.bits(), 32);
    assert_eq!(read.input_dependencies(), vec![0]);
}

#[test]
fn concrete_overwrite_clears_the_shadow() {
    let (mut rt, _dir) = runtime();
    let buf = [0u8; 4];
    let addr = buf.as_ptr() as usize;

    unsafe { rt.make_symbolic(addr, 4, 0) };
    assert!(!rt.is_concrete(addr, 4));

    rt.write_memory(addr, 4, None, true);
    assert!(rt.is_concrete(addr, 4));
}

#[test]
fn memcpy_carries_shadow_to_the_destination() {
    let (mut rt, _dir) = runtime();
    let src = [0u8; 4];
    let dst = [0u8; 4];
    let src_addr = src.as_ptr() as usize;
    let dst_addr = dst.as_ptr() as usize;

    unsafe { rt.make_symbolic(src_addr, 4, 0) };
    rt.memcpy(dst_addr, src_addr, 4);

    let read = unsafe { rt.read_memory(dst_addr, 4, true) }.expect("copied shadow");
    assert_eq!(read.input_dependencies(), vec![0, 1, 2, 3]);
}

#[test]
fn memset_broadcasts_one_expression() {
    let (mut rt, _dir) = runtime();
    let buf = [0u8; 6];
    let addr = buf.as_ptr() as usize;

    let byte = rt.get_input_byte(0, 0xab);
    rt.memset(addr, Some(byte), 6);

    for slot in rt.shadow().iter(addr, 6) {
        let expr = slot.expect("whole range symbolic");
        assert!(matches!(expr.kind(), ExprKind::InputByte { offset: 0 }));
    }
}

#[test]
fn writes_and_reads_cross_page_boundaries() {
    let (mut rt, _dir) = runtime();
    // A buffer guaranteed to straddle a page boundary.
    let buf = vec![0u8; 8192];
    let base = buf.as_ptr() as usize;
    let addr = (base & !0xfff) + 0x1000 - 2;
    assert!(addr >= base && addr + 4 <= base + buf.len());

    let value = rt.build(|b| b.integer(0x0102_0304, 32));
    rt.write_memory(addr, 4, Some(value), true);

    let read = unsafe { rt.read_memory(addr, 4, true) }.expect("symbolic");
    assert_eq!(read.as_const_int(), Some((0x0102_0304, 32)));
    assert_eq!(rt.shadow().page_count(), 2);
}

#[test]
fn overflow_results_match_their_memory_image() {
    let (mut rt, _dir) = runtime();

    // The {i16, i1} aggregate written to memory must place the overflow
    // flag after the (endianness-adjusted) result, padded to 4 bytes.
    let a = rt.build(|b| b.integer(0x7fff, 16));
    let one = rt.build(|b| b.integer(1, 16));
    let packed = rt.build(|b| b.add_overflow(a, one, true, true));

    assert_eq!(packed.bits(), 32);
    // 0x7fff + 1 overflows to 0x8000; little-endian image 00 80, flag 01,
    // padding 00.
    assert_eq!(packed.as_const_int(), Some((0x0080_0100, 32)));

    let buf = [0u8; 4];
    let addr = buf.as_ptr() as usize;
    rt.write_memory(addr, 4, Some(packed), false);
    let read = unsafe { rt.read_memory(addr, 4, false) }.expect("symbolic");
    assert_eq!(read.as_const_int(), Some((0x0080_0100, 32)));
}
