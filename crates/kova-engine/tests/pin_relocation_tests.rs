//! Integration tests for pinned calls against a relocating segment
//!
//! The segment here is deliberately small so that ordinary allocation
//! traffic forces relocations, the way stack growth does in a running task.
//! The tests verify the correct boundary pattern: tracked refs between
//! calls, raw addresses only inside a pin scope.

use kova_engine::{pin_and_call, HandleTable, ObjRef, SegRef, Segment, SegmentError};

/// Stand-in for a native function: checksums the bytes it was handed.
fn native_checksum(ptr: *const u8, len: usize) -> u64 {
    // Native code works from the raw pointer, not the slice
    let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
    bytes.iter().fold(0u64, |acc, &b| acc.wrapping_mul(31).wrapping_add(b as u64))
}

#[test]
fn test_correct_pattern_stable_across_relocations() {
    let mut seg = Segment::with_capacity(32);
    let payload = seg.alloc_bytes(&[7; 24]).unwrap();
    let expected = pin_and_call(&seg, &[payload], |args| {
        native_checksum(args[0].as_ptr(), args[0].len())
    })
    .unwrap();

    let mut relocations = 0;
    for round in 0..50u8 {
        // Relocation-triggering traffic between calls
        let epoch_before = seg.epoch();
        let junk = seg.alloc_bytes(&[round; 48]).unwrap();
        if seg.epoch() != epoch_before {
            relocations += 1;
        }
        seg.free(junk).unwrap();
        seg.compact();

        // Capture-and-immediately-call: fresh pin, fresh address, same bytes
        let sum = pin_and_call(&seg, &[payload], |args| {
            native_checksum(args[0].as_ptr(), args[0].len())
        })
        .unwrap();
        assert_eq!(sum, expected, "payload corrupted after round {round}");
    }

    assert!(relocations > 0, "test never exercised a relocation");
}

#[test]
fn test_relocation_between_calls_may_move_payload() {
    let mut seg = Segment::new();
    let filler = seg.alloc_bytes(&[0; 32]).unwrap();
    let payload = seg.alloc_bytes(&[1, 2, 3, 4]).unwrap();

    let addr_before = pin_and_call(&seg, &[payload], |args| args[0].as_ptr() as usize).unwrap();

    // Compaction slides the payload down over the freed filler
    seg.free(filler).unwrap();
    let epoch = seg.epoch();
    assert_eq!(seg.compact(), 32);
    assert!(seg.epoch() > epoch);

    let addr_after = pin_and_call(&seg, &[payload], |args| {
        assert_eq!(args[0].as_slice(), &[1, 2, 3, 4]);
        args[0].as_ptr() as usize
    })
    .unwrap();

    // The tracked ref still resolves; the old raw address is exactly the
    // kind of alias that must not be carried across calls.
    assert_ne!(
        addr_before, addr_after,
        "payload moved but address did not change"
    );
}

#[test]
fn test_growth_suppressed_during_pinned_call() {
    let mut seg = Segment::with_capacity(64);
    let arg = seg.alloc_bytes(&[5; 32]).unwrap();

    // A pin held by boundary glue keeps the segment still; the managed
    // side observes that as a refused relocation, never as a moved payload.
    seg.pin(arg).unwrap();
    let err = seg.alloc_bytes(&[0; 128]).unwrap_err();
    assert_eq!(err, SegmentError::GrowthSuppressed { pinned: 1 });
    assert_eq!(seg.compact(), 0);
    seg.unpin(arg);

    // Released: growth proceeds and the payload follows its ref
    let big = seg.alloc_bytes(&[0; 128]).unwrap();
    assert_eq!(seg.bytes(big).unwrap().len(), 128);
    assert_eq!(seg.bytes(arg).unwrap(), &[5; 32]);
}

#[test]
fn test_nested_handle_lookup_re_pins() {
    // Long-lived sharing and call-scoped sharing composed: native code
    // holds a handle to a managed string; mid-call it redeems the handle
    // and re-enters a pin scope for the new payload's bytes.
    let table = HandleTable::new();
    let mut seg = Segment::new();

    let greeting: SegRef = seg.alloc_str("hello from kova").unwrap();
    let h = table.create(ObjRef::new(greeting)).unwrap();

    let arg = seg.alloc_bytes(&[0xAB; 4]).unwrap();
    let observed = pin_and_call(&seg, &[arg], |args| {
        assert_eq!(args[0].len(), 4);

        // Native side: integer handle -> tracked ref -> nested pin scope.
        // The redeemed object is NOT covered by the outer pin.
        let redeemed = *table
            .lookup(h)
            .unwrap()
            .downcast_ref::<SegRef>()
            .unwrap();
        pin_and_call(&seg, &[redeemed], |inner| {
            String::from_utf8(inner[0].as_slice().to_vec()).unwrap()
        })
        .unwrap()
    })
    .unwrap();

    assert_eq!(observed, "hello from kova");
    assert_eq!(seg.pinned(), 0);
}

#[test]
fn test_stale_handle_mid_call_is_reported() {
    let table = HandleTable::new();
    let mut seg = Segment::new();

    let data = seg.alloc_bytes(&[1]).unwrap();
    let h = table.create(ObjRef::new(data)).unwrap();
    table.release(h).unwrap();

    let arg = seg.alloc_bytes(&[2]).unwrap();
    pin_and_call(&seg, &[arg], |_| {
        // The native side kept a stale integer; redemption fails loudly
        assert!(table.lookup(h).is_err());
    })
    .unwrap();
}

#[test]
fn test_free_rejected_while_call_in_flight() {
    let mut seg = Segment::new();
    let arg = seg.alloc_bytes(&[9; 8]).unwrap();

    seg.pin(arg).unwrap();
    assert_eq!(seg.free(arg), Err(SegmentError::StillPinned(arg)));
    seg.unpin(arg);
    assert_eq!(seg.free(arg), Ok(()));
}

#[test]
fn test_repeated_deep_call_pattern() {
    // Simulates a call-boundary generator issuing many pinned calls with
    // mixed argument sets while the segment churns.
    let mut seg = Segment::with_capacity(64);
    let a = seg.alloc_str("alpha").unwrap();
    let b = seg.alloc_bytes(&[0xEE; 10]).unwrap();

    for i in 0..200u8 {
        let scratch = seg.alloc_bytes(&[i; 7]).unwrap();

        let (la, lb, ls) = pin_and_call(&seg, &[a, b, scratch], |args| {
            (args[0].len(), args[1].len(), args[2].len())
        })
        .unwrap();
        assert_eq!((la, lb, ls), (5, 10, 7));

        seg.free(scratch).unwrap();
        if i % 16 == 0 {
            seg.compact();
        }
    }

    assert_eq!(seg.str_value(a).unwrap(), "alpha");
    assert_eq!(seg.bytes(b).unwrap(), &[0xEE; 10]);
    assert_eq!(seg.pinned(), 0);
}
