//! Binary-compatible shared-memory layout.
//!
//! Every struct in this module is `#[repr(C)]` with an explicit cache-line
//! alignment, because two different processes (potentially built from two
//! different implementations of this protocol) map the *same* bytes and must
//! agree on their meaning without any serialization step. The `size_of`/
//! `offset_of` assertions at the bottom of the file turn a layout regression
//! into a compile error instead of a cross-process corruption bug.

use std::sync::atomic::AtomicU64;

use crate::constants::{ CACHE_LINE_SIZE, MAX_CONNECTIONS, MAX_SLOTS };

/// A 64-bit monotonic sequence cursor, padded to a full cache line so that
/// independent cursors (claim, publish, and each participant's read cursor)
/// never share a cache line and cause false sharing between cores.
#[repr(C, align(64))]
pub struct Cursor {
    pub value: AtomicU64,
    _pad: [u64; 7],
}

impl Cursor {
    pub const fn new(initial: u64) -> Self {
        Self { value: AtomicU64::new(initial), _pad: [0; 7] }
    }
}

/// The tiny header region, identifying the bus's session generation.
///
/// `session` is never written by this crate today (see DESIGN.md for the
/// open question this leaves); it exists so that a future restart-detection
/// feature can bump it without changing the region's name or size.
#[repr(C)]
pub struct Header {
    pub session: AtomicU64,
}

impl Header {
    pub const fn new() -> Self {
        Self { session: AtomicU64::new(0) }
    }
}

/// Per-participant read cursor, stored inline in the ring-buffer region so
/// every producer can compute the slowest consumer without a separate
/// allocation or directory round-trip.
#[repr(C, align(64))]
pub struct ConnectionState {
    pub read_cursor: Cursor,
}

impl ConnectionState {
    pub const fn new() -> Self {
        Self { read_cursor: Cursor::new(0) }
    }
}

/// A single 64-byte slot descriptor.
///
/// Fields are plain `i64`s rather than atomics: the protocol's only
/// synchronization point is the release store to `RingBuffer::publish_cursor`
/// in [`crate::producer::publish`] (see §4.5 of SPEC_FULL.md) — by the time a
/// consumer observes that store with acquire ordering, every slot write that
/// happened-before it is visible. Reads and writes of individual fields use
/// `read_volatile`/`write_volatile` so the compiler cannot reorder or elide
/// them around that fence.
#[repr(C, align(64))]
#[derive(Clone, Copy)]
pub struct SlotDescriptor {
    pub timestamp: i64,
    pub sender_id: i64,
    pub size: i64,
    pub offset: i64,
    _pad: [i64; 4],
}

impl SlotDescriptor {
    pub const fn empty() -> Self {
        Self { timestamp: 0, sender_id: -1, size: 0, offset: 0, _pad: [0; 4] }
    }
}

/// The shared ring-buffer region: cursors, the per-participant read-cursor
/// table, and the fixed-capacity slot array.
#[repr(C)]
pub struct RingBuffer {
    pub publish_cursor: Cursor,
    pub claim_cursor: Cursor,
    pub connections: [ConnectionState; MAX_CONNECTIONS],
    pub slots: [SlotDescriptor; MAX_SLOTS],
}

impl RingBuffer {
    /// Initialize a freshly-mapped (zeroed) region in place.
    ///
    /// # Safety
    /// `ptr` must point to at least `size_of::<RingBuffer>()` bytes of valid,
    /// exclusively-owned memory (i.e. this must be the participant that just
    /// created the region, before any peer has mapped it).
    pub unsafe fn init_in_place(ptr: *mut RingBuffer) {
        (*ptr).publish_cursor.value.store(0, std::sync::atomic::Ordering::Relaxed);
        (*ptr).claim_cursor.value.store(0, std::sync::atomic::Ordering::Relaxed);
        for c in (*ptr).connections.iter_mut() {
            c.read_cursor.value.store(0, std::sync::atomic::Ordering::Relaxed);
        }
        for s in (*ptr).slots.iter_mut() {
            *s = SlotDescriptor::empty();
        }
    }
}

const_assert_eq!(CACHE_LINE_SIZE, 64);
const_assert_eq!(std::mem::size_of::<Cursor>(), 64);
const_assert_eq!(std::mem::size_of::<Header>(), 8);
const_assert_eq!(std::mem::size_of::<ConnectionState>(), 64);
const_assert_eq!(std::mem::size_of::<SlotDescriptor>(), 64);
const_assert_eq!(std::mem::size_of::<RingBuffer>(), 64 + 64 + 256 * 64 + 4096 * 64);
const_assert_eq!(std::mem::offset_of!(RingBuffer, publish_cursor), 0);
const_assert_eq!(std::mem::offset_of!(RingBuffer, claim_cursor), 64);
const_assert_eq!(std::mem::offset_of!(RingBuffer, connections), 128);
const_assert_eq!(std::mem::offset_of!(RingBuffer, slots), 128 + 256 * 64);

use static_assertions::const_assert_eq;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_size_matches_wire_contract() {
        assert_eq!(std::mem::size_of::<RingBuffer>(), 16512 + 128);
    }

    #[test]
    fn slot_index_is_a_pure_function_of_sequence() {
        let seq: u64 = 4096 + 5;
        let idx = (seq & crate::constants::SLOT_MASK) as usize;
        assert_eq!(idx, 5);
    }
}
