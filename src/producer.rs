//! Claim and publish: the producer half of the ring protocol.

use std::sync::atomic::{ fence, Ordering };

use crate::constants::{ MAX_SLOTS, SLOT_MASK };
use crate::directory::DirectoryClient;
use crate::layout::SlotDescriptor;
use crate::shmem::ShmProvider;

use super::Bus;

/// A claimed, not-yet-published arena range.
///
/// Purely a local bookkeeping value — claiming never touches the ring's
/// atomic cursors (SPEC_FULL.md §4.4); the sequence number is acquired later,
/// inside [`Bus::publish`].
pub struct Claim {
    handle: usize,
    size: usize,
}

impl Claim {
    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<D: DirectoryClient, S: ShmProvider> Bus<D, S> {
    /// Raw pointer to a claimed handle's payload bytes, for writing message
    /// contents before calling [`Bus::publish`].
    ///
    /// # Safety
    /// `claim` must be this `Bus`'s most recent, not-yet-published claim, and
    /// writes through the returned pointer must not exceed `claim.size()`
    /// bytes.
    pub unsafe fn claim_ptr(&self, claim: &Claim) -> *mut u8 {
        unsafe { self.arenas[self.id].ptr_at(claim.handle) }
    }

    /// Bump-allocate `size` bytes of this participant's own arena.
    ///
    /// Purely local pointer arithmetic: no atomics, no syscalls, never
    /// blocks. Returns `None` only if the arena has no room left for `size`
    /// bytes — the arena is fixed-size for the life of the bus, so the only
    /// recourse is to join a new bus with a larger `send_buffer_size`.
    pub fn claim(&mut self, size: usize) -> Option<Claim> {
        let handle = self.arenas[self.id].claim(size)?;
        Some(Claim { handle, size })
    }

    /// Publish a claim: acquire the next ring sequence, wait out backpressure
    /// and any earlier-sequenced claim, write the slot descriptor, then
    /// release it to consumers. Always succeeds given a valid claim.
    ///
    /// The release store to `publish_cursor` is the protocol's one
    /// synchronization point (SPEC_FULL.md §4.5): it happens-after every
    /// write this function makes to the slot, and happens-before any
    /// consumer's acquire load of the same cursor observes this claim's
    /// sequence.
    pub fn publish(&mut self, claim: Claim) -> bool {
        let sequence = self.ring().claim_cursor.value.fetch_add(1, Ordering::Relaxed) + 1;

        self.wait_for_backpressure(sequence);

        let slot_index = (sequence.wrapping_sub(1) & SLOT_MASK) as usize;

        while self.ring().publish_cursor.value.load(Ordering::Acquire) != sequence - 1 {
            std::hint::spin_loop();
        }

        let offset = self.arenas[self.id].offset_of(claim.handle);
        let descriptor = SlotDescriptor {
            timestamp: now_ticks(),
            sender_id: self.id as i64,
            size: claim.size as i64,
            offset,
            ..SlotDescriptor::empty()
        };

        unsafe {
            let slot_ptr = &self.ring().slots[slot_index] as *const SlotDescriptor as *mut SlotDescriptor;
            std::ptr::write_volatile(slot_ptr, descriptor);
        }

        fence(Ordering::Release);
        self.ring().publish_cursor.value.store(sequence, Ordering::Release);

        true
    }

    /// Spin until the slowest *other* consumer's read cursor is within one
    /// ring capacity of `sequence`. Per SPEC_FULL.md §4.5, a lone participant
    /// (nobody else mapped) is never backpressured.
    ///
    /// This participant's own read cursor is excluded from the minimum: a
    /// publisher that never calls `recv` on its own bus must not gate its
    /// own future publishes on a cursor only it could ever advance, which
    /// would deadlock the bus the moment a second participant joined.
    /// Excluding self is also what makes the slow-consumer scenario in
    /// SPEC_FULL.md §8 (S5) resolve: the producer waits on the *consumer's*
    /// cursor, not its own.
    ///
    /// Only the participants mapped at join time are considered: a
    /// participant that joins after this bus did isn't a known slow reader
    /// yet (see DESIGN.md's note on the late-joiner open question).
    fn wait_for_backpressure(&self, sequence: u64) {
        let count = self.names.len();
        if count <= 1 {
            return;
        }

        loop {
            let min_read = (0..count)
                .filter(|&i| i != self.id)
                .map(|i| self.ring().connections[i].read_cursor.value.load(Ordering::Acquire))
                .min()
                .unwrap_or(u64::MAX);

            if sequence.saturating_sub(min_read) <= (MAX_SLOTS as u64) {
                return;
            }
            std::hint::spin_loop();
        }
    }
}

/// A free-running, monotonic tick in microseconds since this process's first
/// publish. Per SPEC_FULL.md §9, `timestamp` only needs to be monotonic and
/// opaque to consumers, not wall-clock time — `Instant` can't go backward
/// under an NTP adjustment the way `SystemTime` can.
fn now_ticks() -> i64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_micros() as i64
}
