//! Receive: the consumer half of the ring protocol.

use std::sync::atomic::Ordering;

use crate::constants::SLOT_MASK;
use crate::directory::DirectoryClient;
use crate::error::{ BusError, Result };
use crate::layout::SlotDescriptor;
use crate::shmem::ShmProvider;

use super::Bus;

/// A received message, borrowed directly out of its sender's payload arena.
///
/// No copy happens between `publish` and `recv`: `data()` points straight
/// into the sender's shared-memory region, valid for as long as the bus
/// stays joined (arenas are append-only, so the bytes behind an already
/// observed message never change).
pub struct Message<'a> {
    sequence: u64,
    sender_id: usize,
    sender: &'a str,
    timestamp: i64,
    data: &'a [u8],
}

impl<'a> Message<'a> {
    /// This message's zero-based ring sequence number (the order it was
    /// published in, counting from 0).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Id of the participant that published this message.
    pub fn sender_id(&self) -> usize {
        self.sender_id
    }

    /// Username of the participant that published this message.
    pub fn sender(&self) -> &'a str {
        self.sender
    }

    /// Opaque, monotonically increasing publish tick (not wall-clock time;
    /// see `crate::producer`'s steady-clock tick source).
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The message payload.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl<D: DirectoryClient, S: ShmProvider> Bus<D, S> {
    /// Receive the next not-yet-seen message, if any is published.
    ///
    /// Returns `Ok(None)` when this participant is caught up to the publish
    /// cursor. Returns `Err(BusError::PublishInvariant)` only if a slot
    /// references a sender id outside the set of participants mapped at join
    /// time, which indicates ring corruption rather than a normal protocol
    /// state — see SPEC_FULL.md §4.6.
    pub fn recv(&mut self) -> Result<Option<Message<'_>>> {
        if self.read_start >= self.read_end {
            self.read_end = self.ring().publish_cursor.value.load(Ordering::Acquire);
            if self.read_start >= self.read_end {
                return Ok(None);
            }
        }

        let next_seq = self.read_start + 1;
        let slot_index = (next_seq.wrapping_sub(1) & SLOT_MASK) as usize;

        let descriptor = unsafe {
            let slot_ptr = &self.ring().slots[slot_index] as *const SlotDescriptor;
            std::ptr::read_volatile(slot_ptr)
        };

        if descriptor.sender_id < 0 || (descriptor.sender_id as usize) >= self.arenas.len() {
            return Err(
                BusError::publish_invariant(
                    format!(
                        "slot {slot_index} references sender_id {} outside [0, {})",
                        descriptor.sender_id,
                        self.arenas.len()
                    )
                )
            );
        }
        let sender_id = descriptor.sender_id as usize;

        let data = unsafe { self.arenas[sender_id].slice_at(descriptor.offset, descriptor.size) };

        self.read_start = next_seq;
        self.ring().connections[self.id].read_cursor.value.store(next_seq, Ordering::Release);

        Ok(
            Some(Message {
                sequence: next_seq - 1,
                sender_id,
                sender: &self.names[sender_id],
                timestamp: descriptor.timestamp,
                data,
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::{ wipe, Bus, BusConfig };
    use crate::directory::file_backed::FileDirectory;
    use crate::shmem::posix::PosixShm;

    fn test_directory(tag: &str) -> FileDirectory {
        let root = std::env::temp_dir().join(format!("ringbus-consumer-test-{tag}-{}", std::process::id()));
        FileDirectory::new(root).unwrap()
    }

    #[test]
    fn recv_returns_none_when_caught_up() {
        let address = format!("t-consumer-empty-{}", std::process::id());
        wipe(&test_directory("empty"), &PosixShm, &address);

        let config = BusConfig::new(&address, "alice").with_send_buffer_size(4096);
        let mut bus = Bus::join(PosixShm, test_directory("empty"), &config).unwrap();

        assert!(bus.recv().unwrap().is_none());

        wipe(&test_directory("empty"), &PosixShm, &address);
    }

    #[test]
    fn publish_then_recv_round_trips_payload() {
        let address = format!("t-consumer-roundtrip-{}", std::process::id());
        wipe(&test_directory("roundtrip"), &PosixShm, &address);

        let config = BusConfig::new(&address, "alice").with_send_buffer_size(4096);
        let mut bus = Bus::join(PosixShm, test_directory("roundtrip"), &config).unwrap();

        let payload = b"hello ring";
        let claim = bus.claim(payload.len()).unwrap();
        unsafe {
            std::ptr::copy_nonoverlapping(payload.as_ptr(), bus.claim_ptr(&claim), payload.len());
        }
        bus.publish(claim);

        let message = bus.recv().unwrap().expect("message should be available");
        assert_eq!(message.data(), payload);
        assert_eq!(message.sender(), "alice");
        assert_eq!(message.sender_id(), 0);

        assert!(bus.recv().unwrap().is_none());

        wipe(&test_directory("roundtrip"), &PosixShm, &address);
    }
}
