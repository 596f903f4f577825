//! Ring Bus Constants
//!
//! Fixed, binary-compatible constants shared by every peer on the bus.
//! None of these are configurable at runtime: changing them changes the
//! wire layout in `crate::layout`, which would break compatibility between
//! processes mapping the same shared-memory regions.

/// Number of slot descriptors in the ring (must be a power of two).
pub const MAX_SLOTS: usize = 4096;

/// Mask applied to a sequence number to compute its slot index.
pub const SLOT_MASK: u64 = (MAX_SLOTS - 1) as u64;

/// Maximum number of participants a single bus address can hold.
pub const MAX_CONNECTIONS: usize = 256;

/// Maximum length, in bytes, of a bus address.
pub const MAX_ADDRESS_LENGTH: usize = 31;

/// Maximum length, in bytes, of a participant username.
pub const MAX_USERNAME_LENGTH: usize = 31;

/// Cache line size assumed for padding (bytes).
pub const CACHE_LINE_SIZE: usize = 64;

/// Default size, in bytes, of a participant's outbound payload arena.
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 1024 * 1024;

/// System page size assumed by the POSIX shared-memory backend when
/// rounding region sizes up to its block-size floor.
pub const PAGE_SIZE: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_slots_is_power_of_two() {
        assert!(MAX_SLOTS.is_power_of_two());
        assert_eq!(SLOT_MASK, (MAX_SLOTS - 1) as u64);
    }

    #[test]
    fn name_length_bounds_are_sane() {
        assert!(MAX_ADDRESS_LENGTH > 0);
        assert!(MAX_USERNAME_LENGTH > 0);
    }
}
