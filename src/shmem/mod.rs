//! Shared-memory provider abstraction.
//!
//! The ring protocol in [`crate::bus`], [`crate::producer`], and
//! [`crate::consumer`] is written entirely against this trait; it never
//! calls into `libc` or `mmap` directly. That keeps the hard part of the
//! system (the atomic protocol) independent of which OS primitive backs a
//! named region independent of whether the backing file lives on `tmpfs` or
//! an ordinary filesystem.

pub mod posix;

use crate::error::Result;

/// How a named region should be created/opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the region if it does not already exist; open it otherwise.
    Default,
    /// Fail if the region already exists.
    MustCreate,
    /// Fail if the region does not already exist.
    MustNotCreate,
}

/// A mapped shared-memory region.
///
/// The pointer is valid for the region's lifetime (until `close`/`Drop`).
/// Implementations must not move the mapping once returned: callers cache
/// `ptr()` and dereference it directly as a typed view.
pub trait ShmRegion {
    /// Raw pointer to the start of the mapped region.
    fn ptr(&self) -> *mut u8;

    /// Actual size of the mapping in bytes (may be larger than requested if
    /// the provider rounds up to a block-size floor).
    fn size(&self) -> i64;

    /// The OS-level name this region was opened under.
    fn name(&self) -> &str;

    /// Whether *this* `open` call is the one that brought the region into
    /// existence (as opposed to mapping one a peer already created).
    ///
    /// Only the creator may safely initialize the region's contents in
    /// place: every later opener already races peers that may have mapped
    /// (or be about to map) the same bytes. This must never be confused
    /// with the directory's own `was_created` flag from
    /// `DirectoryClient::resolve_or_assign`, which answers a different
    /// question (did *this username* just get a fresh id) and is `true`
    /// once per distinct participant, not once per region.
    fn did_create(&self) -> bool;
}

/// Interface consumed by the core for creating, opening, and destroying
/// named shared-memory regions.
///
/// `name` never contains a path separator; the provider is responsible for
/// translating it into whatever namespace its OS primitive requires (a
/// single separator is prefixed, per SPEC_FULL.md §4.2a).
pub trait ShmProvider {
    /// The concrete region type this provider returns.
    type Region: ShmRegion;

    /// Open (and possibly create) a named region of at least `size` bytes.
    fn open(&self, name: &str, size: i64, mode: OpenMode) -> Result<Self::Region>;

    /// Unmap and close a region's descriptor. Does not remove its name from
    /// the namespace; other mappings of the same name remain valid.
    fn close(&self, region: Self::Region) {
        drop(region);
    }

    /// Remove `name` from the namespace. Existing mappings remain valid
    /// until they are individually closed. Missing names are not an error.
    fn unlink(&self, name: &str);
}
