//! Directory client abstraction: durable `(address, username) -> id`
//! assignment and the per-address participant census.
//!
//! The core (`crate::bus`) depends only on the [`DirectoryClient`] trait, per
//! SPEC_FULL.md §4.1 — it is an external collaborator the ring protocol
//! treats as an abstract key-value store with one atomic counter operation.
//! [`file_backed::FileDirectory`] is this crate's single concrete backend;
//! swapping in a networked directory means implementing this trait, nothing
//! in `crate::bus` changes.

pub mod file_backed;

use crate::error::Result;

/// Resolves and persists participant identity for a bus address.
pub trait DirectoryClient {
    /// Resolve `username`'s id on `address`, assigning a fresh one via an
    /// atomic increment of the address's connection counter if this is the
    /// first time this username has joined. Returns `(id, was_created)`.
    fn resolve_or_assign(&self, address: &str, username: &str) -> Result<(usize, bool)>;

    /// The current number of participants ever assigned an id on `address`.
    /// Fails if the address has no participants yet.
    fn get_count(&self, address: &str) -> Result<usize>;

    /// The username that was assigned participant id `id` on `address`.
    fn get_username(&self, address: &str, id: usize) -> Result<String>;

    /// Remove every directory key associated with `address`. Best-effort:
    /// missing keys are not an error.
    fn wipe(&self, address: &str);
}
