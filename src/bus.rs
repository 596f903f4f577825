//! Bus join/leave/wipe: mapping an address's shared regions and a
//! participant's view of every peer's payload arena.

use std::mem::size_of;

use tracing::{ debug, warn };

use crate::arena::Arena;
use crate::constants::{ MAX_ADDRESS_LENGTH, MAX_USERNAME_LENGTH };
use crate::directory::file_backed::FileDirectory;
use crate::directory::DirectoryClient;
use crate::error::{ BusError, Result };
use crate::layout::{ Header, RingBuffer };
use crate::shmem::posix::PosixShm;
use crate::shmem::{ OpenMode, ShmProvider, ShmRegion };

fn header_name(address: &str) -> String {
    format!("disruptor:{address}")
}

fn ring_name(address: &str) -> String {
    format!("disruptor:{address}:rb")
}

fn arena_name(address: &str, id: usize) -> String {
    format!("disruptor:{address}:{id}")
}

fn validate_name(name: &str, max_len: usize) -> Result<()> {
    if name.is_empty() {
        return Err(BusError::invalid_name(name, "must not be empty"));
    }
    if name.len() > max_len {
        return Err(BusError::invalid_name(name, "exceeds maximum length"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(BusError::invalid_name(name, "must not contain a path separator"));
    }
    Ok(())
}

/// Configuration for [`Bus::join`].
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// The bus address to join.
    pub address: String,
    /// This participant's username.
    pub username: String,
    /// Size, in bytes, of this participant's outbound payload arena.
    pub send_buffer_size: usize,
}

impl BusConfig {
    /// Build a config with the default arena size
    /// ([`crate::constants::DEFAULT_SEND_BUFFER_SIZE`]).
    pub fn new(address: impl AsRef<str>, username: impl AsRef<str>) -> Self {
        Self {
            address: address.as_ref().to_string(),
            username: username.as_ref().to_string(),
            send_buffer_size: crate::constants::DEFAULT_SEND_BUFFER_SIZE,
        }
    }

    /// Override the outbound arena size.
    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = size;
        self
    }
}

/// A joined participant's handle onto a bus address.
///
/// Generic over the directory backend `D` and the shared-memory backend `S`
/// so the ring protocol in `crate::producer`/`crate::consumer` never couples
/// itself to a specific transport for either collaborator — see
/// SPEC_FULL.md §4.1/§4.2.
pub struct Bus<D: DirectoryClient, S: ShmProvider> {
    pub(crate) address: String,
    pub(crate) id: usize,
    pub(crate) directory: D,
    pub(crate) shm: S,
    pub(crate) header: S::Region,
    pub(crate) ring_region: S::Region,
    pub(crate) ring: *mut RingBuffer,
    pub(crate) arenas: Vec<Arena<S::Region>>,
    pub(crate) names: Vec<String>,
    // `recv`'s cached half-open range, private to this bus instance.
    pub(crate) read_start: u64,
    pub(crate) read_end: u64,
}

// `ring` points into `ring_region`, which is `Send` for every `ShmProvider`
// this crate ships (shared memory is, by construction, meant to cross
// process/thread boundaries). A `Bus` is never `Sync`: `claim`/`publish`/
// `recv` take `&mut self`, so only one thread drives a given participant at
// a time, matching the single-writer-per-slot principle in SPEC_FULL.md §4.5.
unsafe impl<D: DirectoryClient + Send, S: ShmProvider + Send> Send for Bus<D, S> where S::Region: Send {}

impl<D: DirectoryClient, S: ShmProvider> Bus<D, S> {
    /// Join `address` as `username`, using the given directory and
    /// shared-memory backends. See SPEC_FULL.md §4.3.
    pub fn join(shm: S, directory: D, config: &BusConfig) -> Result<Self> {
        let BusConfig { address, username, send_buffer_size } = config;

        validate_name(address, MAX_ADDRESS_LENGTH)?;
        validate_name(username, MAX_USERNAME_LENGTH)?;

        let (id, was_created) = directory.resolve_or_assign(address, username).map_err(|e| {
            warn!(%address, %username, error = %e, "directory resolve_or_assign failed");
            e
        })?;

        let count = directory.get_count(address).map_err(|e| {
            warn!(%address, error = %e, "directory get_count failed");
            e
        })?;

        let header = shm.open(&header_name(address), size_of::<Header>() as i64, OpenMode::Default).map_err(|e| {
            warn!(%address, "failed to open header region");
            e
        })?;

        let ring_region = shm
            .open(&ring_name(address), size_of::<RingBuffer>() as i64, OpenMode::Default)
            .map_err(|e| {
                warn!(%address, "failed to open ring-buffer region");
                e
            })?;
        let ring = ring_region.ptr() as *mut RingBuffer;

        // Only the participant whose `open` call actually brought the
        // ring-buffer region into existence may initialize it in place —
        // every later opener already races peers that may have mapped (or
        // be about to map) the same bytes. `ring_region.did_create()`
        // answers exactly that question; the directory's `was_created` does
        // not; it is `true` for every distinct username's first join on
        // this address; if a bus already carries published traffic, a
        // second or third distinct participant joining would re-zero
        // `publish_cursor`/`claim_cursor` and every slot out from under
        // peers who already published to it.
        if ring_region.did_create() {
            unsafe {
                RingBuffer::init_in_place(ring);
            }
        }

        if was_created {
            let created = shm
                .open(&arena_name(address, id), *send_buffer_size as i64, OpenMode::MustCreate)
                .map_err(|e| {
                    warn!(%address, id, "failed to create own payload arena");
                    e
                })?;
            shm.close(created);
        }

        let mut arenas = Vec::with_capacity(count);
        let mut names = Vec::with_capacity(count);
        for i in 0..count {
            let region = shm
                .open(&arena_name(address, i), *send_buffer_size as i64, OpenMode::MustNotCreate)
                .map_err(|_| {
                    warn!(%address, participant = i, "failed to map peer arena");
                    BusError::mapping(address.clone(), i)
                })?;
            arenas.push(Arena::new(region));
            names.push(directory.get_username(address, i).map_err(|e| {
                warn!(%address, participant = i, "failed to resolve peer username");
                e
            })?);
        }

        debug!(%address, %username, id, count, "joined bus");

        Ok(Self {
            address: address.clone(),
            id,
            directory,
            shm,
            header,
            ring_region,
            ring,
            arenas,
            names,
            read_start: 0,
            read_end: 0,
        })
    }

    /// This participant's assigned id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The bus address this handle was joined to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Number of participants mapped at join time.
    pub fn participant_count(&self) -> usize {
        self.arenas.len()
    }

    pub(crate) fn ring(&self) -> &RingBuffer {
        unsafe { &*self.ring }
    }

    /// Detach from the bus: unmap every arena and close the ring-buffer and
    /// header regions. No cursor updates happen during leave — this is
    /// exactly what dropping a `Bus` does; the method exists so call sites
    /// can name the SPEC_FULL.md §4.3 operation explicitly.
    pub fn leave(self) {
        debug!(address = %self.address, id = self.id, "left bus");
    }
}

/// Best-effort teardown of every region and directory key for `address`.
///
/// Does not coordinate with live participants: callers must ensure no
/// participant is joined before calling this. Missing keys/regions are not
/// errors (SPEC_FULL.md §4.7).
pub fn wipe<D: DirectoryClient, S: ShmProvider>(directory: &D, shm: &S, address: &str) {
    directory.wipe(address);
    shm.unlink(&header_name(address));
    shm.unlink(&ring_name(address));
    for i in 0..crate::constants::MAX_CONNECTIONS {
        shm.unlink(&arena_name(address, i));
    }
    debug!(%address, "wiped bus");
}

/// Join `address` using this crate's default backends: a POSIX
/// `shm_open`/`mmap` shared-memory provider and a file-backed directory
/// rooted at [`FileDirectory::default_root`].
pub fn join_default(config: &BusConfig) -> Result<Bus<FileDirectory, PosixShm>> {
    let directory = FileDirectory::open_default()
        .map_err(|e| BusError::directory(config.address.clone(), e.to_string()))?;
    Bus::join(PosixShm, directory, config)
}

/// Wipe `address` using this crate's default backends.
pub fn wipe_default(address: &str) {
    if let Ok(directory) = FileDirectory::open_default() {
        wipe(&directory, &PosixShm, address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_address(tag: &str) -> String {
        format!("t-{tag}-{}", std::process::id())
    }

    // Every participant's join needs its own `FileDirectory` handle onto the
    // *same* root (a real directory client would be shared or networked);
    // this must not wipe the root on each call, or a second participant's
    // join would erase the first one's just-written identity.
    fn test_directory(tag: &str) -> FileDirectory {
        let root = std::env::temp_dir().join(format!("ringbus-bus-test-{tag}-{}", std::process::id()));
        FileDirectory::new(root).unwrap()
    }

    #[test]
    fn join_assigns_id_zero_to_first_participant() {
        let address = unique_address("join-first");
        wipe(&test_directory("join-first"), &PosixShm, &address);

        let directory = test_directory("join-first");
        let config = BusConfig::new(&address, "alice").with_send_buffer_size(4096);
        let bus = Bus::join(PosixShm, directory, &config).unwrap();

        assert_eq!(bus.id(), 0);
        assert_eq!(bus.participant_count(), 1);

        let directory = test_directory("join-first");
        wipe(&directory, &PosixShm, &address);
    }

    #[test]
    fn rejoin_preserves_identity_and_remaps_peers() {
        let address = unique_address("rejoin");
        let directory = test_directory("rejoin");
        wipe(&directory, &PosixShm, &address);

        let config_a = BusConfig::new(&address, "alice").with_send_buffer_size(4096);
        let directory_a = test_directory("rejoin");
        let bus_a = Bus::join(PosixShm, directory_a, &config_a).unwrap();
        assert_eq!(bus_a.id(), 0);
        bus_a.leave();

        let directory_a2 = test_directory("rejoin");
        let bus_a2 = Bus::join(PosixShm, directory_a2, &config_a).unwrap();
        assert_eq!(bus_a2.id(), 0, "rejoin with same (address, username) must preserve id");

        let directory = test_directory("rejoin");
        wipe(&directory, &PosixShm, &address);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let directory = test_directory("invalid-names");
        let long_name = "x".repeat(MAX_ADDRESS_LENGTH + 1);
        let config = BusConfig::new(long_name, "alice");
        assert!(Bus::join(PosixShm, directory, &config).is_err());

        let directory = test_directory("invalid-names-2");
        let config = BusConfig::new("t", "has/slash");
        assert!(Bus::join(PosixShm, directory, &config).is_err());
    }
}
