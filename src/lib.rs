//! A lock-free, multi-producer multi-consumer message bus over a
//! shared-memory LMAX Disruptor-style ring.
//!
//! Participants map the same named shared-memory regions under a bus
//! address, each claiming a slot in the ring for every message they publish
//! and reading every other participant's publications from their own cursor.
//! A participant's identity (and its payload arena) is durable across
//! rejoin, resolved through a pluggable [`directory`] backend; the shared
//! regions themselves are opened through a pluggable [`shmem`] backend.
//!
//! ```no_run
//! use ringbus::{ join_default, BusConfig };
//!
//! let config = BusConfig::new("chat-room", "alice");
//! let mut bus = join_default(&config)?;
//! bus.send(b"hello");
//! # Ok::<(), ringbus::BusError>(())
//! ```

pub mod arena;
pub mod bus;
pub mod consumer;
pub mod constants;
pub mod directory;
pub mod error;
pub mod layout;
pub mod producer;
pub mod send;
pub mod shmem;

pub use bus::{ join_default, wipe, wipe_default, Bus, BusConfig };
pub use consumer::Message;
pub use directory::file_backed::FileDirectory;
pub use directory::DirectoryClient;
pub use error::{ BusError, Result };
pub use producer::Claim;
pub use shmem::posix::PosixShm;
pub use shmem::{ OpenMode, ShmProvider, ShmRegion };

/// Crate version, re-exported for compatibility checks between participants.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
