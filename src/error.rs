//! Error types for the ring bus.

use thiserror::Error;

/// Result type alias for ring bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors surfaced by the ring bus's join/leave/wipe paths.
///
/// `claim` never returns a `BusError`: an exhausted arena is communicated by
/// `Option::None` (see [`BusError`] docs on `ArenaFull` below for why it has
/// no variant here). `publish` and `recv` are infallible given a correctly
/// joined bus over a non-corrupt ring; the only way either can fail is a
/// [`BusError::PublishInvariant`] panic, which indicates memory corruption
/// rather than a condition callers should recover from.
#[derive(Error, Debug)]
pub enum BusError {
    /// Address or username outside the `[1, 31]`-byte bound, or containing a
    /// path separator.
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// The offending address or username.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The directory backend was unreachable, a key was missing, or a value
    /// could not be parsed.
    #[error("directory error for address '{address}': {message}")]
    Directory {
        /// The bus address the operation was scoped to.
        address: String,
        /// Description of the failure.
        message: String,
    },

    /// A shared-memory region could not be opened, sized, or mapped.
    #[error("shared memory error for region '{region}': {source}")]
    Shm {
        /// The region name that failed to open/map.
        region: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A peer's payload arena could not be mapped during `join`.
    #[error("failed to map arena for participant {id} on address '{address}'")]
    Mapping {
        /// The bus address being joined.
        address: String,
        /// The participant id whose arena failed to map.
        id: usize,
    },

    /// A slot descriptor referenced a sender id outside `[0, MAX_CONNECTIONS)`,
    /// or otherwise could not be resolved. This indicates ring corruption; the
    /// bus has no recovery path short of `wipe` and rejoin.
    #[error("publish invariant violated: {message}")]
    PublishInvariant {
        /// Description of the invariant that did not hold.
        message: String,
    },
}

impl BusError {
    pub(crate) fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName { name: name.into(), reason }
    }

    pub(crate) fn directory(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Directory { address: address.into(), message: message.into() }
    }

    pub(crate) fn shm(region: impl Into<String>, source: std::io::Error) -> Self {
        Self::Shm { region: region.into(), source }
    }

    pub(crate) fn mapping(address: impl Into<String>, id: usize) -> Self {
        Self::Mapping { address: address.into(), id }
    }

    pub(crate) fn publish_invariant(message: impl Into<String>) -> Self {
        Self::PublishInvariant { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_name_reports_reason() {
        let err = BusError::invalid_name("", "too short");
        assert!(matches!(err, BusError::InvalidName { .. }));
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn shm_error_wraps_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such region");
        let err = BusError::shm("disruptor:t1", io_err);
        assert!(err.to_string().contains("disruptor:t1"));
    }
}
