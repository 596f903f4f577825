//! Single-host, file-backed [`DirectoryClient`].
//!
//! Each `(address, key)` pair is a regular file under a root directory; the
//! file's bytes are its value, following the key-value contract in
//! SPEC_FULL.md §4.1 almost literally (`address/connections/username/id`
//! becomes the path `root/address/connections/username/id`). The only
//! operation that needs cross-process mutual exclusion is incrementing
//! `connectionsCount`, which is guarded with an advisory `flock` held only
//! for the read-modify-write — everything else is write-once.

use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{ Path, PathBuf };

use nix::fcntl::{ flock, FlockArg };

use super::DirectoryClient;
use crate::error::{ BusError, Result };

/// File-backed directory rooted at a configurable directory.
pub struct FileDirectory {
    root: PathBuf,
}

impl FileDirectory {
    /// Create a client rooted at `root`, creating the directory if absent.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root used when no override is configured: a subdirectory of the OS
    /// temp directory, shared by every process on the host.
    pub fn default_root() -> PathBuf {
        std::env::temp_dir().join("ringbus-directory")
    }

    /// Open the default, shared directory root.
    pub fn open_default() -> io::Result<Self> {
        Self::new(Self::default_root())
    }

    fn address_dir(&self, address: &str) -> PathBuf {
        self.root.join(address)
    }

    fn count_path(&self, address: &str) -> PathBuf {
        self.address_dir(address).join("connectionsCount")
    }

    fn id_path(&self, address: &str, username: &str) -> PathBuf {
        self.address_dir(address).join("connections").join(username).join("id")
    }

    fn username_path(&self, address: &str, id: usize) -> PathBuf {
        self.address_dir(address).join(id.to_string()).join("username")
    }

    fn read_usize(path: &Path) -> Option<usize> {
        fs::read_to_string(path).ok().and_then(|s| s.trim().parse::<usize>().ok())
    }

    fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)
    }

    /// Atomically increment the address's connection counter and return the
    /// new value, using an advisory file lock so two processes racing to
    /// assign the first id on a brand-new address still get distinct ids.
    fn increment_count(&self, address: &str) -> Result<usize> {
        let path = self.count_path(address);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| BusError::directory(address, e.to_string()))?;
        }

        let file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| BusError::directory(address, e.to_string()))?;

        flock(file.as_raw_fd(), FlockArg::LockExclusive)
            .map_err(|e| BusError::directory(address, format!("flock failed: {e}")))?;

        let current = Self::read_usize(&path).unwrap_or(0);
        let next = current + 1;

        let result = Self::write_atomic(&path, &next.to_string())
            .map_err(|e| BusError::directory(address, e.to_string()));

        let _ = flock(file.as_raw_fd(), FlockArg::Unlock);
        result?;

        Ok(next)
    }
}

impl DirectoryClient for FileDirectory {
    fn resolve_or_assign(&self, address: &str, username: &str) -> Result<(usize, bool)> {
        let id_path = self.id_path(address, username);
        if let Some(id) = Self::read_usize(&id_path) {
            return Ok((id, false));
        }

        let count = self.increment_count(address)?;
        let id = count - 1;

        Self::write_atomic(&id_path, &id.to_string())
            .map_err(|e| BusError::directory(address, e.to_string()))?;
        Self::write_atomic(&self.username_path(address, id), username)
            .map_err(|e| BusError::directory(address, e.to_string()))?;

        Ok((id, true))
    }

    fn get_count(&self, address: &str) -> Result<usize> {
        let count = Self::read_usize(&self.count_path(address))
            .ok_or_else(|| BusError::directory(address, "connectionsCount missing or unparseable"))?;
        if count == 0 {
            return Err(BusError::directory(address, "connectionsCount must be positive"));
        }
        Ok(count)
    }

    fn get_username(&self, address: &str, id: usize) -> Result<String> {
        fs::read_to_string(self.username_path(address, id))
            .map_err(|e| BusError::directory(address, format!("username for id {id}: {e}")))
    }

    fn wipe(&self, address: &str) {
        let _ = fs::remove_dir_all(self.address_dir(address));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_directory(tag: &str) -> FileDirectory {
        let root = std::env::temp_dir().join(format!("ringbus-directory-test-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        FileDirectory::new(root).unwrap()
    }

    #[test]
    fn first_join_assigns_sequential_ids() {
        let dir = temp_directory("sequential");
        let address = "t-sequential";

        let (id_a, created_a) = dir.resolve_or_assign(address, "alice").unwrap();
        let (id_b, created_b) = dir.resolve_or_assign(address, "bob").unwrap();

        assert!(created_a);
        assert!(created_b);
        assert_eq!(id_a, 0);
        assert_eq!(id_b, 1);
        assert_eq!(dir.get_count(address).unwrap(), 2);

        dir.wipe(address);
    }

    #[test]
    fn rejoin_preserves_identity() {
        let dir = temp_directory("rejoin");
        let address = "t-rejoin";

        let (id_first, _) = dir.resolve_or_assign(address, "alice").unwrap();
        let (id_second, created_second) = dir.resolve_or_assign(address, "alice").unwrap();

        assert_eq!(id_first, id_second);
        assert!(!created_second);

        dir.wipe(address);
    }

    #[test]
    fn username_round_trips_through_id() {
        let dir = temp_directory("round-trip");
        let address = "t-round-trip";

        let (id, _) = dir.resolve_or_assign(address, "carol").unwrap();
        assert_eq!(dir.get_username(address, id).unwrap(), "carol");

        dir.wipe(address);
    }

    #[test]
    fn get_count_fails_before_any_join() {
        let dir = temp_directory("no-join");
        assert!(dir.get_count("t-no-join").is_err());
    }

    #[test]
    fn wipe_removes_all_keys_for_address() {
        let dir = temp_directory("wipe");
        let address = "t-wipe";

        dir.resolve_or_assign(address, "dave").unwrap();
        dir.wipe(address);

        assert!(dir.get_count(address).is_err());
    }
}
