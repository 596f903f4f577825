//! Convenience wrappers over claim/publish, providing a `printf`-style
//! helper for formatted sends (SPEC_FULL.md §4.8).

use std::fmt;

use crate::directory::DirectoryClient;
use crate::shmem::ShmProvider;

use super::Bus;

impl<D: DirectoryClient, S: ShmProvider> Bus<D, S> {
    /// Claim, write, and publish `bytes` in one call. Returns `false` if the
    /// arena had no room left; the ring is otherwise untouched.
    pub fn send(&mut self, bytes: &[u8]) -> bool {
        let Some(claim) = self.claim(bytes.len()) else {
            return false;
        };
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.claim_ptr(&claim), bytes.len());
        }
        self.publish(claim);
        true
    }

    /// Format `args` and publish the result, the way `sendf!(bus, "{}", x)`
    /// would read at a call site. Returns `false` if the arena had no room
    /// left for the formatted bytes.
    pub fn sendf(&mut self, args: fmt::Arguments<'_>) -> bool {
        let formatted = fmt::format(args);
        self.send(formatted.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::{ wipe, Bus, BusConfig };
    use crate::directory::file_backed::FileDirectory;
    use crate::shmem::posix::PosixShm;

    fn test_directory(tag: &str) -> FileDirectory {
        let root = std::env::temp_dir().join(format!("ringbus-send-test-{tag}-{}", std::process::id()));
        FileDirectory::new(root).unwrap()
    }

    #[test]
    fn send_then_recv_sees_plain_bytes() {
        let address = format!("t-send-plain-{}", std::process::id());
        wipe(&test_directory("plain"), &PosixShm, &address);

        let config = BusConfig::new(&address, "alice").with_send_buffer_size(4096);
        let mut bus = Bus::join(PosixShm, test_directory("plain"), &config).unwrap();

        assert!(bus.send(b"ping"));
        let message = bus.recv().unwrap().unwrap();
        assert_eq!(message.data(), b"ping");

        wipe(&test_directory("plain"), &PosixShm, &address);
    }

    #[test]
    fn sendf_formats_before_publishing() {
        let address = format!("t-send-fmt-{}", std::process::id());
        wipe(&test_directory("fmt"), &PosixShm, &address);

        let config = BusConfig::new(&address, "alice").with_send_buffer_size(4096);
        let mut bus = Bus::join(PosixShm, test_directory("fmt"), &config).unwrap();

        assert!(bus.sendf(format_args!("count={}", 7)));
        let message = bus.recv().unwrap().unwrap();
        assert_eq!(message.data(), b"count=7");

        wipe(&test_directory("fmt"), &PosixShm, &address);
    }

    #[test]
    fn send_fails_once_arena_is_exhausted() {
        let address = format!("t-send-full-{}", std::process::id());
        wipe(&test_directory("full"), &PosixShm, &address);

        let config = BusConfig::new(&address, "alice").with_send_buffer_size(4096);
        let mut bus = Bus::join(PosixShm, test_directory("full"), &config).unwrap();

        let chunk = vec![0u8; 1024];
        let mut sent_all = true;
        for _ in 0..5 {
            if !bus.send(&chunk) {
                sent_all = false;
                break;
            }
        }
        assert!(!sent_all, "a 4096-byte arena must not absorb 5 KiB of sends");

        wipe(&test_directory("full"), &PosixShm, &address);
    }
}
