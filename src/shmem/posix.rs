//! POSIX `shm_open`/`mmap` backend for [`crate::shmem::ShmProvider`].

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;

use crate::constants::PAGE_SIZE;
use crate::error::{ BusError, Result };

use super::{ OpenMode, ShmProvider, ShmRegion };

/// A region mapped via `shm_open` + `mmap(MAP_SHARED)`.
pub struct PosixRegion {
    name: String,
    fd: RawFd,
    ptr: *mut u8,
    len: usize,
    did_create: bool,
}

impl ShmRegion for PosixRegion {
    fn ptr(&self) -> *mut u8 {
        self.ptr
    }

    fn size(&self) -> i64 {
        self.len as i64
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn did_create(&self) -> bool {
        self.did_create
    }
}

impl Drop for PosixRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
            libc::close(self.fd);
        }
    }
}

// Each process holds at most one `PosixRegion` per name; the pointer is only
// ever dereferenced through the typed views in `crate::layout`.
unsafe impl Send for PosixRegion {}

fn round_up_to_page(size: i64) -> usize {
    let size = size.max(0) as usize;
    let page = PAGE_SIZE;
    (size + page - 1) / page * page
}

/// Translates a bus region name into the POSIX shared-memory object name:
/// a single leading `/` and nothing else, per SPEC_FULL.md §4.2a.
fn posix_name(name: &str) -> io::Result<CString> {
    CString::new(format!("/{name}"))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

/// Default, single-host shared-memory provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixShm;

impl ShmProvider for PosixShm {
    type Region = PosixRegion;

    fn open(&self, name: &str, size: i64, mode: OpenMode) -> Result<PosixRegion> {
        let c_name = posix_name(name).map_err(|e| BusError::shm(name, e))?;

        // `did_create` must be known precisely: only the side that actually
        // creates the region may `ftruncate` it, or a slower peer opening an
        // already-sized region could truncate it back down underneath a
        // mapping that's already in use.
        let (fd, did_create) = match mode {
            OpenMode::MustNotCreate => {
                let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o600) };
                (fd, false)
            }
            OpenMode::MustCreate => {
                let fd = unsafe {
                    libc::shm_open(
                        c_name.as_ptr(),
                        libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                        0o600
                    )
                };
                (fd, true)
            }
            OpenMode::Default => {
                let fd = unsafe {
                    libc::shm_open(
                        c_name.as_ptr(),
                        libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                        0o600
                    )
                };
                if fd >= 0 {
                    (fd, true)
                } else {
                    let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o600) };
                    (fd, false)
                }
            }
        };

        if fd < 0 {
            return Err(BusError::shm(name, io::Error::last_os_error()));
        }

        if did_create {
            let rounded = round_up_to_page(size);
            if unsafe { libc::ftruncate(fd, rounded as libc::off_t) } != 0 {
                let err = io::Error::last_os_error();
                unsafe {
                    libc::close(fd);
                }
                return Err(BusError::shm(name, err));
            }
        }

        // Trust the file's actual size: for a newly created region that's
        // what we just set via `ftruncate`; for one we merely opened it's
        // whatever its creator set, which may differ from our own `size`.
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } != 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
            }
            return Err(BusError::shm(name, err));
        }
        let map_len = stat.st_size as usize;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0
            )
        };

        if ptr == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
            }
            return Err(BusError::shm(name, err));
        }

        Ok(PosixRegion { name: name.to_string(), fd, ptr: ptr as *mut u8, len: map_len, did_create })
    }

    fn unlink(&self, name: &str) {
        if let Ok(c_name) = posix_name(name) {
            unsafe {
                libc::shm_unlink(c_name.as_ptr());
            }
        }
    }
}
