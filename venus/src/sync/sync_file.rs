// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Waiting on sync files.
//!
//! A sync file becomes readable once all the fences it holds have signaled, so waiting on one
//! is a `poll(2)` for `POLLIN`.

use crate::VulkanError;
use std::{
    fs::File,
    io,
    os::fd::{AsRawFd, FromRawFd, RawFd},
    time::Duration,
};

/// Waits for `file` to signal, for at most `timeout` or forever if `timeout` is `None`.
///
/// Returns whether the file signaled. Any failure other than the timeout is reported as a lost
/// device.
pub(crate) fn wait(file: &File, timeout: Option<Duration>) -> Result<bool, VulkanError> {
    let timeout_ms = match timeout {
        Some(timeout) => timeout.as_millis().try_into().unwrap_or(libc::c_int::MAX),
        None => -1,
    };

    let mut pollfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };

    loop {
        let ret = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

        match ret {
            0 => return Ok(false),
            n if n > 0 => {
                if pollfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 {
                    return Err(VulkanError::DeviceLost);
                }

                return Ok(true);
            }
            _ => match io::Error::last_os_error().raw_os_error() {
                Some(libc::EINTR | libc::EAGAIN) => continue,
                _ => return Err(VulkanError::DeviceLost),
            },
        }
    }
}

// `_IOWR('>', 4, struct sync_file_info)`
const SYNC_IOC_FILE_INFO: u32 = 0xC038_3E04;

// Filled in by the kernel, never read back.
#[allow(dead_code)]
#[repr(C)]
struct SyncFileInfo {
    name: [libc::c_char; 32],
    status: i32,
    flags: u32,
    num_fences: u32,
    pad: u32,
    sync_fence_info: u64,
}

/// Returns whether `fd` refers to a sync file.
fn is_sync_file(fd: RawFd) -> bool {
    let mut info = SyncFileInfo {
        name: [0; 32],
        status: 0,
        flags: 0,
        num_fences: 0,
        pad: 0,
        sync_fence_info: 0,
    };

    // With `num_fences` set to zero the kernel only fills in the header.
    unsafe { libc::ioctl(fd, SYNC_IOC_FILE_INFO as _, &mut info as *mut SyncFileInfo) >= 0 }
}

/// Takes ownership of the raw descriptor `fd`.
///
/// `-1` is accepted and means that the payload is already signaled. Other negative values and
/// descriptors that are not sync files are rejected.
///
/// # Safety
///
/// - If `fd` is open, it must be a sync file that the caller owns and no longer uses.
pub(crate) unsafe fn from_raw_fd(fd: RawFd) -> Result<Option<File>, VulkanError> {
    if fd == -1 {
        return Ok(None);
    }

    if fd < 0 || !is_sync_file(fd) {
        return Err(VulkanError::InvalidExternalHandle);
    }

    Ok(Some(File::from_raw_fd(fd)))
}

#[cfg(test)]
mod tests {
    use super::{from_raw_fd, wait};
    use crate::{tests::sync_file, VulkanError};
    use std::{fs::File, io::Write, os::fd::IntoRawFd, time::Duration};

    #[test]
    fn poll_pending_and_signaled() {
        let (file, mut writer) = sync_file(false);
        assert_eq!(wait(&file, Some(Duration::ZERO)), Ok(false));
        assert_eq!(wait(&file, Some(Duration::from_millis(1))), Ok(false));

        writer.write_all(&[1]).unwrap();
        assert_eq!(wait(&file, Some(Duration::ZERO)), Ok(true));
        assert_eq!(wait(&file, None), Ok(true));
    }

    #[test]
    fn raw_fd_validation() {
        unsafe {
            assert!(from_raw_fd(-1).unwrap().is_none());
            assert_eq!(from_raw_fd(-2).unwrap_err(), VulkanError::InvalidExternalHandle);

            let (file, _writer) = sync_file(true);
            let fd = file.into_raw_fd();
            assert_eq!(from_raw_fd(fd).unwrap_err(), VulkanError::InvalidExternalHandle);
            libc::close(fd);
        }
    }

    #[test]
    fn non_sync_file_is_rejected() {
        let fd = File::open("/dev/null").unwrap().into_raw_fd();

        unsafe {
            assert_eq!(from_raw_fd(fd).unwrap_err(), VulkanError::InvalidExternalHandle);
            libc::close(fd);
        }
    }
}
