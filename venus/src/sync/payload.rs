// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use std::fs::File;

/// What currently backs a fence or a semaphore.
#[derive(Debug)]
pub(crate) enum SyncPayload {
    /// The payload lives in the renderer.
    DeviceOnly,

    /// The payload is an imported sync file. `None` stands for a sync file that was already
    /// signaled when it was imported.
    ImportedSyncFile(Option<File>),

    /// No payload.
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Permanent,
    Temporary,
}

/// The permanent and temporary payloads of a fence or a semaphore.
///
/// The permanent payload is always `DeviceOnly`. The active payload is never `Invalid`.
#[derive(Debug)]
pub(crate) struct PayloadPair {
    permanent: SyncPayload,
    temporary: SyncPayload,
    active: Slot,
}

impl PayloadPair {
    pub(crate) fn new() -> Self {
        PayloadPair {
            permanent: SyncPayload::DeviceOnly,
            temporary: SyncPayload::Invalid,
            active: Slot::Permanent,
        }
    }

    #[inline]
    pub(crate) fn active(&self) -> &SyncPayload {
        match self.active {
            Slot::Permanent => &self.permanent,
            Slot::Temporary => &self.temporary,
        }
    }

    #[inline]
    pub(crate) fn is_device_only(&self) -> bool {
        matches!(self.active(), SyncPayload::DeviceOnly)
    }

    /// Installs `file` as the temporary payload and makes it active, closing any file the
    /// previous temporary payload held.
    pub(crate) fn import(&mut self, file: Option<File>) {
        self.temporary = SyncPayload::ImportedSyncFile(file);
        self.active = Slot::Temporary;
    }

    /// Releases the temporary payload and makes the permanent one active again.
    pub(crate) fn restore_permanent(&mut self) {
        self.temporary = SyncPayload::Invalid;
        self.active = Slot::Permanent;
    }

    /// Moves the file out of the active imported payload, leaving the signaled marker behind.
    ///
    /// Returns `None` if the active payload is not imported.
    pub(crate) fn take_imported_file(&mut self) -> Option<Option<File>> {
        match self.active {
            Slot::Temporary => match &mut self.temporary {
                SyncPayload::ImportedSyncFile(file) => Some(file.take()),
                _ => None,
            },
            Slot::Permanent => None,
        }
    }
}
