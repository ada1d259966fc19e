// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A semaphore provides synchronization between multiple queues, with non-command buffer
//! commands on the same queue, or between the device and an external source.
//!
//! Binary semaphores are signaled by one queue operation and consumed by one wait. Timeline
//! semaphores hold a counter that only ever increases; the host can read and signal it, and
//! wait for it to reach a value.
//!
//! Like fences, semaphores can temporarily take an imported sync file as payload. Because the
//! renderer cannot wait on a file that only exists in the guest, a queue submission that waits
//! on such a semaphore first waits for the file on the host, then tells the renderer that the
//! semaphore is signaled.

use super::{
    fence::same_device,
    payload::{PayloadPair, SyncPayload},
    sync_file, wait, WaitStatus,
};
use crate::{
    device::{Device, DeviceOwned},
    Validated, ValidationError, VulkanError, VulkanObject,
};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::{
    fs::File,
    hash::{Hash, Hasher},
    os::fd::RawFd,
    sync::Arc,
    time::Duration,
};

/// Used to provide synchronization between command buffers during their execution.
///
/// It is similar to a fence, except that it is purely on the GPU side. The CPU can't query a
/// binary semaphore's status or wait for it to be signaled.
#[derive(Debug)]
pub struct Semaphore {
    handle: ash::vk::Semaphore,
    device: Arc<Device>,

    semaphore_type: ash::vk::SemaphoreType,
    export_handle_types: ash::vk::ExternalSemaphoreHandleTypeFlags,

    state: Mutex<SemaphoreState>,
}

#[derive(Debug)]
struct SemaphoreState {
    payloads: PayloadPair,
    ring_idx: u32,
}

impl Semaphore {
    /// Creates a new `Semaphore`.
    #[inline]
    pub fn new(
        device: Arc<Device>,
        create_info: SemaphoreCreateInfo,
    ) -> Result<Semaphore, Validated<VulkanError>> {
        device.trace("vkCreateSemaphore");
        create_info
            .validate()
            .map_err(|err| err.add_context("create_info"))?;

        Ok(unsafe { Self::new_unchecked(device, create_info) })
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn new_unchecked(
        device: Arc<Device>,
        create_info: SemaphoreCreateInfo,
    ) -> Semaphore {
        let SemaphoreCreateInfo {
            semaphore_type,
            initial_value,
            export_handle_types,
            _ne: _,
        } = create_info;

        let handle = device.alloc_handle::<ash::vk::Semaphore>();
        device
            .renderer()
            .create_semaphore_async(handle, semaphore_type, initial_value);

        Semaphore {
            handle,
            device,
            semaphore_type,
            export_handle_types,
            state: Mutex::new(SemaphoreState {
                payloads: PayloadPair::new(),
                ring_idx: 0,
            }),
        }
    }

    /// Returns the type of the semaphore.
    #[inline]
    pub fn semaphore_type(&self) -> ash::vk::SemaphoreType {
        self.semaphore_type
    }

    /// Returns the handle types that can be exported from the semaphore.
    #[inline]
    pub fn export_handle_types(&self) -> ash::vk::ExternalSemaphoreHandleTypeFlags {
        self.export_handle_types
    }

    /// Returns true if the semaphore can be exported, and thus shared with other processes.
    #[inline]
    pub fn is_external(&self) -> bool {
        !self.export_handle_types.is_empty()
    }

    fn validate_timeline(&self, vuid: &'static [&'static str]) -> Result<(), Box<ValidationError>> {
        if self.semaphore_type != ash::vk::SemaphoreType::TIMELINE {
            return Err(Box::new(ValidationError {
                problem: "this semaphore is not a timeline semaphore".into(),
                vuids: vuid,
                ..Default::default()
            }));
        }

        Ok(())
    }

    /// If `self` is a timeline semaphore, returns the current counter value of the semaphore.
    #[inline]
    pub fn counter_value(&self) -> Result<u64, Validated<VulkanError>> {
        self.device.trace("vkGetSemaphoreCounterValue");
        self.validate_timeline(&["VUID-vkGetSemaphoreCounterValue-semaphore-03255"])?;

        let result = unsafe { self.counter_value_unchecked() };
        Ok(self.device.log_result("vkGetSemaphoreCounterValue", result)?)
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    #[inline]
    pub unsafe fn counter_value_unchecked(&self) -> Result<u64, VulkanError> {
        self.device
            .renderer()
            .get_semaphore_counter_value(self.handle)
    }

    /// If `self` is a timeline semaphore, performs a signal operation on the semaphore, setting
    /// the new counter value to `value`.
    ///
    /// # Safety
    ///
    /// - `value` must be greater than the current value of the semaphore, and must not exceed
    ///   the value of any pending signal operation on the semaphore.
    #[inline]
    pub unsafe fn signal(&self, value: u64) -> Result<(), Validated<VulkanError>> {
        self.device.trace("vkSignalSemaphore");
        self.validate_timeline(&["VUID-VkSemaphoreSignalInfo-semaphore-03257"])?;

        self.signal_unchecked(value);

        Ok(())
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn signal_unchecked(&self, value: u64) {
        // TODO: semaphores shared with another process by reference need a synchronous signal,
        // so that the other side observes the new value once this returns.
        self.device
            .renderer()
            .signal_semaphore_async(self.handle, value);
    }

    /// If `self` is a timeline semaphore, waits until its counter value is equal to or greater
    /// than `value`.
    #[inline]
    pub fn wait(
        self: &Arc<Self>,
        value: u64,
        timeout: Option<Duration>,
    ) -> Result<WaitStatus, Validated<VulkanError>> {
        Self::wait_multiple(
            SemaphoreWaitInfo {
                semaphores: vec![SemaphoreWaitValueInfo {
                    semaphore: self.clone(),
                    value,
                    _ne: crate::NonExhaustive(()),
                }],
                ..Default::default()
            },
            timeout,
        )
    }

    /// Waits for multiple timeline semaphores simultaneously.
    ///
    /// If `wait_info.flags` contains `ANY`, the wait ends as soon as one semaphore reaches its
    /// value; otherwise all of them must.
    ///
    /// # Panics
    ///
    /// - Panics if not all semaphores belong to the same device.
    pub fn wait_multiple(
        wait_info: SemaphoreWaitInfo,
        timeout: Option<Duration>,
    ) -> Result<WaitStatus, Validated<VulkanError>> {
        wait_info
            .validate()
            .map_err(|err| err.add_context("wait_info"))?;

        let semaphores: SmallVec<[&Semaphore; 8]> = wait_info
            .semaphores
            .iter()
            .map(|info| &*info.semaphore)
            .collect();
        let Some(device) = same_device(&semaphores, "wait for") else {
            return Ok(WaitStatus::Success);
        };
        device.trace("vkWaitSemaphores");

        let result = unsafe { Self::wait_multiple_unchecked(&wait_info, timeout) };
        Ok(device.log_result("vkWaitSemaphores", result)?)
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn wait_multiple_unchecked(
        wait_info: &SemaphoreWaitInfo,
        timeout: Option<Duration>,
    ) -> Result<WaitStatus, VulkanError> {
        let SemaphoreWaitInfo {
            flags,
            ref semaphores,
            _ne: _,
        } = *wait_info;

        let wait_all = !flags.contains(ash::vk::SemaphoreWaitFlags::ANY);
        let values: SmallVec<[(&Semaphore, u64); 8]> = semaphores
            .iter()
            .map(|info| (&*info.semaphore, info.value))
            .collect();

        wait::wait(&values, wait_all, timeout, "client", |&(semaphore, value)| {
            Ok(semaphore.counter_value_unchecked()? >= value)
        })
    }

    /// Imports a payload from a file descriptor.
    ///
    /// The payload is always imported temporarily: the next wait on the semaphore, or its next
    /// export, restores its own payload.
    ///
    /// # Safety
    ///
    /// - If in `import_semaphore_fd_info`, `handle_type` is `OPAQUE_FD`, then `file` must
    ///   represent a binary semaphore that was exported from Vulkan or a compatible API, with a
    ///   driver and device UUID equal to those of the device that owns `self`.
    #[inline]
    pub unsafe fn import_fd(
        &self,
        import_semaphore_fd_info: ImportSemaphoreFdInfo,
    ) -> Result<(), Validated<VulkanError>> {
        self.device.trace("vkImportSemaphoreFdKHR");
        self.validate_import_fd(&import_semaphore_fd_info)?;

        self.import_fd_unchecked(import_semaphore_fd_info);

        Ok(())
    }

    fn validate_import_fd(
        &self,
        import_semaphore_fd_info: &ImportSemaphoreFdInfo,
    ) -> Result<(), Box<ValidationError>> {
        import_semaphore_fd_info
            .validate()
            .map_err(|err| err.add_context("import_semaphore_fd_info"))?;

        if import_semaphore_fd_info.handle_type
            == ash::vk::ExternalSemaphoreHandleTypeFlags::SYNC_FD
            && self.semaphore_type != ash::vk::SemaphoreType::BINARY
        {
            return Err(Box::new(ValidationError {
                problem: "`import_semaphore_fd_info.handle_type` is `SYNC_FD`, but the semaphore \
                    is not a binary semaphore"
                    .into(),
                vuids: &["VUID-VkImportSemaphoreFdInfoKHR-handleType-03264"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn import_fd_unchecked(&self, import_semaphore_fd_info: ImportSemaphoreFdInfo) {
        let ImportSemaphoreFdInfo {
            handle_type: _,
            flags: _,
            file,
            _ne: _,
        } = import_semaphore_fd_info;

        self.state.lock().payloads.import(file);
    }

    /// Exports the semaphore into a POSIX file descriptor. The caller owns the returned `File`.
    ///
    /// Returns `None` if the semaphore holds an imported payload that was already signaled.
    ///
    /// Exporting a sync file performs a wait operation on the semaphore.
    pub fn export_fd(
        &self,
        handle_type: ash::vk::ExternalSemaphoreHandleTypeFlags,
    ) -> Result<Option<File>, Validated<VulkanError>> {
        self.device.trace("vkGetSemaphoreFdKHR");
        self.validate_export_fd(handle_type)?;

        let result = unsafe { self.export_fd_unchecked(handle_type) };
        Ok(self.device.log_result("vkGetSemaphoreFdKHR", result)?)
    }

    fn validate_export_fd(
        &self,
        handle_type: ash::vk::ExternalSemaphoreHandleTypeFlags,
    ) -> Result<(), Box<ValidationError>> {
        if !self.export_handle_types.contains(handle_type) || handle_type.is_empty() {
            return Err(Box::new(ValidationError {
                context: "handle_type".into(),
                problem: "is not one of the handle types that the semaphore was created with"
                    .into(),
                vuids: &["VUID-VkSemaphoreGetFdInfoKHR-handleType-01132"],
            }));
        }

        if handle_type != ash::vk::ExternalSemaphoreHandleTypeFlags::SYNC_FD {
            return Err(Box::new(ValidationError {
                context: "handle_type".into(),
                problem: "is not `SYNC_FD`; only sync files can be exported".into(),
                vuids: &["VUID-VkSemaphoreGetFdInfoKHR-handleType-01136"],
            }));
        }

        if self.semaphore_type != ash::vk::SemaphoreType::BINARY {
            return Err(Box::new(ValidationError {
                problem: "`handle_type` is `SYNC_FD`, but the semaphore is not a binary \
                    semaphore"
                    .into(),
                vuids: &["VUID-VkSemaphoreGetFdInfoKHR-handleType-03253"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn export_fd_unchecked(
        &self,
        _handle_type: ash::vk::ExternalSemaphoreHandleTypeFlags,
    ) -> Result<Option<File>, VulkanError> {
        let mut state = self.state.lock();
        let renderer = self.device.renderer();

        let file = if state.payloads.is_device_only() {
            Some(self.device.create_sync_file(state.ring_idx)?)
        } else {
            let file = state.payloads.take_imported_file().flatten();

            // The permanent payload of the host semaphore may be signaled. Replace it with a
            // signaled payload so that the wait below is legal.
            renderer.import_semaphore_resource_async(self.handle, 0);

            file
        };

        renderer.wait_semaphore_resource_async(self.handle);
        state.payloads.restore_permanent();

        Ok(file)
    }

    /// Makes the semaphore signaled from the point of view of the host, without involving the
    /// renderer. Used when the window system has already waited for the work the semaphore
    /// tracks.
    pub fn signal_wsi(&self) {
        self.state.lock().payloads.import(None);
    }

    /// Returns true if the active payload is an imported sync file.
    pub(crate) fn is_imported(&self) -> bool {
        !self.state.lock().payloads.is_device_only()
    }

    /// Blocks until the imported sync file signals, then restores the device-only payload.
    ///
    /// Does nothing if no sync file is imported.
    pub(crate) fn wait_external(&self) -> Result<(), VulkanError> {
        let mut state = self.state.lock();

        if let SyncPayload::ImportedSyncFile(Some(file)) = state.payloads.active() {
            if !sync_file::wait(file, None)? {
                return Err(VulkanError::DeviceLost);
            }
        }

        state.payloads.restore_permanent();

        Ok(())
    }

    /// Remembers `ring_idx` as the ring a sync file export must be created on.
    pub(crate) fn set_ring_idx(&self, ring_idx: u32) {
        let mut state = self.state.lock();

        if self.is_external() && state.payloads.is_device_only() {
            state.ring_idx = ring_idx;
        }
    }
}

impl Drop for Semaphore {
    #[inline]
    fn drop(&mut self) {
        self.device
            .renderer()
            .destroy_semaphore_async(self.handle);
    }
}

unsafe impl VulkanObject for Semaphore {
    type Handle = ash::vk::Semaphore;

    #[inline]
    fn handle(&self) -> Self::Handle {
        self.handle
    }
}

unsafe impl DeviceOwned for Semaphore {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl PartialEq for Semaphore {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && self.device() == other.device()
    }
}

impl Eq for Semaphore {}

impl Hash for Semaphore {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
        self.device().hash(state);
    }
}

/// Parameters to create a new `Semaphore`.
#[derive(Clone, Debug)]
pub struct SemaphoreCreateInfo {
    /// The type of semaphore to create.
    ///
    /// The default value is `BINARY`.
    pub semaphore_type: ash::vk::SemaphoreType,

    /// If `semaphore_type` is `TIMELINE`, specifies the counter value that the semaphore
    /// starts with. Must be `0` for binary semaphores.
    ///
    /// The default value is `0`.
    pub initial_value: u64,

    /// The handle types that can be exported from the semaphore.
    ///
    /// The default value is empty.
    pub export_handle_types: ash::vk::ExternalSemaphoreHandleTypeFlags,

    pub _ne: crate::NonExhaustive,
}

impl Default for SemaphoreCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            semaphore_type: ash::vk::SemaphoreType::BINARY,
            initial_value: 0,
            export_handle_types: ash::vk::ExternalSemaphoreHandleTypeFlags::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl SemaphoreCreateInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            semaphore_type,
            initial_value,
            export_handle_types,
            _ne: _,
        } = self;

        if semaphore_type != ash::vk::SemaphoreType::BINARY
            && semaphore_type != ash::vk::SemaphoreType::TIMELINE
        {
            return Err(Box::new(ValidationError {
                context: "semaphore_type".into(),
                problem: "is not a valid semaphore type".into(),
                vuids: &["VUID-VkSemaphoreTypeCreateInfo-semaphoreType-parameter"],
            }));
        }

        if semaphore_type == ash::vk::SemaphoreType::BINARY && initial_value != 0 {
            return Err(Box::new(ValidationError {
                problem: "`semaphore_type` is `BINARY`, but `initial_value` is not `0`".into(),
                vuids: &["VUID-VkSemaphoreTypeCreateInfo-semaphoreType-03279"],
                ..Default::default()
            }));
        }

        let supported = ash::vk::ExternalSemaphoreHandleTypeFlags::from_raw(
            ash::vk::ExternalSemaphoreHandleTypeFlags::OPAQUE_FD.as_raw()
                | ash::vk::ExternalSemaphoreHandleTypeFlags::SYNC_FD.as_raw(),
        );

        if !supported.contains(export_handle_types) {
            return Err(Box::new(ValidationError {
                context: "export_handle_types".into(),
                problem: "contains handle types other than `OPAQUE_FD` and `SYNC_FD`".into(),
                vuids: &["VUID-VkExportSemaphoreCreateInfo-handleTypes-01124"],
            }));
        }

        Ok(())
    }
}

/// Parameters to wait for one or more timeline semaphores.
#[derive(Clone, Debug)]
pub struct SemaphoreWaitInfo {
    /// Additional properties of the wait operation.
    ///
    /// The default value is empty.
    pub flags: ash::vk::SemaphoreWaitFlags,

    /// The semaphores to wait for, and the values to wait for.
    ///
    /// The default value is empty.
    pub semaphores: Vec<SemaphoreWaitValueInfo>,

    pub _ne: crate::NonExhaustive,
}

impl Default for SemaphoreWaitInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: ash::vk::SemaphoreWaitFlags::empty(),
            semaphores: Vec::new(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl SemaphoreWaitInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        for (index, info) in self.semaphores.iter().enumerate() {
            if info.semaphore.semaphore_type != ash::vk::SemaphoreType::TIMELINE {
                return Err(Box::new(ValidationError {
                    context: format!("semaphores[{}].semaphore", index).into(),
                    problem: "is not a timeline semaphore".into(),
                    vuids: &["VUID-VkSemaphoreWaitInfo-pSemaphores-03256"],
                }));
            }
        }

        Ok(())
    }
}

/// A semaphore to wait for, along with the value to wait for.
#[derive(Clone, Debug)]
pub struct SemaphoreWaitValueInfo {
    /// The semaphore to wait for.
    ///
    /// There is no default value.
    pub semaphore: Arc<Semaphore>,

    /// The value to wait for.
    ///
    /// There is no default value.
    pub value: u64,

    pub _ne: crate::NonExhaustive,
}

impl SemaphoreWaitValueInfo {
    /// Returns a `SemaphoreWaitValueInfo` with the specified `semaphore` and `value`.
    #[inline]
    pub fn new(semaphore: Arc<Semaphore>, value: u64) -> Self {
        Self {
            semaphore,
            value,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// Parameters to import a payload into a semaphore.
#[derive(Debug)]
pub struct ImportSemaphoreFdInfo {
    /// The handle type of `file`.
    ///
    /// There is no default value.
    pub handle_type: ash::vk::ExternalSemaphoreHandleTypeFlags,

    /// Additional parameters for the import operation. `SYNC_FD` imports must include
    /// `TEMPORARY`.
    ///
    /// The default value is empty.
    pub flags: ash::vk::SemaphoreImportFlags,

    /// The file to import the semaphore from. `None` is only allowed for `SYNC_FD`, and stands
    /// for a semaphore that is already signaled.
    ///
    /// The default value is `None`.
    pub file: Option<File>,

    pub _ne: crate::NonExhaustive,
}

impl ImportSemaphoreFdInfo {
    /// Returns an `ImportSemaphoreFdInfo` with the specified `handle_type`.
    #[inline]
    pub fn handle_type(handle_type: ash::vk::ExternalSemaphoreHandleTypeFlags) -> Self {
        Self {
            handle_type,
            flags: ash::vk::SemaphoreImportFlags::empty(),
            file: None,
            _ne: crate::NonExhaustive(()),
        }
    }

    /// Returns an `ImportSemaphoreFdInfo` taking ownership of the raw descriptor `fd`.
    ///
    /// `-1` is accepted for an already signaled sync file. Other negative values and
    /// descriptors that are not sync files are rejected with `InvalidExternalHandle`.
    ///
    /// # Safety
    ///
    /// - If `fd` is open, the caller must own it and must not use it afterwards.
    pub unsafe fn from_raw_fd(
        handle_type: ash::vk::ExternalSemaphoreHandleTypeFlags,
        flags: ash::vk::SemaphoreImportFlags,
        fd: RawFd,
    ) -> Result<Self, VulkanError> {
        Ok(Self {
            flags,
            file: sync_file::from_raw_fd(fd)?,
            ..Self::handle_type(handle_type)
        })
    }

    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            handle_type,
            flags,
            ref file,
            _ne: _,
        } = self;

        if handle_type == ash::vk::ExternalSemaphoreHandleTypeFlags::SYNC_FD {
            if !flags.contains(ash::vk::SemaphoreImportFlags::TEMPORARY) {
                return Err(Box::new(ValidationError {
                    problem: "`handle_type` is `SYNC_FD`, but `flags` does not contain \
                        `TEMPORARY`"
                        .into(),
                    vuids: &["VUID-VkImportSemaphoreFdInfoKHR-handleType-07307"],
                    ..Default::default()
                }));
            }
        } else if handle_type == ash::vk::ExternalSemaphoreHandleTypeFlags::OPAQUE_FD {
            if file.is_none() {
                return Err(Box::new(ValidationError {
                    context: "file".into(),
                    problem: "is `None`, but `handle_type` is `OPAQUE_FD`".into(),
                    ..Default::default()
                }));
            }
        } else {
            return Err(Box::new(ValidationError {
                context: "handle_type".into(),
                problem: "is not `OPAQUE_FD` or `SYNC_FD`".into(),
                vuids: &["VUID-VkImportSemaphoreFdInfoKHR-handleType-01143"],
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ImportSemaphoreFdInfo, Semaphore, SemaphoreCreateInfo, SemaphoreWaitInfo,
        SemaphoreWaitValueInfo,
    };
    use crate::{
        sync::WaitStatus,
        tests::{reader_closed, sync_file},
        Validated, VulkanError,
    };
    use std::{io::Write, sync::Arc, time::Duration};

    const SYNC_FD: ash::vk::ExternalSemaphoreHandleTypeFlags =
        ash::vk::ExternalSemaphoreHandleTypeFlags::SYNC_FD;

    fn timeline(initial_value: u64) -> SemaphoreCreateInfo {
        SemaphoreCreateInfo {
            semaphore_type: ash::vk::SemaphoreType::TIMELINE,
            initial_value,
            ..Default::default()
        }
    }

    fn external() -> SemaphoreCreateInfo {
        SemaphoreCreateInfo {
            export_handle_types: SYNC_FD,
            ..Default::default()
        }
    }

    fn sync_fd_import(file: Option<std::fs::File>) -> ImportSemaphoreFdInfo {
        ImportSemaphoreFdInfo {
            flags: ash::vk::SemaphoreImportFlags::TEMPORARY,
            file,
            ..ImportSemaphoreFdInfo::handle_type(SYNC_FD)
        }
    }

    #[test]
    fn semaphore_create() {
        let (device, _queue, renderer) = dev_and_queue!();

        let semaphore = Semaphore::new(device, Default::default()).unwrap();
        assert_eq!(semaphore.semaphore_type(), ash::vk::SemaphoreType::BINARY);
        assert!(!semaphore.is_external());

        drop(semaphore);
        assert_eq!(renderer.count("create_semaphore_async"), 1);
        assert_eq!(renderer.count("destroy_semaphore_async"), 1);
    }

    #[test]
    fn binary_initial_value() {
        let (device, _queue, _renderer) = dev_and_queue!();

        match Semaphore::new(
            device,
            SemaphoreCreateInfo {
                initial_value: 3,
                ..Default::default()
            },
        ) {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }
    }

    #[test]
    fn timeline_signal_and_counter() {
        let (device, _queue, renderer) = dev_and_queue!();

        let semaphore = Semaphore::new(device, timeline(2)).unwrap();
        assert_eq!(semaphore.counter_value().unwrap(), 2);

        unsafe { semaphore.signal(7).unwrap() };
        assert_eq!(semaphore.counter_value().unwrap(), 7);
        assert_eq!(renderer.count("signal_semaphore_async"), 1);
        assert_eq!(renderer.count("get_semaphore_counter_value"), 2);
    }

    #[test]
    fn timeline_counter_never_decreases() {
        let (device, _queue, renderer) = dev_and_queue!();

        let semaphore = Semaphore::new(device, timeline(0)).unwrap();
        unsafe {
            semaphore.signal(5).unwrap();
            semaphore.signal(3).unwrap();
        }

        assert_eq!(semaphore.counter_value().unwrap(), 5);
        assert_eq!(renderer.count("signal_semaphore_async"), 2);
    }

    #[test]
    fn binary_has_no_counter() {
        let (device, _queue, _renderer) = dev_and_queue!();
        let semaphore = Semaphore::new(device, Default::default()).unwrap();

        match semaphore.counter_value() {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }
        match unsafe { semaphore.signal(1) } {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }
    }

    #[test]
    fn wait_multiple() {
        let (device, _queue, _renderer) = dev_and_queue!();

        let a = Arc::new(Semaphore::new(device.clone(), timeline(5)).unwrap());
        let b = Arc::new(Semaphore::new(device, timeline(0)).unwrap());

        let info = |flags| SemaphoreWaitInfo {
            flags,
            semaphores: vec![
                SemaphoreWaitValueInfo::new(a.clone(), 5),
                SemaphoreWaitValueInfo::new(b.clone(), 1),
            ],
            ..Default::default()
        };

        assert_eq!(
            Semaphore::wait_multiple(info(ash::vk::SemaphoreWaitFlags::ANY), None).unwrap(),
            WaitStatus::Success
        );
        assert_eq!(
            Semaphore::wait_multiple(
                info(ash::vk::SemaphoreWaitFlags::empty()),
                Some(Duration::from_millis(2))
            )
            .unwrap(),
            WaitStatus::Timeout
        );

        unsafe { b.signal(1).unwrap() };
        assert_eq!(
            Semaphore::wait_multiple(info(ash::vk::SemaphoreWaitFlags::empty()), None).unwrap(),
            WaitStatus::Success
        );
        assert_eq!(b.wait(1, Some(Duration::ZERO)).unwrap(), WaitStatus::Success);
    }

    #[test]
    fn wait_binary() {
        let (device, _queue, _renderer) = dev_and_queue!();
        let semaphore = Arc::new(Semaphore::new(device, Default::default()).unwrap());

        match semaphore.wait(1, None) {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }
    }

    #[test]
    fn wait_external_releases_file() {
        let (device, _queue, _renderer) = dev_and_queue!();
        let semaphore = Semaphore::new(device, Default::default()).unwrap();

        let (file, mut writer) = sync_file(false);
        unsafe { semaphore.import_fd(sync_fd_import(Some(file))).unwrap() };
        assert!(semaphore.is_imported());

        writer.write_all(&[1]).unwrap();
        semaphore.wait_external().unwrap();
        assert!(!semaphore.is_imported());
        assert!(reader_closed(&writer));
    }

    #[test]
    fn import_validation() {
        let (device, _queue, _renderer) = dev_and_queue!();

        let binary = Semaphore::new(device.clone(), Default::default()).unwrap();
        match unsafe { binary.import_fd(ImportSemaphoreFdInfo::handle_type(SYNC_FD)) } {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }

        let timeline = Semaphore::new(device, timeline(0)).unwrap();
        match unsafe { timeline.import_fd(sync_fd_import(None)) } {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }

        unsafe {
            let err = ImportSemaphoreFdInfo::from_raw_fd(
                SYNC_FD,
                ash::vk::SemaphoreImportFlags::TEMPORARY,
                -3,
            )
            .unwrap_err();
            assert_eq!(err, VulkanError::InvalidExternalHandle);
        }
    }

    #[test]
    fn export_device_only() {
        let (device, queue, renderer) = dev_and_queue!();
        let semaphore = Semaphore::new(device, external()).unwrap();
        semaphore.set_ring_idx(queue.ring_idx());

        assert!(semaphore.export_fd(SYNC_FD).unwrap().is_some());
        assert_eq!(renderer.ring_submissions(), [queue.ring_idx()]);
        assert_eq!(renderer.count("import_semaphore_resource_async"), 0);
        assert_eq!(renderer.count("wait_semaphore_resource_async"), 1);
        assert!(!semaphore.is_imported());
    }

    #[test]
    fn export_imported() {
        let (device, _queue, renderer) = dev_and_queue!();
        let semaphore = Semaphore::new(device, external()).unwrap();

        let (file, _writer) = sync_file(true);
        unsafe { semaphore.import_fd(sync_fd_import(Some(file))).unwrap() };

        let exported = semaphore.export_fd(SYNC_FD).unwrap();
        assert!(exported.is_some());
        assert!(renderer.ring_submissions().is_empty());
        assert_eq!(renderer.count("import_semaphore_resource_async"), 1);
        assert_eq!(renderer.count("wait_semaphore_resource_async"), 1);
        assert!(!semaphore.is_imported());

        semaphore.signal_wsi();
        assert!(semaphore.export_fd(SYNC_FD).unwrap().is_none());
    }

    #[test]
    fn export_validation() {
        let (device, _queue, _renderer) = dev_and_queue!();

        let semaphore = Semaphore::new(device.clone(), Default::default()).unwrap();
        match semaphore.export_fd(SYNC_FD) {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }

        let semaphore = Semaphore::new(
            device,
            SemaphoreCreateInfo {
                export_handle_types: SYNC_FD,
                ..timeline(0)
            },
        )
        .unwrap();
        match semaphore.export_fd(SYNC_FD) {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }
    }
}
