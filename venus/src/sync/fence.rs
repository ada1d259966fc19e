// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A fence provides synchronization between the device and the host, or between an external
//! source and the host.
//!
//! A fence has two states: **signaled** and **unsignaled**. A fence is signaled when the queue
//! submission it was passed to completes, and goes back to unsignaled when it is reset.
//!
//! # Feedback
//!
//! Unless the fence is external, or feedback was disabled, a fence is given a feedback slot and
//! one feedback command per active queue family. When the fence is submitted, the command for
//! the queue's family is executed after the submitted work and writes `SUCCESS` into the slot.
//! Querying the status then only needs a memory read.
//!
//! # Sync files
//!
//! A sync file can be imported into a fence with [`Fence::import_fd`]. It replaces the payload
//! of the fence until the next reset or export. Exporting with [`Fence::export_fd`] either
//! creates a new sync file on the renderer ring that last signaled the fence, or hands over the
//! imported one.

use super::{
    payload::{PayloadPair, SyncPayload},
    sync_file, wait, WaitStatus,
};
use crate::{
    device::{Device, DeviceOwned},
    feedback::{FeedbackSlot, FeedbackType},
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

/// A two-state synchronization primitive that is signalled by the device and waited on by the
/// host.
#[derive(Debug)]
pub struct Fence {
    handle: ash::vk::Fence,
    device: Arc<Device>,

    export_handle_types: ash::vk::ExternalFenceHandleTypeFlags,
    feedback: Option<FenceFeedback>,

    state: Mutex<FenceState>,
}

#[derive(Debug)]
struct FenceFeedback {
    slot: FeedbackSlot,
    // One command per active queue family, keyed by family index.
    commands: SmallVec<[(u32, ash::vk::CommandBuffer); 4]>,
}

#[derive(Debug)]
struct FenceState {
    payloads: PayloadPair,
    // The ring that last signaled the fence, for sync file export.
    ring_idx: u32,
}

impl Fence {
    /// Creates a new `Fence`.
    #[inline]
    pub fn new(
        device: Arc<Device>,
        create_info: FenceCreateInfo,
    ) -> Result<Fence, Validated<VulkanError>> {
        device.trace("vkCreateFence");
        create_info
            .validate()
            .map_err(|err| err.add_context("create_info"))?;

        let result = unsafe { Self::new_unchecked(device.clone(), create_info) };
        Ok(device.log_result("vkCreateFence", result)?)
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn new_unchecked(
        device: Arc<Device>,
        create_info: FenceCreateInfo,
    ) -> Result<Fence, VulkanError> {
        let FenceCreateInfo {
            signaled,
            export_handle_types,
            _ne: _,
        } = create_info;

        let handle = device.alloc_handle::<ash::vk::Fence>();
        let feedback = FenceFeedback::new(&device, signaled, !export_handle_types.is_empty())?;

        device.renderer().create_fence_async(handle, signaled);

        Ok(Fence {
            handle,
            device,
            export_handle_types,
            feedback,
            state: Mutex::new(FenceState {
                payloads: PayloadPair::new(),
                ring_idx: 0,
            }),
        })
    }

    /// Returns the handle types that can be exported from the fence.
    #[inline]
    pub fn export_handle_types(&self) -> ash::vk::ExternalFenceHandleTypeFlags {
        self.export_handle_types
    }

    /// Returns true if the fence can be exported, and thus shared with other processes.
    #[inline]
    pub fn is_external(&self) -> bool {
        !self.export_handle_types.is_empty()
    }

    /// Returns true if the fence has a feedback slot.
    #[inline]
    pub fn has_feedback(&self) -> bool {
        self.feedback.is_some()
    }

    /// Returns true if the fence is signaled.
    pub fn is_signaled(&self) -> Result<bool, VulkanError> {
        self.device.trace("vkGetFenceStatus");

        let result = self.status();
        self.device.log_result("vkGetFenceStatus", result)
    }

    fn status(&self) -> Result<bool, VulkanError> {
        let state = self.state.lock();

        match state.payloads.active() {
            SyncPayload::DeviceOnly => match &self.feedback {
                Some(feedback) => {
                    if feedback.slot.status() != ash::vk::Result::SUCCESS {
                        return Ok(false);
                    }

                    // The feedback slot is written before the host fence signals. Make the
                    // renderer wait for the real signal so that later host commands are ordered
                    // after it.
                    self.device.renderer().wait_for_fences_async(
                        &[self.handle],
                        true,
                        u64::MAX,
                    );

                    Ok(true)
                }
                None => self.device.renderer().get_fence_status(self.handle),
            },
            SyncPayload::ImportedSyncFile(None) => Ok(true),
            SyncPayload::ImportedSyncFile(Some(file)) => {
                sync_file::wait(file, Some(Duration::ZERO))
            }
            SyncPayload::Invalid => unreachable!(),
        }
    }

    /// Waits until the fence is signaled, or at least until the timeout duration has elapsed.
    ///
    /// If you pass a duration of 0, then the function will return without blocking.
    #[inline]
    pub fn wait(&self, timeout: Option<Duration>) -> Result<WaitStatus, VulkanError> {
        Self::multi_wait([self], true, timeout)
    }

    /// Waits for multiple fences at once, either until all of them or until any of them is
    /// signaled.
    ///
    /// # Panics
    ///
    /// - Panics if not all fences belong to the same device.
    pub fn multi_wait<'a>(
        fences: impl IntoIterator<Item = &'a Fence>,
        wait_all: bool,
        timeout: Option<Duration>,
    ) -> Result<WaitStatus, VulkanError> {
        let fences: SmallVec<[&Fence; 8]> = fences.into_iter().collect();

        let Some(device) = same_device(&fences, "wait for") else {
            return Ok(WaitStatus::Success);
        };
        device.trace("vkWaitForFences");

        let result = wait::wait(&fences, wait_all, timeout, "client", |fence| fence.status());
        device.log_result("vkWaitForFences", result)
    }

    /// Resets the fence.
    ///
    /// The host fence is reset asynchronously, so this currently never fails.
    #[inline]
    pub fn reset(&self) -> Result<(), VulkanError> {
        Self::multi_reset([self])
    }

    /// Resets multiple fences at once.
    ///
    /// # Panics
    ///
    /// - Panics if not all fences belong to the same device.
    pub fn multi_reset<'a>(fences: impl IntoIterator<Item = &'a Fence>) -> Result<(), VulkanError> {
        let fences: SmallVec<[&Fence; 8]> = fences.into_iter().collect();

        let Some(device) = same_device(&fences, "reset") else {
            return Ok(());
        };
        device.trace("vkResetFences");

        let handles: SmallVec<[ash::vk::Fence; 8]> =
            fences.iter().map(|fence| fence.handle).collect();

        // TODO: fences shared with another process by reference need a synchronous reset, so
        // that the other side cannot observe the old signal after this returns.
        device.renderer().reset_fences_async(&handles);

        for fence in fences {
            fence.state.lock().payloads.restore_permanent();

            if let Some(feedback) = &fence.feedback {
                feedback.slot.reset_status();
            }
        }

        Ok(())
    }

    /// Imports a payload from a file descriptor.
    ///
    /// The payload is always imported temporarily: the next reset or export of the fence
    /// restores its own payload.
    ///
    /// # Safety
    ///
    /// - If in `import_fence_fd_info`, `handle_type` is `OPAQUE_FD`, then `file` must represent
    ///   a fence that was exported from Vulkan or a compatible API, with a driver and device
    ///   UUID equal to those of the device that owns `self`.
    #[inline]
    pub unsafe fn import_fd(
        &self,
        import_fence_fd_info: ImportFenceFdInfo,
    ) -> Result<(), Validated<VulkanError>> {
        self.device.trace("vkImportFenceFdKHR");

        import_fence_fd_info
            .validate()
            .map_err(|err| err.add_context("import_fence_fd_info"))?;

        self.import_fd_unchecked(import_fence_fd_info);

        Ok(())
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn import_fd_unchecked(&self, import_fence_fd_info: ImportFenceFdInfo) {
        let ImportFenceFdInfo {
            handle_type: _,
            flags: _,
            file,
            _ne: _,
        } = import_fence_fd_info;

        self.state.lock().payloads.import(file);
    }

    /// Exports the fence into a POSIX file descriptor. The caller owns the returned `File`.
    ///
    /// Returns `None` if the fence holds an imported payload that was already signaled.
    ///
    /// Exporting consumes the payload: afterwards the fence behaves as if it had been reset.
    pub fn export_fd(
        &self,
        handle_type: ash::vk::ExternalFenceHandleTypeFlags,
    ) -> Result<Option<File>, Validated<VulkanError>> {
        self.device.trace("vkGetFenceFdKHR");
        self.validate_export_fd(handle_type)?;

        let result = unsafe { self.export_fd_unchecked(handle_type) };
        Ok(self.device.log_result("vkGetFenceFdKHR", result)?)
    }

    fn validate_export_fd(
        &self,
        handle_type: ash::vk::ExternalFenceHandleTypeFlags,
    ) -> Result<(), Box<ValidationError>> {
        if !self.export_handle_types.contains(handle_type) || handle_type.is_empty() {
            return Err(Box::new(ValidationError {
                context: "handle_type".into(),
                problem: "is not one of the handle types that the fence was created with".into(),
                vuids: &["VUID-VkFenceGetFdInfoKHR-handleType-01453"],
            }));
        }

        if handle_type != ash::vk::ExternalFenceHandleTypeFlags::SYNC_FD {
            return Err(Box::new(ValidationError {
                context: "handle_type".into(),
                problem: "is not `SYNC_FD`; only sync files can be exported".into(),
                vuids: &["VUID-VkFenceGetFdInfoKHR-handleType-01456"],
            }));
        }

        Ok(())
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn export_fd_unchecked(
        &self,
        _handle_type: ash::vk::ExternalFenceHandleTypeFlags,
    ) -> Result<Option<File>, VulkanError> {
        let mut state = self.state.lock();

        if state.payloads.is_device_only() {
            let file = self.device.create_sync_file(state.ring_idx)?;

            // The host fence may still hold the payload that was just handed out.
            self.device
                .renderer()
                .reset_fence_resource_async(self.handle);
            state.payloads.restore_permanent();

            return Ok(Some(file));
        }

        let file = state.payloads.take_imported_file().flatten();
        drop(state);

        // The host fence may have been signaled before the import.
        if let Err(err) = self.reset() {
            self.state.lock().payloads.import(file);
            return Err(err);
        }

        Ok(file)
    }

    /// Makes the fence signaled from the point of view of the host, without involving the
    /// renderer. Used when the window system has already waited for the work the fence
    /// tracks.
    pub fn signal_wsi(&self) {
        self.state.lock().payloads.import(None);
    }

    /// Returns the feedback command for the queue family `queue_family_index`, if the fence has
    /// feedback.
    pub(crate) fn feedback_command(
        &self,
        queue_family_index: u32,
    ) -> Option<ash::vk::CommandBuffer> {
        self.feedback.as_ref().and_then(|feedback| {
            feedback
                .commands
                .iter()
                .find(|&&(index, _)| index == queue_family_index)
                .map(|&(_, command_buffer)| command_buffer)
        })
    }

    /// Remembers `ring_idx` as the ring a sync file export must be created on.
    pub(crate) fn set_ring_idx(&self, ring_idx: u32) {
        let mut state = self.state.lock();

        if self.is_external() && state.payloads.is_device_only() {
            state.ring_idx = ring_idx;
        }
    }
}

// Checks that all `objects` belong to the same device, and returns it.
pub(super) fn same_device<'a, T: DeviceOwned>(
    objects: &[&'a T],
    action: &str,
) -> Option<&'a Arc<Device>> {
    let (&first, rest) = objects.split_first()?;
    let device = first.device();

    for object in rest {
        assert!(
            Arc::ptr_eq(device, object.device()),
            "tried to {} multiple objects that didn't belong to the same device",
            action,
        );
    }

    Some(device)
}

impl FenceFeedback {
    fn new(
        device: &Device,
        signaled: bool,
        is_external: bool,
    ) -> Result<Option<FenceFeedback>, VulkanError> {
        if is_external
            || !device.renderer().info().allow_vk_wait_syncs
            || device.perf_options().no_fence_feedback
        {
            return Ok(None);
        }

        let slot = device
            .feedback_pool()
            .alloc(FeedbackType::Fence)
            .ok_or(VulkanError::OutOfHostMemory)?;
        slot.set_status(if signaled {
            ash::vk::Result::SUCCESS
        } else {
            ash::vk::Result::NOT_READY
        });

        let renderer = device.renderer();
        let mut commands = SmallVec::new();

        for &queue_family_index in device.active_queue_families() {
            let result = renderer.alloc_feedback_command(
                queue_family_index,
                FeedbackType::Fence,
                slot.cell(),
            );

            match result {
                Ok(command_buffer) => commands.push((queue_family_index, command_buffer)),
                Err(err) => {
                    for (queue_family_index, command_buffer) in commands {
                        renderer.free_feedback_command(queue_family_index, command_buffer);
                    }
                    device.feedback_pool().free(slot);

                    return Err(err);
                }
            }
        }

        Ok(Some(FenceFeedback { slot, commands }))
    }
}

impl Drop for Fence {
    #[inline]
    fn drop(&mut self) {
        let renderer = self.device.renderer();

        if let Some(FenceFeedback { slot, commands }) = self.feedback.take() {
            for (queue_family_index, command_buffer) in commands {
                renderer.free_feedback_command(queue_family_index, command_buffer);
            }
            self.device.feedback_pool().free(slot);
        }

        renderer.destroy_fence_async(self.handle);
    }
}

unsafe impl VulkanObject for Fence {
    type Handle = ash::vk::Fence;

    #[inline]
    fn handle(&self) -> Self::Handle {
        self.handle
    }
}

unsafe impl DeviceOwned for Fence {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl PartialEq for Fence {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && self.device() == other.device()
    }
}

impl Eq for Fence {}

impl Hash for Fence {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
        self.device().hash(state);
    }
}

/// Parameters to create a new `Fence`.
#[derive(Clone, Debug)]
pub struct FenceCreateInfo {
    /// Whether the fence should be created in the signaled state.
    ///
    /// The default value is `false`.
    pub signaled: bool,

    /// The handle types that can be exported from the fence. A fence with export handle types
    /// is external: it never gets a feedback slot, and submissions that signal it are made
    /// synchronously.
    ///
    /// The default value is empty.
    pub export_handle_types: ash::vk::ExternalFenceHandleTypeFlags,

    pub _ne: crate::NonExhaustive,
}

impl Default for FenceCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            signaled: false,
            export_handle_types: ash::vk::ExternalFenceHandleTypeFlags::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl FenceCreateInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            signaled: _,
            export_handle_types,
            _ne: _,
        } = self;

        if !SUPPORTED_HANDLE_TYPES.contains(export_handle_types) {
            return Err(Box::new(ValidationError {
                context: "export_handle_types".into(),
                problem: "contains handle types other than `OPAQUE_FD` and `SYNC_FD`".into(),
                vuids: &["VUID-VkExportFenceCreateInfo-handleTypes-01446"],
            }));
        }

        Ok(())
    }
}

const SUPPORTED_HANDLE_TYPES: ash::vk::ExternalFenceHandleTypeFlags =
    ash::vk::ExternalFenceHandleTypeFlags::from_raw(
        ash::vk::ExternalFenceHandleTypeFlags::OPAQUE_FD.as_raw()
            | ash::vk::ExternalFenceHandleTypeFlags::SYNC_FD.as_raw(),
    );

/// Parameters to import a payload into a fence.
#[derive(Debug)]
pub struct ImportFenceFdInfo {
    /// The handle type of `file`.
    ///
    /// There is no default value.
    pub handle_type: ash::vk::ExternalFenceHandleTypeFlags,

    /// Additional parameters for the import operation. `SYNC_FD` imports must include
    /// `TEMPORARY`.
    ///
    /// The default value is empty.
    pub flags: ash::vk::FenceImportFlags,

    /// The file to import the fence from. `None` is only allowed for `SYNC_FD`, and stands for a
    /// fence that is already signaled.
    ///
    /// The default value is `None`.
    pub file: Option<File>,

    pub _ne: crate::NonExhaustive,
}

impl ImportFenceFdInfo {
    /// Returns an `ImportFenceFdInfo` with the specified `handle_type`.
    #[inline]
    pub fn handle_type(handle_type: ash::vk::ExternalFenceHandleTypeFlags) -> Self {
        Self {
            handle_type,
            flags: ash::vk::FenceImportFlags::empty(),
            file: None,
            _ne: crate::NonExhaustive(()),
        }
    }

    /// Returns an `ImportFenceFdInfo` taking ownership of the raw descriptor `fd`.
    ///
    /// `-1` is accepted for an already signaled sync file. Other negative values and
    /// descriptors that are not sync files are rejected with `InvalidExternalHandle`.
    ///
    /// # Safety
    ///
    /// - If `fd` is open, the caller must own it and must not use it afterwards.
    pub unsafe fn from_raw_fd(
        handle_type: ash::vk::ExternalFenceHandleTypeFlags,
        flags: ash::vk::FenceImportFlags,
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

        if handle_type == ash::vk::ExternalFenceHandleTypeFlags::SYNC_FD {
            if !flags.contains(ash::vk::FenceImportFlags::TEMPORARY) {
                return Err(Box::new(ValidationError {
                    problem: "`handle_type` is `SYNC_FD`, but `flags` does not contain \
                        `TEMPORARY`"
                        .into(),
                    vuids: &["VUID-VkImportFenceFdInfoKHR-handleType-07306"],
                    ..Default::default()
                }));
            }
        } else if handle_type == ash::vk::ExternalFenceHandleTypeFlags::OPAQUE_FD {
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
                vuids: &["VUID-VkImportFenceFdInfoKHR-handleType-01464"],
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Fence, FenceCreateInfo, ImportFenceFdInfo};
    use crate::{
        options::PerfOptions,
        renderer::RendererInfo,
        sync::WaitStatus,
        tests::{device_with, renderer_info, sync_file},
        Validated, VulkanError, VulkanObject,
    };
    use std::{fs::File, io::Write, os::fd::IntoRawFd, time::Duration};

    const SYNC_FD: ash::vk::ExternalFenceHandleTypeFlags =
        ash::vk::ExternalFenceHandleTypeFlags::SYNC_FD;

    fn sync_fd_import(file: Option<std::fs::File>) -> ImportFenceFdInfo {
        ImportFenceFdInfo {
            flags: ash::vk::FenceImportFlags::TEMPORARY,
            file,
            ..ImportFenceFdInfo::handle_type(SYNC_FD)
        }
    }

    fn external_fence_info() -> FenceCreateInfo {
        FenceCreateInfo {
            export_handle_types: SYNC_FD,
            ..Default::default()
        }
    }

    #[test]
    fn fence_create() {
        let (device, _queue, renderer) = dev_and_queue!();

        let fence = Fence::new(device.clone(), Default::default()).unwrap();
        assert!(fence.has_feedback());
        assert!(!fence.is_signaled().unwrap());
        assert_eq!(renderer.sync_calls(), 0);

        drop(fence);
        assert_eq!(device.feedback_pool().used_slots(), 0);
        assert_eq!(renderer.live_feedback_commands(), 0);
        assert_eq!(renderer.count("destroy_fence_async"), 1);
    }

    #[test]
    fn fence_create_signaled() {
        let (device, _queue, renderer) = dev_and_queue!();

        let fence = Fence::new(
            device,
            FenceCreateInfo {
                signaled: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(fence.is_signaled().unwrap());
        assert_eq!(fence.wait(Some(Duration::ZERO)), Ok(WaitStatus::Success));
        assert_eq!(renderer.sync_calls(), 0);
        assert!(renderer.count("wait_for_fences_async") >= 1);
    }

    #[test]
    fn fence_without_feedback_asks_host() {
        let (device, _queue, renderer) = dev_and_queue!(
            renderer_info(),
            PerfOptions {
                no_fence_feedback: true,
                ..Default::default()
            }
        );

        let fence = Fence::new(
            device,
            FenceCreateInfo {
                signaled: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(!fence.has_feedback());
        assert!(fence.is_signaled().unwrap());
        assert_eq!(renderer.count("get_fence_status"), 1);
    }

    #[test]
    fn fence_feedback_needs_host_waits() {
        let (device, _queue, _renderer) = dev_and_queue!(
            RendererInfo {
                allow_vk_wait_syncs: false,
                ..renderer_info()
            },
            PerfOptions::default()
        );

        let fence = Fence::new(device.clone(), Default::default()).unwrap();
        assert!(!fence.has_feedback());

        let external = Fence::new(device, external_fence_info()).unwrap();
        assert!(!external.has_feedback());
    }

    #[test]
    fn external_fence_has_no_feedback() {
        let (device, _queue, _renderer) = dev_and_queue!();

        let fence = Fence::new(device, external_fence_info()).unwrap();
        assert!(fence.is_external());
        assert!(!fence.has_feedback());
    }

    #[test]
    fn reset_then_not_ready() {
        let (device, _queue, renderer) = dev_and_queue!();

        let fence = Fence::new(
            device,
            FenceCreateInfo {
                signaled: true,
                ..Default::default()
            },
        )
        .unwrap();

        fence.reset().unwrap();
        assert!(!fence.is_signaled().unwrap());
        assert_eq!(renderer.count("reset_fences_async"), 1);
    }

    #[test]
    fn feedback_rollback() {
        let (device, _queues, renderer) =
            device_with(renderer_info(), PerfOptions::default(), &[0, 1, 2]);
        renderer.fail_feedback_command(2);

        match Fence::new(device.clone(), Default::default()) {
            Err(Validated::Error(VulkanError::OutOfDeviceMemory)) => (),
            _ => panic!(),
        }

        assert_eq!(renderer.live_feedback_commands(), 0);
        assert_eq!(device.feedback_pool().used_slots(), 0);
        assert_eq!(renderer.count("create_fence_async"), 0);
    }

    #[test]
    fn import_signaled_marker() {
        let (device, _queue, renderer) = dev_and_queue!();

        let fence = Fence::new(device, external_fence_info()).unwrap();
        unsafe {
            let info = ImportFenceFdInfo::from_raw_fd(
                SYNC_FD,
                ash::vk::FenceImportFlags::TEMPORARY,
                -1,
            )
            .unwrap();
            fence.import_fd(info).unwrap();
        }

        assert!(fence.is_signaled().unwrap());
        assert_eq!(renderer.sync_calls(), 0);
    }

    #[test]
    fn import_invalid_fd() {
        unsafe {
            let err = ImportFenceFdInfo::from_raw_fd(
                SYNC_FD,
                ash::vk::FenceImportFlags::TEMPORARY,
                -7,
            )
            .unwrap_err();
            assert_eq!(err, VulkanError::InvalidExternalHandle);
        }
    }

    #[test]
    fn import_non_sync_file() {
        let (device, _queue, renderer) = dev_and_queue!();
        let fence = Fence::new(device, external_fence_info()).unwrap();
        let fd = File::open("/dev/null").unwrap().into_raw_fd();

        let err = unsafe {
            ImportFenceFdInfo::from_raw_fd(SYNC_FD, ash::vk::FenceImportFlags::TEMPORARY, fd)
        }
        .unwrap_err();
        assert_eq!(err, VulkanError::InvalidExternalHandle);
        unsafe { libc::close(fd) };

        // The fence keeps its own payload.
        assert!(!fence.is_signaled().unwrap());
        assert_eq!(renderer.sync_calls(), 0);
    }

    #[test]
    fn import_validation() {
        let (device, _queue, _renderer) = dev_and_queue!();
        let fence = Fence::new(device, Default::default()).unwrap();

        unsafe {
            // Sync files can only be imported temporarily.
            match fence.import_fd(ImportFenceFdInfo::handle_type(SYNC_FD)) {
                Err(Validated::ValidationError(_)) => (),
                _ => panic!(),
            }

            match fence.import_fd(ImportFenceFdInfo::handle_type(
                ash::vk::ExternalFenceHandleTypeFlags::OPAQUE_WIN32,
            )) {
                Err(Validated::ValidationError(_)) => (),
                _ => panic!(),
            }
        }
    }

    #[test]
    fn import_pending_sync_file() {
        let (device, _queue, _renderer) = dev_and_queue!();
        let fence = Fence::new(device, Default::default()).unwrap();

        let (file, mut writer) = sync_file(false);
        unsafe { fence.import_fd(sync_fd_import(Some(file))).unwrap() };

        assert!(!fence.is_signaled().unwrap());
        assert_eq!(
            fence.wait(Some(Duration::from_millis(2))),
            Ok(WaitStatus::Timeout)
        );

        writer.write_all(&[1]).unwrap();
        assert!(fence.is_signaled().unwrap());
        assert_eq!(fence.wait(None), Ok(WaitStatus::Success));

        // Resetting drops the imported payload.
        fence.reset().unwrap();
        assert!(!fence.is_signaled().unwrap());
    }

    #[test]
    fn export_device_only() {
        let (device, queue, renderer) = dev_and_queue!();
        let fence = Fence::new(device, external_fence_info()).unwrap();
        fence.set_ring_idx(queue.ring_idx());

        let file = fence.export_fd(SYNC_FD).unwrap();
        assert!(file.is_some());

        assert_eq!(renderer.ring_submissions(), [queue.ring_idx()]);
        assert_eq!(renderer.count("reset_fence_resource_async"), 1);
        assert_eq!(renderer.live_syncs(), 0);
        assert!(fence.state.lock().payloads.is_device_only());
    }

    #[test]
    fn export_failure() {
        let (device, _queue, renderer) = dev_and_queue!();
        let fence = Fence::new(device, external_fence_info()).unwrap();
        renderer.fail_sync_file_export();

        match fence.export_fd(SYNC_FD) {
            Err(Validated::Error(VulkanError::TooManyObjects)) => (),
            _ => panic!(),
        }
        assert_eq!(renderer.live_syncs(), 0);
        assert_eq!(renderer.count("reset_fence_resource_async"), 0);
    }

    #[test]
    fn export_imported_moves_file() {
        let (device, _queue, renderer) = dev_and_queue!();
        let fence = Fence::new(device, external_fence_info()).unwrap();

        let (file, mut writer) = sync_file(false);
        unsafe { fence.import_fd(sync_fd_import(Some(file))).unwrap() };

        let exported = fence.export_fd(SYNC_FD).unwrap().unwrap();
        assert!(fence.state.lock().payloads.is_device_only());
        assert_eq!(renderer.count("reset_fences_async"), 1);
        assert!(renderer.ring_submissions().is_empty());

        // The exported file is the imported one, still open.
        writer.write_all(&[1]).unwrap();
        assert_eq!(
            crate::sync::sync_file::wait(&exported, Some(Duration::ZERO)),
            Ok(true)
        );
    }

    #[test]
    fn export_imported_signaled_marker() {
        let (device, _queue, _renderer) = dev_and_queue!();
        let fence = Fence::new(device, external_fence_info()).unwrap();

        fence.signal_wsi();
        assert!(fence.is_signaled().unwrap());
        assert!(fence.export_fd(SYNC_FD).unwrap().is_none());
        assert!(fence.state.lock().payloads.is_device_only());
    }

    #[test]
    fn export_validation() {
        let (device, _queue, _renderer) = dev_and_queue!();

        let fence = Fence::new(device.clone(), Default::default()).unwrap();
        match fence.export_fd(SYNC_FD) {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }

        let fence = Fence::new(
            device,
            FenceCreateInfo {
                export_handle_types: ash::vk::ExternalFenceHandleTypeFlags::OPAQUE_FD,
                ..Default::default()
            },
        )
        .unwrap();
        match fence.export_fd(ash::vk::ExternalFenceHandleTypeFlags::OPAQUE_FD) {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }
    }

    #[test]
    fn create_validation() {
        let (device, _queue, _renderer) = dev_and_queue!();

        match Fence::new(
            device,
            FenceCreateInfo {
                export_handle_types: ash::vk::ExternalFenceHandleTypeFlags::OPAQUE_WIN32,
                ..Default::default()
            },
        ) {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }
    }

    #[test]
    fn multi_wait() {
        let (device, _queue, _renderer) = dev_and_queue!();

        let signaled = Fence::new(
            device.clone(),
            FenceCreateInfo {
                signaled: true,
                ..Default::default()
            },
        )
        .unwrap();
        let pending = Fence::new(device.clone(), Default::default()).unwrap();

        assert_eq!(
            Fence::multi_wait([&pending, &signaled], false, None),
            Ok(WaitStatus::Success)
        );
        assert_eq!(
            Fence::multi_wait([&pending, &signaled], true, Some(Duration::from_millis(2))),
            Ok(WaitStatus::Timeout)
        );
        assert_eq!(
            Fence::multi_wait([&signaled, &signaled], true, Some(Duration::ZERO)),
            Ok(WaitStatus::Success)
        );

        Fence::multi_reset([&pending, &signaled]).unwrap();
        assert!(!signaled.is_signaled().unwrap());
    }

    #[test]
    fn multi_wait_different_devices() {
        let (device1, _queue, _renderer) = dev_and_queue!();
        let (device2, _queue, _renderer) = dev_and_queue!();

        let fence1 = Fence::new(device1, Default::default()).unwrap();
        let fence2 = Fence::new(device2, Default::default()).unwrap();

        assert_should_panic!("didn't belong to the same device", {
            let _ = Fence::multi_wait([&fence1, &fence2], true, Some(Duration::ZERO));
        });
    }

    #[test]
    fn handles_are_unique() {
        let (device, _queue, _renderer) = dev_and_queue!();

        let fence1 = Fence::new(device.clone(), Default::default()).unwrap();
        let fence2 = Fence::new(device, Default::default()).unwrap();
        assert_ne!(fence1.handle(), fence2.handle());
        assert_ne!(fence1, fence2);
    }
}
