// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{Device, DeviceOwned};
use crate::{
    command_buffer::{SubmitBatches, SubmitInfo, SubmitInfo2},
    memory::DeviceMemory,
    renderer::{RingSubmission, RingSubmitBatch},
    sync::{fence::Fence, semaphore::Semaphore},
    Validated, ValidationError, VulkanError, VulkanObject,
};
use parking_lot::{Mutex, MutexGuard};
use std::{
    borrow::Cow,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

/// Represents a queue where commands can be submitted.
#[derive(Debug)]
pub struct Queue {
    handle: ash::vk::Queue,
    device: Arc<Device>,

    queue_family_index: u32,
    queue_index: u32, // index within family
    ring_idx: u32,

    state: Mutex<QueueState>,
}

impl Queue {
    pub(super) fn new(
        device: Arc<Device>,
        queue_family_index: u32,
        queue_index: u32,
        ring_idx: u32,
    ) -> Arc<Self> {
        let handle = device.alloc_handle::<ash::vk::Queue>();

        Arc::new(Queue {
            handle,
            device,
            queue_family_index,
            queue_index,
            ring_idx,
            state: Mutex::new(Default::default()),
        })
    }

    /// Returns the index of the queue family that this queue belongs to.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Returns the index of this queue within its queue family.
    #[inline]
    pub fn queue_index(&self) -> u32 {
        self.queue_index
    }

    /// Returns the renderer ring that the queue submits to.
    #[inline]
    pub fn ring_idx(&self) -> u32 {
        self.ring_idx
    }

    /// Locks the queue and then calls the provided closure, providing it with an object that
    /// can be used to perform operations on the queue, such as command buffer submissions.
    #[inline]
    pub fn with<'a, R>(self: &'a Arc<Self>, func: impl FnOnce(QueueGuard<'a>) -> R) -> R {
        func(QueueGuard {
            queue: self,
            state: self.state.lock(),
        })
    }
}

unsafe impl VulkanObject for Queue {
    type Handle = ash::vk::Queue;

    #[inline]
    fn handle(&self) -> Self::Handle {
        self.handle
    }
}

unsafe impl DeviceOwned for Queue {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl PartialEq for Queue {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.queue_index == other.queue_index
            && self.queue_family_index == other.queue_family_index
            && self.device == other.device
    }
}

impl Eq for Queue {}

impl Hash for Queue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.queue_index.hash(state);
        self.queue_family_index.hash(state);
        self.device.hash(state);
    }
}

#[derive(Debug, Default)]
struct QueueState {
    // Used to wait for the queue to become idle. Created on first use.
    wait_fence: Option<Fence>,
}

pub struct QueueGuard<'a> {
    queue: &'a Arc<Queue>,
    state: MutexGuard<'a, QueueState>,
}

impl QueueGuard<'_> {
    /// Waits until all work on this queue has finished.
    ///
    /// This is equivalent to submitting a fence to the queue, waiting on it, and then resetting
    /// it.
    pub fn wait_idle(&mut self) -> Result<(), VulkanError> {
        let device = self.queue.device();
        device.trace("vkQueueWaitIdle");

        let result = self.wait_idle_inner();
        device.log_result("vkQueueWaitIdle", result)
    }

    fn wait_idle_inner(&mut self) -> Result<(), VulkanError> {
        let fence = match self.state.wait_fence.take() {
            Some(fence) => fence,
            None => unsafe { Fence::new_unchecked(self.queue.device.clone(), Default::default())? },
        };

        let result = self
            .submit_batches(SubmitBatches::Submit(Cow::Borrowed(&[])), Some(&fence))
            .and_then(|()| fence.wait(None))
            .and_then(|_| fence.reset());

        self.state.wait_fence = Some(fence);

        result
    }

    /// Binds memory to sparse resources.
    ///
    /// Sparse binding is not supported by the renderer protocol, so this always reports a lost
    /// device.
    pub fn bind_sparse(
        &mut self,
        _bind_infos: &[ash::vk::BindSparseInfo<'_>],
        _fence: Option<&Arc<Fence>>,
    ) -> Result<(), VulkanError> {
        let device = self.queue.device();
        device.trace("vkQueueBindSparse");

        device.log_result("vkQueueBindSparse", Err(VulkanError::DeviceLost))
    }

    /// Submits command buffers to a queue to be executed.
    ///
    /// # Safety
    ///
    /// - The command buffers must be in the executable state, and must have been recorded for
    ///   the queue family of this queue.
    /// - The semaphores and the fence must not be in use by a pending operation that is not
    ///   ordered before this one.
    /// - For every binary semaphore that is waited on, a signal operation must have been
    ///   submitted before.
    #[inline]
    pub unsafe fn submit(
        &mut self,
        submit_infos: &[SubmitInfo],
        fence: Option<&Arc<Fence>>,
    ) -> Result<(), Validated<VulkanError>> {
        let device = self.queue.device();
        device.trace("vkQueueSubmit");
        self.validate_submit(submit_infos, fence)?;

        let result = self.submit_unchecked(submit_infos, fence);
        Ok(device.log_result("vkQueueSubmit", result)?)
    }

    fn validate_submit(
        &self,
        submit_infos: &[SubmitInfo],
        fence: Option<&Arc<Fence>>,
    ) -> Result<(), Box<ValidationError>> {
        let device = self.queue.device();

        if let Some(fence) = fence {
            // VUID-vkQueueSubmit-commonparent
            assert_eq!(device, fence.device());
        }

        for (index, submit_info) in submit_infos.iter().enumerate() {
            submit_info
                .validate(device)
                .map_err(|err| err.add_context(format!("submit_infos[{}]", index)))?;
        }

        Ok(())
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn submit_unchecked(
        &mut self,
        submit_infos: &[SubmitInfo],
        fence: Option<&Arc<Fence>>,
    ) -> Result<(), VulkanError> {
        self.submit_batches(
            SubmitBatches::Submit(Cow::Borrowed(submit_infos)),
            fence.map(|fence| &**fence),
        )
    }

    /// Submits command buffers to a queue to be executed, with per-element info structures.
    ///
    /// # Safety
    ///
    /// The same requirements as for [`submit`](Self::submit) apply.
    #[inline]
    pub unsafe fn submit2(
        &mut self,
        submit_infos: &[SubmitInfo2],
        fence: Option<&Arc<Fence>>,
    ) -> Result<(), Validated<VulkanError>> {
        let device = self.queue.device();
        device.trace("vkQueueSubmit2");
        self.validate_submit2(submit_infos, fence)?;

        let result = self.submit2_unchecked(submit_infos, fence);
        Ok(device.log_result("vkQueueSubmit2", result)?)
    }

    fn validate_submit2(
        &self,
        submit_infos: &[SubmitInfo2],
        fence: Option<&Arc<Fence>>,
    ) -> Result<(), Box<ValidationError>> {
        let device = self.queue.device();

        if let Some(fence) = fence {
            // VUID-vkQueueSubmit2-commonparent
            assert_eq!(device, fence.device());
        }

        for submit_info in submit_infos {
            for semaphore_info in submit_info
                .wait_semaphore_infos
                .iter()
                .chain(&submit_info.signal_semaphore_infos)
            {
                // VUID-vkQueueSubmit2-commonparent
                assert_eq!(device, semaphore_info.semaphore.device());
            }

            if let Some(memory) = &submit_info.wsi_memory_signal {
                assert_eq!(device, memory.device());
            }
        }

        Ok(())
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn submit2_unchecked(
        &mut self,
        submit_infos: &[SubmitInfo2],
        fence: Option<&Arc<Fence>>,
    ) -> Result<(), VulkanError> {
        self.submit_batches(
            SubmitBatches::Submit2(Cow::Borrowed(submit_infos)),
            fence.map(|fence| &**fence),
        )
    }

    fn submit_batches(
        &mut self,
        batches: SubmitBatches<'_>,
        fence: Option<&Fence>,
    ) -> Result<(), VulkanError> {
        let mut submission = QueueSubmission::new(self.queue, batches, fence);
        submission.prepare_submit()?;
        submission.submit(self)
    }

    // Makes sure that the window system reads `memory` only after the work just submitted.
    fn wsi_present(&mut self, memory: &DeviceMemory) {
        static IDLE_WAIT_WARNINGS: AtomicU32 = AtomicU32::new(0);

        let device = self.queue.device();
        let renderer = device.renderer();

        if renderer.info().has_implicit_fencing {
            let batches = [RingSubmitBatch {
                ring_idx: self.queue.ring_idx,
                syncs: &[],
            }];

            if let Err(err) = renderer.submit(&RingSubmission {
                bos: &[memory.bo()],
                batches: &batches,
            }) {
                log::warn!("failed to order the presented memory after the submission: {}", err);
            }
        } else {
            if device.debug_options().wsi
                && IDLE_WAIT_WARNINGS
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                        (count < 10).then_some(count + 1)
                    })
                    .is_ok()
            {
                log::warn!("forcing a queue idle wait before presenting");
            }

            if let Err(err) = self.wait_idle() {
                log::warn!("queue idle wait before presenting failed: {}", err);
            }
        }
    }
}

impl SubmitInfo {
    pub(crate) fn validate(&self, device: &Arc<Device>) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref wait_semaphores,
            ref wait_dst_stage_mask,
            command_buffers: _,
            ref signal_semaphores,
            ref wait_semaphore_values,
            ref signal_semaphore_values,
            ref wsi_memory_signal,
            _ne: _,
        } = self;

        for semaphore in wait_semaphores.iter().chain(signal_semaphores) {
            // VUID-vkQueueSubmit-commonparent
            assert_eq!(device, semaphore.device());
        }

        if let Some(memory) = wsi_memory_signal {
            assert_eq!(device, memory.device());
        }

        if wait_dst_stage_mask.len() != wait_semaphores.len() {
            return Err(Box::new(ValidationError {
                problem: "`wait_dst_stage_mask` does not have the same length as \
                    `wait_semaphores`"
                    .into(),
                vuids: &["VUID-VkSubmitInfo-pWaitDstStageMask-parameter"],
                ..Default::default()
            }));
        }

        // Values are either absent or given for every semaphore, and timeline semaphores need
        // them.
        let values_match = |semaphores: &[Arc<Semaphore>], values: &[u64]| {
            values.len() == semaphores.len()
                || values.is_empty()
                    && semaphores.iter().all(|semaphore| {
                        semaphore.semaphore_type() != ash::vk::SemaphoreType::TIMELINE
                    })
        };

        if !values_match(wait_semaphores.as_slice(), wait_semaphore_values.as_slice()) {
            return Err(Box::new(ValidationError {
                problem: "`wait_semaphore_values` is not empty and does not have the same \
                    length as `wait_semaphores`, or `wait_semaphores` contains a timeline \
                    semaphore and `wait_semaphore_values` is empty"
                    .into(),
                vuids: &[
                    "VUID-VkSubmitInfo-pWaitSemaphores-03239",
                    "VUID-VkSubmitInfo-pNext-03240",
                ],
                ..Default::default()
            }));
        }

        if !values_match(signal_semaphores.as_slice(), signal_semaphore_values.as_slice()) {
            return Err(Box::new(ValidationError {
                problem: "`signal_semaphore_values` is not empty and does not have the same \
                    length as `signal_semaphores`, or `signal_semaphores` contains a timeline \
                    semaphore and `signal_semaphore_values` is empty"
                    .into(),
                vuids: &[
                    "VUID-VkSubmitInfo-pNext-03241",
                    "VUID-VkSubmitInfo-pSignalSemaphores-03242",
                ],
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// One call to a queue submission entry point, from preparation to dispatch.
struct QueueSubmission<'a> {
    queue: &'a Arc<Queue>,
    batches: SubmitBatches<'a>,
    fence: Option<&'a Fence>,

    // Set when the submission must be a round trip to the renderer.
    synchronous: bool,
    has_feedback_fence: bool,
    wsi_memory: Option<Arc<DeviceMemory>>,
}

impl<'a> QueueSubmission<'a> {
    fn new(queue: &'a Arc<Queue>, batches: SubmitBatches<'a>, fence: Option<&'a Fence>) -> Self {
        QueueSubmission {
            queue,
            batches,
            fence,
            synchronous: false,
            has_feedback_fence: false,
            wsi_memory: None,
        }
    }

    fn prepare(&mut self) -> Result<(), VulkanError> {
        self.has_feedback_fence = self.fence.is_some_and(Fence::has_feedback);
        let is_external_fence = self.fence.is_some_and(Fence::is_external);

        // Presentation is only tracked for single-batch submissions.
        if self.batches.len() == 1 {
            self.wsi_memory = self.batches.wsi_memory_signal(0).cloned();
        }

        self.synchronous = is_external_fence || self.wsi_memory.is_some();

        for batch_index in 0..self.batches.len() {
            self.resolve_imported_waits(batch_index)?;

            if !self.synchronous {
                self.synchronous = (0..self.batches.signal_semaphore_count(batch_index)).any(
                    |semaphore_index| {
                        self.batches
                            .signal_semaphore(batch_index, semaphore_index)
                            .is_external()
                    },
                );
            }
        }

        Ok(())
    }

    // The renderer cannot wait on sync files imported in the guest. Wait for them here, then
    // give the host semaphores a signaled payload.
    fn resolve_imported_waits(&self, batch_index: usize) -> Result<(), VulkanError> {
        let renderer = self.queue.device.renderer();

        for semaphore_index in 0..self.batches.wait_semaphore_count(batch_index) {
            let semaphore = self.batches.wait_semaphore(batch_index, semaphore_index);

            if !semaphore.is_imported() {
                continue;
            }

            semaphore.wait_external()?;
            renderer.import_semaphore_resource_async(semaphore.handle(), 0);
        }

        Ok(())
    }

    fn prepare_submit(&mut self) -> Result<(), VulkanError> {
        self.prepare()?;

        if self.has_feedback_fence {
            if let Some(command_buffer) = self
                .fence
                .and_then(|fence| fence.feedback_command(self.queue.queue_family_index))
            {
                self.batches
                    .try_push_command_buffer(command_buffer)
                    .ok_or(VulkanError::OutOfHostMemory)?;
            }
        }

        Ok(())
    }

    fn submit(self, guard: &mut QueueGuard<'_>) -> Result<(), VulkanError> {
        let queue = self.queue;
        let device = &queue.device;
        let renderer = device.renderer();

        if self.batches.is_empty() && self.fence.is_none() {
            return Ok(());
        }

        let fence_handle = self.fence.map(Fence::handle);

        if self.synchronous || device.perf_options().no_async_queue_submit {
            renderer.queue_submit_sync(queue.handle, &self.batches, fence_handle)?;
        } else {
            renderer.queue_submit_async(queue.handle, &self.batches, fence_handle);
        }

        // A later sync file export of these objects must wait for this ring.
        if let Some(fence) = self.fence {
            fence.set_ring_idx(queue.ring_idx);
        }

        for batch_index in 0..self.batches.len() {
            for semaphore_index in 0..self.batches.signal_semaphore_count(batch_index) {
                self.batches
                    .signal_semaphore(batch_index, semaphore_index)
                    .set_ring_idx(queue.ring_idx);
            }
        }

        if let Some(memory) = &self.wsi_memory {
            guard.wsi_present(memory);
        }

        Ok(())
    }
}
