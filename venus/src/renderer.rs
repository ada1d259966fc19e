// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The transport to the host renderer.
//!
//! Calls come in two flavors. `*_async` calls are encoded into the command stream and the
//! driver moves on without waiting; any error they hit on the host surfaces later, typically as
//! a lost device. The other calls are synchronous: they block until the renderer has replied.
//!
//! Besides forwarded Vulkan commands, the renderer exposes a few primitives of its own:
//! submissions to a *ring* (one execution timeline of the host GPU context), renderer sync
//! objects that such submissions can signal, and export of those sync objects as sync files.

use crate::{
    command_buffer::SubmitBatches,
    feedback::{FeedbackCell, FeedbackType},
    VulkanError,
};
use std::{fmt::Debug, fs::File};

/// Capabilities of the renderer, fixed for the lifetime of the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RendererInfo {
    /// The host attaches the fences of a submission to the buffer objects it references, so a
    /// later consumer of those buffer objects waits for the submission implicitly.
    pub has_implicit_fencing: bool,

    /// The host can wait on its own syncs from Vulkan wait commands. Fence feedback relies on this
    /// to cover the gap between a feedback slot being written and the real fence signal.
    pub allow_vk_wait_syncs: bool,
}

/// A sync object owned by the renderer, identified by its id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RendererSync(pub u32);

/// A buffer object shared with the renderer, identified by its resource id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RendererBo(pub u32);

/// One batch of a ring submission.
#[derive(Clone, Copy, Debug, Default)]
pub struct RingSubmitBatch<'a> {
    /// The ring to submit to.
    pub ring_idx: u32,

    /// Renderer syncs to signal once the ring reaches this batch, with the value to signal.
    pub syncs: &'a [(RendererSync, u64)],
}

/// A submission to the renderer's rings, carrying no Vulkan work.
#[derive(Clone, Copy, Debug, Default)]
pub struct RingSubmission<'a> {
    /// Buffer objects the submission references, for implicit fencing.
    pub bos: &'a [RendererBo],

    pub batches: &'a [RingSubmitBatch<'a>],
}

/// The channel that carries commands to the host GPU context.
///
/// The handles passed to the renderer are the guest-side handles of the objects; the renderer
/// maps them to its own objects when they are created.
pub trait Renderer: Debug + Send + Sync {
    /// Returns the capabilities of the renderer.
    fn info(&self) -> &RendererInfo;

    fn create_fence_async(&self, fence: ash::vk::Fence, signaled: bool);

    fn destroy_fence_async(&self, fence: ash::vk::Fence);

    fn create_semaphore_async(
        &self,
        semaphore: ash::vk::Semaphore,
        semaphore_type: ash::vk::SemaphoreType,
        initial_value: u64,
    );

    fn destroy_semaphore_async(&self, semaphore: ash::vk::Semaphore);

    fn create_event_async(&self, event: ash::vk::Event, flags: ash::vk::EventCreateFlags);

    fn destroy_event_async(&self, event: ash::vk::Event);

    /// Submits batches to a queue and returns without waiting for the host.
    fn queue_submit_async(
        &self,
        queue: ash::vk::Queue,
        batches: &SubmitBatches<'_>,
        fence: Option<ash::vk::Fence>,
    );

    /// Submits batches to a queue and waits for the host to accept them.
    fn queue_submit_sync(
        &self,
        queue: ash::vk::Queue,
        batches: &SubmitBatches<'_>,
        fence: Option<ash::vk::Fence>,
    ) -> Result<(), VulkanError>;

    /// Returns whether the host fence is signaled.
    fn get_fence_status(&self, fence: ash::vk::Fence) -> Result<bool, VulkanError>;

    fn reset_fences_async(&self, fences: &[ash::vk::Fence]);

    fn wait_for_fences_async(&self, fences: &[ash::vk::Fence], wait_all: bool, timeout: u64);

    /// Drops the payload the host fence received from a sync file export.
    fn reset_fence_resource_async(&self, fence: ash::vk::Fence);

    fn get_semaphore_counter_value(&self, semaphore: ash::vk::Semaphore)
        -> Result<u64, VulkanError>;

    fn signal_semaphore_async(&self, semaphore: ash::vk::Semaphore, value: u64);

    /// Imports the renderer resource `resource_id` as the payload of the host semaphore.
    /// Resource id `0` stands for an already-signaled payload.
    fn import_semaphore_resource_async(&self, semaphore: ash::vk::Semaphore, resource_id: u32);

    /// Performs a wait operation on the host semaphore, consuming its payload.
    fn wait_semaphore_resource_async(&self, semaphore: ash::vk::Semaphore);

    /// Returns whether the host event is set.
    fn get_event_status(&self, event: ash::vk::Event) -> Result<bool, VulkanError>;

    fn set_event(&self, event: ash::vk::Event) -> Result<(), VulkanError>;

    fn set_event_async(&self, event: ash::vk::Event);

    fn reset_event(&self, event: ash::vk::Event) -> Result<(), VulkanError>;

    fn reset_event_async(&self, event: ash::vk::Event);

    /// Records a command buffer for the queue family `queue_family_index` that writes the
    /// signaled status of `ty` into `cell`.
    fn alloc_feedback_command(
        &self,
        queue_family_index: u32,
        ty: FeedbackType,
        cell: &FeedbackCell,
    ) -> Result<ash::vk::CommandBuffer, VulkanError>;

    fn free_feedback_command(
        &self,
        queue_family_index: u32,
        command_buffer: ash::vk::CommandBuffer,
    );

    /// Creates a binary renderer sync with the given initial value.
    fn create_sync(&self, initial_value: u64) -> Result<RendererSync, VulkanError>;

    fn destroy_sync(&self, sync: RendererSync);

    /// Submits work-free batches to the renderer's rings.
    fn submit(&self, submission: &RingSubmission<'_>) -> Result<(), VulkanError>;

    /// Exports a renderer sync as a sync file. Returns `None` if the export failed.
    fn export_sync_file(&self, sync: RendererSync) -> Option<File>;
}
