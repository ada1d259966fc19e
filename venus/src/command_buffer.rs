// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Batches of work submitted to a queue.
//!
//! Applications describe a submission either with the legacy [`SubmitInfo`] layout, where
//! semaphores, stage masks and values are parallel arrays, or with [`SubmitInfo2`], where each
//! semaphore and command buffer has its own info structure. [`SubmitBatches`] holds either one
//! and exposes accessors that work the same for both, so that the submission logic is written
//! only once.
//!
//! Command buffers are opaque here. They are recorded by other parts of the driver and only
//! their handles travel with the submission.

use crate::{memory::DeviceMemory, sync::semaphore::Semaphore};
use std::{borrow::Cow, sync::Arc};

/// Parameters to submit a batch of command buffers, in the legacy layout.
#[derive(Clone, Debug)]
pub struct SubmitInfo {
    /// The semaphores to wait for before beginning the execution of this batch.
    ///
    /// The default value is empty.
    pub wait_semaphores: Vec<Arc<Semaphore>>,

    /// For each element of `wait_semaphores`, the stages at which the wait happens.
    ///
    /// The default value is empty.
    pub wait_dst_stage_mask: Vec<ash::vk::PipelineStageFlags>,

    /// The command buffers to execute.
    ///
    /// The default value is empty.
    pub command_buffers: Vec<ash::vk::CommandBuffer>,

    /// The semaphores to signal after the execution of this batch has completed.
    ///
    /// The default value is empty.
    pub signal_semaphores: Vec<Arc<Semaphore>>,

    /// For each timeline semaphore in `wait_semaphores`, the value to wait for. Must be either
    /// empty or as long as `wait_semaphores`.
    ///
    /// The default value is empty.
    pub wait_semaphore_values: Vec<u64>,

    /// For each timeline semaphore in `signal_semaphores`, the value to signal. Must be either
    /// empty or as long as `signal_semaphores`.
    ///
    /// The default value is empty.
    pub signal_semaphore_values: Vec<u64>,

    /// Memory that the window system will read once this batch completes. Only honored when
    /// the submission contains exactly one batch.
    ///
    /// The default value is `None`.
    pub wsi_memory_signal: Option<Arc<DeviceMemory>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for SubmitInfo {
    #[inline]
    fn default() -> Self {
        Self {
            wait_semaphores: Vec::new(),
            wait_dst_stage_mask: Vec::new(),
            command_buffers: Vec::new(),
            signal_semaphores: Vec::new(),
            wait_semaphore_values: Vec::new(),
            signal_semaphore_values: Vec::new(),
            wsi_memory_signal: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// Parameters to submit a batch of command buffers, with per-element info structures.
#[derive(Clone, Debug)]
pub struct SubmitInfo2 {
    /// The default value is empty.
    pub flags: ash::vk::SubmitFlags,

    /// The semaphores to wait for before beginning the execution of this batch.
    ///
    /// The default value is empty.
    pub wait_semaphore_infos: Vec<SemaphoreSubmitInfo>,

    /// The command buffers to execute.
    ///
    /// The default value is empty.
    pub command_buffer_infos: Vec<CommandBufferSubmitInfo>,

    /// The semaphores to signal after the execution of this batch has completed.
    ///
    /// The default value is empty.
    pub signal_semaphore_infos: Vec<SemaphoreSubmitInfo>,

    /// Memory that the window system will read once this batch completes. Only honored when
    /// the submission contains exactly one batch.
    ///
    /// The default value is `None`.
    pub wsi_memory_signal: Option<Arc<DeviceMemory>>,

    pub _ne: crate::NonExhaustive,
}

impl Default for SubmitInfo2 {
    #[inline]
    fn default() -> Self {
        Self {
            flags: ash::vk::SubmitFlags::empty(),
            wait_semaphore_infos: Vec::new(),
            command_buffer_infos: Vec::new(),
            signal_semaphore_infos: Vec::new(),
            wsi_memory_signal: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A semaphore wait or signal operation in a [`SubmitInfo2`].
#[derive(Clone, Debug)]
pub struct SemaphoreSubmitInfo {
    pub semaphore: Arc<Semaphore>,

    /// For timeline semaphores, the value to wait for or to signal. Ignored for binary
    /// semaphores.
    ///
    /// The default value is `0`.
    pub value: u64,

    /// The stages at which the wait happens, or after which the signal happens.
    ///
    /// The default value is `ALL_COMMANDS`.
    pub stage_mask: ash::vk::PipelineStageFlags2,

    /// The default value is `0`.
    pub device_index: u32,

    pub _ne: crate::NonExhaustive,
}

impl SemaphoreSubmitInfo {
    /// Returns a `SemaphoreSubmitInfo` with the specified `semaphore`.
    #[inline]
    pub fn semaphore(semaphore: Arc<Semaphore>) -> Self {
        Self {
            semaphore,
            value: 0,
            stage_mask: ash::vk::PipelineStageFlags2::ALL_COMMANDS,
            device_index: 0,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// A command buffer to execute in a [`SubmitInfo2`].
#[derive(Clone, Debug)]
pub struct CommandBufferSubmitInfo {
    pub command_buffer: ash::vk::CommandBuffer,

    /// The default value is `0`.
    pub device_mask: u32,

    pub _ne: crate::NonExhaustive,
}

impl CommandBufferSubmitInfo {
    /// Returns a `CommandBufferSubmitInfo` with the specified `command_buffer`.
    #[inline]
    pub fn command_buffer(command_buffer: ash::vk::CommandBuffer) -> Self {
        Self {
            command_buffer,
            device_mask: 0,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// The batches of one queue submission, in either layout.
///
/// The batches are borrowed from the caller. Only when the driver has to extend the submission
/// does it take a copy.
#[derive(Clone, Debug)]
pub enum SubmitBatches<'a> {
    Submit(Cow<'a, [SubmitInfo]>),
    Submit2(Cow<'a, [SubmitInfo2]>),
}

impl<'a> SubmitBatches<'a> {
    /// Returns the number of batches.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::Submit(batches) => batches.len(),
            Self::Submit2(batches) => batches.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of semaphores batch `batch_index` waits on.
    #[inline]
    pub fn wait_semaphore_count(&self, batch_index: usize) -> usize {
        match self {
            Self::Submit(batches) => batches[batch_index].wait_semaphores.len(),
            Self::Submit2(batches) => batches[batch_index].wait_semaphore_infos.len(),
        }
    }

    /// Returns the number of semaphores batch `batch_index` signals.
    #[inline]
    pub fn signal_semaphore_count(&self, batch_index: usize) -> usize {
        match self {
            Self::Submit(batches) => batches[batch_index].signal_semaphores.len(),
            Self::Submit2(batches) => batches[batch_index].signal_semaphore_infos.len(),
        }
    }

    #[inline]
    pub fn wait_semaphore(&self, batch_index: usize, semaphore_index: usize) -> &Arc<Semaphore> {
        match self {
            Self::Submit(batches) => &batches[batch_index].wait_semaphores[semaphore_index],
            Self::Submit2(batches) => {
                &batches[batch_index].wait_semaphore_infos[semaphore_index].semaphore
            }
        }
    }

    #[inline]
    pub fn signal_semaphore(&self, batch_index: usize, semaphore_index: usize) -> &Arc<Semaphore> {
        match self {
            Self::Submit(batches) => &batches[batch_index].signal_semaphores[semaphore_index],
            Self::Submit2(batches) => {
                &batches[batch_index].signal_semaphore_infos[semaphore_index].semaphore
            }
        }
    }

    /// Returns the number of command buffers in batch `batch_index`.
    #[inline]
    pub fn command_buffer_count(&self, batch_index: usize) -> usize {
        match self {
            Self::Submit(batches) => batches[batch_index].command_buffers.len(),
            Self::Submit2(batches) => batches[batch_index].command_buffer_infos.len(),
        }
    }

    #[inline]
    pub fn command_buffer(
        &self,
        batch_index: usize,
        command_buffer_index: usize,
    ) -> ash::vk::CommandBuffer {
        match self {
            Self::Submit(batches) => batches[batch_index].command_buffers[command_buffer_index],
            Self::Submit2(batches) => {
                batches[batch_index].command_buffer_infos[command_buffer_index].command_buffer
            }
        }
    }

    /// Returns the WSI memory that batch `batch_index` signals, if any.
    #[inline]
    pub fn wsi_memory_signal(&self, batch_index: usize) -> Option<&Arc<DeviceMemory>> {
        match self {
            Self::Submit(batches) => batches[batch_index].wsi_memory_signal.as_ref(),
            Self::Submit2(batches) => batches[batch_index].wsi_memory_signal.as_ref(),
        }
    }

    /// Appends a batch that executes only `command_buffer`, copying the borrowed batches first.
    ///
    /// Returns `None` if the copy could not be allocated.
    pub(crate) fn try_push_command_buffer(
        &mut self,
        command_buffer: ash::vk::CommandBuffer,
    ) -> Option<()> {
        match self {
            Self::Submit(batches) => {
                let batches = try_to_mut(batches)?;
                batches.push(SubmitInfo {
                    command_buffers: vec![command_buffer],
                    ..Default::default()
                });
            }
            Self::Submit2(batches) => {
                let batches = try_to_mut(batches)?;
                batches.push(SubmitInfo2 {
                    command_buffer_infos: vec![CommandBufferSubmitInfo::command_buffer(
                        command_buffer,
                    )],
                    ..Default::default()
                });
            }
        }

        Some(())
    }
}

// Like `Cow::to_mut`, but reserves room for one more element and reports allocation failure
// instead of aborting.
fn try_to_mut<'c, T: Clone>(batches: &'c mut Cow<'_, [T]>) -> Option<&'c mut Vec<T>> {
    if let Cow::Borrowed(borrowed) = *batches {
        let mut owned = Vec::new();
        owned.try_reserve_exact(borrowed.len() + 1).ok()?;
        owned.extend_from_slice(borrowed);
        *batches = Cow::Owned(owned);
    }

    match batches {
        Cow::Owned(owned) => {
            owned.try_reserve(1).ok()?;
            Some(owned)
        }
        Cow::Borrowed(_) => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CommandBufferSubmitInfo, SemaphoreSubmitInfo, SubmitBatches, SubmitInfo, SubmitInfo2,
    };
    use crate::{
        sync::semaphore::{Semaphore, SemaphoreCreateInfo},
        Handle,
    };
    use std::{borrow::Cow, sync::Arc};

    #[test]
    fn accessors_agree_across_layouts() {
        let (device, _queue, _renderer) = dev_and_queue!();

        let wait =
            Arc::new(Semaphore::new(device.clone(), SemaphoreCreateInfo::default()).unwrap());
        let signal =
            Arc::new(Semaphore::new(device.clone(), SemaphoreCreateInfo::default()).unwrap());
        let cmd = ash::vk::CommandBuffer::from_raw(0x42);

        let v1 = [SubmitInfo {
            wait_semaphores: vec![wait.clone()],
            wait_dst_stage_mask: vec![ash::vk::PipelineStageFlags::ALL_COMMANDS],
            command_buffers: vec![cmd],
            signal_semaphores: vec![signal.clone()],
            ..Default::default()
        }];
        let v2 = [SubmitInfo2 {
            wait_semaphore_infos: vec![SemaphoreSubmitInfo::semaphore(wait.clone())],
            command_buffer_infos: vec![CommandBufferSubmitInfo::command_buffer(cmd)],
            signal_semaphore_infos: vec![SemaphoreSubmitInfo::semaphore(signal.clone())],
            ..Default::default()
        }];

        for batches in [
            SubmitBatches::Submit(Cow::Borrowed(&v1)),
            SubmitBatches::Submit2(Cow::Borrowed(&v2)),
        ] {
            assert_eq!(batches.len(), 1);
            assert_eq!(batches.wait_semaphore_count(0), 1);
            assert_eq!(batches.signal_semaphore_count(0), 1);
            assert!(Arc::ptr_eq(batches.wait_semaphore(0, 0), &wait));
            assert!(Arc::ptr_eq(batches.signal_semaphore(0, 0), &signal));
            assert_eq!(batches.command_buffer_count(0), 1);
            assert_eq!(batches.command_buffer(0, 0), cmd);
            assert!(batches.wsi_memory_signal(0).is_none());
        }
    }

    #[test]
    fn push_copies_borrowed_batches() {
        let cmd = ash::vk::CommandBuffer::from_raw(7);
        let v2 = [SubmitInfo2::default(), SubmitInfo2::default()];

        let mut batches = SubmitBatches::Submit2(Cow::Borrowed(&v2));
        batches.try_push_command_buffer(cmd).unwrap();

        assert_eq!(v2.len(), 2);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches.command_buffer_count(2), 1);
        assert_eq!(batches.command_buffer(2, 0), cmd);
        assert_eq!(batches.wait_semaphore_count(2), 0);
    }
}
