// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! An event provides fine-grained synchronization within a single queue, or from the host to a
//! queue.
//!
//! An event has two states: **signaled** and **unsignaled**. Unless it was created with
//! `DEVICE_ONLY`, an event is given a feedback slot holding its state, so that the host can
//! query it without a round trip and set or reset it without waiting for the renderer.

use crate::{
    device::{Device, DeviceOwned},
    feedback::{FeedbackSlot, FeedbackType},
    Validated, ValidationError, VulkanError, VulkanObject,
};
use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Used to block the GPU execution until an event on the CPU occurs.
///
/// Note that Vulkan implementations may have limits on how long a command buffer will wait for
/// an event to be signaled, in order to avoid interfering with progress of other clients of the
/// GPU. If the event isn't signaled within these limits, results are undefined and may include
/// device loss.
#[derive(Debug)]
pub struct Event {
    handle: ash::vk::Event,
    device: Arc<Device>,

    flags: ash::vk::EventCreateFlags,
    feedback_slot: Option<FeedbackSlot>,
}

impl Event {
    /// Creates a new `Event`.
    #[inline]
    pub fn new(
        device: Arc<Device>,
        create_info: EventCreateInfo,
    ) -> Result<Event, Validated<VulkanError>> {
        device.trace("vkCreateEvent");

        let result = unsafe { Self::new_unchecked(device.clone(), create_info) };
        Ok(device.log_result("vkCreateEvent", result)?)
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn new_unchecked(
        device: Arc<Device>,
        create_info: EventCreateInfo,
    ) -> Result<Event, VulkanError> {
        let EventCreateInfo { flags, _ne: _ } = create_info;

        let feedback_slot = if flags.contains(ash::vk::EventCreateFlags::DEVICE_ONLY)
            || device.perf_options().no_event_feedback
        {
            None
        } else {
            let slot = device
                .feedback_pool()
                .alloc(FeedbackType::Event)
                .ok_or(VulkanError::OutOfHostMemory)?;
            slot.set_status(ash::vk::Result::EVENT_RESET);

            Some(slot)
        };

        let handle = device.alloc_handle::<ash::vk::Event>();
        device.renderer().create_event_async(handle, flags);

        Ok(Event {
            handle,
            device,
            flags,
            feedback_slot,
        })
    }

    /// Returns the flags that the event was created with.
    #[inline]
    pub fn flags(&self) -> ash::vk::EventCreateFlags {
        self.flags
    }

    /// Returns true if the event has a feedback slot.
    #[inline]
    pub fn has_feedback(&self) -> bool {
        self.feedback_slot.is_some()
    }

    fn validate_host_access(
        &self,
        vuids: &'static [&'static str],
    ) -> Result<(), Box<ValidationError>> {
        if self.flags.contains(ash::vk::EventCreateFlags::DEVICE_ONLY) {
            return Err(Box::new(ValidationError {
                context: "self.flags()".into(),
                problem: "contains `DEVICE_ONLY`".into(),
                vuids,
            }));
        }

        Ok(())
    }

    /// Returns true if the event is signaled.
    #[inline]
    pub fn is_set(&self) -> Result<bool, Validated<VulkanError>> {
        self.device.trace("vkGetEventStatus");
        self.validate_host_access(&["VUID-vkGetEventStatus-event-03940"])?;

        let result = unsafe { self.is_set_unchecked() };
        Ok(self.device.log_result("vkGetEventStatus", result)?)
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn is_set_unchecked(&self) -> Result<bool, VulkanError> {
        match &self.feedback_slot {
            Some(slot) => Ok(slot.status() == ash::vk::Result::EVENT_SET),
            None => self.device.renderer().get_event_status(self.handle),
        }
    }

    /// Changes the `Event` to the signaled state.
    ///
    /// If a command buffer is waiting on this event, it is then unblocked.
    #[inline]
    pub fn set(&mut self) -> Result<(), Validated<VulkanError>> {
        self.device.trace("vkSetEvent");
        self.validate_host_access(&["VUID-vkSetEvent-event-03941"])?;

        let result = unsafe { self.set_unchecked() };
        Ok(self.device.log_result("vkSetEvent", result)?)
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn set_unchecked(&mut self) -> Result<(), VulkanError> {
        let renderer = self.device.renderer();

        match &self.feedback_slot {
            Some(slot) => {
                slot.set_status(ash::vk::Result::EVENT_SET);
                renderer.set_event_async(self.handle);

                Ok(())
            }
            None => renderer.set_event(self.handle),
        }
    }

    /// Changes the `Event` to the unsignaled state.
    #[inline]
    pub fn reset(&mut self) -> Result<(), Validated<VulkanError>> {
        self.device.trace("vkResetEvent");
        self.validate_host_access(&["VUID-vkResetEvent-event-03823"])?;

        let result = unsafe { self.reset_unchecked() };
        Ok(self.device.log_result("vkResetEvent", result)?)
    }

    #[cfg_attr(not(feature = "document_unchecked"), doc(hidden))]
    pub unsafe fn reset_unchecked(&mut self) -> Result<(), VulkanError> {
        let renderer = self.device.renderer();

        match &self.feedback_slot {
            Some(slot) => {
                slot.set_status(ash::vk::Result::EVENT_RESET);
                renderer.reset_event_async(self.handle);

                Ok(())
            }
            None => renderer.reset_event(self.handle),
        }
    }
}

impl Drop for Event {
    #[inline]
    fn drop(&mut self) {
        if let Some(slot) = self.feedback_slot.take() {
            self.device.feedback_pool().free(slot);
        }

        self.device.renderer().destroy_event_async(self.handle);
    }
}

unsafe impl VulkanObject for Event {
    type Handle = ash::vk::Event;

    #[inline]
    fn handle(&self) -> Self::Handle {
        self.handle
    }
}

unsafe impl DeviceOwned for Event {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl PartialEq for Event {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && self.device() == other.device()
    }
}

impl Eq for Event {}

impl Hash for Event {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
        self.device().hash(state);
    }
}

/// Parameters to create a new `Event`.
#[derive(Clone, Debug)]
pub struct EventCreateInfo {
    /// Additional properties of the event.
    ///
    /// The default value is empty.
    pub flags: ash::vk::EventCreateFlags,

    pub _ne: crate::NonExhaustive,
}

impl Default for EventCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: ash::vk::EventCreateFlags::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Event, EventCreateInfo};
    use crate::{options::PerfOptions, tests::renderer_info, Validated, VulkanError};

    #[test]
    fn event_create() {
        let (device, _queue, renderer) = dev_and_queue!();

        let event = Event::new(device.clone(), Default::default()).unwrap();
        assert!(event.has_feedback());
        assert!(!event.is_set().unwrap());
        assert_eq!(renderer.sync_calls(), 0);

        drop(event);
        assert_eq!(device.feedback_pool().used_slots(), 0);
        assert_eq!(renderer.count("destroy_event_async"), 1);
    }

    #[test]
    fn event_set_reset_with_feedback() {
        let (device, _queue, renderer) = dev_and_queue!();

        let mut event = Event::new(device, Default::default()).unwrap();
        event.set().unwrap();
        assert!(event.is_set().unwrap());
        assert!(renderer.event_is_set(&event));

        event.reset().unwrap();
        assert!(!event.is_set().unwrap());
        assert!(!renderer.event_is_set(&event));

        assert_eq!(renderer.count("set_event_async"), 1);
        assert_eq!(renderer.count("reset_event_async"), 1);
        assert_eq!(renderer.sync_calls(), 0);
    }

    #[test]
    fn event_without_feedback() {
        let (device, _queue, renderer) = dev_and_queue!(
            renderer_info(),
            PerfOptions {
                no_event_feedback: true,
                ..Default::default()
            }
        );

        let mut event = Event::new(device, Default::default()).unwrap();
        assert!(!event.has_feedback());

        event.set().unwrap();
        assert!(event.is_set().unwrap());
        event.reset().unwrap();
        assert!(!event.is_set().unwrap());

        assert_eq!(renderer.count("set_event"), 1);
        assert_eq!(renderer.count("reset_event"), 1);
        assert_eq!(renderer.count("get_event_status"), 2);

        renderer.fail_sync_calls(VulkanError::DeviceLost);
        match event.set() {
            Err(Validated::Error(VulkanError::DeviceLost)) => (),
            _ => panic!(),
        }
    }

    #[test]
    fn device_only_event() {
        let (device, _queue, _renderer) = dev_and_queue!();

        let mut event = Event::new(
            device.clone(),
            EventCreateInfo {
                flags: ash::vk::EventCreateFlags::DEVICE_ONLY,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(!event.has_feedback());
        assert_eq!(device.feedback_pool().used_slots(), 0);

        match event.set() {
            Err(Validated::ValidationError(_)) => (),
            _ => panic!(),
        }
    }

    #[test]
    fn pool_exhausted() {
        let (device, _queue, renderer) = dev_and_queue!(@pool 1, 1);

        let _event = Event::new(device.clone(), Default::default()).unwrap();
        match Event::new(device, Default::default()) {
            Err(Validated::Error(VulkanError::OutOfHostMemory)) => (),
            _ => panic!(),
        }
        assert_eq!(renderer.count("create_event_async"), 1);
    }
}
