// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Device memory, as far as queue submission is concerned.
//!
//! Allocation and mapping live elsewhere in the driver. Submissions only need to know which
//! renderer buffer object backs a memory object, so that presentation can be ordered against
//! the work that rendered into it.

use crate::{
    device::{Device, DeviceOwned},
    renderer::RendererBo,
    VulkanObject,
};
use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

/// A memory object that is backed by a renderer buffer object.
#[derive(Debug)]
pub struct DeviceMemory {
    handle: ash::vk::DeviceMemory,
    device: Arc<Device>,
    bo: RendererBo,
}

impl DeviceMemory {
    /// Wraps the memory object `handle`, backed by the buffer object `bo`.
    ///
    /// # Safety
    ///
    /// - `handle` must be a memory object created from `device`, and `bo` must be the buffer
    ///   object the renderer allocated for it.
    pub unsafe fn from_handle(
        device: Arc<Device>,
        handle: ash::vk::DeviceMemory,
        bo: RendererBo,
    ) -> Arc<DeviceMemory> {
        Arc::new(DeviceMemory { handle, device, bo })
    }

    /// Returns the renderer buffer object backing the memory.
    #[inline]
    pub fn bo(&self) -> RendererBo {
        self.bo
    }
}

unsafe impl VulkanObject for DeviceMemory {
    type Handle = ash::vk::DeviceMemory;

    #[inline]
    fn handle(&self) -> Self::Handle {
        self.handle
    }
}

unsafe impl DeviceOwned for DeviceMemory {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl PartialEq for DeviceMemory {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && self.device == other.device
    }
}

impl Eq for DeviceMemory {}

impl Hash for DeviceMemory {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
        self.device.hash(state);
    }
}
