// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The guest-side representation of a device on the host renderer.
//!
//! The `Device` owns the transport to the renderer, the driver options, the feedback pool
//! shared by its fences and events, and it hands out the guest handles of the objects created
//! from it. Creating a device also creates its queues:
//!
//! ```no_run
//! use std::sync::Arc;
//! use venus::{
//!     device::{Device, DeviceCreateInfo, QueueCreateInfo},
//!     options::{DebugOptions, PerfOptions},
//!     renderer::Renderer,
//! };
//!
//! # let renderer: Arc<dyn Renderer> = return;
//! let (device, mut queues) = Device::new(
//!     renderer,
//!     DeviceCreateInfo {
//!         queue_create_infos: vec![QueueCreateInfo {
//!             queue_family_index: 0,
//!             ..Default::default()
//!         }],
//!         debug: DebugOptions::from_env(),
//!         perf: PerfOptions::from_env(),
//!         ..Default::default()
//!     },
//! )
//! .unwrap();
//! let queue = queues.next().unwrap();
//! ```

pub use self::queue::{Queue, QueueGuard};
use crate::{
    feedback::{FeedbackPool, FeedbackPoolCreateInfo},
    options::{DebugOptions, PerfOptions},
    renderer::{Renderer, RingSubmission, RingSubmitBatch},
    Handle, ValidationError, VulkanError, VulkanObject,
};
use smallvec::SmallVec;
use std::{
    fmt::Display,
    fs::File,
    hash::{Hash, Hasher},
    ops::Deref,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

mod queue;

static NEXT_DEVICE_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Represents a device on the renderer.
#[derive(Debug)]
pub struct Device {
    handle: ash::vk::Device,
    renderer: Arc<dyn Renderer>,

    debug: DebugOptions,
    perf: PerfOptions,

    active_queue_families: SmallVec<[u32; 8]>,
    feedback_pool: FeedbackPool,

    next_handle: AtomicU64,
}

impl Device {
    /// Creates a new `Device`, along with the queues listed in `create_info`.
    ///
    /// Queues are returned in the order of `create_info.queue_create_infos`. Each queue gets
    /// its own renderer ring, numbered from 1.
    pub fn new(
        renderer: Arc<dyn Renderer>,
        create_info: DeviceCreateInfo,
    ) -> Result<(Arc<Device>, impl ExactSizeIterator<Item = Arc<Queue>>), Box<ValidationError>>
    {
        create_info
            .validate()
            .map_err(|err| err.add_context("create_info"))?;

        let DeviceCreateInfo {
            queue_create_infos,
            debug,
            perf,
            feedback_pool,
            _ne: _,
        } = create_info;

        let active_queue_families = queue_create_infos
            .iter()
            .map(|info| info.queue_family_index)
            .collect();

        let device = Arc::new(Device {
            handle: ash::vk::Device::from_raw(NEXT_DEVICE_HANDLE.fetch_add(1, Ordering::Relaxed)),
            renderer,
            debug,
            perf,
            active_queue_families,
            feedback_pool: FeedbackPool::new(feedback_pool),
            next_handle: AtomicU64::new(1),
        });

        let mut ring_idx = 0;
        let queues: Vec<_> = queue_create_infos
            .iter()
            .flat_map(|info| (0..info.queue_count).map(move |queue_index| (info, queue_index)))
            .map(|(info, queue_index)| {
                ring_idx += 1;
                Queue::new(
                    device.clone(),
                    info.queue_family_index,
                    queue_index,
                    ring_idx,
                )
            })
            .collect();

        Ok((device, queues.into_iter()))
    }

    /// Returns the transport to the renderer.
    #[inline]
    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Returns the diagnostics options the device was created with.
    #[inline]
    pub fn debug_options(&self) -> &DebugOptions {
        &self.debug
    }

    /// Returns the performance options the device was created with.
    #[inline]
    pub fn perf_options(&self) -> &PerfOptions {
        &self.perf
    }

    /// Returns the queue family indices that the device has queues for.
    #[inline]
    pub fn active_queue_families(&self) -> &[u32] {
        &self.active_queue_families
    }

    /// Returns the pool that feedback slots are allocated from.
    #[inline]
    pub fn feedback_pool(&self) -> &FeedbackPool {
        &self.feedback_pool
    }

    /// Returns a handle that no other object of this device has.
    pub(crate) fn alloc_handle<H: Handle>(&self) -> H {
        H::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Creates a sync file that signals once the renderer ring `ring_idx` has executed all the
    /// work submitted to it so far.
    pub(crate) fn create_sync_file(&self, ring_idx: u32) -> Result<File, VulkanError> {
        let renderer = &self.renderer;

        let sync = renderer.create_sync(0)?;
        let syncs = [(sync, 1)];
        let batches = [RingSubmitBatch {
            ring_idx,
            syncs: &syncs,
        }];

        let result = renderer
            .submit(&RingSubmission {
                bos: &[],
                batches: &batches,
            })
            .and_then(|()| {
                renderer
                    .export_sync_file(sync)
                    .ok_or(VulkanError::TooManyObjects)
            });

        renderer.destroy_sync(sync);

        result
    }

    /// Logs `result` if it is an error and the `result` debug option is set.
    pub(crate) fn log_result<T, E: Display>(
        &self,
        entry_point: &str,
        result: Result<T, E>,
    ) -> Result<T, E> {
        if self.debug.result {
            if let Err(err) = &result {
                log::debug!("{} failed: {}", entry_point, err);
            }
        }

        result
    }

    /// Logs the call of `entry_point` if the `trace` debug option is set.
    #[inline]
    pub(crate) fn trace(&self, entry_point: &str) {
        if self.debug.trace {
            log::trace!("{}", entry_point);
        }
    }
}

unsafe impl VulkanObject for Device {
    type Handle = ash::vk::Device;

    #[inline]
    fn handle(&self) -> Self::Handle {
        self.handle
    }
}

impl PartialEq for Device {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Device {}

impl Hash for Device {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

/// Parameters to create a new `Device`.
#[derive(Clone, Debug)]
pub struct DeviceCreateInfo {
    /// The queues to create for the device.
    ///
    /// The default value is empty, which must be overridden.
    pub queue_create_infos: Vec<QueueCreateInfo>,

    /// Diagnostics switches. Use [`DebugOptions::from_env`] to read them from the environment.
    ///
    /// The default value is all switches off.
    pub debug: DebugOptions,

    /// Performance switches. Use [`PerfOptions::from_env`] to read them from the environment.
    ///
    /// The default value is all switches off.
    pub perf: PerfOptions,

    /// How to size the feedback pool.
    ///
    /// The default value is `FeedbackPoolCreateInfo::default()`.
    pub feedback_pool: FeedbackPoolCreateInfo,

    pub _ne: crate::NonExhaustive,
}

impl Default for DeviceCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            queue_create_infos: Vec::new(),
            debug: DebugOptions::default(),
            perf: PerfOptions::default(),
            feedback_pool: FeedbackPoolCreateInfo::default(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl DeviceCreateInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            ref queue_create_infos,
            debug: _,
            perf: _,
            ref feedback_pool,
            _ne: _,
        } = self;

        if queue_create_infos.is_empty() {
            return Err(Box::new(ValidationError {
                context: "queue_create_infos".into(),
                problem: "is empty".into(),
                vuids: &["VUID-VkDeviceCreateInfo-queueCreateInfoCount-arraylength"],
            }));
        }

        for (index, queue_create_info) in queue_create_infos.iter().enumerate() {
            queue_create_info
                .validate()
                .map_err(|err| err.add_context(format!("queue_create_infos[{}]", index)))?;

            if queue_create_infos[..index]
                .iter()
                .any(|other| other.queue_family_index == queue_create_info.queue_family_index)
            {
                return Err(Box::new(ValidationError {
                    context: format!("queue_create_infos[{}].queue_family_index", index).into(),
                    problem: "is the same as the queue family index of an earlier element".into(),
                    vuids: &["VUID-VkDeviceCreateInfo-queueFamilyIndex-02802"],
                }));
            }
        }

        if feedback_pool.slots_per_buffer == 0 {
            return Err(Box::new(ValidationError {
                context: "feedback_pool.slots_per_buffer".into(),
                problem: "is zero".into(),
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// Parameters to create queues of one queue family.
#[derive(Clone, Debug)]
pub struct QueueCreateInfo {
    /// The index of the queue family to create queues for.
    ///
    /// The default value is `0`.
    pub queue_family_index: u32,

    /// The number of queues to create.
    ///
    /// The default value is `1`.
    pub queue_count: u32,

    pub _ne: crate::NonExhaustive,
}

impl Default for QueueCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            queue_family_index: 0,
            queue_count: 1,
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl QueueCreateInfo {
    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        if self.queue_count == 0 {
            return Err(Box::new(ValidationError {
                context: "queue_count".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkDeviceQueueCreateInfo-queueCount-arraylength"],
            }));
        }

        Ok(())
    }
}

/// Implemented on objects that belong to a device.
///
/// # Safety
///
/// - `device()` must return the correct device.
pub unsafe trait DeviceOwned {
    /// Returns the device that owns `self`.
    fn device(&self) -> &Arc<Device>;
}

unsafe impl<T> DeviceOwned for T
where
    T: Deref,
    T::Target: DeviceOwned,
{
    #[inline]
    fn device(&self) -> &Arc<Device> {
        (**self).device()
    }
}
