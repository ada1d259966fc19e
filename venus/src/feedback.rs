// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Feedback slots: status cells shared between the guest and the GPU timeline.
//!
//! Asking the renderer for the status of a fence or an event costs a full round trip. To avoid
//! it, such objects can be given a *feedback slot*: a cell of memory visible to both sides. A
//! companion command, recorded by the renderer and executed on the GPU right after the real
//! work, writes the new status into the cell, and the guest simply reads it.
//!
//! Slots are handed out by the [`FeedbackPool`] owned by the device. The pool grows by whole
//! buffers and recycles freed slots.

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    sync::{
        atomic::{AtomicI32, AtomicU64, Ordering},
        Arc,
    },
};

/// What kind of object a feedback slot tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedbackType {
    /// The cell holds `SUCCESS` or `NOT_READY`.
    Fence,
    /// The cell holds `EVENT_SET` or `EVENT_RESET`.
    Event,
}

impl FeedbackType {
    #[inline]
    fn reset_status(self) -> ash::vk::Result {
        match self {
            FeedbackType::Fence => ash::vk::Result::NOT_READY,
            FeedbackType::Event => ash::vk::Result::EVENT_RESET,
        }
    }
}

/// Parameters to create a [`FeedbackPool`].
#[derive(Clone, Debug)]
pub struct FeedbackPoolCreateInfo {
    /// How many slots each buffer of the pool holds.
    ///
    /// The default value is `512`.
    pub slots_per_buffer: usize,

    /// The maximum number of buffers the pool may allocate, or `None` for no limit. Allocation
    /// fails once every slot of every buffer is in use.
    ///
    /// The default value is `None`.
    pub max_buffers: Option<usize>,

    pub _ne: crate::NonExhaustive,
}

impl Default for FeedbackPoolCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            slots_per_buffer: 512,
            max_buffers: None,
            _ne: crate::NonExhaustive(()),
        }
    }
}

/// The device-wide allocator of feedback slots.
#[derive(Debug)]
pub struct FeedbackPool {
    id: u64,
    slots_per_buffer: usize,
    max_buffers: Option<usize>,
    // Slots returned to the pool.
    free_slots: SegQueue<FeedbackCell>,
    // Only taken to grow the pool.
    state: Mutex<FeedbackPoolState>,
}

#[derive(Debug, Default)]
struct FeedbackPoolState {
    buffers: Vec<Arc<FeedbackBuffer>>,
    // Number of cells handed out from the newest buffer.
    used: usize,
}

impl FeedbackPool {
    /// Creates a new, empty `FeedbackPool`. No memory is allocated until the first slot is
    /// requested.
    ///
    /// # Panics
    ///
    /// - Panics if `create_info.slots_per_buffer` is zero.
    pub fn new(create_info: FeedbackPoolCreateInfo) -> FeedbackPool {
        let FeedbackPoolCreateInfo {
            slots_per_buffer,
            max_buffers,
            _ne: _,
        } = create_info;

        assert!(slots_per_buffer != 0);

        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        FeedbackPool {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            slots_per_buffer,
            max_buffers,
            free_slots: SegQueue::new(),
            state: Mutex::new(FeedbackPoolState::default()),
        }
    }

    /// Allocates a slot of the given type, or returns `None` if the pool is exhausted.
    ///
    /// The status of the new slot is unspecified; the caller sets it.
    pub fn alloc(&self, ty: FeedbackType) -> Option<FeedbackSlot> {
        let cell = match self.free_slots.pop() {
            Some(cell) => cell,
            None => self.alloc_new()?,
        };

        Some(FeedbackSlot { ty, cell })
    }

    fn alloc_new(&self) -> Option<FeedbackCell> {
        let mut state = self.state.lock();

        // A slot may have been freed while we were waiting for the lock.
        if let Some(cell) = self.free_slots.pop() {
            return Some(cell);
        }

        if state.buffers.is_empty() || state.used == self.slots_per_buffer {
            if self
                .max_buffers
                .is_some_and(|max_buffers| state.buffers.len() >= max_buffers)
            {
                return None;
            }

            let id = state.buffers.len() as u32;
            let buffer = FeedbackBuffer::new(self.id, id, self.slots_per_buffer);
            state.buffers.push(Arc::new(buffer));
            state.used = 0;

            log::debug!(
                "feedback pool grew to {} buffers of {} slots",
                state.buffers.len(),
                self.slots_per_buffer,
            );
        }

        let index = state.used;
        state.used += 1;

        Some(FeedbackCell {
            buffer: state.buffers.last()?.clone(),
            index,
        })
    }

    /// Returns a slot to the pool.
    ///
    /// # Panics
    ///
    /// - Panics if `slot` was not allocated from this pool.
    pub fn free(&self, slot: FeedbackSlot) {
        assert_eq!(
            slot.cell.buffer.pool_id, self.id,
            "tried to free a feedback slot that belongs to another pool",
        );

        self.free_slots.push(slot.cell);
    }

    /// Returns the number of slots currently handed out.
    pub fn used_slots(&self) -> usize {
        let state = self.state.lock();

        match state.buffers.len() {
            0 => 0,
            n => (n - 1) * self.slots_per_buffer + state.used - self.free_slots.len(),
        }
    }
}

/// One chunk of shared memory holding feedback cells.
pub struct FeedbackBuffer {
    pool_id: u64,
    id: u32,
    cells: Box<[AtomicI32]>,
}

impl FeedbackBuffer {
    fn new(pool_id: u64, id: u32, slot_count: usize) -> Self {
        FeedbackBuffer {
            pool_id,
            id,
            cells: (0..slot_count)
                .map(|_| AtomicI32::new(ash::vk::Result::NOT_READY.as_raw()))
                .collect(),
        }
    }

    /// Returns the identifier of the buffer within its pool.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Debug for FeedbackBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("FeedbackBuffer")
            .field("id", &self.id)
            .field("len", &self.cells.len())
            .finish()
    }
}

/// A feedback slot owned by a fence or an event.
///
/// A slot must be given back with [`FeedbackPool::free`]; dropping it leaks the cell.
#[derive(Debug)]
pub struct FeedbackSlot {
    ty: FeedbackType,
    cell: FeedbackCell,
}

impl FeedbackSlot {
    /// Returns the type the slot was allocated with.
    #[inline]
    pub fn ty(&self) -> FeedbackType {
        self.ty
    }

    /// Returns the status currently stored in the slot.
    #[inline]
    pub fn status(&self) -> ash::vk::Result {
        self.cell.read()
    }

    /// Stores `status` in the slot.
    #[inline]
    pub fn set_status(&self, status: ash::vk::Result) {
        self.cell.write(status);
    }

    /// Puts the slot back into the unsignaled state of its type.
    #[inline]
    pub fn reset_status(&self) {
        self.cell.write(self.ty.reset_status());
    }

    /// Returns the GPU-side view of the slot, which is what a feedback command writes to.
    #[inline]
    pub fn cell(&self) -> &FeedbackCell {
        &self.cell
    }
}

/// The location of a feedback cell, as seen by the commands that write it.
#[derive(Clone)]
pub struct FeedbackCell {
    buffer: Arc<FeedbackBuffer>,
    index: usize,
}

impl FeedbackCell {
    /// Returns the buffer that holds the cell.
    #[inline]
    pub fn buffer(&self) -> &Arc<FeedbackBuffer> {
        &self.buffer
    }

    /// Returns the byte offset of the cell within its buffer.
    #[inline]
    pub fn offset(&self) -> u64 {
        (self.index * size_of::<AtomicI32>()) as u64
    }

    /// Reads the cell.
    #[inline]
    pub fn read(&self) -> ash::vk::Result {
        ash::vk::Result::from_raw(self.buffer.cells[self.index].load(Ordering::Acquire))
    }

    /// Writes the cell.
    #[inline]
    pub fn write(&self, status: ash::vk::Result) {
        self.buffer.cells[self.index].store(status.as_raw(), Ordering::Release);
    }
}

impl Debug for FeedbackCell {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("FeedbackCell")
            .field("buffer", &self.buffer.id)
            .field("offset", &self.offset())
            .finish()
    }
}
