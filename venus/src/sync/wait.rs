// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Client-side waiting on several objects at once.
//!
//! The renderer is never asked to block. Instead the objects are polled until the condition
//! holds or the deadline passes, relaxing the thread between rounds.

use super::WaitStatus;
use crate::VulkanError;
use smallvec::SmallVec;
use std::{
    thread,
    time::{Duration, Instant},
};

/// The point in time at which a wait gives up.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    /// `None`, or a timeout too large to represent, never expires.
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Deadline(timeout.and_then(|timeout| Instant::now().checked_add(timeout)))
    }

    #[inline]
    pub(crate) fn is_expired(&self) -> bool {
        self.0.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Backoff between polling rounds.
#[derive(Debug)]
pub(crate) struct Relax {
    iter: u32,
    reason: &'static str,
}

impl Relax {
    const BUSY_WAIT_ORDER: u32 = 4;
    const WARN_ORDER: u32 = 12;
    const BASE_SLEEP_US: u64 = 10;

    pub(crate) fn new(reason: &'static str) -> Self {
        Relax { iter: 0, reason }
    }

    /// Yields for the first rounds, then sleeps for a duration that doubles every time the
    /// number of rounds does.
    pub(crate) fn relax(&mut self) {
        self.iter = self.iter.saturating_add(1);

        if self.iter < 1 << Self::BUSY_WAIT_ORDER {
            thread::yield_now();
            return;
        }

        if self.iter % (1 << Self::WARN_ORDER) == 0 {
            log::warn!("stuck in {} wait with iter at {}", self.reason, self.iter);
        }

        let last_bit = u32::BITS - self.iter.leading_zeros();
        let shift = last_bit - Self::BUSY_WAIT_ORDER - 1;
        thread::sleep(Duration::from_micros(Self::BASE_SLEEP_US << shift));
    }
}

/// Polls `objects` until any of them is ready, or until all of them are if `wait_all` is true.
///
/// `is_ready` is called once per pending object per round. An error stops the wait.
pub(crate) fn wait<T: Clone>(
    objects: &[T],
    wait_all: bool,
    timeout: Option<Duration>,
    reason: &'static str,
    mut is_ready: impl FnMut(&T) -> Result<bool, VulkanError>,
) -> Result<WaitStatus, VulkanError> {
    if objects.is_empty() {
        return Ok(WaitStatus::Success);
    }

    let deadline = Deadline::new(timeout);
    let mut relax = Relax::new(reason);

    if wait_all && objects.len() > 1 {
        let mut pending: SmallVec<[T; 8]> = SmallVec::new();
        pending
            .try_reserve(objects.len())
            .map_err(|_| VulkanError::OutOfHostMemory)?;
        pending.extend(objects.iter().cloned());

        loop {
            remove_ready(&mut pending, &mut is_ready)?;

            if pending.is_empty() {
                return Ok(WaitStatus::Success);
            }

            if deadline.is_expired() {
                return Ok(WaitStatus::Timeout);
            }

            relax.relax();
        }
    } else {
        loop {
            for object in objects {
                if is_ready(object)? {
                    return Ok(WaitStatus::Success);
                }
            }

            if deadline.is_expired() {
                return Ok(WaitStatus::Timeout);
            }

            relax.relax();
        }
    }
}

// Drops the ready objects, keeping the order of the pending ones.
fn remove_ready<T>(
    pending: &mut SmallVec<[T; 8]>,
    is_ready: &mut impl FnMut(&T) -> Result<bool, VulkanError>,
) -> Result<(), VulkanError> {
    let mut result = Ok(());

    pending.retain(|object| {
        if result.is_err() {
            return true;
        }

        match is_ready(&*object) {
            Ok(ready) => !ready,
            Err(err) => {
                result = Err(err);
                true
            }
        }
    });

    result
}
