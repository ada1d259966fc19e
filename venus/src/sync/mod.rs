// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Synchronization primitives.
//!
//! - [`Fence`](fence::Fence)s signal the host when a queue submission has completed.
//! - [`Semaphore`](semaphore::Semaphore)s order queue operations against each other, and in their
//!   timeline form also against the host.
//! - [`Event`](event::Event)s are flags that both the host and command buffers can set.
//!
//! Fences and semaphores have a *payload*. Normally that payload lives in the renderer and the
//! object is said to be device-only. Importing a sync file temporarily replaces it with the
//! imported file, until the payload is consumed by a wait, a reset or an export.

pub mod event;
pub mod fence;
mod payload;
pub mod semaphore;
pub(crate) mod sync_file;
mod wait;

/// The outcome of a wait operation that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WaitStatus {
    /// The condition waited for was met.
    Success,

    /// The timeout elapsed before the condition was met.
    Timeout,
}
