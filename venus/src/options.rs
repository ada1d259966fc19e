// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Driver policies that can be toggled at device creation.
//!
//! Both option sets can be parsed from a comma-separated list of names, which is how they are
//! read from the `VN_DEBUG` and `VN_PERF` environment variables.

use std::env;

/// Diagnostics switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugOptions {
    /// Log every failed result before it is returned to the caller.
    pub result: bool,

    /// Log when presentation has to fall back to a full queue drain.
    pub wsi: bool,

    /// Log every entry point as it is called.
    pub trace: bool,
}

impl DebugOptions {
    /// Reads the options from the `VN_DEBUG` environment variable.
    pub fn from_env() -> Self {
        env::var("VN_DEBUG")
            .map(|val| Self::parse(&val))
            .unwrap_or_default()
    }

    /// Parses a comma-separated option list. Unknown names are ignored.
    pub fn parse(list: &str) -> Self {
        let mut options = Self::default();

        for name in tokens(list) {
            match name {
                "result" => options.result = true,
                "wsi" => options.wsi = true,
                "trace" => options.trace = true,
                _ => log::debug!("ignoring unknown debug option `{}`", name),
            }
        }

        options
    }
}

/// Performance switches. All of them trade speed for simpler behavior, which is useful when
/// narrowing down synchronization bugs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerfOptions {
    /// Make every queue submission a synchronous round trip.
    pub no_async_queue_submit: bool,

    /// Do not attach feedback slots to fences.
    pub no_fence_feedback: bool,

    /// Do not attach feedback slots to events.
    pub no_event_feedback: bool,
}

impl PerfOptions {
    /// Reads the options from the `VN_PERF` environment variable.
    pub fn from_env() -> Self {
        env::var("VN_PERF")
            .map(|val| Self::parse(&val))
            .unwrap_or_default()
    }

    /// Parses a comma-separated option list. Unknown names are ignored.
    pub fn parse(list: &str) -> Self {
        let mut options = Self::default();

        for name in tokens(list) {
            match name {
                "no_async_queue_submit" => options.no_async_queue_submit = true,
                "no_fence_feedback" => options.no_fence_feedback = true,
                "no_event_feedback" => options.no_event_feedback = true,
                _ => log::debug!("ignoring unknown perf option `{}`", name),
            }
        }

        options
    }
}

fn tokens(list: &str) -> impl Iterator<Item = &str> {
    list.split([',', ' ', ':'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
