// Copyright (c) 2026 The venus developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Queue submission and synchronization objects of a virtualized Vulkan driver.
//!
//! The driver does not talk to a GPU itself. Every Vulkan command is encoded and forwarded to a
//! *renderer* running on the host, which owns the real Vulkan device. This crate implements the
//! part of the driver that coordinates work submission and synchronization across that
//! boundary:
//!
//! - The [`Renderer`](crate::renderer::Renderer) trait is the transport. Most host calls are
//!   issued asynchronously and never wait for a reply; the few that need a result are made
//!   synchronously and cost a full round trip.
//!
//! - A [`Device`](crate::device::Device) owns the renderer, the
//!   [`FeedbackPool`](crate::feedback::FeedbackPool) and the [`Queue`](crate::device::Queue)s.
//!
//! - [`Fence`](crate::sync::fence::Fence), [`Semaphore`](crate::sync::semaphore::Semaphore) and
//!   [`Event`](crate::sync::event::Event) mirror host objects. Fences and events may carry a
//!   feedback slot: a cell of shared memory written by the GPU timeline, which lets the guest
//!   poll their status without asking the host.
//!
//! - Fences and semaphores can import and export sync files, which lets them interoperate with
//!   the windowing system and other processes.

pub use ash::vk::Handle;
use std::{
    borrow::Cow,
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    ops::Deref,
    sync::Arc,
};

pub mod command_buffer;
pub mod device;
pub mod feedback;
pub mod memory;
pub mod options;
pub mod renderer;
pub mod sync;

/// Gives access to the internal identifier of an object.
pub unsafe trait VulkanObject {
    /// The type of the object.
    type Handle: ash::vk::Handle;

    /// Returns the raw Vulkan handle of the object.
    fn handle(&self) -> Self::Handle;
}

unsafe impl<T, U> VulkanObject for T
where
    T: SafeDeref<Target = U>,
    U: VulkanObject + ?Sized,
{
    type Handle = U::Handle;

    #[inline]
    fn handle(&self) -> Self::Handle {
        (**self).handle()
    }
}

/// Alternative to the `Deref` trait. Contrary to `Deref`, must always return the same object.
pub unsafe trait SafeDeref: Deref {}
unsafe impl<T: ?Sized> SafeDeref for &T {}
unsafe impl<T: ?Sized> SafeDeref for Arc<T> {}
unsafe impl<T: ?Sized> SafeDeref for Box<T> {}

/// An enumeration of runtime errors that can be returned by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VulkanError {
    OutOfHostMemory,
    OutOfDeviceMemory,
    InitializationFailed,
    DeviceLost,
    TooManyObjects,
    InvalidExternalHandle,
    Unknown,
    Unnamed(ash::vk::Result),
}

impl From<ash::vk::Result> for VulkanError {
    fn from(val: ash::vk::Result) -> VulkanError {
        match val {
            ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY => Self::OutOfHostMemory,
            ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => Self::OutOfDeviceMemory,
            ash::vk::Result::ERROR_INITIALIZATION_FAILED => Self::InitializationFailed,
            ash::vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            ash::vk::Result::ERROR_TOO_MANY_OBJECTS => Self::TooManyObjects,
            ash::vk::Result::ERROR_INVALID_EXTERNAL_HANDLE => Self::InvalidExternalHandle,
            ash::vk::Result::ERROR_UNKNOWN => Self::Unknown,
            x => Self::Unnamed(x),
        }
    }
}

impl From<VulkanError> for ash::vk::Result {
    fn from(val: VulkanError) -> ash::vk::Result {
        match val {
            VulkanError::OutOfHostMemory => ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            VulkanError::OutOfDeviceMemory => ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            VulkanError::InitializationFailed => ash::vk::Result::ERROR_INITIALIZATION_FAILED,
            VulkanError::DeviceLost => ash::vk::Result::ERROR_DEVICE_LOST,
            VulkanError::TooManyObjects => ash::vk::Result::ERROR_TOO_MANY_OBJECTS,
            VulkanError::InvalidExternalHandle => ash::vk::Result::ERROR_INVALID_EXTERNAL_HANDLE,
            VulkanError::Unknown => ash::vk::Result::ERROR_UNKNOWN,
            VulkanError::Unnamed(x) => x,
        }
    }
}

impl Error for VulkanError {}

impl Display for VulkanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            VulkanError::OutOfHostMemory => write!(f, "A host memory allocation has failed."),
            VulkanError::OutOfDeviceMemory => write!(f, "A device memory allocation has failed."),
            VulkanError::InitializationFailed => write!(
                f,
                "Initialization of an object could not be completed for implementation-specific \
                reasons.",
            ),
            VulkanError::DeviceLost => write!(f, "The logical or physical device has been lost."),
            VulkanError::TooManyObjects => write!(
                f,
                "Too many objects of the type have already been created.",
            ),
            VulkanError::InvalidExternalHandle => write!(
                f,
                "An external handle is not a valid handle of the specified type.",
            ),
            VulkanError::Unknown => write!(
                f,
                "An unknown error has occurred; either the application has provided invalid \
                input, or an implementation failure has occurred.",
            ),
            VulkanError::Unnamed(result) => {
                write!(f, "Unnamed error, VkResult value {}", result.as_raw())
            }
        }
    }
}

/// A wrapper for error types of functions that can return validation errors.
#[derive(Clone)]
pub enum Validated<E> {
    /// A non-validation error occurred.
    Error(E),

    /// A validation error occurred.
    ValidationError(Box<ValidationError>),
}

impl<E> Validated<E> {
    /// Maps the inner `Error` value using the provided function, or does nothing if the value is
    /// `ValidationError`.
    #[inline]
    pub fn map<F>(self, f: impl FnOnce(E) -> F) -> Validated<F> {
        match self {
            Self::Error(err) => Validated::Error(f(err)),
            Self::ValidationError(err) => Validated::ValidationError(err),
        }
    }

    /// Returns the inner `Error` value, or panics if it contains `ValidationError`.
    #[track_caller]
    #[inline]
    pub fn unwrap(self) -> E {
        match self {
            Self::Error(err) => err,
            Self::ValidationError(err) => {
                panic!(
                    "called `Validated::unwrap` on a `ValidationError` value: {:?}",
                    err
                )
            }
        }
    }
}

impl<E> Error for Validated<E>
where
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Error(err) => Some(err),
            Self::ValidationError(err) => Some(err),
        }
    }
}

impl<E> Display for Validated<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Error(_) => write!(f, "a non-validation error occurred"),
            Self::ValidationError(_) => write!(f, "a validation error occurred"),
        }
    }
}

impl<E> std::fmt::Debug for Validated<E>
where
    E: std::fmt::Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Error(err) => write!(f, "a non-validation error occurred: {}", err),
            Self::ValidationError(err) => {
                write!(f, "a validation error occurred\n\nCaused by:\n    {:?}", err)
            }
        }
    }
}

impl<E> From<Box<ValidationError>> for Validated<E> {
    #[inline]
    fn from(err: Box<ValidationError>) -> Self {
        Self::ValidationError(err)
    }
}

impl From<VulkanError> for Validated<VulkanError> {
    #[inline]
    fn from(err: VulkanError) -> Self {
        Self::Error(err)
    }
}

/// The arguments or other context of a call to a driver function were not valid.
#[derive(Clone, Default)]
pub struct ValidationError {
    /// The context in which the problem exists (e.g. a specific parameter).
    pub context: Cow<'static, str>,

    /// A description of the problem.
    pub problem: Cow<'static, str>,

    /// Valid usage IDs (VUIDs) in the Vulkan specification that relate to the error.
    pub vuids: &'static [&'static str],
}

impl ValidationError {
    pub(crate) fn add_context(
        mut self: Box<Self>,
        context: impl Into<Cow<'static, str>>,
    ) -> Box<Self> {
        if self.context.is_empty() {
            self.context = context.into();
        } else {
            self.context = format!("{}.{}", context.into(), self.context).into();
        }

        self
    }
}

impl std::fmt::Debug for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if self.context.is_empty() {
            write!(f, "{}", self.problem)?;
        } else {
            write!(f, "{}: {}", self.context, self.problem)?;
        }

        if !self.vuids.is_empty() {
            write!(f, "\n\nVulkan VUIDs:")?;

            for vuid in self.vuids {
                write!(f, "\n    {}", vuid)?;
            }
        }

        Ok(())
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if self.context.is_empty() {
            write!(f, "{}", self.problem)
        } else {
            write!(f, "{}: {}", self.context, self.problem)
        }
    }
}

impl Error for ValidationError {}

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside the crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`. The effect is
/// similar to the standard Rust `#[non_exhaustive]` attribute, except that it does not prevent
/// update syntax from being used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)] // add traits as needed
pub struct NonExhaustive(pub(crate) ());
