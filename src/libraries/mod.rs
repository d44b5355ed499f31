//! Shared modules used by every service
//!
//! This module contains commonly used methods and data structures which are being used in individual services.
//! Each sub-module focuses on a specific area like `scheduling` or `transport`.
//! Small functions that don't belong anywhere else can be found in the `helpers` module.

use std::error::Error;

pub mod helpers;
pub mod lifecycle;
pub mod scheduling;
pub mod transport;

#[cfg(test)]
pub mod testing;

/// Type erased error which is thread safe
pub type BoxedError = Box<dyn Error + Send + Sync + 'static>;

/// Result without a value which carries a [`BoxedError`]
pub type EmptyResult = Result<(), BoxedError>;
