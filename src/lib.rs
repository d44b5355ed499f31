//! This library crate contains everything needed to distribute messages over a publish/subscribe bus.
//!
//! Submodules have been introduced to split responsibilities. The low-level [`libraries`] provide
//! scheduling, lifecycle and transport primitives, the [`domain`] holds the dispatch and listening logic
//! and the [`services`] wire both together into the executables.

#![allow(clippy::nonstandard_macro_braces)]

pub mod domain;
pub mod libraries;
pub mod services;
