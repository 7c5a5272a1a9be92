//! Hartrace - HTTP activity recorder with HAR export
//!
//! Observes the request/response traffic of a client application, groups it
//! per page, correlates each response or error with the request that caused
//! it, and exports the session as an HTTP Archive (HAR 1.2) document.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod har;
pub mod network;
pub mod proxy;
pub mod recording;
pub mod url;

pub use error::{HartraceError, Result};
