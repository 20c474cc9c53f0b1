//! LTL
//!
//! LTL is a library and an executable to run black-box optimizers against
//! optimizees, evaluating each proposed batch sequentially or in parallel.
#![warn(missing_docs, unused)]

#[macro_use]
extern crate log;

/// Tools for binaries
pub mod bin_utils;
/// Runs optimizers to completion
pub mod runner;
