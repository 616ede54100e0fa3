#![forbid(unsafe_code)]

//! Music submission tooling: classify YouTube Music links, expand channels
//! into albums and songs, hand new items to a MeTube download queue and keep
//! a catalog of what was already handed over.

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod queue;
pub mod submission;
pub mod url_kind;
pub mod warning;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
