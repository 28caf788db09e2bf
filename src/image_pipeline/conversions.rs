//! Pipeline conversions module
//!
//! This module contains orchestration logic for turning caller arrays into DM3 files.

mod array_to_dm3;

#[cfg(test)]
mod tests;

pub use array_to_dm3::{Dm3Pipeline, write_container, write_container_with};
