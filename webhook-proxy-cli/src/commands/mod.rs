//! CLI command implementations.
//!
//! - [`serve`] - Run the proxy until interrupted
//! - [`init`] - Write a default configuration file

pub mod init;
pub mod serve;
