//! Manage side-by-side installs of a runtime interpreter
//!
//! - [`version`]: version lifecycle (list, resolve, install, remove) and active-version sources
//! - [`precedence`]: policy choosing between local, global and environment versions
//! - [`config`]: configuration loading
//! - [`logging`]: tracing setup for the binary

pub mod config;
pub mod logging;
pub mod precedence;
pub mod version;
