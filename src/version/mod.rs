//! Version lifecycle and resolution for installed runtime builds
//!
//! This module discovers published versions, tracks installed ones, resolves
//! user specifiers to concrete versions, installs and removes builds, and reads
//! the local/global/environment active-version sources.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│   Manager   │────▶│   Matcher   │
//! │ (index,bin) │     │  (caches)   │     │ (order,find)│
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                        │        │
//!                        ▼        ▼
//!                 ┌─────────────┐ ┌─────────────┐
//!                 │    Store    │ │   Runner    │
//!                 │ (dirs,marks)│ │  (spawn)    │
//!                 └─────────────┘ └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`manager`]: listing, resolution, install/fetch/remove, batch install
//! - [`active`]: local/global/environment active version sources
//! - [`args`]: per-version extra arguments
//! - [`runner`]: process spawning and version probing
//! - [`cache`]: in-memory version list cache with invalidation and TTL
//! - [`store`]: on-disk layout of installed versions
//! - [`matcher`]: version ordering and matching trait
//! - [`matchers`]: concrete matcher implementations
//! - [`transport`]: transport trait, index entries and URL layout
//! - [`transports`]: concrete transports (HTTP)
//! - [`error`]: error types
//! - [`semver`]: shared version parsing utilities

pub mod active;
pub mod args;
pub mod cache;
pub mod error;
pub mod manager;
pub mod matcher;
pub mod matchers;
pub mod runner;
pub mod semver;
pub mod store;
pub mod transport;
pub mod transports;
