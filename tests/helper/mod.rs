//! Shared test utilities

#![allow(dead_code)]

pub mod transport;

pub use transport::{FakeTransport, create_test_manager};
