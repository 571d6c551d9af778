//! Version matcher implementations

pub mod dist;

pub use dist::DistVersionMatcher;
