//! Reasoning context assembly under a byte budget.

pub mod builder;

pub use builder::{build, build_with_prior};
