//! Cucumber step definitions for behavior tests.

pub mod bootstrap;
pub mod pipeline;
