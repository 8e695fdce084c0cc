//! Compiled matchers: wildcard name patterns, type patterns, and the staged
//! class/member pipelines built from parsed specifications

mod name_pattern;
mod pipeline;
mod type_pattern;

pub use name_pattern::*;
pub use pipeline::*;
pub use type_pattern::*;
