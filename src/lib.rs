//! Configuration front end for a JVM class shrinker
//!
//! Compiles a keep-rule configuration language into reusable matcher
//! pipelines, and links program and library class pools so the pipelines and
//! consistency checkers can run over a resolved class graph.

pub mod app_view;
pub mod config;
pub mod errors;
pub mod jvm;
pub mod link;
pub mod matcher;
