//! Class-entity data model shared by every phase
//!
//! Ingestion (out of scope here) produces [`Class`] entities and hands them
//! over in two [`ClassPool`]s; the linker resolves the symbolic references
//! between them; the configuration pipelines match against them.

mod access_flags;
mod attributes;
mod class;
mod class_pool;
mod descriptors;
mod names;

pub use access_flags::*;
pub use attributes::*;
pub use class::*;
pub use class_pool::*;
pub use descriptors::*;
pub use names::*;
