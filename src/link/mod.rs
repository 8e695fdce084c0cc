//! Cross-pool linking: reference resolution, diagnostics, and the
//! configuration consistency checkers

mod checkers;
mod diagnostics;
mod linker;

pub use checkers::*;
pub use diagnostics::*;
pub use linker::*;
