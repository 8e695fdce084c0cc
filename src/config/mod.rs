//! Configuration language: tokenization, parsing, and the parsed rule model

mod errors;
mod parser;
mod specification;
mod wildcard;
mod word_source;

pub use errors::*;
pub use parser::*;
pub use specification::*;
pub use wildcard::*;
pub use word_source::*;
