use std::fmt;
use std::io;

/// Failure while reading or parsing a configuration
///
/// Lexical and syntax errors abort the configuration read for the source
/// chain that produced them. The location is the word source's
/// human-readable position, including the include chain.
#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub location: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, location: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    pub fn without_location(message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            location: None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({})", self.message, location),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> ParseError {
        ParseError::without_location(format!("I/O error: {}", err))
    }
}
