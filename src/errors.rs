use crate::config::ParseError;
use crate::link::LinkAborted;
use std::fmt;

/// Any failure the front end can produce
#[derive(Debug)]
pub enum Error {
    /// Configuration text that doesn't parse
    Parse(ParseError),
    /// Parsed fine, but the options contradict each other
    Configuration(String),
    /// Unresolved references gated by the warning policy
    Link(LinkAborted),
    Io(std::io::Error),
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<LinkAborted> for Error {
    fn from(err: LinkAborted) -> Error {
        Error::Link(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => write!(f, "{}", err),
            Error::Configuration(message) => write!(f, "{}", message),
            Error::Link(err) => write!(f, "{}", err),
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}
