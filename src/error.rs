use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Source position of a token, used to attribute errors to a template location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub template: Arc<str>,
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(template: Arc<str>, line: usize, col: usize) -> Self {
        Self {
            template,
            line,
            col,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.template, self.line, self.col)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Syntax Error [{template} | line {line} col {col}]: {message}")]
    Syntax {
        template: String,
        line: usize,
        col: usize,
        message: String,
    },
    #[error("Structural Error [{template}]: {message}")]
    Structural { template: String, message: String },
    #[error("Execution Error [{template} | line {line} col {col}]: {message}")]
    Execution {
        template: String,
        line: usize,
        col: usize,
        message: String,
    },
    #[error("Template Not Found: {0}")]
    TemplateNotFound(String),
    #[error("Output Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn syntax(pos: &Position, message: impl Into<String>) -> Self {
        Error::Syntax {
            template: pos.template.to_string(),
            line: pos.line,
            col: pos.col,
            message: message.into(),
        }
    }

    pub(crate) fn execution(pos: &Position, message: impl Into<String>) -> Self {
        Error::Execution {
            template: pos.template.to_string(),
            line: pos.line,
            col: pos.col,
            message: message.into(),
        }
    }

    pub(crate) fn structural(template: &str, message: impl Into<String>) -> Self {
        Error::Structural {
            template: template.to_string(),
            message: message.into(),
        }
    }
}

/// Error returned by a filter function. The caller attributes it to a position.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct FilterError(pub String);

impl FilterError {
    pub fn new(message: impl Into<String>) -> Self {
        FilterError(message.into())
    }
}

impl serde::ser::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::Serialization(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
