//! Error types for location-expression parsing and evaluation.

use thiserror::Error;

/// Errors raised while parsing or evaluating a location expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The expression text is not well formed.
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A name test used a prefix that is not bound in the namespace table.
    #[error("unknown namespace prefix '{prefix}'")]
    UnknownPrefix { prefix: String },

    /// The expression calls a function the evaluator does not provide.
    #[error("unknown function '{name}()'")]
    UnknownFunction { name: String },

    /// A function was called with the wrong number of arguments.
    #[error("function '{name}()' expects {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    /// An operand had the wrong type, e.g. a path step applied to a string.
    #[error("type error: {message}")]
    Type { message: String },
}

impl QueryError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        QueryError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        QueryError::Type {
            message: message.into(),
        }
    }
}

/// Result alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
