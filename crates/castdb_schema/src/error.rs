//! Error types for schema derivation, solidification, and encoding.

use thiserror::Error;

use crate::model::ModelKind;

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while deriving, solidifying, or encoding model schemas.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A symbol was declared twice in the same graph.
    #[error("duplicate symbol: {symbol}")]
    DuplicateSymbol {
        /// The symbol that was already declared.
        symbol: String,
    },

    /// A symbol is not a plain identifier.
    #[error("invalid symbol {symbol:?}: expected an identifier")]
    InvalidSymbol {
        /// The offending symbol text.
        symbol: String,
    },

    /// A referenced symbol has no declaration in the graph.
    #[error("unknown symbol: {symbol}")]
    UnknownSymbol {
        /// The symbol that could not be found.
        symbol: String,
    },

    /// The same symbol was requested under two different model kinds.
    #[error("model kind collision on {symbol}: requested {requested}, declared {declared}")]
    KindCollision {
        /// The symbol whose kind is disputed.
        symbol: String,
        /// The kind the caller asked for.
        requested: ModelKind,
        /// The kind the symbol actually carries.
        declared: ModelKind,
    },

    /// A property value matched no element shape.
    #[error("invalid element at {model}.{property}")]
    InvalidElement {
        /// The model being derived.
        model: String,
        /// The property whose value could not be classified.
        property: String,
    },

    /// A base reference matched neither template shape.
    #[error("invalid template on {model}: {reason}")]
    InvalidTemplate {
        /// The model carrying the base reference.
        model: String,
        /// What made the reference unusable.
        reason: String,
    },

    /// A template inheritance chain loops back on itself.
    #[error("template cycle through {symbol}")]
    TemplateCycle {
        /// A symbol on the cycle.
        symbol: String,
    },

    /// A generic parameter has no binding in scope.
    #[error("unbound parameter {parameter} while solidifying {model}")]
    UnboundParameter {
        /// The model being solidified.
        model: String,
        /// The parameter nothing binds.
        parameter: String,
    },

    /// Solidification referenced a template that was never derived.
    #[error("missing template {template} while solidifying {model}")]
    MissingTemplate {
        /// The model being solidified.
        model: String,
        /// The template that is absent.
        template: String,
    },

    /// A stale encoding schema was paired with a different model.
    #[error("encoding model mismatch: schema is for {schema}, model is {model}")]
    ModelMismatch {
        /// The model the stale schema describes.
        schema: String,
        /// The model that was actually supplied.
        model: String,
    },

    /// Serialized schema data is malformed.
    #[error("invalid schema format: {message}")]
    InvalidFormat {
        /// Details about the malformation.
        message: String,
    },
}

impl SchemaError {
    /// Creates an [`SchemaError::InvalidTemplate`] error.
    pub fn invalid_template(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            model: model.into(),
            reason: reason.into(),
        }
    }

    /// Creates an [`SchemaError::InvalidFormat`] error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an [`SchemaError::UnknownSymbol`] error.
    pub fn unknown_symbol(symbol: impl Into<String>) -> Self {
        Self::UnknownSymbol {
            symbol: symbol.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_symbol() {
        let err = SchemaError::unknown_symbol("Person");
        assert_eq!(err.to_string(), "unknown symbol: Person");
    }

    #[test]
    fn kind_collision_display_names_both_kinds() {
        let err = SchemaError::KindCollision {
            symbol: "Named".to_string(),
            requested: ModelKind::Data,
            declared: ModelKind::ConcreteTemplate,
        };
        let text = err.to_string();
        assert!(text.contains("Named"));
        assert!(text.contains("data"));
        assert!(text.contains("concrete template"));
    }

    #[test]
    fn invalid_format_keeps_the_message() {
        let err = SchemaError::invalid_format("truncated slot table");
        assert_eq!(
            err.to_string(),
            "invalid schema format: truncated slot table"
        );
    }
}
