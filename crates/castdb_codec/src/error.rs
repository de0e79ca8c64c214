//! Error types for row encoding and decoding.

use castdb_schema::ElementKind;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding records into rows or decoding them back.
///
/// All of these are content errors: they describe a record or a row that
/// cannot be processed, never an I/O condition.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The encoding catalog has no layout for the record's model.
    #[error("no encoding schema for model {model}")]
    UnknownModel {
        /// The model the record claims.
        model: String,
    },

    /// A slot in the layout has no value on the record.
    ///
    /// The positional row format admits no holes, so every storable slot
    /// must be supplied.
    #[error("record of model {model} is missing property {property}")]
    MissingProperty {
        /// The record's model.
        model: String,
        /// The slot key without a value.
        property: String,
    },

    /// A supplied value does not match the slot's declared kind.
    #[error("type mismatch at {model}.{property}: slot holds {expected}, value is {found}")]
    TypeMismatch {
        /// The record's model.
        model: String,
        /// The slot key.
        property: String,
        /// The kind the layout declares.
        expected: ElementKind,
        /// A short name for the supplied value's shape.
        found: &'static str,
    },

    /// A layout slot carries a kind that cannot occupy a row field.
    #[error("slot {property} of model {model} has unstorable kind {kind}")]
    UnstorableSlot {
        /// The layout's model.
        model: String,
        /// The slot key.
        property: String,
        /// The offending kind.
        kind: ElementKind,
    },

    /// An encoded row would exceed what its length prefix can express.
    #[error("row for model {model} is too large: {size} bytes")]
    RowTooLarge {
        /// The record's model.
        model: String,
        /// The oversized byte count.
        size: usize,
    },

    /// Stored row bytes are malformed.
    #[error("corrupt row: {message}")]
    CorruptRow {
        /// What the scan or decode tripped over.
        message: String,
    },
}

impl CodecError {
    /// Creates a [`CodecError::UnknownModel`] error.
    pub fn unknown_model(model: impl Into<String>) -> Self {
        Self::UnknownModel {
            model: model.into(),
        }
    }

    /// Creates a [`CodecError::MissingProperty`] error.
    pub fn missing_property(model: impl Into<String>, property: impl Into<String>) -> Self {
        Self::MissingProperty {
            model: model.into(),
            property: property.into(),
        }
    }

    /// Creates a [`CodecError::CorruptRow`] error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptRow {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_the_model_and_property() {
        let err = CodecError::missing_property("Person", "age");
        assert_eq!(
            err.to_string(),
            "record of model Person is missing property age"
        );
    }

    #[test]
    fn type_mismatch_display_names_both_sides() {
        let err = CodecError::TypeMismatch {
            model: "Person".to_string(),
            property: "age".to_string(),
            expected: ElementKind::NumberPrimitive,
            found: "text",
        };
        let text = err.to_string();
        assert!(text.contains("number"));
        assert!(text.contains("text"));
    }
}
