//! Error types raised while building and running formatters.
//!
//! Two families exist, matching the two points at which things can go wrong:
//!
//! - [`MetadataError`] is raised while a formatter is being *built*. It is
//!   fatal to that one resolution only; the resolver never caches a failed
//!   build, so other types (and later retries) are unaffected.
//! - [`FormatError`] is raised while *decoding* input that does not have the
//!   shape the formatter expects. It is fatal to that one decode call.
//!
//! [`Error`] is what every encode/decode entry point returns.

use std::{fmt::Display, io};

/// Construction-time failure of a formatter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// The resolver has no registered formatter and the type does not know
    /// how to build one.
    #[error("no formatter available for type `{type_name}`")]
    NoFormatter { type_name: &'static str },

    /// A case provides no factory (cases with fields) or no singleton
    /// accessor (cases without fields).
    #[error("case `{case}` of `{union}` has no {expected}")]
    MissingConstructor {
        union: &'static str,
        case: &'static str,
        expected: &'static str,
    },

    #[error(
        "parameter `{parameter}` at position {position} of case `{case}` in \
         `{union}` matches no field"
    )]
    UnmatchedParameter {
        union: &'static str,
        case: &'static str,
        parameter: &'static str,
        position: usize,
    },

    #[error(
        "parameter `{parameter}` of case `{case}` in `{union}` matches more \
         than one field name"
    )]
    AmbiguousParameter {
        union: &'static str,
        case: &'static str,
        parameter: &'static str,
    },

    #[error(
        "parameter `{parameter}` of case `{case}` in `{union}` has type \
         `{found}` but the matched field has type `{expected}`"
    )]
    ParameterTypeMismatch {
        union: &'static str,
        case: &'static str,
        parameter: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// Case tags must run densely from zero in declaration order.
    #[error(
        "case `{case}` of `{union}` declares tag {tag}, expected tag \
         {expected}"
    )]
    NonDenseTag {
        union: &'static str,
        case: &'static str,
        tag: i32,
        expected: i32,
    },

    #[error("case `{case}` of `{union}` declares field `{field}` twice")]
    DuplicateField {
        union: &'static str,
        case: &'static str,
        field: &'static str,
    },

    #[error(
        "field `{field}` of case `{case}` in `{union}` is skipped but its type \
         has no default value"
    )]
    SkippedFieldWithoutDefault {
        union: &'static str,
        case: &'static str,
        field: &'static str,
    },

    /// A value reported a case tag that its own descriptor does not declare.
    #[error("value of `{union}` reports undeclared case tag {tag}")]
    UnknownCaseTag { union: &'static str, tag: i32 },

    /// A hand-written descriptor disagrees with the values it describes.
    #[error("case `{case}` of `{union}` is inconsistent: {reason}")]
    InconsistentCase {
        union: &'static str,
        case: &'static str,
        reason: &'static str,
    },

    /// A type-erased field value did not have the type its descriptor named.
    #[error("field value is not of the declared type `{expected}`")]
    FieldValueMismatch { expected: &'static str },
}

/// Decode-time failure caused by input of the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error(
        "invalid union data for `{union}`: expected a 2-element array, found \
         {found} elements"
    )]
    InvalidEnvelope { union: &'static str, found: u32 },

    #[error("nil encountered for value-kind sum type `{union}`")]
    NilForValueKind { union: &'static str },

    #[error("unknown tag {tag} encountered for value-kind sum type `{union}`")]
    UnknownTagForValueKind { union: &'static str, tag: i32 },

    /// A non-optional slot decoded to "no value" (nil or an unknown tag of a
    /// reference-kind sum type).
    #[error("no value decoded for non-optional `{type_name}`")]
    NoValue { type_name: &'static str },

    #[error(
        "field `{field}` of case `{case}` in `{union}` is absent from the \
         input and its type has no default value"
    )]
    MissingField {
        union: &'static str,
        case: &'static str,
        field: &'static str,
    },

    #[error("length {0} does not fit in a MessagePack header")]
    LengthOverflow(usize),

    #[error("{0} trailing bytes after the decoded value")]
    TrailingBytes(usize),

    /// The primitive reader could not decode the next token.
    #[error("malformed input: {0}")]
    Malformed(String),
}

impl FormatError {
    pub(crate) fn malformed(reason: impl Display) -> Self {
        Self::Malformed(reason.to_string())
    }
}

/// The error returned by every encode and decode operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns the metadata error, if this is one.
    #[must_use]
    pub const fn as_metadata(&self) -> Option<&MetadataError> {
        match self {
            Self::Metadata(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the format error, if this is one.
    #[must_use]
    pub const fn as_format(&self) -> Option<&FormatError> {
        match self {
            Self::Format(err) => Some(err),
            _ => None,
        }
    }
}
