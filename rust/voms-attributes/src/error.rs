//! Error types for attribute certificate decoding.
//!
//! Every failure is classified by an [`ErrorKind`], which is shared with the
//! trust validation crate so that callers can branch on one closed set of
//! failure kinds regardless of which stage rejected the input.

use der::asn1::ObjectIdentifier;
use serde::Serialize;

/// The kinds of failure an attribute certificate can be rejected with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed or incomplete structure.
    Decode,
    /// A critical extension the decoder does not understand.
    UnsupportedExtension,
    /// A hierarchical attribute name that violates FQAN syntax.
    MalformedFqan,
    /// The AC signature does not match the claimed signer.
    SignatureVerification,
    /// Broken chain, expired certificate, or no matching trust anchor.
    ChainValidation,
}

/// Syntax faults found while parsing an FQAN.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FqanError {
    /// The name does not start with `/`.
    #[error("FQAN '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    /// Two separators with nothing in between, or a trailing separator.
    #[error("FQAN '{fqan}' has an empty segment at position {position}")]
    EmptySegment {
        /// The offending FQAN
        fqan: String,
        /// Zero-based segment index
        position: usize,
    },

    /// A group segment contains an unescaped `=`.
    #[error("FQAN '{fqan}' has an unescaped '=' in group segment '{segment}'")]
    UnescapedSeparator {
        /// The offending FQAN
        fqan: String,
        /// The offending segment
        segment: String,
    },

    /// Only qualifiers, no group.
    #[error("FQAN '{0}' names no group")]
    NoGroup(String),

    /// A `Role=` qualifier that is not the final segment.
    #[error("FQAN '{0}' has a Role qualifier that is not the final segment")]
    MisplacedRole(String),

    /// A `Capability=` qualifier with a value other than `NULL`.
    #[error("FQAN '{0}' carries a capability, which is no longer supported")]
    UnsupportedCapability(String),

    /// A qualifier with an empty value, e.g. `Role=`.
    #[error("FQAN '{0}' has an empty qualifier value")]
    EmptyQualifier(String),

    /// A backslash escape at the end of input or before an unexpected character.
    #[error("FQAN '{0}' has an invalid escape sequence")]
    InvalidEscape(String),

    /// Control characters or whitespace inside a segment.
    #[error("FQAN '{0}' contains a disallowed character")]
    DisallowedCharacter(String),
}

/// Errors that can occur while decoding an attribute certificate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The byte structure could not be parsed.
    #[error("Malformed attribute certificate: {0}")]
    Malformed(String),

    /// A field the record cannot exist without is absent.
    #[error("Missing mandatory field: {0}")]
    MissingField(&'static str),

    /// `notBefore` is later than `notAfter`.
    #[error("Validity window is inverted: notBefore is after notAfter")]
    InvertedValidity,

    /// A critical extension the decoder does not understand.
    #[error("Unsupported critical extension {0}")]
    UnsupportedExtension(ObjectIdentifier),

    /// An FQAN entry failed to parse.
    #[error("Malformed FQAN: {0}")]
    MalformedFqan(#[from] FqanError),
}

impl DecodeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Malformed(_)
            | DecodeError::MissingField(_)
            | DecodeError::InvertedValidity => ErrorKind::Decode,
            DecodeError::UnsupportedExtension(_) => ErrorKind::UnsupportedExtension,
            DecodeError::MalformedFqan(_) => ErrorKind::MalformedFqan,
        }
    }

    pub(crate) fn malformed(context: &str, err: impl std::fmt::Display) -> Self {
        DecodeError::Malformed(format!("{context}: {err}"))
    }
}

impl From<der::Error> for DecodeError {
    fn from(err: der::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_classifies_decode_errors() {
        assert_eq!(DecodeError::InvertedValidity.kind(), ErrorKind::Decode);
        assert_eq!(DecodeError::MissingField("vo").kind(), ErrorKind::Decode);
        assert_eq!(
            DecodeError::UnsupportedExtension(ObjectIdentifier::new_unwrap("1.2.3.4")).kind(),
            ErrorKind::UnsupportedExtension
        );
        assert_eq!(
            DecodeError::from(FqanError::MisplacedRole("/vo/Role=a/b".into())).kind(),
            ErrorKind::MalformedFqan
        );
    }

    #[test]
    fn it_serializes_error_kinds_in_screaming_case() {
        let json = serde_json::to_string(&ErrorKind::ChainValidation).unwrap();
        assert_eq!(json, "\"CHAIN_VALIDATION\"");
    }

    #[test]
    fn it_mentions_the_offending_oid() {
        let err = DecodeError::UnsupportedExtension(ObjectIdentifier::new_unwrap("1.2.3.4"));
        assert!(err.to_string().contains("1.2.3.4"));
    }
}
