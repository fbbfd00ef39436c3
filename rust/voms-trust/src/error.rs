//! Validation errors.
//!
//! Both variants of [`ValidationError`] map onto the shared
//! [`ErrorKind`] classification so callers can treat decode and trust
//! failures uniformly.

use voms_attributes::ErrorKind;

/// Reasons an AA certificate chain is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// No AA certificates accompany the attribute certificate.
    #[error("AA certificate chain is empty")]
    EmptyChain,

    /// The chain does not terminate at any configured trust anchor.
    #[error("Unknown trust anchor")]
    UnknownAnchor,

    /// The AC names an issuer other than the leaf AA certificate's subject.
    #[error("AC issuer {ac_issuer} does not match AA certificate subject {aa_subject}")]
    IssuerMismatch {
        /// Issuer named in the attribute certificate
        ac_issuer: String,
        /// Subject of the leaf AA certificate
        aa_subject: String,
    },

    /// A certificate's issuer is not the subject of the next certificate.
    #[error("Certificate[{index}] is not issued by the next certificate in the chain")]
    BrokenLink {
        /// Position of the certificate in the chain
        index: usize,
    },

    /// A certificate's signature does not verify under its issuer's key.
    #[error("Certificate[{index}] has an invalid signature")]
    InvalidSignature {
        /// Position of the certificate in the chain
        index: usize,
    },

    /// A certificate's validity window ended before the reference time.
    #[error("Certificate[{index}] expired")]
    Expired {
        /// Position of the certificate in the chain
        index: usize,
    },

    /// A certificate's validity window starts after the reference time.
    #[error("Certificate[{index}] not yet valid")]
    NotYetValid {
        /// Position of the certificate in the chain
        index: usize,
    },

    /// The revocation source reported a certificate as revoked.
    #[error("Certificate[{index}] is revoked")]
    Revoked {
        /// Position of the certificate in the chain
        index: usize,
    },

    /// A certificate that issues another one lacks `basicConstraints`
    /// with `cA` set.
    #[error("Certificate[{index}] is not a certificate authority")]
    NotACertificateAuthority {
        /// Position of the certificate in the walked path
        index: usize,
    },

    /// A key or signature algorithm the validator cannot verify.
    #[error("Unsupported key type: {0}")]
    UnsupportedKey(String),

    /// More certificates than the configured maximum need to be walked.
    #[error("Chain of {length} certificates exceeds the maximum of {max}")]
    TooLong {
        /// Certificates that would be walked
        length: usize,
        /// Configured maximum
        max: usize,
    },
}

/// Errors that can occur while validating an attribute certificate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The AC signature does not verify under the leaf AA certificate's key.
    #[error("Invalid AC signature: {0}")]
    SignatureVerification(String),

    /// The AA chain is broken, expired, or not anchored.
    #[error("Chain validation failed: {0}")]
    ChainValidation(#[from] ChainError),
}

impl ValidationError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::SignatureVerification(_) => ErrorKind::SignatureVerification,
            ValidationError::ChainValidation(_) => ErrorKind::ChainValidation,
        }
    }

    /// The chain failure reason, if this is a chain validation error.
    pub fn chain_error(&self) -> Option<&ChainError> {
        match self {
            ValidationError::ChainValidation(reason) => Some(reason),
            ValidationError::SignatureVerification(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_classifies_validation_errors() {
        assert_eq!(
            ValidationError::SignatureVerification("bad".into()).kind(),
            ErrorKind::SignatureVerification
        );
        assert_eq!(
            ValidationError::from(ChainError::UnknownAnchor).kind(),
            ErrorKind::ChainValidation
        );
    }

    #[test]
    fn it_names_the_unknown_anchor_reason() {
        let err = ValidationError::from(ChainError::UnknownAnchor);
        assert_eq!(err.chain_error(), Some(&ChainError::UnknownAnchor));
        assert_eq!(
            err.to_string(),
            "Chain validation failed: Unknown trust anchor"
        );
    }
}
