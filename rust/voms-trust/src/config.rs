//! Validator configuration.

use serde::{Deserialize, Serialize};

/// Tunables for [`crate::TrustValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Most certificates walked from the AA leaf up to the anchor.
    pub max_chain_depth: usize,
    /// Require the AC issuer to equal the leaf AA certificate's subject.
    pub require_issuer_match: bool,
    /// Accept a chain whose last certificate is issued by an anchor that
    /// is not itself part of the chain.
    pub allow_unlisted_root: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 10,
            require_issuer_match: true,
            allow_unlisted_root: true,
        }
    }
}
