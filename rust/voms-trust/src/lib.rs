//! Trust validation for VOMS attribute certificates.
//!
//! Given a record decoded by `voms-attributes`, a [`TrustValidator`] proves
//! that the AC was signed by the leaf certificate of its AA chain and that
//! the chain leads to a configured trust anchor, with every walked
//! certificate in date and unrevoked at the reference time.
//!
//! # Example
//!
//! ```no_run
//! use voms_trust::{TrustAnchors, TrustValidator, global};
//!
//! # fn example(ac: &[u8], chain: &[Vec<u8>], bundle: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! global().replace(TrustAnchors::from_pem(bundle)?);
//!
//! let record = voms_attributes::decode(ac, chain)?;
//! TrustValidator::with_global_anchors().validate(&record)?;
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
mod anchor;
mod config;
mod error;
mod revocation;
mod validate;

pub use algorithm::{AlgorithmError, SignatureAlgorithm};
pub use anchor::{AnchorStore, TrustAnchor, TrustAnchorProvider, TrustAnchors, fingerprint, global};
pub use config::ValidatorConfig;
pub use error::{ChainError, ValidationError};
pub use revocation::{RevocationSource, RevocationStatus, RevokedSerials};
pub use validate::TrustValidator;
