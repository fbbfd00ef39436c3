#![warn(missing_docs)]

//! Decoding of VOMS attribute certificates.
//!
//! A VOMS Attribute Authority (AA) vouches for a user's membership in a
//! virtual organisation (VO) by signing an RFC 5755 attribute certificate
//! (AC). This crate turns such a certificate into an immutable
//! [`VomsAttribute`] record: VO name, AA endpoint, holder and issuer names,
//! validity window, the ordered list of [`Fqan`]s and any generic
//! name/value attributes.
//!
//! Decoding checks structure only. Signature and chain validation live in
//! the `voms-trust` crate.
//!
//! ```no_run
//! use voms_attributes::{AttributeRecord, decode};
//!
//! # fn example(ac: &[u8], chain: &[Vec<u8>]) -> Result<(), voms_attributes::DecodeError> {
//! let record = decode(ac, chain)?;
//! println!("{} via {}:{}", record.primary_fqan(), record.host(), record.port());
//! # Ok(())
//! # }
//! ```

#[allow(missing_docs)]
pub mod asn1;
mod decode;
mod error;
mod fqan;
mod generic;
mod record;
pub mod time;
mod validity;

#[cfg(any(test, feature = "helpers"))]
#[allow(missing_docs)]
pub mod helpers;

pub use decode::{Decoder, decode};
pub use error::{DecodeError, ErrorKind, FqanError};
pub use fqan::Fqan;
pub use generic::{Extraction, GenericAttribute, extract as extract_generic_attributes};
pub use record::{AttributeRecord, EncodedAc, VomsAc, VomsAttribute};
pub use time::{Clock, FixedClock, SystemClock};
pub use validity::ValidityWindow;

pub use x509_cert::{self, Certificate, name::Name, serial_number::SerialNumber};
