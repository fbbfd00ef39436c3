//! Revocation status input.
//!
//! Fetching and caching revocation lists happens elsewhere. The validator
//! only asks a [`RevocationSource`] about each certificate it walks.

use der::Encode;
use std::collections::HashSet;
use x509_cert::{Certificate, name::Name, serial_number::SerialNumber};

/// What a revocation source knows about a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevocationStatus {
    /// Known not to be revoked.
    Good,
    /// Revoked by its issuer.
    Revoked,
    /// No information. Treated as not revoked.
    Unknown,
}

/// Answers revocation queries for certificates in an AA chain.
pub trait RevocationSource: Send + Sync {
    /// Status of `certificate`.
    fn status(&self, certificate: &Certificate) -> RevocationStatus;
}

/// A fixed set of revoked `(issuer, serial)` pairs.
///
/// Issuers are compared by their DER encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevokedSerials {
    revoked: HashSet<(Vec<u8>, Vec<u8>)>,
}

impl RevokedSerials {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the certificate `serial` issued by `issuer` as revoked.
    pub fn revoke(mut self, issuer: &Name, serial: &SerialNumber) -> der::Result<Self> {
        self.revoked
            .insert((issuer.to_der()?, serial.as_bytes().to_vec()));
        Ok(self)
    }
}

impl RevocationSource for RevokedSerials {
    fn status(&self, certificate: &Certificate) -> RevocationStatus {
        let tbs = &certificate.tbs_certificate;
        let Ok(issuer) = tbs.issuer.to_der() else {
            return RevocationStatus::Unknown;
        };
        if self
            .revoked
            .contains(&(issuer, tbs.serial_number.as_bytes().to_vec()))
        {
            RevocationStatus::Revoked
        } else {
            RevocationStatus::Good
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;
    use voms_attributes::{
        helpers::TestAuthority,
        time::{Duration, UNIX_EPOCH},
    };

    #[test]
    fn it_reports_listed_serials_as_revoked() -> TestResult {
        let from = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let to = UNIX_EPOCH + Duration::from_secs(1_900_000_000);
        let ca = TestAuthority::root("CN=CA", 1, from, to)?;
        let revoked = ca.issue("CN=Revoked AA", 2, from, to)?;
        let good = ca.issue("CN=Good AA", 3, from, to)?;

        let source = RevokedSerials::new().revoke(
            ca.subject(),
            &revoked.certificate().tbs_certificate.serial_number,
        )?;

        assert_eq!(source.status(revoked.certificate()), RevocationStatus::Revoked);
        assert_eq!(source.status(good.certificate()), RevocationStatus::Good);
        Ok(())
    }

    #[test]
    fn it_distinguishes_issuers_by_encoding() -> TestResult {
        use der::Decode;

        // `CN=CA` as UTF8String and as PrintableString.
        let utf8 = Name::from_der(&[
            0x30, 0x0d, 0x31, 0x0b, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x03, 0x0c, 0x02, b'C',
            b'A',
        ])?;
        let printable = Name::from_der(&[
            0x30, 0x0d, 0x31, 0x0b, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x03, 0x13, 0x02, b'C',
            b'A',
        ])?;

        let from = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        let to = UNIX_EPOCH + Duration::from_secs(1_900_000_000);
        let ca = TestAuthority::root("CN=CA", 1, from, to)?;
        let aa = ca.issue("CN=AA", 2, from, to)?;
        let serial = &aa.certificate().tbs_certificate.serial_number;

        let mut under_utf8 = aa.certificate().clone();
        under_utf8.tbs_certificate.issuer = utf8.clone();
        let mut under_printable = aa.certificate().clone();
        under_printable.tbs_certificate.issuer = printable;

        let source = RevokedSerials::new().revoke(&utf8, serial)?;
        assert_eq!(source.status(&under_utf8), RevocationStatus::Revoked);
        assert_eq!(source.status(&under_printable), RevocationStatus::Good);
        Ok(())
    }
}
