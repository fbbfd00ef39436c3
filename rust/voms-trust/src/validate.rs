//! Attribute certificate validation.
//!
//! The validator checks, in this order:
//! 1. The AA chain is present
//! 2. The chain reaches a configured trust anchor
//! 3. The AC issuer is the leaf AA certificate's subject
//! 4. The AC signature verifies under the leaf AA key
//! 5. Each walked certificate is in date and not revoked. Every certificate
//!    above the leaf, the anchor included, is a CA and signs the one below it
//!
//! The anchor is located before any signature is examined, so a chain that
//! leads nowhere is always reported as an unknown anchor.

use crate::{
    algorithm::{self, AlgorithmError},
    anchor::{TrustAnchorProvider, TrustAnchors, global},
    config::ValidatorConfig,
    error::{ChainError, ValidationError},
    revocation::{RevocationSource, RevocationStatus},
};
use der::{Decode, Encode, oid::AssociatedOid};
use std::{sync::Arc, time::SystemTime};
use voms_attributes::{AttributeRecord, Certificate, Clock, SystemClock};
use x509_cert::ext::pkix::BasicConstraints;

/// Where the walked part of the chain ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminus<'a> {
    /// The certificate at this index is itself an anchor.
    Listed(usize),
    /// The last certificate is issued by this anchor from outside the chain.
    IssuedBy(&'a Certificate),
}

/// Validates attribute records against a set of trust anchors.
///
/// A validator holds no per-call state and can be shared across threads.
#[derive(Clone)]
pub struct TrustValidator {
    anchors: Arc<dyn TrustAnchorProvider>,
    clock: Arc<dyn Clock>,
    revocation: Option<Arc<dyn RevocationSource>>,
    config: ValidatorConfig,
}

impl std::fmt::Debug for TrustValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustValidator")
            .field("clock", &self.clock)
            .field("revocation", &self.revocation.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TrustValidator {
    /// A validator reading anchors from `anchors`, the system clock, and
    /// the default configuration.
    pub fn new(anchors: impl TrustAnchorProvider + 'static) -> Self {
        Self {
            anchors: Arc::new(anchors),
            clock: Arc::new(SystemClock),
            revocation: None,
            config: ValidatorConfig::default(),
        }
    }

    /// A validator reading the process-wide anchor store.
    pub fn with_global_anchors() -> Self {
        Self::new(global())
    }

    /// Use `clock` as the reference time for [`TrustValidator::validate`].
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Consult `source` for every walked certificate.
    pub fn with_revocation(mut self, source: impl RevocationSource + 'static) -> Self {
        self.revocation = Some(Arc::new(source));
        self
    }

    /// Replace the validator configuration.
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate `record` at the clock's current time.
    pub fn validate<R>(&self, record: &R) -> Result<(), ValidationError>
    where
        R: AttributeRecord + ?Sized,
    {
        self.validate_at(record, self.clock.now())
    }

    /// Validate `record` with `time` as the reference time for certificate
    /// validity windows.
    pub fn validate_at<R>(&self, record: &R, time: SystemTime) -> Result<(), ValidationError>
    where
        R: AttributeRecord + ?Sized,
    {
        let result = self.check(record, time);
        match &result {
            Ok(()) => tracing::debug!(
                vo = record.vo(),
                issuer = %record.issuer(),
                "attribute certificate is trusted"
            ),
            Err(err) => tracing::debug!(
                vo = record.vo(),
                issuer = %record.issuer(),
                kind = ?err.kind(),
                %err,
                "attribute certificate is not trusted"
            ),
        }
        result
    }

    fn check<R>(&self, record: &R, time: SystemTime) -> Result<(), ValidationError>
    where
        R: AttributeRecord + ?Sized,
    {
        let chain = record.aa_certificates();
        let leaf = chain.first().ok_or(ChainError::EmptyChain)?;

        let anchors = self.anchors.anchors();
        let terminus = self.locate_anchor(chain, &anchors)?;

        let aa_subject = &leaf.tbs_certificate.subject;
        if self.config.require_issuer_match && record.issuer() != aa_subject {
            return Err(ChainError::IssuerMismatch {
                ac_issuer: record.issuer().to_string(),
                aa_subject: aa_subject.to_string(),
            }
            .into());
        }

        algorithm::verify(
            record.signature_algorithm(),
            &leaf.tbs_certificate.subject_public_key_info,
            record.encoded().to_be_signed(),
            record.signature(),
        )
        .map_err(|err| ValidationError::SignatureVerification(err.to_string()))?;

        let walked = match terminus {
            Terminus::Listed(index) => &chain[..=index],
            Terminus::IssuedBy(_) => chain,
        };
        if walked.len() > self.config.max_chain_depth {
            return Err(ChainError::TooLong {
                length: walked.len(),
                max: self.config.max_chain_depth,
            }
            .into());
        }

        let mut path: Vec<&Certificate> = walked.iter().collect();
        if let Terminus::IssuedBy(anchor) = terminus {
            path.push(anchor);
        }
        self.walk(&path, time)?;

        Ok(())
    }

    fn locate_anchor<'a>(
        &self,
        chain: &'a [Certificate],
        anchors: &'a TrustAnchors,
    ) -> Result<Terminus<'a>, ChainError> {
        if let Some(index) = chain
            .iter()
            .position(|certificate| anchors.find(certificate).is_some())
        {
            return Ok(Terminus::Listed(index));
        }

        if self.config.allow_unlisted_root {
            if let Some(last) = chain.last() {
                let issuer = anchors
                    .issuers_of(&last.tbs_certificate.issuer)
                    .find(|anchor| verify_issued_by(last, anchor.certificate()).is_ok());
                if let Some(anchor) = issuer {
                    return Ok(Terminus::IssuedBy(anchor.certificate()));
                }
            }
        }

        Err(ChainError::UnknownAnchor)
    }

    /// Check every certificate on `path`, leaf first and ending with the
    /// anchor. Each certificate after the leaf issues its predecessor and
    /// must therefore be a CA.
    fn walk(&self, path: &[&Certificate], time: SystemTime) -> Result<(), ChainError> {
        for (index, certificate) in path.iter().copied().enumerate() {
            let validity = &certificate.tbs_certificate.validity;
            if time < validity.not_before.to_system_time() {
                return Err(ChainError::NotYetValid { index });
            }
            if time > validity.not_after.to_system_time() {
                return Err(ChainError::Expired { index });
            }

            if let Some(source) = &self.revocation {
                if source.status(certificate) == RevocationStatus::Revoked {
                    return Err(ChainError::Revoked { index });
                }
            }

            if index > 0 && !is_certificate_authority(certificate) {
                return Err(ChainError::NotACertificateAuthority { index });
            }

            if let Some(issuer) = path.get(index + 1) {
                if certificate.tbs_certificate.issuer != issuer.tbs_certificate.subject {
                    return Err(ChainError::BrokenLink { index });
                }
                verify_issued_by(certificate, issuer).map_err(|err| match err {
                    AlgorithmError::UnsupportedAlgorithm(_)
                    | AlgorithmError::KeyMismatch { .. }
                    | AlgorithmError::InvalidKey(_) => ChainError::UnsupportedKey(err.to_string()),
                    AlgorithmError::InvalidSignature => ChainError::InvalidSignature { index },
                })?;
            }
        }

        Ok(())
    }
}

/// Whether `certificate` carries `basicConstraints` with `cA` set.
fn is_certificate_authority(certificate: &Certificate) -> bool {
    certificate
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|extension| extension.extn_id == BasicConstraints::OID)
        .and_then(|extension| BasicConstraints::from_der(extension.extn_value.as_bytes()).ok())
        .is_some_and(|constraints| constraints.ca)
}

/// Verify that `certificate` carries a valid signature by `issuer`'s key.
fn verify_issued_by(certificate: &Certificate, issuer: &Certificate) -> Result<(), AlgorithmError> {
    let tbs = certificate
        .tbs_certificate
        .to_der()
        .map_err(|_| AlgorithmError::InvalidSignature)?;
    algorithm::verify(
        &certificate.signature_algorithm,
        &issuer.tbs_certificate.subject_public_key_info,
        &tbs,
        certificate.signature.raw_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::AnchorStore;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;
    use voms_attributes::{
        Decoder, FixedClock, VomsAttribute,
        helpers::{AcBuilder, TestAuthority},
        time::{Duration, UNIX_EPOCH},
    };

    const T0: u64 = 1_700_000_000;
    const DAY: u64 = 86_400;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn record(aa: &TestAuthority, chain: &[&TestAuthority]) -> TestResult<VomsAttribute> {
        let der = AcBuilder::new("atlas", "voms.cern.ch", 15001)
            .fqan("/atlas")
            .validity(at(T0), at(T0 + DAY))
            .sign(aa)?;
        let chain = chain
            .iter()
            .map(|authority| authority.to_der())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Decoder::new().decode(&der, &chain)?)
    }

    #[test]
    fn it_walks_only_up_to_a_listed_anchor() -> TestResult {
        let root = TestAuthority::root("CN=Root", 1, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let ca = root.issue("CN=Grid CA", 2, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let aa = ca.issue("CN=AA", 3, at(T0 - DAY), at(T0 + 10 * DAY))?;
        // The root is expired but lies beyond the anchored CA.
        let expired_root = TestAuthority::root("CN=Root", 1, at(T0 - 3 * DAY), at(T0 - 2 * DAY))?;
        let record = record(&aa, &[&aa, &ca, &expired_root])?;

        let validator = TrustValidator::new(TrustAnchors::from_der([ca.to_der()?])?);
        validator.validate_at(&record, at(T0))?;
        Ok(())
    }

    #[test]
    fn it_enforces_the_maximum_depth() -> TestResult {
        let root = TestAuthority::root("CN=Root", 1, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let ca = root.issue("CN=Grid CA", 2, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let aa = ca.issue("CN=AA", 3, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let record = record(&aa, &[&aa, &ca, &root])?;

        let validator = TrustValidator::new(TrustAnchors::from_der([root.to_der()?])?)
            .with_config(ValidatorConfig {
                max_chain_depth: 2,
                ..ValidatorConfig::default()
            });

        assert_eq!(
            validator.validate_at(&record, at(T0)),
            Err(ValidationError::from(ChainError::TooLong {
                length: 3,
                max: 2
            }))
        );
        Ok(())
    }

    #[test]
    fn it_can_require_the_anchor_inside_the_chain() -> TestResult {
        let root = TestAuthority::root("CN=Root", 1, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let aa = root.issue("CN=AA", 2, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let record = record(&aa, &[&aa])?;
        let anchors = TrustAnchors::from_der([root.to_der()?])?;

        TrustValidator::new(anchors.clone()).validate_at(&record, at(T0))?;

        let strict = TrustValidator::new(anchors).with_config(ValidatorConfig {
            allow_unlisted_root: false,
            ..ValidatorConfig::default()
        });
        assert_eq!(
            strict.validate_at(&record, at(T0)),
            Err(ValidationError::from(ChainError::UnknownAnchor))
        );
        Ok(())
    }

    #[test]
    fn it_reports_an_unsupported_algorithm_in_the_chain() -> TestResult {
        use der::asn1::ObjectIdentifier;
        use x509_cert::spki::AlgorithmIdentifierOwned;

        let root = TestAuthority::root("CN=Root", 1, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let aa = root.issue("CN=AA", 2, at(T0 - DAY), at(T0 + 10 * DAY))?;

        // DSA with SHA-256.
        let mut relabelled = aa.certificate().clone();
        relabelled.signature_algorithm = AlgorithmIdentifierOwned {
            oid: ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.2"),
            parameters: None,
        };

        let der = AcBuilder::new("atlas", "voms.cern.ch", 15001)
            .fqan("/atlas")
            .validity(at(T0), at(T0 + DAY))
            .sign(&aa)?;
        let record = Decoder::new().decode(&der, &[relabelled.to_der()?, root.to_der()?])?;

        let err = TrustValidator::new(TrustAnchors::from_der([root.to_der()?])?)
            .validate_at(&record, at(T0))
            .unwrap_err();
        assert!(
            matches!(
                err.chain_error(),
                Some(ChainError::UnsupportedKey(reason)) if reason.contains("2.16.840.1.101.3.4.3.2")
            ),
            "{err}"
        );
        assert_eq!(err.kind(), voms_attributes::ErrorKind::ChainValidation);
        Ok(())
    }

    #[test]
    fn it_requires_every_issuer_to_be_a_ca() -> TestResult {
        let root = TestAuthority::root("CN=Root", 1, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let user = root.issue_end_entity("CN=Alice,O=Grid", 2, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let aa = user.issue("CN=voms.cern.ch,O=Grid", 3, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let record = record(&aa, &[&aa, &user, &root])?;

        let validator = TrustValidator::new(TrustAnchors::from_der([root.to_der()?])?);
        assert_eq!(
            validator.validate_at(&record, at(T0)),
            Err(ValidationError::from(ChainError::NotACertificateAuthority {
                index: 1
            }))
        );
        Ok(())
    }

    #[test]
    fn it_checks_an_anchor_outside_the_chain_like_a_listed_one() -> TestResult {
        let root = TestAuthority::root("CN=Root", 1, at(T0 - DAY), at(T0 + DAY))?;
        let aa = root.issue("CN=AA", 2, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let record = record(&aa, &[&aa])?;
        let validator = TrustValidator::new(TrustAnchors::from_der([root.to_der()?])?);

        validator.validate_at(&record, at(T0 + DAY))?;
        assert_eq!(
            validator.validate_at(&record, at(T0 + DAY + 1)),
            Err(ValidationError::from(ChainError::Expired { index: 1 }))
        );

        let user = root.issue_end_entity("CN=Alice", 3, at(T0 - DAY), at(T0 + DAY))?;
        let aa = user.issue("CN=AA", 4, at(T0 - DAY), at(T0 + DAY))?;
        let record = self::record(&aa, &[&aa])?;
        let validator = TrustValidator::new(TrustAnchors::from_der([user.to_der()?])?);
        assert_eq!(
            validator.validate_at(&record, at(T0)),
            Err(ValidationError::from(ChainError::NotACertificateAuthority {
                index: 1
            }))
        );
        Ok(())
    }

    #[test]
    fn it_reads_anchors_from_a_shared_store() -> TestResult {
        let root = TestAuthority::root("CN=Root", 1, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let aa = root.issue("CN=AA", 2, at(T0 - DAY), at(T0 + 10 * DAY))?;
        let record = record(&aa, &[&aa, &root])?;

        let store = Arc::new(AnchorStore::default());
        let validator = TrustValidator::new(store.clone()).with_clock(FixedClock::from_unix(T0));

        assert_eq!(
            validator.validate(&record),
            Err(ValidationError::from(ChainError::UnknownAnchor))
        );

        store.replace(TrustAnchors::from_der([root.to_der()?])?);
        validator.validate(&record)?;
        Ok(())
    }
}
