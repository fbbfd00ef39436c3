//! Fixture builders for tests.
//!
//! [`TestAuthority`] mints CA and AA certificates with deterministic keys,
//! and [`AcBuilder`] encodes and signs attribute certificates with them.
//! Nothing here is suitable for production keys.

use crate::{
    asn1::{
        AC_VERSION_2, AcCerts, AttCertValidityPeriod, AttributeCertificate,
        AttributeCertificateInfo, AttributeHolder, FullAttributes, GenericAttributeValue, Holder,
        IetfAttrSyntax, IssuerSerial, TARGET_INFORMATION, V2Form, VOMS_AC_CERTS, VOMS_ATTRIBUTE,
        VOMS_GENERIC_ATTRIBUTES,
    },
    generic::GenericAttribute,
};
use anyhow::{Result, anyhow};
use der::{
    Decode, Encode, Tag, TagNumber,
    oid::AssociatedOid,
    asn1::{Any, BitString, GeneralizedTime, Ia5String, ObjectIdentifier, OctetString, SetOfVec},
};
use p256::pkcs8::EncodePublicKey;
use rand_chacha::{ChaCha8Rng, rand_core::SeedableRng};
use sha2::{Digest, Sha256};
use std::{
    str::FromStr,
    time::{Duration, SystemTime},
};
use x509_cert::{
    Certificate, TbsCertificate, Version,
    attr::Attribute,
    ext::{
        Extension,
        pkix::{
            BasicConstraints,
            name::{GeneralName, GeneralNames},
        },
    },
    name::Name,
    serial_number::SerialNumber,
    spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned},
    time::{Time, Validity},
};

const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const SHA256_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// Key type of a [`TestAuthority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// ECDSA over P-256 with SHA-256.
    P256,
    /// RSA-2048, PKCS#1 v1.5 with SHA-256.
    Rsa,
}

enum TestKey {
    P256(p256::ecdsa::SigningKey),
    Rsa(Box<rsa::pkcs1v15::SigningKey<Sha256>>),
}

impl TestKey {
    /// Derive a key from a seed so fixtures are reproducible.
    fn derive(algorithm: KeyAlgorithm, seed: &str) -> Result<Self> {
        let digest = Sha256::digest(seed.as_bytes());
        match algorithm {
            KeyAlgorithm::P256 => Ok(TestKey::P256(
                p256::ecdsa::SigningKey::from_slice(&digest).map_err(|err| anyhow!("{err}"))?,
            )),
            KeyAlgorithm::Rsa => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&digest);
                let mut rng = ChaCha8Rng::from_seed(seed);
                let key = rsa::RsaPrivateKey::new(&mut rng, 2048)?;
                Ok(TestKey::Rsa(Box::new(rsa::pkcs1v15::SigningKey::new(key))))
            }
        }
    }

    fn public_key_info(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let document = match self {
            TestKey::P256(key) => key.verifying_key().to_public_key_der()?,
            TestKey::Rsa(key) => {
                let private: &rsa::RsaPrivateKey = (**key).as_ref();
                private.to_public_key().to_public_key_der()?
            }
        };
        Ok(SubjectPublicKeyInfoOwned::from_der(document.as_bytes())?)
    }

    fn algorithm(&self) -> AlgorithmIdentifierOwned {
        match self {
            TestKey::P256(_) => AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA256,
                parameters: None,
            },
            TestKey::Rsa(_) => AlgorithmIdentifierOwned {
                oid: SHA256_WITH_RSA_ENCRYPTION,
                parameters: Some(Any::null()),
            },
        }
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        use rsa::signature::{SignatureEncoding, Signer};

        match self {
            TestKey::P256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
            TestKey::Rsa(key) => key.sign(message).to_vec(),
        }
    }
}

/// A certificate together with the key it certifies.
pub struct TestAuthority {
    certificate: Certificate,
    key: TestKey,
}

impl TestAuthority {
    /// A self-signed P-256 root.
    pub fn root(
        subject: &str,
        serial: u64,
        not_before: SystemTime,
        not_after: SystemTime,
    ) -> Result<Self> {
        Self::root_with(KeyAlgorithm::P256, subject, serial, not_before, not_after)
    }

    /// A self-signed root with the given key type.
    pub fn root_with(
        algorithm: KeyAlgorithm,
        subject: &str,
        serial: u64,
        not_before: SystemTime,
        not_after: SystemTime,
    ) -> Result<Self> {
        let key = TestKey::derive(algorithm, &format!("{subject}#{serial}"))?;
        let subject = Name::from_str(subject)?;
        let certificate = certify(
            &key,
            &subject,
            subject.clone(),
            key.public_key_info()?,
            serial,
            not_before,
            not_after,
            true,
        )?;
        Ok(Self { certificate, key })
    }

    /// A P-256 CA certificate issued by this authority.
    pub fn issue(
        &self,
        subject: &str,
        serial: u64,
        not_before: SystemTime,
        not_after: SystemTime,
    ) -> Result<Self> {
        self.issue_with(KeyAlgorithm::P256, subject, serial, not_before, not_after)
    }

    /// A CA certificate with the given key type issued by this authority.
    pub fn issue_with(
        &self,
        algorithm: KeyAlgorithm,
        subject: &str,
        serial: u64,
        not_before: SystemTime,
        not_after: SystemTime,
    ) -> Result<Self> {
        self.issue_certificate(algorithm, subject, serial, not_before, not_after, true)
    }

    /// A P-256 end-entity certificate (`cA=false`) issued by this authority.
    pub fn issue_end_entity(
        &self,
        subject: &str,
        serial: u64,
        not_before: SystemTime,
        not_after: SystemTime,
    ) -> Result<Self> {
        self.issue_certificate(KeyAlgorithm::P256, subject, serial, not_before, not_after, false)
    }

    fn issue_certificate(
        &self,
        algorithm: KeyAlgorithm,
        subject: &str,
        serial: u64,
        not_before: SystemTime,
        not_after: SystemTime,
        ca: bool,
    ) -> Result<Self> {
        let key = TestKey::derive(algorithm, &format!("{subject}#{serial}"))?;
        let certificate = certify(
            &self.key,
            self.subject(),
            Name::from_str(subject)?,
            key.public_key_info()?,
            serial,
            not_before,
            not_after,
            ca,
        )?;
        Ok(Self { certificate, key })
    }

    /// The authority's certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The authority's subject name.
    pub fn subject(&self) -> &Name {
        &self.certificate.tbs_certificate.subject
    }

    /// DER encoding of the authority's certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.certificate.to_der()?)
    }

    /// Sign `message`, returning the algorithm used and the signature bytes.
    pub fn sign(&self, message: &[u8]) -> (AlgorithmIdentifierOwned, Vec<u8>) {
        (self.key.algorithm(), self.key.sign(message))
    }
}

#[allow(clippy::too_many_arguments)]
fn certify(
    signer: &TestKey,
    issuer: &Name,
    subject: Name,
    subject_public_key_info: SubjectPublicKeyInfoOwned,
    serial: u64,
    not_before: SystemTime,
    not_after: SystemTime,
    ca: bool,
) -> Result<Certificate> {
    let basic_constraints = BasicConstraints {
        ca,
        path_len_constraint: None,
    };
    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&serial.to_be_bytes())?,
        signature: signer.algorithm(),
        issuer: issuer.clone(),
        validity: Validity {
            not_before: Time::try_from(not_before)?,
            not_after: Time::try_from(not_after)?,
        },
        subject,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(vec![Extension {
            extn_id: BasicConstraints::OID,
            critical: true,
            extn_value: OctetString::new(basic_constraints.to_der()?)?,
        }]),
    };
    let signature = signer.sign(&tbs_certificate.to_der()?);

    Ok(Certificate {
        tbs_certificate,
        signature_algorithm: signer.algorithm(),
        signature: BitString::from_bytes(&signature)?,
    })
}

/// Builds and signs VOMS attribute certificates.
#[derive(Debug, Clone)]
pub struct AcBuilder {
    policy_authority: Option<String>,
    host: String,
    voms_attribute: bool,
    signed: bool,
    holder: String,
    holder_issuer: String,
    holder_serial: u64,
    entity_name: bool,
    issuer: Option<String>,
    serial: u64,
    not_before: SystemTime,
    not_after: SystemTime,
    fqans: Vec<String>,
    generic_attributes: Vec<GenericAttribute>,
    targets: Vec<String>,
    embedded_chain: Vec<Certificate>,
    extra_extensions: Vec<(ObjectIdentifier, bool, Vec<u8>)>,
}

impl AcBuilder {
    /// An AC for `vo` issued by the AA at `host:port`, valid for twelve
    /// hours from now and carrying no FQANs yet.
    pub fn new(vo: &str, host: &str, port: u16) -> Self {
        let now = SystemTime::now();
        Self {
            policy_authority: Some(format!("{vo}://{host}:{port}")),
            host: host.to_string(),
            voms_attribute: true,
            signed: true,
            holder: "CN=Holder,O=Grid".to_string(),
            holder_issuer: "CN=Holder CA,O=Grid".to_string(),
            holder_serial: 7,
            entity_name: true,
            issuer: None,
            serial: 1,
            not_before: now - Duration::from_secs(60),
            not_after: now + Duration::from_secs(12 * 3600),
            fqans: Vec::new(),
            generic_attributes: Vec::new(),
            targets: Vec::new(),
            embedded_chain: Vec::new(),
            extra_extensions: Vec::new(),
        }
    }

    /// Holder subject and the serial number of the holder certificate.
    pub fn holder(mut self, subject: &str, serial: u64) -> Self {
        self.holder = subject.to_string();
        self.holder_serial = serial;
        self
    }

    /// Issuer of the holder certificate.
    pub fn holder_issuer(mut self, issuer: &str) -> Self {
        self.holder_issuer = issuer.to_string();
        self
    }

    /// Omit `entityName`, leaving only `baseCertificateID`.
    pub fn without_entity_name(mut self) -> Self {
        self.entity_name = false;
        self
    }

    /// Override the issuer name; defaults to the signer's subject.
    pub fn issuer(mut self, issuer: &str) -> Self {
        self.issuer = Some(issuer.to_string());
        self
    }

    pub fn serial(mut self, serial: u64) -> Self {
        self.serial = serial;
        self
    }

    pub fn validity(mut self, not_before: SystemTime, not_after: SystemTime) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    /// Replace the `vo://host:port` policy authority with `uri` verbatim.
    pub fn policy_authority(mut self, uri: &str) -> Self {
        self.policy_authority = Some(uri.to_string());
        self
    }

    /// Encode the FQAN attribute without a policy authority.
    pub fn without_policy_authority(mut self) -> Self {
        self.policy_authority = None;
        self
    }

    /// Leave the VOMS FQAN attribute out entirely.
    pub fn without_voms_attribute(mut self) -> Self {
        self.voms_attribute = false;
        self
    }

    /// Emit an empty signature value instead of signing.
    pub fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    /// Append an FQAN, encoded verbatim.
    pub fn fqan(mut self, fqan: &str) -> Self {
        self.fqans.push(fqan.to_string());
        self
    }

    pub fn generic_attribute(mut self, name: &str, value: &str, context: &str) -> Self {
        self.generic_attributes
            .push(GenericAttribute::new(name, value, context));
        self
    }

    /// Append a target URI.
    pub fn target(mut self, uri: &str) -> Self {
        self.targets.push(uri.to_string());
        self
    }

    /// Embed an AA chain, leaf first.
    pub fn embed_chain(mut self, chain: &[&TestAuthority]) -> Self {
        self.embedded_chain = chain
            .iter()
            .map(|authority| authority.certificate().clone())
            .collect();
        self
    }

    /// Append an arbitrary extension.
    pub fn extension(mut self, oid: ObjectIdentifier, critical: bool, value: Vec<u8>) -> Self {
        self.extra_extensions.push((oid, critical, value));
        self
    }

    /// Encode the AC and sign it with `signer`.
    pub fn sign(&self, signer: &TestAuthority) -> Result<Vec<u8>> {
        let issuer = match &self.issuer {
            Some(issuer) => Name::from_str(issuer)?,
            None => signer.subject().clone(),
        };
        let info = AttributeCertificateInfo {
            version: AC_VERSION_2,
            holder: Holder {
                base_certificate_id: Some(IssuerSerial {
                    issuer: directory_names(&self.holder_issuer)?,
                    serial: SerialNumber::new(&self.holder_serial.to_be_bytes())?,
                    issuer_uid: None,
                }),
                entity_name: if self.entity_name {
                    Some(directory_names(&self.holder)?)
                } else {
                    None
                },
                object_digest_info: None,
            },
            issuer: v2_form(issuer)?,
            signature: signer.key.algorithm(),
            serial_number: SerialNumber::new(&self.serial.to_be_bytes())?,
            attr_cert_validity_period: AttCertValidityPeriod {
                not_before_time: GeneralizedTime::from_system_time(self.not_before)?,
                not_after_time: GeneralizedTime::from_system_time(self.not_after)?,
            },
            attributes: if self.voms_attribute {
                vec![self.voms_attribute()?]
            } else {
                Vec::new()
            },
            issuer_unique_id: None,
            extensions: self.extensions()?,
        };

        let tbs = info.to_der()?;
        let (signature_algorithm, mut signature) = signer.sign(&tbs);
        if !self.signed {
            signature.clear();
        }
        let ac = AttributeCertificate {
            acinfo: Any::from_der(&tbs)?,
            signature_algorithm,
            signature_value: BitString::from_bytes(&signature)?,
        };
        Ok(ac.to_der()?)
    }

    fn voms_attribute(&self) -> Result<Attribute> {
        let policy_authority = self
            .policy_authority
            .as_deref()
            .map(|uri| -> der::Result<GeneralNames> {
                Ok(vec![GeneralName::UniformResourceIdentifier(Ia5String::new(uri)?)])
            })
            .transpose()?;
        let value = IetfAttrSyntax {
            policy_authority,
            values: self
                .fqans
                .iter()
                .map(|fqan| Any::encode_from(&OctetString::new(fqan.as_bytes())?))
                .collect::<der::Result<_>>()?,
        };

        Ok(Attribute {
            oid: VOMS_ATTRIBUTE,
            values: SetOfVec::try_from(vec![Any::encode_from(&value)?])?,
        })
    }

    fn extensions(&self) -> Result<Option<Vec<Extension>>> {
        let mut extensions = Vec::new();

        if !self.embedded_chain.is_empty() {
            let value = AcCerts {
                certificates: self.embedded_chain.clone(),
            };
            extensions.push(Extension {
                extn_id: VOMS_AC_CERTS,
                critical: false,
                extn_value: OctetString::new(value.to_der()?)?,
            });
        }

        if !self.generic_attributes.is_empty() {
            let grantor = format!("CN={}", self.host);
            extensions.push(Extension {
                extn_id: VOMS_GENERIC_ATTRIBUTES,
                critical: false,
                extn_value: OctetString::new(encode_generic_attributes(
                    &self.generic_attributes,
                    &grantor,
                )?)?,
            });
        }

        if !self.targets.is_empty() {
            let targets = self
                .targets
                .iter()
                .map(|uri| {
                    let name = GeneralName::UniformResourceIdentifier(Ia5String::new(uri)?);
                    Any::new(context_tag(TagNumber::N0), name.to_der()?)
                })
                .collect::<der::Result<Vec<_>>>()?;
            extensions.push(Extension {
                extn_id: TARGET_INFORMATION,
                critical: true,
                extn_value: OctetString::new(vec![targets].to_der()?)?,
            });
        }

        for (oid, critical, value) in &self.extra_extensions {
            extensions.push(Extension {
                extn_id: *oid,
                critical: *critical,
                extn_value: OctetString::new(value.clone())?,
            });
        }

        Ok((!extensions.is_empty()).then_some(extensions))
    }
}

fn context_tag(number: TagNumber) -> Tag {
    Tag::ContextSpecific {
        constructed: true,
        number,
    }
}

fn v2_form(issuer: Name) -> Result<Any> {
    let form = V2Form {
        issuer_name: Some(vec![GeneralName::DirectoryName(issuer)]),
        base_certificate_id: None,
        object_digest_info: None,
    };
    let encoded = Any::encode_from(&form)?;
    Ok(Any::new(context_tag(TagNumber::N0), encoded.value())?)
}

/// A `GeneralNames` holding a single directory name in RFC 4514 form.
pub fn directory_names(name: &str) -> Result<GeneralNames> {
    Ok(vec![GeneralName::DirectoryName(Name::from_str(name)?)])
}

/// Encode the value of the generic attributes extension with every
/// attribute granted by `grantor`.
pub fn encode_generic_attributes(
    attributes: &[GenericAttribute],
    grantor: &str,
) -> Result<Vec<u8>> {
    let entries = attributes
        .iter()
        .map(|attribute| {
            Any::encode_from(&GenericAttributeValue {
                name: OctetString::new(attribute.name.as_bytes())?,
                value: OctetString::new(attribute.value.as_bytes())?,
                qualifier: OctetString::new(attribute.context.as_bytes())?,
            })
        })
        .collect::<der::Result<Vec<_>>>()?;

    let holder = AttributeHolder {
        grantor: directory_names(grantor)?,
        attributes: entries,
    };
    let full = FullAttributes {
        holders: vec![Any::encode_from(&holder)?],
    };
    Ok(full.to_der()?)
}
