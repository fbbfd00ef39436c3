//! ASN.1 structures of the X.509 attribute certificate profile and the
//! VOMS-specific attributes and extensions carried inside it.
//!
//! The AC profile module is defined with IMPLICIT tags. CHOICE types that
//! cannot be implicitly tagged (`AttCertIssuer`, `Target`) are kept as raw
//! [`Any`] and interpreted by the decoder.

use der::{
    Decode, Sequence, Tag,
    asn1::{Any, BitString, GeneralizedTime, ObjectIdentifier, OctetString},
};
use x509_cert::{
    Certificate,
    attr::Attribute,
    ext::{Extensions, pkix::name::GeneralNames},
    serial_number::SerialNumber,
    spki::AlgorithmIdentifierOwned,
};

/// VOMS FQAN attribute (`IetfAttrSyntax`).
pub const VOMS_ATTRIBUTE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.8005.100.100.4");

/// AA certificate chain embedded by the issuing AA.
pub const VOMS_AC_CERTS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.8005.100.100.10");

/// VOMS generic attributes.
pub const VOMS_GENERIC_ATTRIBUTES: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.8005.100.100.11");

/// `id-ce-targetInformation`.
pub const TARGET_INFORMATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.55");

/// `id-ce-noRevAvail`.
pub const NO_REVOCATION_AVAILABLE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.56");

/// `id-ce-authorityKeyIdentifier`.
pub const AUTHORITY_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.35");

/// Extensions the decoder understands; any other critical extension is rejected.
pub const KNOWN_EXTENSIONS: [ObjectIdentifier; 5] = [
    VOMS_AC_CERTS,
    VOMS_GENERIC_ATTRIBUTES,
    TARGET_INFORMATION,
    NO_REVOCATION_AVAILABLE,
    AUTHORITY_KEY_IDENTIFIER,
];

/// `AttCertVersion` v2.
pub const AC_VERSION_2: u8 = 1;

/// The signed outer structure. `acinfo` is kept as received so that the
/// signed bytes are available verbatim.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AttributeCertificate {
    pub acinfo: Any,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    pub signature_value: BitString,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AttributeCertificateInfo {
    pub version: u8,
    pub holder: Holder,
    /// `AttCertIssuer`: v1Form `GeneralNames` or v2Form `[0] V2Form`.
    pub issuer: Any,
    pub signature: AlgorithmIdentifierOwned,
    pub serial_number: SerialNumber,
    pub attr_cert_validity_period: AttCertValidityPeriod,
    pub attributes: Vec<Attribute>,
    #[asn1(optional = "true")]
    pub issuer_unique_id: Option<BitString>,
    #[asn1(optional = "true")]
    pub extensions: Option<Extensions>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Holder {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub base_certificate_id: Option<IssuerSerial>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub entity_name: Option<GeneralNames>,
    #[asn1(context_specific = "2", tag_mode = "IMPLICIT", optional = "true")]
    pub object_digest_info: Option<ObjectDigestInfo>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct IssuerSerial {
    pub issuer: GeneralNames,
    pub serial: SerialNumber,
    #[asn1(optional = "true")]
    pub issuer_uid: Option<BitString>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ObjectDigestInfo {
    /// ENUMERATED `DigestedObjectType`.
    pub digested_object_type: Any,
    #[asn1(optional = "true")]
    pub other_object_type_id: Option<ObjectIdentifier>,
    pub digest_algorithm: AlgorithmIdentifierOwned,
    pub object_digest: BitString,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct V2Form {
    #[asn1(optional = "true")]
    pub issuer_name: Option<GeneralNames>,
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub base_certificate_id: Option<IssuerSerial>,
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", optional = "true")]
    pub object_digest_info: Option<ObjectDigestInfo>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AttCertValidityPeriod {
    pub not_before_time: GeneralizedTime,
    pub not_after_time: GeneralizedTime,
}

/// Value of the VOMS FQAN attribute.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct IetfAttrSyntax {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT", optional = "true")]
    pub policy_authority: Option<GeneralNames>,
    /// `CHOICE { octets OCTET STRING, oid OBJECT IDENTIFIER, string UTF8String }`
    pub values: Vec<Any>,
}

/// Value of the AC certificates extension.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AcCerts {
    pub certificates: Vec<Certificate>,
}

/// Value of the generic attributes extension. Holders are kept raw so a
/// malformed holder can be skipped without losing the rest.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct FullAttributes {
    pub holders: Vec<Any>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AttributeHolder {
    pub grantor: GeneralNames,
    pub attributes: Vec<Any>,
}

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct GenericAttributeValue {
    pub name: OctetString,
    pub value: OctetString,
    pub qualifier: OctetString,
}

/// `TargetInformation ::= SEQUENCE OF Targets`, `Targets ::= SEQUENCE OF Target`.
pub type TargetInformation = Vec<Vec<Any>>;

/// Decode the content octets of an implicitly tagged constructed value as
/// if they carried the universal `SEQUENCE` tag.
pub fn decode_implicit_sequence<T>(any: &Any) -> der::Result<T>
where
    T: for<'a> Decode<'a>,
{
    let retagged = Any::new(Tag::Sequence, any.value())?;
    let bytes = der::Encode::to_der(&retagged)?;
    T::from_der(&bytes)
}
