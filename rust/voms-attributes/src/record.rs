//! The immutable attribute record handed to callers.
//!
//! A record is produced once by [`crate::Decoder`] and never changes. All
//! fields are resolved at decode time, so accessors cannot fail. Views that
//! older consumers expect (the FQAN object list, the legacy "fully
//! qualified attribute" strings, the plain string list) are computed from
//! the one stored FQAN list and therefore cannot drift from it.

use crate::{
    asn1::AttributeCertificate,
    error::DecodeError,
    fqan::Fqan,
    generic::GenericAttribute,
    time::Clock,
    validity::ValidityWindow,
};
use der::Decode;
use nonempty::NonEmpty;
use std::{ops::Range, sync::Arc, time::SystemTime};
use x509_cert::{
    Certificate, name::Name, serial_number::SerialNumber, spki::AlgorithmIdentifierOwned,
};

/// The read-only capability set shared by every record shape.
pub trait AttributeRecord {
    /// Name of the VO these attributes are about.
    fn vo(&self) -> &str;

    /// Host of the AA that signed these attributes.
    fn host(&self) -> &str;

    /// Port the AA listens on.
    fn port(&self) -> u16;

    /// Subject of the holder of these attributes.
    fn holder(&self) -> &Name;

    /// Serial number of the holder certificate.
    fn holder_serial_number(&self) -> &SerialNumber;

    /// Subject of the AA that signed these attributes.
    fn issuer(&self) -> &Name;

    /// Serial number of the attribute certificate itself.
    fn serial_number(&self) -> &SerialNumber;

    /// The validity window.
    fn validity(&self) -> ValidityWindow;

    /// FQANs in encoding order. Never empty.
    fn fqan_list(&self) -> &NonEmpty<Fqan>;

    /// Raw signature bytes.
    fn signature(&self) -> &[u8];

    /// Algorithm the signature was produced with.
    fn signature_algorithm(&self) -> &AlgorithmIdentifierOwned;

    /// Generic attributes in encoding order.
    fn generic_attributes(&self) -> &[GenericAttribute];

    /// Target names the AC is restricted to. Empty means unrestricted.
    fn targets(&self) -> &[String];

    /// The AA certificate chain, leaf first.
    fn aa_certificates(&self) -> &[Certificate];

    /// The encoded certificate, as received.
    fn encoded(&self) -> &EncodedAc;

    /// Clock used by [`AttributeRecord::is_valid`].
    fn clock(&self) -> &dyn Clock;

    /// Start of the validity window.
    fn not_before(&self) -> SystemTime {
        self.validity().not_before()
    }

    /// End of the validity window.
    fn not_after(&self) -> SystemTime {
        self.validity().not_after()
    }

    /// FQAN strings in encoding order.
    fn fqans(&self) -> Vec<String> {
        self.fqan_list().iter().map(ToString::to_string).collect()
    }

    /// The primary FQAN (the first one encoded).
    fn primary(&self) -> &Fqan {
        self.fqan_list().first()
    }

    /// The primary FQAN as a string.
    fn primary_fqan(&self) -> String {
        self.primary().to_string()
    }

    /// Whether `time` falls inside the validity window, bounds included.
    ///
    /// Performs no cryptographic validation.
    fn valid_at(&self, time: SystemTime) -> bool {
        self.validity().contains(time)
    }

    /// [`AttributeRecord::valid_at`] for the record's clock.
    fn is_valid(&self) -> bool {
        self.valid_at(self.clock().now())
    }

    /// Typed FQAN list.
    #[deprecated(note = "use `fqans` or `fqan_list` instead")]
    fn list_of_fqan(&self) -> Vec<Fqan> {
        self.fqan_list().iter().cloned().collect()
    }

    /// FQANs in the legacy `/group/Role=<role>/Capability=NULL` form.
    #[deprecated(note = "use `fqans` instead")]
    fn fully_qualified_attributes(&self) -> Vec<String> {
        self.fqan_list()
            .iter()
            .map(Fqan::to_legacy_string)
            .collect()
    }
}

/// The attribute certificate exactly as it was received.
///
/// Advanced callers can re-parse it into the full ASN.1 structure. Nothing
/// in this crate reads it beyond locating the signed portion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedAc {
    der: Vec<u8>,
    signed: Range<usize>,
}

impl EncodedAc {
    pub(crate) fn new(der: Vec<u8>, signed: Range<usize>) -> Self {
        Self { der, signed }
    }

    /// The complete DER encoding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.der
    }

    /// The signed `acinfo` portion.
    pub fn to_be_signed(&self) -> &[u8] {
        &self.der[self.signed.clone()]
    }

    /// Parse the full ASN.1 structure.
    pub fn parse(&self) -> Result<AttributeCertificate, DecodeError> {
        Ok(AttributeCertificate::from_der(&self.der)?)
    }
}

/// A record decoded from an RFC 5755 attribute certificate carrying the
/// VOMS attribute profile.
#[derive(Debug, Clone)]
pub struct VomsAc {
    pub(crate) vo: String,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) holder: Name,
    pub(crate) holder_serial: SerialNumber,
    pub(crate) issuer: Name,
    pub(crate) serial: SerialNumber,
    pub(crate) validity: ValidityWindow,
    pub(crate) fqans: NonEmpty<Fqan>,
    pub(crate) signature: Vec<u8>,
    pub(crate) signature_algorithm: AlgorithmIdentifierOwned,
    pub(crate) generic_attributes: Vec<GenericAttribute>,
    pub(crate) skipped_generic_attributes: usize,
    pub(crate) targets: Vec<String>,
    pub(crate) aa_certificates: Vec<Certificate>,
    pub(crate) encoded: EncodedAc,
    pub(crate) clock: Arc<dyn Clock>,
}

impl VomsAc {
    /// Generic attribute entries that were dropped because they did not decode.
    pub fn skipped_generic_attributes(&self) -> usize {
        self.skipped_generic_attributes
    }
}

// The clock is an injected collaborator, not part of the decoded content.
impl PartialEq for VomsAc {
    fn eq(&self, other: &Self) -> bool {
        self.vo == other.vo
            && self.host == other.host
            && self.port == other.port
            && self.holder == other.holder
            && self.holder_serial == other.holder_serial
            && self.issuer == other.issuer
            && self.serial == other.serial
            && self.validity == other.validity
            && self.fqans == other.fqans
            && self.signature == other.signature
            && self.signature_algorithm == other.signature_algorithm
            && self.generic_attributes == other.generic_attributes
            && self.skipped_generic_attributes == other.skipped_generic_attributes
            && self.targets == other.targets
            && self.aa_certificates == other.aa_certificates
            && self.encoded == other.encoded
    }
}

impl Eq for VomsAc {}

impl AttributeRecord for VomsAc {
    fn vo(&self) -> &str {
        &self.vo
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn holder(&self) -> &Name {
        &self.holder
    }

    fn holder_serial_number(&self) -> &SerialNumber {
        &self.holder_serial
    }

    fn issuer(&self) -> &Name {
        &self.issuer
    }

    fn serial_number(&self) -> &SerialNumber {
        &self.serial
    }

    fn validity(&self) -> ValidityWindow {
        self.validity
    }

    fn fqan_list(&self) -> &NonEmpty<Fqan> {
        &self.fqans
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn signature_algorithm(&self) -> &AlgorithmIdentifierOwned {
        &self.signature_algorithm
    }

    fn generic_attributes(&self) -> &[GenericAttribute] {
        &self.generic_attributes
    }

    fn targets(&self) -> &[String] {
        &self.targets
    }

    fn aa_certificates(&self) -> &[Certificate] {
        &self.aa_certificates
    }

    fn encoded(&self) -> &EncodedAc {
        &self.encoded
    }

    fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

/// Every record shape the decoder can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VomsAttribute {
    /// RFC 5755 attribute certificate with the VOMS attribute profile.
    Rfc5755(VomsAc),
}

impl VomsAttribute {
    /// The record behind this variant.
    pub fn record(&self) -> &dyn AttributeRecord {
        match self {
            VomsAttribute::Rfc5755(ac) => ac,
        }
    }
}

impl From<VomsAc> for VomsAttribute {
    fn from(ac: VomsAc) -> Self {
        VomsAttribute::Rfc5755(ac)
    }
}

impl AttributeRecord for VomsAttribute {
    fn vo(&self) -> &str {
        self.record().vo()
    }

    fn host(&self) -> &str {
        self.record().host()
    }

    fn port(&self) -> u16 {
        self.record().port()
    }

    fn holder(&self) -> &Name {
        self.record().holder()
    }

    fn holder_serial_number(&self) -> &SerialNumber {
        self.record().holder_serial_number()
    }

    fn issuer(&self) -> &Name {
        self.record().issuer()
    }

    fn serial_number(&self) -> &SerialNumber {
        self.record().serial_number()
    }

    fn validity(&self) -> ValidityWindow {
        self.record().validity()
    }

    fn fqan_list(&self) -> &NonEmpty<Fqan> {
        self.record().fqan_list()
    }

    fn signature(&self) -> &[u8] {
        self.record().signature()
    }

    fn signature_algorithm(&self) -> &AlgorithmIdentifierOwned {
        self.record().signature_algorithm()
    }

    fn generic_attributes(&self) -> &[GenericAttribute] {
        self.record().generic_attributes()
    }

    fn targets(&self) -> &[String] {
        self.record().targets()
    }

    fn aa_certificates(&self) -> &[Certificate] {
        self.record().aa_certificates()
    }

    fn encoded(&self) -> &EncodedAc {
        self.record().encoded()
    }

    fn clock(&self) -> &dyn Clock {
        self.record().clock()
    }
}
