//! Decoding of attribute certificates into [`VomsAttribute`] records.
//!
//! Decoding is purely structural. It performs no signature or chain
//! checks; those belong to the trust validator.

use crate::{
    asn1::{
        AC_VERSION_2, AcCerts, AttributeCertificate, AttributeCertificateInfo, IetfAttrSyntax,
        KNOWN_EXTENSIONS, TargetInformation, V2Form, VOMS_AC_CERTS, VOMS_ATTRIBUTE,
        VOMS_GENERIC_ATTRIBUTES, TARGET_INFORMATION, decode_implicit_sequence,
    },
    error::DecodeError,
    fqan::Fqan,
    generic::{self, Extraction},
    record::{EncodedAc, VomsAc, VomsAttribute},
    time::{Clock, SystemClock},
    validity::ValidityWindow,
};
use der::{Decode, Encode, Header, Reader, SliceReader, Tag, TagNumber, Tagged, asn1::Any};
use nonempty::NonEmpty;
use std::sync::Arc;
use x509_cert::{
    Certificate,
    ext::{Extension, pkix::name::{GeneralName, GeneralNames}},
    name::Name,
};

/// Decodes attribute certificates.
///
/// The decoder holds the clock that records it produces will use to answer
/// [`crate::AttributeRecord::is_valid`].
#[derive(Debug, Clone)]
pub struct Decoder {
    clock: Arc<dyn Clock>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// A decoder whose records read the system clock.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock handed to decoded records.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Decode a DER attribute certificate.
    ///
    /// `chain` is the AA certificate chain in DER, leaf first. When it is
    /// empty the chain embedded in the certificate, if any, is used instead.
    pub fn decode<B>(&self, ac: &[u8], chain: &[B]) -> Result<VomsAttribute, DecodeError>
    where
        B: AsRef<[u8]>,
    {
        let result = self.decode_ac(ac, chain);
        match &result {
            Ok(VomsAttribute::Rfc5755(record)) => tracing::debug!(
                vo = %record.vo,
                issuer = %record.issuer,
                fqans = record.fqans.len(),
                "decoded attribute certificate"
            ),
            Err(err) => tracing::debug!(kind = ?err.kind(), %err, "rejected attribute certificate"),
        }
        result
    }

    fn decode_ac<B>(&self, der: &[u8], chain: &[B]) -> Result<VomsAttribute, DecodeError>
    where
        B: AsRef<[u8]>,
    {
        let ac = AttributeCertificate::from_der(der)?;
        let info: AttributeCertificateInfo = ac.acinfo.decode_as()?;

        if info.version != AC_VERSION_2 {
            return Err(DecodeError::Malformed(format!(
                "unsupported attribute certificate version {}",
                info.version
            )));
        }
        if info.signature != ac.signature_algorithm {
            return Err(DecodeError::Malformed(
                "inner and outer signature algorithms differ".to_string(),
            ));
        }

        let signature = ac.signature_value.raw_bytes().to_vec();
        if signature.is_empty() {
            return Err(DecodeError::MissingField("signature"));
        }

        let (holder, holder_serial) = holder(&info)?;
        let issuer = issuer(&info.issuer)?;

        let period = &info.attr_cert_validity_period;
        let validity = ValidityWindow::new(
            period.not_before_time.to_system_time(),
            period.not_after_time.to_system_time(),
        )?;

        let voms = info
            .attributes
            .iter()
            .find(|attribute| attribute.oid == VOMS_ATTRIBUTE)
            .and_then(|attribute| attribute.values.iter().next())
            .ok_or(DecodeError::MissingField("VOMS attribute"))?;
        let voms: IetfAttrSyntax = voms.decode_as()?;
        let (vo, host, port) = policy_authority(voms.policy_authority.as_ref())?;
        let fqans = fqans(&voms.values)?;

        let mut generic_attributes = Extraction::default();
        let mut targets = Vec::new();
        let mut embedded_chain = Vec::new();

        for extension in info.extensions.iter().flatten() {
            if !KNOWN_EXTENSIONS.contains(&extension.extn_id) {
                if extension.critical {
                    return Err(DecodeError::UnsupportedExtension(extension.extn_id));
                }
                tracing::debug!(oid = %extension.extn_id, "ignoring unrecognised extension");
                continue;
            }

            if extension.extn_id == VOMS_GENERIC_ATTRIBUTES {
                generic_attributes = generic::extract(extension)?;
            } else if extension.extn_id == TARGET_INFORMATION {
                targets = target_names(extension)?;
            } else if extension.extn_id == VOMS_AC_CERTS {
                embedded_chain = AcCerts::from_der(extension.extn_value.as_bytes())
                    .map_err(|err| DecodeError::malformed("AC certificates extension", err))?
                    .certificates;
            }
        }

        let aa_certificates = if chain.is_empty() {
            embedded_chain
        } else {
            chain
                .iter()
                .enumerate()
                .map(|(index, certificate)| {
                    Certificate::from_der(certificate.as_ref()).map_err(|err| {
                        DecodeError::malformed(&format!("AA certificate {index}"), err)
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(VomsAttribute::Rfc5755(VomsAc {
            vo,
            host,
            port,
            holder,
            holder_serial,
            issuer,
            serial: info.serial_number,
            validity,
            fqans,
            signature,
            signature_algorithm: ac.signature_algorithm,
            generic_attributes: generic_attributes.attributes,
            skipped_generic_attributes: generic_attributes.skipped,
            targets,
            aa_certificates,
            encoded: EncodedAc::new(der.to_vec(), signed_range(der, &ac.acinfo)?),
            clock: self.clock.clone(),
        }))
    }
}

/// Decode with a [`Decoder`] that reads the system clock.
pub fn decode<B>(ac: &[u8], chain: &[B]) -> Result<VomsAttribute, DecodeError>
where
    B: AsRef<[u8]>,
{
    Decoder::new().decode(ac, chain)
}

/// Byte range of the `acinfo` TLV inside the outer SEQUENCE.
fn signed_range(der: &[u8], acinfo: &Any) -> Result<std::ops::Range<usize>, DecodeError> {
    let mut reader = SliceReader::new(der)?;
    Header::decode(&mut reader)?;
    let start = usize::try_from(reader.position())?;
    let end = start + usize::try_from(acinfo.encoded_len()?)?;
    Ok(start..end)
}

fn holder(
    info: &AttributeCertificateInfo,
) -> Result<(Name, x509_cert::serial_number::SerialNumber), DecodeError> {
    let base = info.holder.base_certificate_id.as_ref();

    let name = info
        .holder
        .entity_name
        .as_ref()
        .and_then(first_directory_name)
        .or_else(|| base.and_then(|base| first_directory_name(&base.issuer)))
        .ok_or(DecodeError::MissingField("holder name"))?;
    let serial = base
        .map(|base| base.serial.clone())
        .ok_or(DecodeError::MissingField("holder serial number"))?;

    Ok((name, serial))
}

fn issuer(issuer: &Any) -> Result<Name, DecodeError> {
    let names: GeneralNames = match issuer.tag() {
        Tag::Sequence => issuer.decode_as()?,
        Tag::ContextSpecific {
            constructed: true,
            number,
        } if number == TagNumber::N0 => {
            let form: V2Form = decode_implicit_sequence(issuer)?;
            form.issuer_name
                .ok_or(DecodeError::MissingField("issuer name"))?
        }
        tag => {
            return Err(DecodeError::Malformed(format!(
                "unrecognised issuer form {tag}"
            )));
        }
    };

    first_directory_name(&names).ok_or(DecodeError::MissingField("issuer name"))
}

fn first_directory_name(names: &GeneralNames) -> Option<Name> {
    names.iter().find_map(|name| match name {
        GeneralName::DirectoryName(name) => Some(name.clone()),
        _ => None,
    })
}

fn policy_authority(names: Option<&GeneralNames>) -> Result<(String, String, u16), DecodeError> {
    let uri = names
        .into_iter()
        .flatten()
        .find_map(|name| match name {
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
            _ => None,
        })
        .ok_or(DecodeError::MissingField("policy authority"))?;

    let malformed = || DecodeError::Malformed(format!("invalid policy authority {uri:?}"));

    let (vo, authority) = uri.split_once("://").ok_or_else(malformed)?;
    let (host, port) = authority.rsplit_once(':').ok_or_else(malformed)?;
    if vo.is_empty() {
        return Err(DecodeError::MissingField("VO name"));
    }
    if host.is_empty() {
        return Err(DecodeError::MissingField("AA host"));
    }
    let port = port.parse::<u16>().map_err(|_| malformed())?;

    Ok((vo.to_string(), host.to_string(), port))
}

fn fqans(values: &[Any]) -> Result<NonEmpty<Fqan>, DecodeError> {
    let fqans = values
        .iter()
        .map(|value| {
            let text = match value.tag() {
                Tag::OctetString | Tag::Utf8String => std::str::from_utf8(value.value())
                    .map_err(|err| DecodeError::malformed("FQAN", err))?,
                tag => {
                    return Err(DecodeError::Malformed(format!(
                        "unsupported FQAN encoding {tag}"
                    )));
                }
            };
            Ok(Fqan::parse(text)?)
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    NonEmpty::from_vec(fqans).ok_or(DecodeError::MissingField("FQAN"))
}

fn target_names(extension: &Extension) -> Result<Vec<String>, DecodeError> {
    let information = TargetInformation::from_der(extension.extn_value.as_bytes())
        .map_err(|err| DecodeError::malformed("target information", err))?;

    let mut names = Vec::new();
    for target in information.iter().flatten() {
        let name = match target.tag() {
            Tag::ContextSpecific {
                constructed: true,
                number,
            } if number == TagNumber::N0 || number == TagNumber::N1 => {
                GeneralName::from_der(target.value())?
            }
            _ => {
                return Err(DecodeError::Malformed(
                    "unsupported target form".to_string(),
                ));
            }
        };

        match name {
            GeneralName::UniformResourceIdentifier(uri) => names.push(uri.to_string()),
            GeneralName::DnsName(dns) => names.push(dns.to_string()),
            GeneralName::DirectoryName(name) => names.push(name.to_string()),
            other => {
                tracing::debug!(?other, "ignoring target name of unsupported type");
            }
        }
    }
    Ok(names)
}
