//! Generic attribute extraction.
//!
//! VOMS generic attributes are free-form `(name, value, context)` triples
//! carried in their own AC extension, grouped by the grantor that issued
//! them. The context (the ASN.1 `qualifier`) is advisory only.
//!
//! The extension is normally non-critical. In that case entries that fail
//! to decode are skipped and counted so that one bad entry does not hide
//! the rest. A critical generic attribute extension is mandatory for the
//! relying party, so any malformed entry rejects the whole certificate.

use crate::{
    asn1::{AttributeHolder, FullAttributes, GenericAttributeValue},
    error::DecodeError,
};
use der::{Decode, Encode, asn1::Any};
use serde::{Deserialize, Serialize};
use x509_cert::ext::Extension;

/// A single name/value/context triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenericAttribute {
    /// Attribute name
    pub name: String,
    /// Attribute value
    pub value: String,
    /// Grouping hint, typically the VO or group the attribute was granted in
    pub context: String,
}

impl GenericAttribute {
    /// Creates a new generic attribute.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

/// Outcome of extracting generic attributes from an extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Attributes in encoding order.
    pub attributes: Vec<GenericAttribute>,
    /// Number of entries that were skipped because they did not decode.
    pub skipped: usize,
}

/// Extract generic attributes from the VOMS generic attributes extension.
///
/// Encoding order is preserved across grantors and within each grantor.
pub fn extract(extension: &Extension) -> Result<Extraction, DecodeError> {
    let mut extraction = Extraction::default();
    let strict = extension.critical;

    let full = match FullAttributes::from_der(extension.extn_value.as_bytes()) {
        Ok(full) => full,
        Err(err) => {
            skip(&mut extraction, strict, "generic attribute block", err)?;
            return Ok(extraction);
        }
    };

    for holder in &full.holders {
        let holder = match reparse::<AttributeHolder>(holder) {
            Ok(holder) => holder,
            Err(err) => {
                skip(&mut extraction, strict, "generic attribute holder", err)?;
                continue;
            }
        };

        for entry in &holder.attributes {
            match reparse::<GenericAttributeValue>(entry)
                .map_err(|err| err.to_string())
                .and_then(|value| to_attribute(&value))
            {
                Ok(attribute) => extraction.attributes.push(attribute),
                Err(err) => skip(&mut extraction, strict, "generic attribute", err)?,
            }
        }
    }

    if extraction.skipped > 0 {
        tracing::warn!(
            skipped = extraction.skipped,
            kept = extraction.attributes.len(),
            "skipped malformed generic attribute entries"
        );
    }

    Ok(extraction)
}

fn skip(
    extraction: &mut Extraction,
    strict: bool,
    what: &str,
    err: impl std::fmt::Display,
) -> Result<(), DecodeError> {
    if strict {
        return Err(DecodeError::malformed(what, err));
    }
    tracing::debug!(%err, "skipping malformed {what}");
    extraction.skipped += 1;
    Ok(())
}

fn reparse<T>(any: &Any) -> der::Result<T>
where
    T: for<'a> Decode<'a>,
{
    T::from_der(&any.to_der()?)
}

fn to_attribute(value: &GenericAttributeValue) -> Result<GenericAttribute, String> {
    let text = |octets: &der::asn1::OctetString| {
        String::from_utf8(octets.as_bytes().to_vec()).map_err(|err| err.to_string())
    };

    let name = text(&value.name)?;
    if name.is_empty() {
        return Err("empty attribute name".to_string());
    }

    Ok(GenericAttribute {
        name,
        value: text(&value.value)?,
        context: text(&value.qualifier)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{asn1::VOMS_GENERIC_ATTRIBUTES, helpers};
    use der::asn1::OctetString;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    fn extension(value: Vec<u8>, critical: bool) -> TestResult<Extension> {
        Ok(Extension {
            extn_id: VOMS_GENERIC_ATTRIBUTES,
            critical,
            extn_value: OctetString::new(value)?,
        })
    }

    fn raw_entry(name: &[u8], value: &[u8], qualifier: &[u8]) -> TestResult<Any> {
        let entry = GenericAttributeValue {
            name: OctetString::new(name)?,
            value: OctetString::new(value)?,
            qualifier: OctetString::new(qualifier)?,
        };
        Ok(Any::from_der(&entry.to_der()?)?)
    }

    #[test]
    fn it_reproduces_attributes_in_encoding_order() -> TestResult {
        let attributes = vec![
            GenericAttribute::new("mail", "a@b.org", "atlas"),
            GenericAttribute::new("nickname", "ab", "atlas"),
            GenericAttribute::new("mail", "c@d.org", "atlas/higgs"),
        ];
        let encoded = helpers::encode_generic_attributes(&attributes, "CN=aa.example.org")?;
        let extraction = extract(&extension(encoded, false)?)?;

        assert_eq!(extraction.attributes, attributes);
        assert_eq!(extraction.skipped, 0);
        Ok(())
    }

    #[test]
    fn it_skips_malformed_entries_in_non_critical_extension() -> TestResult {
        let holder = AttributeHolder {
            grantor: helpers::directory_names("CN=aa.example.org")?,
            attributes: vec![
                raw_entry(b"mail", b"a@b.org", b"atlas")?,
                raw_entry(b"", b"orphan", b"atlas")?,
                raw_entry(b"bad", &[0xff, 0xfe], b"atlas")?,
                Any::from_der(&OctetString::new(b"junk".as_slice())?.to_der()?)?,
                raw_entry(b"role", b"pilot", b"atlas")?,
            ],
        };
        let full = FullAttributes {
            holders: vec![Any::from_der(&holder.to_der()?)?],
        };

        let extraction = extract(&extension(full.to_der()?, false)?)?;

        assert_eq!(
            extraction.attributes,
            vec![
                GenericAttribute::new("mail", "a@b.org", "atlas"),
                GenericAttribute::new("role", "pilot", "atlas"),
            ]
        );
        assert_eq!(extraction.skipped, 3);
        Ok(())
    }

    #[test]
    fn it_rejects_malformed_entries_in_critical_extension() -> TestResult {
        let holder = AttributeHolder {
            grantor: helpers::directory_names("CN=aa.example.org")?,
            attributes: vec![raw_entry(b"bad", &[0xff], b"atlas")?],
        };
        let full = FullAttributes {
            holders: vec![Any::from_der(&holder.to_der()?)?],
        };

        let result = extract(&extension(full.to_der()?, true)?);
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
        Ok(())
    }

    #[test]
    fn it_counts_an_undecodable_block_once() -> TestResult {
        let extraction = extract(&extension(vec![0x04, 0x01, 0x00], false)?)?;
        assert!(extraction.attributes.is_empty());
        assert_eq!(extraction.skipped, 1);

        assert!(extract(&extension(vec![0x04, 0x01, 0x00], true)?).is_err());
        Ok(())
    }
}
