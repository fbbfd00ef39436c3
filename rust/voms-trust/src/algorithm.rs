//! Signature algorithm dispatch.
//!
//! Maps X.509 algorithm identifiers onto the RustCrypto verifiers and checks
//! that the public key is of the family the algorithm expects.

use der::{Encode, asn1::ObjectIdentifier, oid::AssociatedOid};
use rsa::pkcs8::DecodePublicKey;
use signature::Verifier;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

const SHA256_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const SHA384_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const SHA512_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// Errors raised while verifying a single signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlgorithmError {
    /// The signature algorithm is not supported.
    #[error("unsupported signature algorithm {0}")]
    UnsupportedAlgorithm(ObjectIdentifier),

    /// The public key does not belong to the algorithm's key family.
    #[error("{algorithm:?} cannot be verified with a {key} key")]
    KeyMismatch {
        /// Algorithm the signature claims
        algorithm: SignatureAlgorithm,
        /// Key algorithm (and curve) found in the certificate
        key: String,
    },

    /// The public key could not be decoded.
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    /// The signature is malformed or does not match.
    #[error("signature mismatch")]
    InvalidSignature,
}

/// Signature algorithms the validator can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256
    RsaSha256,
    /// RSA PKCS#1 v1.5 with SHA-384
    RsaSha384,
    /// RSA PKCS#1 v1.5 with SHA-512
    RsaSha512,
    /// ECDSA over P-256 with SHA-256
    EcdsaP256Sha256,
    /// ECDSA over P-384 with SHA-384
    EcdsaP384Sha384,
    /// Ed25519
    Ed25519,
}

impl TryFrom<&AlgorithmIdentifierOwned> for SignatureAlgorithm {
    type Error = AlgorithmError;

    fn try_from(algorithm: &AlgorithmIdentifierOwned) -> Result<Self, Self::Error> {
        match algorithm.oid {
            oid if oid == SHA256_WITH_RSA_ENCRYPTION => Ok(Self::RsaSha256),
            oid if oid == SHA384_WITH_RSA_ENCRYPTION => Ok(Self::RsaSha384),
            oid if oid == SHA512_WITH_RSA_ENCRYPTION => Ok(Self::RsaSha512),
            oid if oid == ECDSA_WITH_SHA256 => Ok(Self::EcdsaP256Sha256),
            oid if oid == ECDSA_WITH_SHA384 => Ok(Self::EcdsaP384Sha384),
            oid if oid == ED25519 => Ok(Self::Ed25519),
            oid => Err(AlgorithmError::UnsupportedAlgorithm(oid)),
        }
    }
}

impl SignatureAlgorithm {
    /// Verify `signature` over `message` with the key in `key`.
    pub fn verify(
        &self,
        key: &SubjectPublicKeyInfoOwned,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), AlgorithmError> {
        self.check_key(key)?;

        match self {
            Self::RsaSha256 => verify_rsa::<sha2::Sha256>(key, message, signature),
            Self::RsaSha384 => verify_rsa::<sha2::Sha384>(key, message, signature),
            Self::RsaSha512 => verify_rsa::<sha2::Sha512>(key, message, signature),
            Self::EcdsaP256Sha256 => {
                let key = key.subject_public_key.raw_bytes();
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(key)
                    .map_err(|err| AlgorithmError::InvalidKey(err.to_string()))?;
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|_| AlgorithmError::InvalidSignature)?;
                verify_with(&key, message, &signature)
            }
            Self::EcdsaP384Sha384 => {
                let key = key.subject_public_key.raw_bytes();
                let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(key)
                    .map_err(|err| AlgorithmError::InvalidKey(err.to_string()))?;
                let signature = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|_| AlgorithmError::InvalidSignature)?;
                verify_with(&key, message, &signature)
            }
            Self::Ed25519 => {
                let bytes: &[u8; ed25519_dalek::PUBLIC_KEY_LENGTH] = key
                    .subject_public_key
                    .raw_bytes()
                    .try_into()
                    .map_err(|_| AlgorithmError::InvalidKey("Ed25519 key length".into()))?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(bytes)
                    .map_err(|err| AlgorithmError::InvalidKey(err.to_string()))?;
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| AlgorithmError::InvalidSignature)?;
                key.verify_strict(message, &signature)
                    .map_err(|_| AlgorithmError::InvalidSignature)
            }
        }
    }

    fn check_key(&self, key: &SubjectPublicKeyInfoOwned) -> Result<(), AlgorithmError> {
        let family = &key.algorithm;
        let curve = family
            .parameters
            .as_ref()
            .and_then(|parameters| parameters.decode_as::<ObjectIdentifier>().ok());

        let matches = match self {
            Self::RsaSha256 | Self::RsaSha384 | Self::RsaSha512 => family.oid == RSA_ENCRYPTION,
            Self::EcdsaP256Sha256 => family.oid == EC_PUBLIC_KEY && curve == Some(SECP256R1),
            Self::EcdsaP384Sha384 => family.oid == EC_PUBLIC_KEY && curve == Some(SECP384R1),
            Self::Ed25519 => family.oid == ED25519,
        };

        if matches {
            Ok(())
        } else {
            Err(AlgorithmError::KeyMismatch {
                algorithm: *self,
                key: match curve {
                    Some(curve) => format!("{}/{curve}", family.oid),
                    None => family.oid.to_string(),
                },
            })
        }
    }
}

/// Verify a signature made with the algorithm named by `algorithm`.
pub fn verify(
    algorithm: &AlgorithmIdentifierOwned,
    key: &SubjectPublicKeyInfoOwned,
    message: &[u8],
    signature: &[u8],
) -> Result<(), AlgorithmError> {
    SignatureAlgorithm::try_from(algorithm)?.verify(key, message, signature)
}

fn verify_rsa<D>(
    key: &SubjectPublicKeyInfoOwned,
    message: &[u8],
    signature: &[u8],
) -> Result<(), AlgorithmError>
where
    D: sha2::Digest + AssociatedOid,
{
    let der = key
        .to_der()
        .map_err(|err| AlgorithmError::InvalidKey(err.to_string()))?;
    let key = rsa::RsaPublicKey::from_public_key_der(&der)
        .map_err(|err| AlgorithmError::InvalidKey(err.to_string()))?;
    let signature = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|_| AlgorithmError::InvalidSignature)?;
    verify_with(&rsa::pkcs1v15::VerifyingKey::<D>::new(key), message, &signature)
}

fn verify_with<V, S>(key: &V, message: &[u8], signature: &S) -> Result<(), AlgorithmError>
where
    V: Verifier<S>,
{
    key.verify(message, signature)
        .map_err(|_| AlgorithmError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::{Decode, asn1::Any};
    use ed25519_dalek::Signer as _;
    use pretty_assertions::assert_eq;
    use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};
    use testresult::TestResult;
    use x509_cert::spki::AlgorithmIdentifierOwned;

    fn algorithm(oid: ObjectIdentifier) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid,
            parameters: None,
        }
    }

    fn ed25519_key(seed: u8) -> (ed25519_dalek::SigningKey, SubjectPublicKeyInfoOwned) {
        let signing = ed25519_dalek::SigningKey::generate(&mut ChaCha20Rng::from_seed([seed; 32]));
        let spki = SubjectPublicKeyInfoOwned {
            algorithm: algorithm(ED25519),
            subject_public_key: der::asn1::BitString::from_bytes(
                signing.verifying_key().as_bytes(),
            )
            .unwrap(),
        };
        (signing, spki)
    }

    #[test]
    fn it_verifies_ed25519_signatures() -> TestResult {
        let (signing, spki) = ed25519_key(1);
        let signature = signing.sign(b"payload");

        verify(&algorithm(ED25519), &spki, b"payload", &signature.to_bytes())?;
        assert_eq!(
            verify(&algorithm(ED25519), &spki, b"tampered", &signature.to_bytes()),
            Err(AlgorithmError::InvalidSignature)
        );
        Ok(())
    }

    #[test]
    fn it_verifies_p384_signatures() -> TestResult {
        use p384::pkcs8::EncodePublicKey;
        use signature::Signer;

        let signing = p384::ecdsa::SigningKey::from_slice(&[7u8; 48])?;
        let spki = SubjectPublicKeyInfoOwned::from_der(
            signing.verifying_key().to_public_key_der()?.as_bytes(),
        )?;
        let signature: p384::ecdsa::Signature = signing.sign(b"payload");
        let signature = signature.to_der();

        verify(&algorithm(ECDSA_WITH_SHA384), &spki, b"payload", signature.as_bytes())?;
        assert_eq!(
            verify(&algorithm(ECDSA_WITH_SHA384), &spki, b"other", signature.as_bytes()),
            Err(AlgorithmError::InvalidSignature)
        );
        Ok(())
    }

    #[test]
    fn it_rejects_a_key_from_another_family() {
        let (_, spki) = ed25519_key(2);
        let result = verify(&algorithm(ECDSA_WITH_SHA256), &spki, b"payload", &[0; 64]);
        assert!(matches!(result, Err(AlgorithmError::KeyMismatch { .. })));
    }

    #[test]
    fn it_rejects_a_p256_signature_claimed_for_p384() -> TestResult {
        use p256::pkcs8::EncodePublicKey;

        let signing = p256::ecdsa::SigningKey::from_slice(&[9u8; 32])?;
        let spki = SubjectPublicKeyInfoOwned::from_der(
            signing.verifying_key().to_public_key_der()?.as_bytes(),
        )?;
        let result = verify(&algorithm(ECDSA_WITH_SHA384), &spki, b"payload", &[0; 8]);
        assert!(matches!(result, Err(AlgorithmError::KeyMismatch { .. })));
        Ok(())
    }

    #[test]
    fn it_rejects_unknown_algorithms() {
        let (_, spki) = ed25519_key(3);
        let md5_with_rsa = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");
        assert_eq!(
            verify(&algorithm(md5_with_rsa), &spki, b"payload", &[]),
            Err(AlgorithmError::UnsupportedAlgorithm(md5_with_rsa))
        );
    }

    #[test]
    fn it_ignores_rsa_null_parameters() {
        let identifier = AlgorithmIdentifierOwned {
            oid: SHA256_WITH_RSA_ENCRYPTION,
            parameters: Some(Any::null()),
        };
        assert_eq!(
            SignatureAlgorithm::try_from(&identifier),
            Ok(SignatureAlgorithm::RsaSha256)
        );
    }
}
