//! Trust anchors and the process-wide anchor store.
//!
//! An anchor set is immutable once built. The store publishes whole sets
//! through an [`ArcSwap`], so a validation that has taken a snapshot keeps
//! seeing that snapshot even while a new set is being installed.

use arc_swap::ArcSwap;
use der::{Decode, Encode};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    sync::{Arc, LazyLock},
};
use x509_cert::{Certificate, name::Name};

/// A root certificate trusted without further proof.
#[derive(Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    certificate: Certificate,
    fingerprint: [u8; 32],
}

impl TrustAnchor {
    /// Wrap a certificate as an anchor.
    pub fn new(certificate: Certificate) -> der::Result<Self> {
        let fingerprint = fingerprint(&certificate)?;
        Ok(Self {
            certificate,
            fingerprint,
        })
    }

    /// Decode an anchor from DER.
    pub fn from_der(der: &[u8]) -> der::Result<Self> {
        Self::new(Certificate::from_der(der)?)
    }

    /// The anchor certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The anchor's subject name.
    pub fn subject(&self) -> &Name {
        &self.certificate.tbs_certificate.subject
    }

    /// SHA-256 over the certificate's DER encoding.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }
}

impl fmt::Debug for TrustAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustAnchor")
            .field("subject", &self.subject().to_string())
            .field("fingerprint", &hex(&self.fingerprint))
            .finish()
    }
}

/// SHA-256 over a certificate's DER encoding.
pub fn fingerprint(certificate: &Certificate) -> der::Result<[u8; 32]> {
    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&Sha256::digest(certificate.to_der()?));
    Ok(fingerprint)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// An immutable set of trust anchors. Clones share the same storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustAnchors {
    anchors: Arc<[TrustAnchor]>,
}

impl TrustAnchors {
    /// An anchor set holding `anchors`.
    pub fn new(anchors: impl IntoIterator<Item = TrustAnchor>) -> Self {
        Self {
            anchors: anchors.into_iter().collect(),
        }
    }

    /// Build an anchor set from DER certificates.
    pub fn from_der<I, B>(certificates: I) -> der::Result<Self>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        certificates
            .into_iter()
            .map(|der| TrustAnchor::from_der(der.as_ref()))
            .collect::<der::Result<Vec<_>>>()
            .map(Self::new)
    }

    /// Build an anchor set from a PEM bundle.
    pub fn from_pem(pem: &[u8]) -> der::Result<Self> {
        Certificate::load_pem_chain(pem)?
            .into_iter()
            .map(TrustAnchor::new)
            .collect::<der::Result<Vec<_>>>()
            .map(Self::new)
    }

    /// The anchor with the same DER encoding as `certificate`, if any.
    pub fn find(&self, certificate: &Certificate) -> Option<&TrustAnchor> {
        let fingerprint = fingerprint(certificate).ok()?;
        self.anchors
            .iter()
            .find(|anchor| anchor.fingerprint == fingerprint)
    }

    /// Anchors whose subject is `issuer`.
    pub fn issuers_of<'a>(&'a self, issuer: &'a Name) -> impl Iterator<Item = &'a TrustAnchor> {
        self.anchors
            .iter()
            .filter(move |anchor| anchor.subject() == issuer)
    }

    /// Iterate over the anchors.
    pub fn iter(&self) -> impl Iterator<Item = &TrustAnchor> {
        self.anchors.iter()
    }

    /// Number of anchors.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// Supplies the current anchor set.
pub trait TrustAnchorProvider: Send + Sync {
    /// A consistent snapshot of the anchors.
    fn anchors(&self) -> Arc<TrustAnchors>;
}

impl TrustAnchorProvider for TrustAnchors {
    fn anchors(&self) -> Arc<TrustAnchors> {
        // Shares the anchor slice; no certificate is copied.
        Arc::new(self.clone())
    }
}

impl<P: TrustAnchorProvider + ?Sized> TrustAnchorProvider for Arc<P> {
    fn anchors(&self) -> Arc<TrustAnchors> {
        (**self).anchors()
    }
}

impl<P: TrustAnchorProvider + ?Sized> TrustAnchorProvider for &P {
    fn anchors(&self) -> Arc<TrustAnchors> {
        (**self).anchors()
    }
}

/// A replaceable anchor set.
///
/// Readers take snapshots without locking. [`AnchorStore::replace`]
/// installs a complete new set in one atomic step.
#[derive(Debug, Default)]
pub struct AnchorStore {
    current: ArcSwap<TrustAnchors>,
}

impl AnchorStore {
    /// A store initially holding `anchors`.
    pub fn new(anchors: TrustAnchors) -> Self {
        Self {
            current: ArcSwap::from_pointee(anchors),
        }
    }

    /// Install a new anchor set, returning the previous one.
    pub fn replace(&self, anchors: TrustAnchors) -> Arc<TrustAnchors> {
        let count = anchors.len();
        let previous = self.current.swap(Arc::new(anchors));
        tracing::debug!(
            previous = previous.len(),
            current = count,
            "replaced trust anchor set"
        );
        previous
    }

    /// The current anchor set.
    pub fn snapshot(&self) -> Arc<TrustAnchors> {
        self.current.load_full()
    }
}

impl TrustAnchorProvider for AnchorStore {
    fn anchors(&self) -> Arc<TrustAnchors> {
        self.snapshot()
    }
}

static GLOBAL: LazyLock<AnchorStore> = LazyLock::new(AnchorStore::default);

/// The process-wide anchor store. Starts out empty.
pub fn global() -> &'static AnchorStore {
    &GLOBAL
}
