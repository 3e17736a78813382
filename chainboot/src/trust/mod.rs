//! Trust gate.
//!
//! Nothing acquired by the resolver is used until a [`TrustGate`] accepts it.
//! The gate answers with a plain `bool`; the reason for a rejection is only
//! logged at `debug` level.

mod signature;

pub use signature::{
    decode_signing_key, decode_verifying_key, encode_signing_key, encode_verifying_key,
    generate_signing_key, key_id, key_id_hex, read_trailer, sign_file, KeyId, Trailer, MAGIC,
    TRAILER_LEN,
};

use std::fs::File;
use std::io;
use std::path::Path;

use ed25519_dalek::VerifyingKey;

/// Decides whether an on-disk artifact may be used.
pub trait TrustGate: Send + Sync {
    /// Whether `path` is an authentic artifact.
    ///
    /// Must fail closed: anything short of an explicit pass is `false`.
    fn is_trusted(&self, path: &Path) -> bool;
}

/// Reasons an artifact fails verification, or a key cannot be used.
#[derive(Debug)]
pub enum TrustError {
    /// The path does not exist or is not a regular file.
    Missing,
    /// The artifact carries no signature trailer.
    Unsigned,
    /// The trailer names a key that is not trusted.
    UnknownKey(String),
    /// The signature does not match the payload.
    BadSignature,
    /// The artifact already carries a trailer.
    AlreadySigned,
    /// A configured key is malformed.
    InvalidKey(String),
    /// Reading the artifact failed.
    Io(io::Error),
}

impl std::fmt::Display for TrustError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "file does not exist"),
            Self::Unsigned => write!(f, "file is not signed"),
            Self::UnknownKey(id) => write!(f, "signed by untrusted key {}", id),
            Self::BadSignature => write!(f, "signature does not match contents"),
            Self::AlreadySigned => write!(f, "file is already signed"),
            Self::InvalidKey(reason) => write!(f, "{}", reason),
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for TrustError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrustError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Trust gate accepting artifacts signed by one of a fixed set of keys.
#[derive(Debug, Clone, Default)]
pub struct SignatureTrustGate {
    keys: Vec<(KeyId, VerifyingKey)>,
}

impl SignatureTrustGate {
    /// Create a gate trusting the given keys.
    pub fn new(keys: impl IntoIterator<Item = VerifyingKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| (key_id(&k), k)).collect(),
        }
    }

    /// Create a gate from base64-encoded public keys.
    pub fn from_base64_keys<S: AsRef<str>>(encoded: &[S]) -> Result<Self, TrustError> {
        let keys = encoded
            .iter()
            .map(|k| decode_verifying_key(k.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(keys))
    }

    /// Number of trusted keys.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Verify `path`, reporting why it was rejected.
    pub fn verify(&self, path: &Path) -> Result<KeyId, TrustError> {
        if !path.is_file() {
            return Err(TrustError::Missing);
        }

        let mut file = File::open(path)?;
        let trailer = read_trailer(&mut file)?;

        let key = self
            .keys
            .iter()
            .find(|(id, _)| *id == trailer.key_id)
            .map(|(_, key)| key)
            .ok_or_else(|| TrustError::UnknownKey(key_id_hex(&trailer.key_id)))?;

        let digest = signature::payload_digest(&mut file, trailer.payload_len)?;
        signature::verify_digest(key, &digest, &trailer)?;

        Ok(trailer.key_id)
    }
}

impl TrustGate for SignatureTrustGate {
    fn is_trusted(&self, path: &Path) -> bool {
        match self.verify(path) {
            Ok(id) => {
                tracing::debug!(path = %path.display(), key = %key_id_hex(&id), "Signature verified");
                true
            }
            Err(reason) => {
                tracing::debug!(path = %path.display(), %reason, "Artifact rejected");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use std::fs;
    use tempfile::TempDir;

    fn signed_file(dir: &Path, name: &str, key: &SigningKey) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("contents of {}", name)).unwrap();
        sign_file(&path, key).unwrap();
        path
    }

    #[test]
    fn test_trusted_signature() {
        let temp = TempDir::new().unwrap();
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let path = signed_file(temp.path(), "runtime.msi", &key);

        let gate = SignatureTrustGate::new([key.verifying_key()]);
        assert!(gate.is_trusted(&path));
        assert!(gate.is_trusted(&path), "verification is repeatable");
    }

    #[test]
    fn test_missing_file_is_untrusted() {
        let temp = TempDir::new().unwrap();
        let gate = SignatureTrustGate::new([SigningKey::from_bytes(&[1u8; 32]).verifying_key()]);

        assert!(!gate.is_trusted(&temp.path().join("absent.msi")));
        assert!(!gate.is_trusted(temp.path()), "directories are not artifacts");
        assert!(matches!(
            gate.verify(&temp.path().join("absent.msi")),
            Err(TrustError::Missing)
        ));
    }

    #[test]
    fn test_unknown_key_is_untrusted() {
        let temp = TempDir::new().unwrap();
        let signer = SigningKey::from_bytes(&[1u8; 32]);
        let other = SigningKey::from_bytes(&[2u8; 32]);
        let path = signed_file(temp.path(), "runtime.msi", &signer);

        let gate = SignatureTrustGate::new([other.verifying_key()]);
        assert!(!gate.is_trusted(&path));
        assert!(matches!(gate.verify(&path), Err(TrustError::UnknownKey(_))));
    }

    #[test]
    fn test_tampered_payload_is_untrusted() {
        let temp = TempDir::new().unwrap();
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let path = signed_file(temp.path(), "runtime.exe", &key);

        let mut bytes = fs::read(&path).unwrap();
        bytes[0] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let gate = SignatureTrustGate::new([key.verifying_key()]);
        assert!(!gate.is_trusted(&path));
        assert!(matches!(gate.verify(&path), Err(TrustError::BadSignature)));
    }

    #[test]
    fn test_unsigned_is_untrusted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plain.exe");
        fs::write(&path, vec![0u8; 4096]).unwrap();

        let gate = SignatureTrustGate::new([SigningKey::from_bytes(&[1u8; 32]).verifying_key()]);
        assert!(matches!(gate.verify(&path), Err(TrustError::Unsigned)));
    }

    #[test]
    fn test_empty_gate_trusts_nothing() {
        let temp = TempDir::new().unwrap();
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let path = signed_file(temp.path(), "runtime.msi", &key);

        assert!(!SignatureTrustGate::default().is_trusted(&path));
    }

    #[test]
    fn test_from_base64_keys() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let encoded = vec![encode_verifying_key(&key.verifying_key())];
        let gate = SignatureTrustGate::from_base64_keys(&encoded).unwrap();
        assert_eq!(gate.key_count(), 1);

        assert!(SignatureTrustGate::from_base64_keys(&["AAAA"]).is_err());
    }
}
