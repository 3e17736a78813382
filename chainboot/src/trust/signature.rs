//! Embedded signature trailer.
//!
//! A signed artifact is laid out as
//!
//! ```text
//! payload | key id (8) | ed25519 signature (64) | magic "CHBTSIG1" (8)
//! ```
//!
//! The signature covers the SHA-256 digest of the payload. The key id is the
//! first 8 bytes of the SHA-256 digest of the publisher's public key.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use super::TrustError;

/// Trailer magic.
pub const MAGIC: &[u8; 8] = b"CHBTSIG1";

/// Length of the key id.
pub const KEY_ID_LEN: usize = 8;

/// Length of the whole trailer.
pub const TRAILER_LEN: usize = KEY_ID_LEN + 64 + MAGIC.len();

/// Buffer size for hashing payloads (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Short identifier of a publisher key.
pub type KeyId = [u8; KEY_ID_LEN];

/// Key id for a public key.
pub fn key_id(key: &VerifyingKey) -> KeyId {
    let digest = Sha256::digest(key.as_bytes());
    let mut id = [0u8; KEY_ID_LEN];
    id.copy_from_slice(&digest[..KEY_ID_LEN]);
    id
}

/// Lowercase hex rendering of a key id, for logs.
pub fn key_id_hex(id: &KeyId) -> String {
    id.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decoded trailer of a signed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    pub key_id: KeyId,
    pub signature: [u8; 64],
    /// Length of the signed payload.
    pub payload_len: u64,
}

/// Read the trailer of `file`.
///
/// Returns [`TrustError::Unsigned`] if the file is too short or the magic
/// is absent.
pub fn read_trailer(file: &mut File) -> Result<Trailer, TrustError> {
    let len = file.metadata()?.len();
    if len < TRAILER_LEN as u64 {
        return Err(TrustError::Unsigned);
    }

    let mut raw = [0u8; TRAILER_LEN];
    file.seek(SeekFrom::Start(len - TRAILER_LEN as u64))?;
    file.read_exact(&mut raw)?;

    if &raw[TRAILER_LEN - MAGIC.len()..] != MAGIC {
        return Err(TrustError::Unsigned);
    }

    let mut key_id = [0u8; KEY_ID_LEN];
    key_id.copy_from_slice(&raw[..KEY_ID_LEN]);
    let mut signature = [0u8; 64];
    signature.copy_from_slice(&raw[KEY_ID_LEN..KEY_ID_LEN + 64]);

    Ok(Trailer {
        key_id,
        signature,
        payload_len: len - TRAILER_LEN as u64,
    })
}

/// SHA-256 digest of the first `len` bytes of `file`.
pub fn payload_digest(file: &mut File, len: u64) -> Result<[u8; 32], TrustError> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = Read::by_ref(file).take(len);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().into())
}

/// Check a trailer against a public key.
pub fn verify_digest(
    key: &VerifyingKey,
    digest: &[u8; 32],
    trailer: &Trailer,
) -> Result<(), TrustError> {
    let signature = Signature::from_bytes(&trailer.signature);
    key.verify(digest, &signature)
        .map_err(|_| TrustError::BadSignature)
}

/// Append a signature trailer to `path`.
///
/// Fails with [`TrustError::AlreadySigned`] when a trailer is present, since
/// the new signature would otherwise cover the old one.
pub fn sign_file(path: &Path, key: &SigningKey) -> Result<KeyId, TrustError> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;

    match read_trailer(&mut file) {
        Ok(_) => return Err(TrustError::AlreadySigned),
        Err(TrustError::Unsigned) => {}
        Err(e) => return Err(e),
    }

    let len = file.metadata()?.len();
    let digest = payload_digest(&mut file, len)?;
    let signature = key.sign(&digest);
    let id = key_id(&key.verifying_key());

    let mut writer = BufWriter::new(file);
    writer.write_all(&id)?;
    writer.write_all(&signature.to_bytes())?;
    writer.write_all(MAGIC)?;
    writer.flush()?;

    Ok(id)
}

/// Generate a new random signing key.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::from_bytes(&rand::random::<[u8; 32]>())
}

/// Decode a base64 ed25519 public key.
pub fn decode_verifying_key(encoded: &str) -> Result<VerifyingKey, TrustError> {
    let raw = decode_32(encoded, "public key")?;
    VerifyingKey::from_bytes(&raw)
        .map_err(|e| TrustError::InvalidKey(format!("invalid ed25519 public key: {}", e)))
}

/// Decode a base64 ed25519 secret key (32-byte seed).
pub fn decode_signing_key(encoded: &str) -> Result<SigningKey, TrustError> {
    let raw = decode_32(encoded, "secret key")?;
    Ok(SigningKey::from_bytes(&raw))
}

/// Base64 encoding of a public key.
pub fn encode_verifying_key(key: &VerifyingKey) -> String {
    BASE64.encode(key.as_bytes())
}

/// Base64 encoding of a secret key.
pub fn encode_signing_key(key: &SigningKey) -> String {
    BASE64.encode(key.to_bytes())
}

fn decode_32(encoded: &str, what: &str) -> Result<[u8; 32], TrustError> {
    let raw = BASE64
        .decode(encoded.trim())
        .map_err(|_| TrustError::InvalidKey(format!("invalid {} encoding (expected base64)", what)))?;
    raw.try_into()
        .map_err(|_| TrustError::InvalidKey(format!("invalid {} length (expected 32 bytes)", what)))
}
