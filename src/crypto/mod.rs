//! # Credentials and cryptographic primitives
//!
//! The cloud endpoint authenticates devices with a short-lived JSON Web Token signed
//! by the device's EC P-256 key. Hashing and signing are provided by the board
//! support package through [`Crypto`], since the key often lives in a secure element;
//! the token formatting and URL-safe base64 happen here.
//!
//! ```text
//!   b64url(header) . b64url(claims) . b64url(ecc_sign(sha256(b64url(header) . b64url(claims))))
//! ```
//!
//! ```rust
//! use libiotc::crypto::{decode_urlsafe, encode_urlsafe};
//!
//! let mut encoded = [0u8; 16];
//! let text = encode_urlsafe(&[0xfb, 0xff, 0xfe], &mut encoded).unwrap();
//! assert_eq!(text, "-__-");
//!
//! let mut decoded = [0u8; 3];
//! assert_eq!(decode_urlsafe(text.as_bytes(), &mut decoded).unwrap(), &[0xfb, 0xff, 0xfe]);
//! ```

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// ES256 JSON Web Token construction
pub mod jwt;

use alloc::string::String;
use alloc::vec::Vec;

use base64ct::{Base64UrlUnpadded, Encoding};

use crate::error::State;

pub use jwt::create_jwt_es256;

/// Length of an ES256 signature in its `r || s` form.
pub const ES256_SIGNATURE_LEN: usize = 64;

/// Errors reported by the crypto primitives.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CryptoError {
    /// The output buffer is too small; `required` bytes are needed.
    BufferTooSmall { required: usize },
    /// The private key could not be parsed.
    KeyParse,
    /// The input is malformed.
    InvalidInput,
    /// Any other failure of the primitive.
    Failed,
}

impl From<CryptoError> for State {
    fn from(error: CryptoError) -> Self {
        match error {
            CryptoError::BufferTooSmall { .. } => State::BufferTooSmall,
            CryptoError::InvalidInput => State::InvalidParameter,
            CryptoError::KeyParse | CryptoError::Failed => State::JwtFormation,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CryptoError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            CryptoError::BufferTooSmall { required } => defmt::write!(f, "BufferTooSmall({})", required),
            CryptoError::KeyParse => defmt::write!(f, "KeyParse"),
            CryptoError::InvalidInput => defmt::write!(f, "InvalidInput"),
            CryptoError::Failed => defmt::write!(f, "Failed"),
        }
    }
}

/// Signature algorithms a key can be used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// ECDSA over P-256 with SHA-256.
    Es256,
}

/// Where the private key material lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyData {
    /// PEM-encoded key text.
    Pem(String),
    /// Slot of a secure element holding the key.
    Slot(u8),
    /// Platform-specific key descriptor.
    Custom(Vec<u8>),
}

/// Private key descriptor handed to [`Crypto::ecc_sign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub algorithm: SignatureAlgorithm,
    pub data: KeyData,
}

impl PrivateKey {
    /// ES256 key from PEM text.
    pub fn pem(text: &str) -> Self {
        Self { algorithm: SignatureAlgorithm::Es256, data: KeyData::Pem(String::from(text)) }
    }

    /// ES256 key held in a secure element slot.
    pub fn slot(slot: u8) -> Self {
        Self { algorithm: SignatureAlgorithm::Es256, data: KeyData::Slot(slot) }
    }

    /// `true` when there is no key material to sign with.
    pub fn is_empty(&self) -> bool {
        match &self.data {
            KeyData::Pem(text) => text.is_empty(),
            KeyData::Slot(_) => false,
            KeyData::Custom(bytes) => bytes.is_empty(),
        }
    }
}

/// Hashing and signing provided by the board support package.
pub trait Crypto {
    /// SHA-256 digest of `data`.
    fn sha256(&mut self, data: &[u8]) -> Result<[u8; 32], CryptoError>;

    /// Signs a 32-byte digest, writing the `r || s` signature into `signature` and
    /// returning its length.
    fn ecc_sign(&mut self, key: &PrivateKey, digest: &[u8; 32], signature: &mut [u8]) -> Result<usize, CryptoError>;
}

/// Length of the unpadded URL-safe base64 encoding of `len` bytes.
pub const fn encoded_len(len: usize) -> usize {
    (len * 4).div_ceil(3)
}

/// Encodes `src` as unpadded URL-safe base64 into `dst`.
///
/// When `dst` is too short the error reports the required size.
pub fn encode_urlsafe<'a>(src: &[u8], dst: &'a mut [u8]) -> Result<&'a str, CryptoError> {
    let required = encoded_len(src.len());
    if dst.len() < required {
        return Err(CryptoError::BufferTooSmall { required });
    }
    Base64UrlUnpadded::encode(src, dst).map_err(|_| CryptoError::BufferTooSmall { required })
}

/// Appends the unpadded URL-safe base64 encoding of `src` to `out`.
pub fn encode_urlsafe_into(src: &[u8], out: &mut String) -> Result<(), State> {
    let mut scratch = Vec::new();
    scratch
        .try_reserve_exact(encoded_len(src.len()))
        .map_err(|_| State::OutOfMemory)?;
    scratch.resize(encoded_len(src.len()), 0);
    let text = encode_urlsafe(src, &mut scratch)?;
    out.try_reserve(text.len()).map_err(|_| State::OutOfMemory)?;
    out.push_str(text);
    Ok(())
}

/// Decodes unpadded URL-safe base64 from `src` into `dst`.
pub fn decode_urlsafe<'a>(src: &[u8], dst: &'a mut [u8]) -> Result<&'a [u8], CryptoError> {
    let required = src.len() * 3 / 4;
    if dst.len() < required {
        return Err(CryptoError::BufferTooSmall { required });
    }
    Base64UrlUnpadded::decode(src, dst).map_err(|_| CryptoError::InvalidInput)
}
