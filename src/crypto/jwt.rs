use alloc::string::String;

use log::debug;
use serde::Serialize;

use super::{Crypto, ES256_SIGNATURE_LEN, PrivateKey, encode_urlsafe_into, encoded_len};
use crate::error::State;

/// Longest project id accepted in the audience claim.
pub const PROJECT_ID_MAX_LEN: usize = 200;

const HEADER_BUF_SIZE: usize = 40;
const CLAIMS_BUF_SIZE: usize = 256;

#[derive(Serialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
}

#[derive(Serialize)]
struct Claims<'a> {
    iat: u64,
    exp: u64,
    aud: &'a str,
}

/// Builds an ES256-signed JWT for `project_id`, valid from `issued_at` (Unix seconds)
/// for `expiration` seconds.
///
/// # Errors
///
/// * [`State::NullProjectId`] for an empty project id
/// * [`State::JwtProjectIdTooLong`] beyond [`PROJECT_ID_MAX_LEN`] bytes
/// * [`State::NullKeyData`] for a key without material
/// * [`State::BufferTooSmall`], [`State::InvalidParameter`] or
///   [`State::JwtFormation`] when hashing or signing fails
pub fn create_jwt_es256<C: Crypto + ?Sized>(
    crypto: &mut C,
    project_id: &str,
    issued_at: u64,
    expiration: u32,
    key: &PrivateKey,
) -> Result<String, State> {
    if project_id.is_empty() {
        return Err(State::NullProjectId);
    }
    if project_id.len() > PROJECT_ID_MAX_LEN {
        return Err(State::JwtProjectIdTooLong);
    }
    if key.is_empty() {
        return Err(State::NullKeyData);
    }

    let mut header = [0u8; HEADER_BUF_SIZE];
    let header_len = serde_json_core::to_slice(&Header { alg: "ES256", typ: "JWT" }, &mut header)
        .map_err(|_| State::JwtFormation)?;

    let claims = Claims {
        iat: issued_at,
        exp: issued_at.saturating_add(u64::from(expiration)),
        aud: project_id,
    };
    let mut claims_json = [0u8; CLAIMS_BUF_SIZE];
    let claims_len = serde_json_core::to_slice(&claims, &mut claims_json)
        .map_err(|_| State::JwtFormation)?;

    let mut token = String::new();
    token
        .try_reserve(
            encoded_len(header_len) + encoded_len(claims_len) + encoded_len(ES256_SIGNATURE_LEN) + 2,
        )
        .map_err(|_| State::OutOfMemory)?;
    encode_urlsafe_into(&header[..header_len], &mut token)?;
    token.push('.');
    encode_urlsafe_into(&claims_json[..claims_len], &mut token)?;

    let digest = crypto.sha256(token.as_bytes())?;
    let mut signature = [0u8; ES256_SIGNATURE_LEN];
    let signature_len = crypto.ecc_sign(key, &digest, &mut signature)?;
    let signature = signature.get(..signature_len).ok_or(State::JwtFormation)?;

    token.push('.');
    encode_urlsafe_into(signature, &mut token)?;
    debug!("created JWT for {} valid {}s", project_id, expiration);
    Ok(token)
}
