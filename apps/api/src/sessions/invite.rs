//! Signed interview invites.
//!
//! Format: `<base64url(json claims)>.<hex(hmac-sha256(secret, first part))>`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteClaims {
    pub job_code: String,
    pub email: String,
    /// Expiry as a unix timestamp (seconds).
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum InviteError {
    #[error("invite token is malformed")]
    Malformed,
    #[error("invite signature is invalid")]
    BadSignature,
    #[error("invite has expired")]
    Expired,
}

fn mac_for(secret: &str, payload: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(payload.as_bytes());
    mac
}

pub fn verify_invite(
    secret: &str,
    token: &str,
    now: DateTime<Utc>,
) -> Result<InviteClaims, InviteError> {
    let (payload, signature) = token.trim().split_once('.').ok_or(InviteError::Malformed)?;
    let signature = hex::decode(signature).map_err(|_| InviteError::Malformed)?;

    mac_for(secret, payload)
        .verify_slice(&signature)
        .map_err(|_| InviteError::BadSignature)?;

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| InviteError::Malformed)?;
    let claims: InviteClaims = serde_json::from_slice(&json).map_err(|_| InviteError::Malformed)?;

    if claims.exp <= now.timestamp() {
        return Err(InviteError::Expired);
    }
    Ok(claims)
}

#[cfg(test)]
pub fn sign_invite(secret: &str, claims: &InviteClaims) -> String {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    let signature = hex::encode(mac_for(secret, &payload).finalize().into_bytes());
    format!("{payload}.{signature}")
}
