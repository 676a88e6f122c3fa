// SPDX-License-Identifier: EUPL-1.2

//! Caller identity, as asserted by the external identity provider.
//!
//! Every request carries:
//!
//! - `X-Portal-Identity` — the authenticated identity, e.g. `jane@bhel.com`
//! - `X-Portal-Role`     — one of `developer`, `reviewer`, `hod`, `dtg`, `cdt`, `hosting`, `admin`
//! - `X-Portal-Signature` — base64url Ed25519 signature by the identity provider,
//!   required when `IDENTITY_PUBLIC_KEY` is configured
//!
//! ## Canonical message format
//!
//! ```text
//! hosting-portal:identity:{identity}:{role}
//! ```

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::{
    db::AppState,
    error::WorkflowError,
    models::{Actor, Role},
};

pub const IDENTITY_HEADER: &str = "x-portal-identity";
pub const ROLE_HEADER: &str = "x-portal-role";
pub const SIGNATURE_HEADER: &str = "x-portal-signature";

/// Decode a base64url-encoded 32-byte Ed25519 public key.
pub fn decode_public_key(public_key_b64: &str) -> Result<VerifyingKey, String> {
    let pk_bytes = URL_SAFE_NO_PAD
        .decode(public_key_b64.trim())
        .map_err(|e| format!("bad public key encoding: {e}"))?;

    let pk_bytes: [u8; 32] = pk_bytes
        .try_into()
        .map_err(|_| "public key must be 32 bytes".to_string())?;

    VerifyingKey::from_bytes(&pk_bytes).map_err(|e| format!("invalid public key: {e}"))
}

/// Verify a base64url Ed25519 signature over `message`.
pub fn verify_signature(
    key: &VerifyingKey,
    message: &str,
    signature_b64: &str,
) -> Result<(), String> {
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(signature_b64.trim())
        .map_err(|e| format!("bad signature encoding: {e}"))?;

    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| "signature must be 64 bytes".to_string())?;

    let signature = Signature::from_bytes(&sig_bytes);

    key.verify(message.as_bytes(), &signature)
        .map_err(|e| format!("signature verification failed: {e}"))
}

/// Build the canonical message the identity provider signs.
pub fn identity_message(identity: &str, role: Role) -> String {
    format!("hosting-portal:identity:{identity}:{role}")
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = WorkflowError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let identity = header(parts, IDENTITY_HEADER).ok_or_else(|| {
            WorkflowError::Unauthenticated(format!("missing {IDENTITY_HEADER} header"))
        })?;
        let role: Role = header(parts, ROLE_HEADER)
            .ok_or_else(|| WorkflowError::Unauthenticated(format!("missing {ROLE_HEADER} header")))?
            .parse()
            .map_err(WorkflowError::Unauthenticated)?;

        if let Some(key) = &state.identity_key {
            let signature = header(parts, SIGNATURE_HEADER).ok_or_else(|| {
                WorkflowError::Unauthenticated(format!("missing {SIGNATURE_HEADER} header"))
            })?;
            verify_signature(key, &identity_message(identity, role), signature)
                .map_err(WorkflowError::Unauthenticated)?;
        }

        Ok(Actor::new(identity, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn idp_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn accepts_signature_from_identity_provider() {
        let signing = idp_key();
        let public = URL_SAFE_NO_PAD.encode(signing.verifying_key().to_bytes());
        let key = decode_public_key(&public).unwrap();

        let message = identity_message("jane@bhel.com", Role::Reviewer);
        let signature = URL_SAFE_NO_PAD.encode(signing.sign(message.as_bytes()).to_bytes());

        assert!(verify_signature(&key, &message, &signature).is_ok());
    }

    #[test]
    fn rejects_signature_for_a_different_role() {
        let signing = idp_key();
        let key = signing.verifying_key();

        let signed = identity_message("jane@bhel.com", Role::Reviewer);
        let signature = URL_SAFE_NO_PAD.encode(signing.sign(signed.as_bytes()).to_bytes());

        let claimed = identity_message("jane@bhel.com", Role::Admin);
        assert!(verify_signature(&key, &claimed, &signature).is_err());
    }

    #[test]
    fn rejects_malformed_inputs() {
        assert!(decode_public_key("not base64!").is_err());
        assert!(decode_public_key(&URL_SAFE_NO_PAD.encode([1u8; 16])).is_err());

        let key = idp_key().verifying_key();
        let short = URL_SAFE_NO_PAD.encode([0u8; 10]);
        assert!(verify_signature(&key, "m", &short).is_err());
    }

    #[test]
    fn canonical_message_format() {
        assert_eq!(
            identity_message("hod@bhel.com", Role::Hod),
            "hosting-portal:identity:hod@bhel.com:hod"
        );
    }
}
