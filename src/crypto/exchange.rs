// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static ECDH session key agreement.
//!
//! Both participants compute
//! `HKDF-SHA256(ikm = X25519(own_private, peer_public), salt = SHA-256(chat_id))`
//! and arrive at the same 32-byte session key. Binding the chat id means two
//! conversations between the same pair never share a key.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::keys::{PrivateKey, PublicKey, SessionKey};
use super::secret::{SecretKey32, KEY_LEN};
use super::CryptoError;

const SESSION_KEY_INFO: &[u8] = b"sealed-chat/session-key/v1";

/// Per-chat derivation context.
pub fn chat_context(chat_id: &str) -> [u8; 32] {
    Sha256::digest(chat_id.as_bytes()).into()
}

/// Derive the session key for `chat_id` between `own` and `peer`.
pub fn derive_session_key(
    own: &PrivateKey,
    peer: &PublicKey,
    chat_id: &str,
) -> Result<SessionKey, CryptoError> {
    let secret = own.to_static_secret();
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(*peer.as_bytes()));
    if !shared.was_contributory() {
        return Err(CryptoError::KeyDerivation(
            "peer public key is a low-order point".into(),
        ));
    }

    let context = chat_context(chat_id);
    let hk = Hkdf::<Sha256>::new(Some(&context[..]), shared.as_bytes());
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(SESSION_KEY_INFO, okm.as_mut())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(SessionKey::from_secret(SecretKey32::from_bytes(*okm)))
}
