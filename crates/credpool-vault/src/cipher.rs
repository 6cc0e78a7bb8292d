// SPDX-FileCopyrightText: 2026 Credpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret cipher: passphrase to key, and AES-256-GCM seal/open of secrets.
//!
//! Every [`encrypt`] call draws a fresh random 96-bit nonce from the system
//! CSPRNG and embeds it in the returned [`SealedSecret`]. This module does
//! no I/O.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use credpool_core::VaultError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::kdf::{self, KdfParams, Salt};

/// GCM authentication tag length.
const TAG_LEN: usize = 16;

/// Known plaintext sealed at vault creation to verify the passphrase on unlock.
pub(crate) const KEY_CHECK_PLAINTEXT: &[u8] = b"credpool-key-check-v1";

/// The derived vault key. Only ever held in memory; zeroized on drop.
pub struct VaultKey(Zeroizing<[u8; 32]>);

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

impl VaultKey {
    fn aead(&self) -> Result<LessSafeKey, VaultError> {
        let unbound = UnboundKey::new(&AES_256_GCM, self.0.as_ref())
            .map_err(|_| VaultError::Crypto("failed to create AES-256-GCM key".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }
}

/// An encrypted secret: nonce plus ciphertext-with-tag.
///
/// Persisted as a single base64 string of `nonce || ciphertext || tag`.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedSecret {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl SealedSecret {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Split a persisted blob. `None` if it is too short to hold a nonce and tag.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        Some(Self {
            nonce: nonce.try_into().ok()?,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

impl std::fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedSecret")
            .field("len", &self.ciphertext.len())
            .finish()
    }
}

impl Serialize for SealedSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for SealedSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| D::Error::custom(format!("sealed secret is not base64: {e}")))?;
        Self::from_bytes(&bytes)
            .ok_or_else(|| D::Error::custom("sealed secret is shorter than nonce + tag"))
    }
}

/// Create key material for a brand-new vault: a fresh salt and the key it yields.
///
/// The caller persists the salt; refusing to overwrite an existing salt is
/// the store's job ([`crate::store::CredentialStore::write_salt`]).
pub fn initialize(
    passphrase: &SecretString,
    params: &KdfParams,
) -> Result<(Salt, VaultKey), VaultError> {
    let salt = Salt::generate()?;
    let key = derive(passphrase, &salt, params)?;
    Ok((salt, key))
}

/// Re-derive the key for an existing vault and verify it against `probe`.
///
/// Derivation itself cannot detect a wrong passphrase, so `probe` (the
/// key-check record, or any stored secret) must open cleanly. With no probe
/// the key is returned unverified.
pub fn unlock(
    passphrase: &SecretString,
    salt: &Salt,
    params: &KdfParams,
    probe: Option<&SealedSecret>,
) -> Result<VaultKey, VaultError> {
    let key = derive(passphrase, salt, params)?;
    if let Some(sealed) = probe {
        decrypt(&key, sealed).map_err(|_| VaultError::InvalidPassphrase)?;
    }
    Ok(key)
}

fn derive(passphrase: &SecretString, salt: &Salt, params: &KdfParams) -> Result<VaultKey, VaultError> {
    kdf::derive_key(passphrase.expose_secret().as_bytes(), salt, params).map(VaultKey)
}

/// Authenticated encryption of `plaintext` under a fresh random nonce.
pub fn encrypt(key: &VaultKey, plaintext: &[u8]) -> Result<SealedSecret, VaultError> {
    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| VaultError::Crypto("failed to generate random nonce".to_string()))?;

    // Seal in place: the buffer is extended with the authentication tag.
    let mut in_out = plaintext.to_vec();
    key.aead()?
        .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| VaultError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    Ok(SealedSecret {
        nonce,
        ciphertext: in_out,
    })
}

/// Open a sealed secret. Any integrity mismatch yields `DecryptionFailed`
/// and no plaintext.
pub fn decrypt(key: &VaultKey, sealed: &SealedSecret) -> Result<Zeroizing<Vec<u8>>, VaultError> {
    let mut in_out = Zeroizing::new(sealed.ciphertext.clone());
    let plaintext_len = key
        .aead()?
        .open_in_place(
            Nonce::assume_unique_for_key(sealed.nonce),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| VaultError::DecryptionFailed)?
        .len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}

/// Encrypt a secret string.
pub fn encrypt_secret(key: &VaultKey, secret: &SecretString) -> Result<SealedSecret, VaultError> {
    encrypt(key, secret.expose_secret().as_bytes())
}

/// Decrypt to a secret string. Non-UTF-8 plaintext counts as a failed integrity check.
pub fn decrypt_secret(key: &VaultKey, sealed: &SealedSecret) -> Result<SecretString, VaultError> {
    let plaintext = decrypt(key, sealed)?;
    let text = std::str::from_utf8(&plaintext).map_err(|_| VaultError::DecryptionFailed)?;
    Ok(SecretString::from(text.to_string()))
}
