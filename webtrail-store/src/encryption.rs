//! Field-level at-rest encryption
//!
//! Wraps a configurable subset of properties per node kind in ciphertext
//! envelopes before they reach the codec, and unwraps them on the way
//! back out. AES-256-GCM with a fresh random salt and nonce per call; the
//! per-value key is derived from the session master key via
//! PBKDF2-SHA256 over the value's salt.
//!
//! The master key lives only in memory for the session. It comes from an
//! explicit passphrase (PBKDF2 over a per-device salt) or, absent one, is
//! re-derived deterministically from a device fingerprint. A fingerprint
//! is not a secret, so the fingerprint path offers casual-inspection
//! protection only — kept as the stored format specifies.
//!
//! An uninitialized service passes properties through unchanged in both
//! directions, and a failure on a single field is logged and leaves that
//! field's original value in place rather than aborting the whole node.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::codec::decode_value;
use crate::error::{Result, StoreError};
use crate::model::{NodeKind, PropertyMap};

const ALGORITHM: &str = "AES-256-GCM";
const KEY_DERIVATION: &str = "PBKDF2-SHA256";
/// Iteration count for deriving the session master key
const MASTER_ITERATIONS: u32 = 100_000;
/// Iteration count for deriving a per-value key from the master key
const VALUE_ITERATIONS: u32 = 1_000;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
/// Token cap for the searchable index
const MAX_INDEX_TOKENS: usize = 50;
/// Plaintext of the canary used by passphrase verification
const CANARY: &str = "webtrail-canary";
/// Salt for the fingerprint-derived master key (the fingerprint itself is
/// the only secret-ish input, so this is just a domain separator)
const FINGERPRINT_SALT: &[u8] = b"webtrail-device-key";

/// Structured ciphertext record substituted for an encrypted property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub data: String,
    pub salt: String,
    pub iv: String,
    pub algorithm: String,
    pub key_derivation: String,
    pub iterations: u32,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Structural detection: an object with string `data`/`salt`/`iv`/
    /// `algorithm` fields is treated as an envelope
    pub fn looks_like(value: &Value) -> bool {
        match value {
            Value::Object(map) => ["data", "salt", "iv", "algorithm"]
                .iter()
                .all(|k| matches!(map.get(*k), Some(Value::String(_)))),
            _ => false,
        }
    }
}

/// Inputs hashed together for the no-passphrase key path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFingerprint {
    pub user_agent: String,
    pub screen: String,
    pub timezone: String,
    pub canvas: String,
}

impl DeviceFingerprint {
    fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.user_agent.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.screen.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.timezone.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.canvas.as_bytes());
        hasher.finalize().into()
    }
}

/// Which properties get wrapped for a given node kind
pub fn sensitive_properties(kind: NodeKind) -> &'static [&'static str] {
    match kind {
        NodeKind::Page => &["url", "title", "html", "mhtml", "screenshot", "forms"],
        NodeKind::Session => &["name"],
        NodeKind::User => &["name", "email"],
        NodeKind::Device => &["name"],
        NodeKind::Tag | NodeKind::Domain | NodeKind::Window | NodeKind::Tab => &[],
    }
}

/// Session-scoped encryption service
///
/// Only the key's presence is observable; the key bytes never leave the
/// service and are never persisted.
pub struct EncryptionService {
    master_key: RwLock<Option<[u8; 32]>>,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field(
                "master_key",
                &if self.is_initialized() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .finish()
    }
}

impl Default for EncryptionService {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionService {
    /// Create an uninitialized service: properties pass through unchanged
    /// until a key is derived
    pub fn new() -> Self {
        Self {
            master_key: RwLock::new(None),
        }
    }

    /// Whether a master key has been derived this session
    pub fn is_initialized(&self) -> bool {
        self.master_key.read().is_some()
    }

    /// Derive the master key from an explicit passphrase and the
    /// persisted per-device salt
    pub fn init_with_passphrase(&self, passphrase: &str, device_salt: &[u8]) -> Result<()> {
        if passphrase.is_empty() {
            return Err(StoreError::EncryptionInit("empty passphrase".into()));
        }
        if device_salt.is_empty() {
            return Err(StoreError::EncryptionInit("empty device salt".into()));
        }
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(
            passphrase.as_bytes(),
            device_salt,
            MASTER_ITERATIONS,
            &mut key,
        );
        *self.master_key.write() = Some(key);
        log::info!("Encryption initialized from passphrase");
        Ok(())
    }

    /// Derive the master key deterministically from a device fingerprint
    ///
    /// Used when no passphrase is supplied. The same fingerprint always
    /// yields the same key, which is what makes re-derivation across
    /// sessions possible without persisting key material.
    pub fn init_with_fingerprint(&self, fingerprint: &DeviceFingerprint) -> Result<()> {
        let digest = fingerprint.digest();
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(&digest, FINGERPRINT_SALT, MASTER_ITERATIONS, &mut key);
        *self.master_key.write() = Some(key);
        log::info!("Encryption initialized from device fingerprint");
        Ok(())
    }

    fn master(&self) -> Result<[u8; 32]> {
        (*self.master_key.read()).ok_or(StoreError::EncryptionNotInitialized)
    }

    /// Encrypt one value. Every call draws a fresh salt and nonce, so the
    /// same plaintext never produces the same ciphertext twice.
    pub fn encrypt(&self, plaintext: &str) -> Result<Envelope> {
        let master = self.master()?;

        let mut salt = [0u8; SALT_LEN];
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let value_key = derive_value_key(&master, &salt);
        let cipher = Aes256Gcm::new_from_slice(&value_key)
            .map_err(|e| StoreError::encryption_failed(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| StoreError::encryption_failed(e.to_string()))?;

        Ok(Envelope {
            data: BASE64.encode(ciphertext),
            salt: BASE64.encode(salt),
            iv: BASE64.encode(nonce_bytes),
            algorithm: ALGORITHM.to_string(),
            key_derivation: KEY_DERIVATION.to_string(),
            iterations: VALUE_ITERATIONS,
            timestamp: Utc::now(),
        })
    }

    /// Decrypt one envelope back to its plaintext
    pub fn decrypt(&self, envelope: &Envelope) -> Result<String> {
        let master = self.master()?;
        decrypt_with(&master, envelope)
    }

    /// Wrap each configured sensitive property of `kind` in place
    ///
    /// Uninitialized service: everything passes through unencrypted (the
    /// stored format's permissive fallback). Per-field failures are
    /// logged and leave the plaintext value.
    pub fn encrypt_node_properties(&self, kind: NodeKind, properties: &mut PropertyMap) {
        if !self.is_initialized() {
            log::debug!("Encryption not initialized; {kind} properties stored in plaintext");
            return;
        }

        for field in sensitive_properties(kind) {
            let Some(value) = properties.get(*field) else {
                continue;
            };
            if value.is_null() || Envelope::looks_like(value) {
                continue;
            }
            let plaintext = match value {
                Value::String(s) => s.clone(),
                composite => composite.to_string(),
            };
            match self.encrypt(&plaintext) {
                Ok(envelope) => match serde_json::to_value(&envelope) {
                    Ok(wrapped) => {
                        properties.insert((*field).to_string(), wrapped);
                    }
                    Err(e) => {
                        log::warn!("Could not serialize envelope for {kind}.{field}: {e}");
                    }
                },
                Err(e) => {
                    log::warn!("Encryption failed for {kind}.{field}, leaving plaintext: {e}");
                }
            }
        }
    }

    /// Unwrap every envelope-shaped property in place
    ///
    /// Envelope detection is structural, so this works without knowing
    /// which kind's table produced the value. Failures (including an
    /// uninitialized service) leave the envelope where it is.
    pub fn decrypt_node_properties(&self, properties: &mut PropertyMap) {
        let fields: Vec<String> = properties
            .iter()
            .filter(|(_, v)| Envelope::looks_like(v))
            .map(|(k, _)| k.clone())
            .collect();
        if fields.is_empty() {
            return;
        }
        if !self.is_initialized() {
            log::debug!("Encryption not initialized; leaving {} field(s) encrypted", fields.len());
            return;
        }

        for field in fields {
            let value = properties.get(&field).cloned().unwrap_or(Value::Null);
            let envelope: Envelope = match serde_json::from_value(value) {
                Ok(env) => env,
                Err(e) => {
                    log::warn!("Envelope-shaped value in {field} did not parse: {e}");
                    continue;
                }
            };
            match self.decrypt(&envelope) {
                Ok(plaintext) => {
                    properties.insert(field, decode_value(&plaintext));
                }
                Err(e) => {
                    log::warn!("Decryption failed for {field}, leaving envelope: {e}");
                }
            }
        }
    }

    /// Encrypt a fixed canary for later passphrase verification
    pub fn canary(&self) -> Result<Envelope> {
        self.encrypt(CANARY)
    }

    /// Check a candidate passphrase against a stored canary envelope
    pub fn verify_passphrase(
        &self,
        passphrase: &str,
        device_salt: &[u8],
        canary: &Envelope,
    ) -> Result<()> {
        let mut candidate = [0u8; 32];
        pbkdf2_hmac::<Sha256>(
            passphrase.as_bytes(),
            device_salt,
            MASTER_ITERATIONS,
            &mut candidate,
        );
        match decrypt_with(&candidate, canary) {
            Ok(plaintext) if plaintext == CANARY => Ok(()),
            _ => Err(StoreError::InvalidPassword),
        }
    }

    /// Tokenize text and encrypt each token independently
    ///
    /// Tokens are lowercased, punctuation-split, longer than two
    /// characters, and capped at [`MAX_INDEX_TOKENS`].
    pub fn create_searchable_index(&self, text: &str) -> Result<Vec<Envelope>> {
        let mut seen = std::collections::HashSet::new();
        let mut envelopes = Vec::new();
        for token in tokenize(text) {
            if !seen.insert(token.clone()) {
                continue;
            }
            envelopes.push(self.encrypt(&token)?);
            if envelopes.len() >= MAX_INDEX_TOKENS {
                break;
            }
        }
        Ok(envelopes)
    }

    /// Re-encrypt the query term and byte-compare against stored tokens
    ///
    /// Because every `encrypt` call draws a fresh salt and nonce, the
    /// re-encrypted term essentially never matches a previously stored
    /// ciphertext — equality search over this index does not work as
    /// stored. The code path is kept as-is; switching index tokens to a
    /// keyed deterministic hash would be a format change.
    pub fn search_encrypted_index(&self, term: &str, stored: &[Envelope]) -> Result<bool> {
        let needle = self.encrypt(&term.to_lowercase())?;
        Ok(stored.iter().any(|env| env.data == needle.data))
    }
}

fn derive_value_key(master: &[u8; 32], salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(master, salt, VALUE_ITERATIONS, &mut key);
    key
}

fn decrypt_with(master: &[u8; 32], envelope: &Envelope) -> Result<String> {
    let salt = BASE64
        .decode(&envelope.salt)
        .map_err(|e| StoreError::decryption_failed(format!("bad salt: {e}")))?;
    let nonce_bytes = BASE64
        .decode(&envelope.iv)
        .map_err(|e| StoreError::decryption_failed(format!("bad iv: {e}")))?;
    let ciphertext = BASE64
        .decode(&envelope.data)
        .map_err(|e| StoreError::decryption_failed(format!("bad data: {e}")))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(StoreError::decryption_failed("bad iv length"));
    }

    let value_key = derive_value_key(master, &salt);
    let cipher = Aes256Gcm::new_from_slice(&value_key)
        .map_err(|e| StoreError::decryption_failed(e.to_string()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| StoreError::decryption_failed("authentication failed"))?;

    String::from_utf8(plaintext).map_err(|e| StoreError::decryption_failed(e.to_string()))
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() > 2)
        .map(String::from)
        .collect()
}
