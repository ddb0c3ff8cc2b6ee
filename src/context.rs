//! Component C: Crypto Contexts.
//!
//! A `CryptoContext` produces a fresh 32-byte data key for every object put
//! (`get_encryption_data_key`) and recovers it again at get time
//! (`get_decryption_data_key`), wrapping/unwrapping the key under a
//! longer-lived key-encryption key the three variants disagree about how to
//! reach: a local AES key (`Symmetric`), a local RSA key pair
//! (`Asymmetric`), or a remote `KeyManagementService` (`Kms`, `MockKms`).
//!
//! Grounded on `examples/mrcord77-rust_citadel/citadel-keystore/src/keystore.rs`
//! for the `async fn` capability-method shape (`Keystore::generate`,
//! `::activate`, ...) even where a given variant does no actual awaiting,
//! and on `citadel_keystore::storage::InMemoryBackend` for the `MockKms`
//! in-memory test double.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use async_trait::async_trait;
use rand_core::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::cipher::AES_256_KEY_LEN;
use crate::error::{ContextError, MissingKmsKey};
use crate::metadata::WrapAlg;

/// A freshly generated 32-byte content encryption key, zeroized on drop.
pub type RawDataKey = Zeroizing<[u8; AES_256_KEY_LEN]>;

fn fresh_key() -> RawDataKey {
    let mut key = [0u8; AES_256_KEY_LEN];
    rand_core::OsRng.fill_bytes(&mut key);
    Zeroizing::new(key)
}

/// The output of [`CryptoContext::get_encryption_data_key`]: the plaintext
/// key to use for this object, its wrapped form, and the material
/// description to persist alongside it.
pub struct EncryptionDataKey {
    pub raw_key: RawDataKey,
    pub material_description: BTreeMap<String, String>,
    pub wrapped_key: Vec<u8>,
    /// The key-wrap algorithm this context used, reported so the caller can
    /// write it into `x-amz-wrap-alg` without having to downcast
    /// `dyn CryptoContext` to figure out which variant produced the key.
    pub wrap_alg: WrapAlg,
}

/// Common contract for all three key-wrapping strategies. Async throughout
/// because `Kms` has to make a real network call; `Symmetric` and
/// `Asymmetric` are synchronous under the hood and simply never yield.
#[async_trait]
pub trait CryptoContext: Send + Sync {
    async fn get_encryption_data_key(&self) -> Result<EncryptionDataKey, ContextError>;

    async fn get_decryption_data_key(
        &self,
        material_description: &BTreeMap<String, String>,
        wrapped_key: &[u8],
    ) -> Result<RawDataKey, ContextError>;
}

/// Capability a `Kms` / `MockKms` crypto context delegates key generation
/// and unwrapping to. Object-safe via `async-trait` so the facade and
/// orchestrators can hold `Arc<dyn KeyManagementService>`.
#[async_trait]
pub trait KeyManagementService: Send + Sync {
    async fn generate_data_key(
        &self,
        key_id: &str,
        encryption_context: &BTreeMap<String, String>,
    ) -> Result<(Vec<u8>, Vec<u8>), ContextError>;

    async fn decrypt(
        &self,
        ciphertext_blob: &[u8],
        encryption_context: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, ContextError>;
}

// ---------------------------------------------------------------------------
// Symmetric: local AES key-wrap (RFC 3394) under a caller-supplied key.
// ---------------------------------------------------------------------------

/// Wraps fresh data keys under a single long-lived AES key the caller
/// supplies out of band. `material_description` passes through unchanged
/// (defaults to an empty map).
pub struct Symmetric {
    kek: [u8; AES_256_KEY_LEN],
    material_description: BTreeMap<String, String>,
}

impl Symmetric {
    pub fn new(kek: [u8; AES_256_KEY_LEN]) -> Self {
        Self {
            kek,
            material_description: BTreeMap::new(),
        }
    }

    pub fn with_material_description(mut self, matdesc: BTreeMap<String, String>) -> Self {
        self.material_description = matdesc;
        self
    }
}

#[async_trait]
impl CryptoContext for Symmetric {
    async fn get_encryption_data_key(&self) -> Result<EncryptionDataKey, ContextError> {
        let raw_key = fresh_key();
        let wrapped_key = aes_wrap(&self.kek, &raw_key)?;
        Ok(EncryptionDataKey {
            raw_key,
            material_description: self.material_description.clone(),
            wrapped_key,
            wrap_alg: WrapAlg::AesWrap,
        })
    }

    async fn get_decryption_data_key(
        &self,
        _material_description: &BTreeMap<String, String>,
        wrapped_key: &[u8],
    ) -> Result<RawDataKey, ContextError> {
        let plain = aes_unwrap(&self.kek, wrapped_key)?;
        Ok(Zeroizing::new(plain))
    }
}

fn aes_wrap(kek: &[u8; AES_256_KEY_LEN], key: &[u8; AES_256_KEY_LEN]) -> Result<Vec<u8>, ContextError> {
    use aes_kw::KekAes256;
    let kek = KekAes256::new(kek.into());
    kek.wrap_vec(key)
        .map_err(|e| ContextError(alloc::format!("AES key wrap failed: {e:?}")))
}

fn aes_unwrap(
    kek: &[u8; AES_256_KEY_LEN],
    wrapped: &[u8],
) -> Result<[u8; AES_256_KEY_LEN], ContextError> {
    use aes_kw::KekAes256;
    let kek = KekAes256::new(kek.into());
    let plain = kek
        .unwrap_vec(wrapped)
        .map_err(|e| ContextError(alloc::format!("AES key unwrap failed: {e:?}")))?;
    if plain.len() != AES_256_KEY_LEN {
        return Err(ContextError("AES key unwrap produced wrong length".to_string()));
    }
    let mut out = [0u8; AES_256_KEY_LEN];
    out.copy_from_slice(&plain);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Asymmetric: RSA-OAEP(SHA-256) wrap under a caller-supplied key pair.
// ---------------------------------------------------------------------------

pub struct Asymmetric {
    public_key: RsaPublicKey,
    private_key: Option<RsaPrivateKey>,
}

impl Asymmetric {
    /// Construct an encrypt-only context from a public key.
    pub fn for_encryption(public_key: RsaPublicKey) -> Self {
        Self {
            public_key,
            private_key: None,
        }
    }

    /// Construct an encrypt+decrypt context from a full key pair.
    pub fn for_key_pair(private_key: RsaPrivateKey) -> Self {
        let public_key = private_key.to_public_key();
        Self {
            public_key,
            private_key: Some(private_key),
        }
    }
}

#[async_trait]
impl CryptoContext for Asymmetric {
    async fn get_encryption_data_key(&self) -> Result<EncryptionDataKey, ContextError> {
        let raw_key = fresh_key();
        let mut rng = rand_core::OsRng;
        let wrapped_key = self
            .public_key
            .encrypt(&mut rng, Oaep::new::<Sha256>(), raw_key.as_slice())?;
        Ok(EncryptionDataKey {
            raw_key,
            material_description: BTreeMap::new(),
            wrapped_key,
            wrap_alg: WrapAlg::RsaOaepSha256,
        })
    }

    async fn get_decryption_data_key(
        &self,
        _material_description: &BTreeMap<String, String>,
        wrapped_key: &[u8],
    ) -> Result<RawDataKey, ContextError> {
        let private_key = self
            .private_key
            .as_ref()
            .ok_or_else(|| ContextError("Asymmetric context has no private key for decryption".to_string()))?;
        let plain = private_key.decrypt(Oaep::new::<Sha256>(), wrapped_key)?;
        if plain.len() != AES_256_KEY_LEN {
            return Err(ContextError("unwrapped RSA payload is not a 32-byte key".to_string()));
        }
        let mut key = [0u8; AES_256_KEY_LEN];
        key.copy_from_slice(&plain);
        Ok(Zeroizing::new(key))
    }
}

// ---------------------------------------------------------------------------
// Kms: delegates to a `KeyManagementService` implementation.
// ---------------------------------------------------------------------------

const KMS_CONTEXT_KEY: &str = "kms_cmk_id";

pub struct Kms {
    kms: Arc<dyn KeyManagementService>,
    key_id: Option<String>,
}

impl Kms {
    pub fn new(kms: Arc<dyn KeyManagementService>, key_id: Option<String>) -> Self {
        Self { kms, key_id }
    }
}

#[async_trait]
impl CryptoContext for Kms {
    async fn get_encryption_data_key(&self) -> Result<EncryptionDataKey, ContextError> {
        let key_id = self.key_id.as_ref().ok_or(MissingKmsKey)?;
        let mut encryption_context = BTreeMap::new();
        encryption_context.insert(KMS_CONTEXT_KEY.to_string(), key_id.clone());

        let (plaintext, ciphertext_blob) = self.kms.generate_data_key(key_id, &encryption_context).await?;
        if plaintext.len() != AES_256_KEY_LEN {
            return Err(ContextError("KMS GenerateDataKey returned unexpected plaintext length".to_string()));
        }
        let mut raw = [0u8; AES_256_KEY_LEN];
        raw.copy_from_slice(&plaintext);

        Ok(EncryptionDataKey {
            raw_key: Zeroizing::new(raw),
            material_description: encryption_context,
            wrapped_key: ciphertext_blob,
            wrap_alg: WrapAlg::Kms,
        })
    }

    async fn get_decryption_data_key(
        &self,
        material_description: &BTreeMap<String, String>,
        wrapped_key: &[u8],
    ) -> Result<RawDataKey, ContextError> {
        let plain = self.kms.decrypt(wrapped_key, material_description).await?;
        if plain.len() != AES_256_KEY_LEN {
            return Err(ContextError("KMS Decrypt returned unexpected plaintext length".to_string()));
        }
        let mut raw = [0u8; AES_256_KEY_LEN];
        raw.copy_from_slice(&plain);
        Ok(Zeroizing::new(raw))
    }
}

impl From<MissingKmsKey> for ContextError {
    fn from(e: MissingKmsKey) -> Self {
        ContextError(e.to_string())
    }
}

/// In-process `KeyManagementService` test double, grounded on
/// `citadel_keystore::storage::InMemoryBackend`'s `Arc<Mutex<...>>`-guarded
/// map shape. Keeps a fixed data key per `key_id` rather than a real KMS's
/// random key per call, which is what makes the `MockKms` test double
/// deterministic and therefore useful for fixture-based tests.
pub struct MockKms {
    keys: std::sync::Mutex<BTreeMap<String, [u8; AES_256_KEY_LEN]>>,
}

impl Default for MockKms {
    fn default() -> Self {
        Self::new()
    }
}

impl MockKms {
    pub fn new() -> Self {
        Self {
            keys: std::sync::Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a deterministic data key for `key_id`, used by tests that
    /// need a known plaintext to assert against.
    pub fn set_key(&self, key_id: impl Into<String>, key: [u8; AES_256_KEY_LEN]) {
        self.keys.lock().unwrap().insert(key_id.into(), key);
    }
}

#[async_trait]
impl KeyManagementService for MockKms {
    async fn generate_data_key(
        &self,
        key_id: &str,
        _encryption_context: &BTreeMap<String, String>,
    ) -> Result<(Vec<u8>, Vec<u8>), ContextError> {
        let mut keys = self.keys.lock().unwrap();
        let key = *keys.entry(key_id.to_string()).or_insert_with(|| {
            let mut k = [0u8; AES_256_KEY_LEN];
            rand_core::OsRng.fill_bytes(&mut k);
            k
        });
        drop(keys);
        // The "ciphertext blob" for the mock is the key_id tagged onto the
        // plaintext so `decrypt` below can look it back up without a real
        // wrapping scheme; this is a test fixture, not a security property.
        let mut blob = key_id.as_bytes().to_vec();
        blob.push(0);
        blob.extend_from_slice(&key);
        Ok((key.to_vec(), blob))
    }

    async fn decrypt(
        &self,
        ciphertext_blob: &[u8],
        _encryption_context: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, ContextError> {
        let sep = ciphertext_blob
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ContextError("malformed MockKms ciphertext blob".to_string()))?;
        Ok(ciphertext_blob[sep + 1..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn symmetric_roundtrips() {
        let ctx = Symmetric::new([0x55; AES_256_KEY_LEN]);
        let enc = ctx.get_encryption_data_key().await.unwrap();
        let recovered = ctx
            .get_decryption_data_key(&enc.material_description, &enc.wrapped_key)
            .await
            .unwrap();
        assert_eq!(*recovered, *enc.raw_key);
    }

    #[tokio::test]
    async fn asymmetric_roundtrips() {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let ctx = Asymmetric::for_key_pair(private);
        let enc = ctx.get_encryption_data_key().await.unwrap();
        assert_eq!(enc.wrapped_key.len(), 128);
        let recovered = ctx
            .get_decryption_data_key(&enc.material_description, &enc.wrapped_key)
            .await
            .unwrap();
        assert_eq!(*recovered, *enc.raw_key);
    }

    #[tokio::test]
    async fn kms_roundtrips_through_mock() {
        let mock = Arc::new(MockKms::new());
        let ctx = Kms::new(mock, Some("alias/test".to_string()));
        let enc = ctx.get_encryption_data_key().await.unwrap();
        assert_eq!(enc.material_description.get(KMS_CONTEXT_KEY).unwrap(), "alias/test");
        let recovered = ctx
            .get_decryption_data_key(&enc.material_description, &enc.wrapped_key)
            .await
            .unwrap();
        assert_eq!(*recovered, *enc.raw_key);
    }

    #[tokio::test]
    async fn kms_without_key_id_rejects_encryption() {
        let mock = Arc::new(MockKms::new());
        let ctx = Kms::new(mock, None);
        let err = ctx.get_encryption_data_key().await.unwrap_err();
        assert_eq!(err.0, MissingKmsKey.to_string());
    }
}
