//! Component B: Content Cipher.
//!
//! Implements the two content encryption algorithms S3 Encryption Client
//! objects carry: AES-256-GCM (no AAD, 16-byte tag appended to the
//! ciphertext) and AES-256-CBC with PKCS#7 padding. Also implements ranged
//! decryption of GCM ciphertext by reinterpreting AES-GCM as AES-CTR over
//! the already-authenticated byte range the caller chose to fetch — CBC has
//! no such mode and rejects ranged reads outright.
//!
//! Grounded on `examples/original_source/aioboto3/s3/cse.py`
//! (`_get_adjusted_crypto_range`, `_get_cipher`, the `j0`/counter-block
//! arithmetic) and on the teacher's `citadel-envelope::aead` module for the
//! aes-gcm crate usage pattern.

use alloc::vec::Vec;

use aes::Aes256;
use aes_gcm::aead::{Aead, KeyInit as AeadKeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce as GcmNonce};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use ctr::cipher::StreamCipher;

use crate::error::DecryptError;

pub const GCM_IV_LEN: usize = 12;
pub const GCM_TAG_LEN: usize = 16;
pub const CBC_IV_LEN: usize = 16;
pub const AES_BLOCK_LEN: usize = 16;
pub const AES_256_KEY_LEN: usize = 32;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256Ctr = ctr::Ctr32BE<Aes256>;

/// Encrypt `plaintext` under AES-256-GCM with a 12-byte IV and no
/// associated data, matching the wire format: ciphertext || 16-byte tag.
pub fn gcm_encrypt(key: &[u8; AES_256_KEY_LEN], iv: &[u8; GCM_IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = GcmNonce::from_slice(iv);
    // aes-gcm never fails to encrypt; only decryption can fail (tag check).
    cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &[] })
        .expect("AES-256-GCM encryption is infallible for in-memory buffers")
}

/// Decrypt and authenticate a full (non-ranged) GCM object.
/// `ciphertext` must include the trailing 16-byte tag.
pub fn gcm_decrypt(
    key: &[u8; AES_256_KEY_LEN],
    iv: &[u8; GCM_IV_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, DecryptError> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = GcmNonce::from_slice(iv);
    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad: &[] })
        .map_err(|_| DecryptError::TagMismatch)
}

/// Decrypt a byte range of GCM ciphertext without the tag, by treating the
/// cipher as AES-CTR with the counter positioned at `start_block_index`.
/// Callers are responsible for having already fetched a block-aligned
/// range (see [`crate::range`]) and for not treating this as authenticated
/// — authentication only covers the full object and is the caller's job to
/// enforce (e.g. by verifying a checksum out of band) when doing partial
/// reads, exactly as the original library documents.
pub fn gcm_decrypt_range(
    key: &[u8; AES_256_KEY_LEN],
    iv: &[u8; GCM_IV_LEN],
    start_block_index: u64,
    ranged_ciphertext: &[u8],
) -> Vec<u8> {
    let counter = adjust_iv_for_range(iv, start_block_index);
    let mut buf = ranged_ciphertext.to_vec();
    let mut cipher = Aes256Ctr::new(key.into(), &counter.into());
    cipher.apply_keystream(&mut buf);
    buf
}

/// Encrypt `plaintext` under AES-256-CBC with PKCS#7 padding.
pub fn cbc_encrypt(key: &[u8; AES_256_KEY_LEN], iv: &[u8; CBC_IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    let enc = Aes256CbcEnc::new(key.into(), iv.into());
    enc.encrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(plaintext)
}

/// Decrypt and unpad a full CBC object. Ranged CBC reads are not supported
/// (the cipher mode has no random-access property) and must be rejected by
/// the caller before invoking this function with anything but the whole
/// ciphertext.
pub fn cbc_decrypt(
    key: &[u8; AES_256_KEY_LEN],
    iv: &[u8; CBC_IV_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, DecryptError> {
    let dec = Aes256CbcDec::new(key.into(), iv.into());
    dec.decrypt_padded_vec_mut::<cbc::cipher::block_padding::Pkcs7>(ciphertext)
        .map_err(|_| DecryptError::BadPadding)
}

/// `_compute_j0`: the GCM initial counter block, constructed from a
/// 12-byte IV by appending the fixed 4-byte suffix `00 00 00 02` (the `02`
/// accounts for GCM reserving counter value 1 for the tag-mask block).
pub fn compute_j0(iv: &[u8; GCM_IV_LEN]) -> [u8; 16] {
    let mut j0 = [0u8; 16];
    j0[..12].copy_from_slice(iv);
    j0[15] = 2;
    j0
}

/// `_increment_blocks`: add `n` to the low 32 bits of a 16-byte counter
/// block, wrapping modulo 2^32 (the counter never carries into the fixed
/// IV bytes, matching AES-CTR's 32-bit block-counter convention).
pub fn increment_blocks(counter: &[u8; 16], n: u64) -> [u8; 16] {
    let mut out = *counter;
    let low = u32::from_be_bytes([counter[12], counter[13], counter[14], counter[15]]);
    let new_low = low.wrapping_add(n as u32);
    out[12..16].copy_from_slice(&new_low.to_be_bytes());
    out
}

/// `_adjust_iv_for_range`: the CTR counter block to start decrypting at
/// `start_block_index` (a count of 16-byte AES blocks from the start of
/// the object).
pub fn adjust_iv_for_range(iv: &[u8; GCM_IV_LEN], start_block_index: u64) -> [u8; 16] {
    increment_blocks(&compute_j0(iv), start_block_index)
}
