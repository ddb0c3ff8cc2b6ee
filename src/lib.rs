//! # s3cse-crypto
//!
//! Client-side envelope encryption compatible with the S3 Encryption
//! Client wire format: a metadata codec for the `x-amz-key*` header set,
//! AES-256-GCM/CBC content ciphers (including ranged GCM decryption via
//! AES-CTR reinterpretation), a range planner for turning a user byte range
//! into a block-aligned ciphertext range, and the three key-wrapping crypto
//! contexts (`Symmetric`, `Asymmetric`, `Kms`) plus an in-process `MockKms`
//! test double.
//!
//! ## Quick Start
//!
//! ```rust
//! use s3cse_crypto::cipher;
//!
//! let key = [0x42u8; 32];
//! let iv = [0x11u8; cipher::GCM_IV_LEN];
//! let ciphertext = cipher::gcm_encrypt(&key, &iv, b"hello s3");
//! let plaintext = cipher::gcm_decrypt(&key, &iv, &ciphertext).unwrap();
//! assert_eq!(plaintext, b"hello s3");
//! ```
//!
//! ## What's NOT Provided
//!
//! - The object-store and transfer-orchestration layer (see `s3cse-transfer`)
//! - Streaming encryption of unbounded input (objects are encrypted whole)
//! - KMS v1 legacy decrypt (only GenerateDataKey/Decrypt against a key id)

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod cipher;
pub mod error;
pub mod metadata;
pub mod range;

#[cfg(feature = "std")]
pub mod context;

pub use error::{ContextError, DecryptError, MalformedMetadata, MissingKmsKey};
pub use metadata::{CekAlg, EnvelopeMetadata, WrapAlg};
pub use range::RangePlan;

#[cfg(feature = "std")]
pub use context::{CryptoContext, EncryptionDataKey, KeyManagementService, RawDataKey};
