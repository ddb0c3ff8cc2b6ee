//! Error types for the `s3cse-crypto` layer.
//!
//! Each kind named in the spec gets its own small type here; `s3cse-transfer`
//! folds these into its top-level `S3cseError` via `From` impls, the same
//! layering the teacher's `citadel-keystore::error` uses for wrapping
//! lower-layer failures.

use core::fmt;

/// Failure to recover plaintext: tag mismatch, bad padding, unsupported
/// algorithm, or a ranged request against a cipher that doesn't support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptError {
    /// GCM authentication tag did not verify.
    TagMismatch,
    /// CBC padding was not valid PKCS#7.
    BadPadding,
    /// A ranged read was requested against a CBC-encrypted object.
    RangeNotSupported,
    /// `x-amz-cek-alg` / `x-amz-wrap-alg` named something this crate does
    /// not implement.
    UnsupportedAlgorithm,
}

impl fmt::Display for DecryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagMismatch => write!(f, "decrypt: AEAD tag did not verify"),
            Self::BadPadding => write!(f, "decrypt: invalid PKCS#7 padding"),
            Self::RangeNotSupported => {
                write!(f, "decrypt: ranged read not supported for this cipher")
            }
            Self::UnsupportedAlgorithm => write!(f, "decrypt: unsupported algorithm"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecryptError {}

/// The metadata header map was missing a required header, had invalid
/// base64/JSON, or declared an unsupported algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedMetadata {
    MissingHeader(&'static str),
    BadBase64(&'static str),
    BadJson,
    UnsupportedAlgorithm(&'static str),
}

impl fmt::Display for MalformedMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader(h) => write!(f, "metadata: missing required header {h}"),
            Self::BadBase64(h) => write!(f, "metadata: invalid base64 in {h}"),
            Self::BadJson => write!(f, "metadata: matdesc did not decode to a flat string map"),
            Self::UnsupportedAlgorithm(alg) => write!(f, "metadata: unsupported algorithm {alg}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MalformedMetadata {}

/// Encryption was requested on a KMS crypto context with no key id
/// configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingKmsKey;

impl fmt::Display for MissingKmsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KMS crypto context has no key_id configured for encryption")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MissingKmsKey {}

/// A crypto-context wrapping/unwrapping operation failed: the underlying
/// KMS call returned an error, or an RSA/AES-wrap operation could not
/// parse its input.
#[derive(Debug, Clone)]
pub struct ContextError(pub alloc::string::String);

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crypto context: {}", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ContextError {}

impl From<DecryptError> for ContextError {
    fn from(e: DecryptError) -> Self {
        use alloc::string::ToString;
        ContextError(e.to_string())
    }
}

impl From<rsa::Error> for ContextError {
    fn from(e: rsa::Error) -> Self {
        use alloc::string::ToString;
        ContextError(e.to_string())
    }
}
