//! Error types for the transfer layer.

use std::fmt;

// ---------------------------------------------------------------------------
// Top-level transfer error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum S3cseError {
    /// Failure to recover plaintext: tag mismatch, bad padding, a ranged
    /// read against a CBC object, or an unsupported algorithm.
    Decrypt(s3cse_crypto::DecryptError),
    /// The envelope header set was missing a header, had invalid
    /// base64/JSON, or named an unsupported algorithm.
    Metadata(s3cse_crypto::MalformedMetadata),
    /// Encryption was requested on a KMS context with no key id configured.
    MissingKmsKey,
    /// The object key does not exist (normalized from an upstream
    /// `NoSuchKey`/404).
    NotFound { bucket: String, key: String },
    /// The upstream `ObjectStore` or `KeyManagementService` returned an
    /// error during a multipart session. Carries the upstream error as a
    /// cause.
    TransferFailed(String),
    /// Cooperative cancellation was observed.
    Cancelled,
}

impl fmt::Display for S3cseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decrypt(e) => write!(f, "{e}"),
            Self::Metadata(e) => write!(f, "{e}"),
            Self::MissingKmsKey => write!(f, "{}", s3cse_crypto::MissingKmsKey),
            Self::NotFound { bucket, key } => write!(f, "object not found: s3://{bucket}/{key}"),
            Self::TransferFailed(cause) => write!(f, "transfer failed: {cause}"),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for S3cseError {}

impl From<s3cse_crypto::DecryptError> for S3cseError {
    fn from(e: s3cse_crypto::DecryptError) -> Self {
        Self::Decrypt(e)
    }
}

impl From<s3cse_crypto::MalformedMetadata> for S3cseError {
    fn from(e: s3cse_crypto::MalformedMetadata) -> Self {
        Self::Metadata(e)
    }
}

impl From<s3cse_crypto::MissingKmsKey> for S3cseError {
    fn from(_: s3cse_crypto::MissingKmsKey) -> Self {
        Self::MissingKmsKey
    }
}

impl From<s3cse_crypto::ContextError> for S3cseError {
    fn from(e: s3cse_crypto::ContextError) -> Self {
        Self::TransferFailed(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Specific operation errors (type-safe), mirroring the per-operation error
// wrapper pattern used elsewhere in this codebase.
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PutError(pub S3cseError);
impl fmt::Display for PutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::error::Error for PutError {}
impl From<S3cseError> for PutError {
    fn from(e: S3cseError) -> Self {
        Self(e)
    }
}

#[derive(Debug)]
pub struct GetError(pub S3cseError);
impl fmt::Display for GetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::error::Error for GetError {}
impl From<S3cseError> for GetError {
    fn from(e: S3cseError) -> Self {
        Self(e)
    }
}
