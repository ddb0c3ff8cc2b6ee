//! Component A: Metadata Codec.
//!
//! Encodes and decodes the envelope metadata that travels as S3 object
//! headers/user-metadata: `x-amz-key` (v1) or `x-amz-key-v2` (v2),
//! `x-amz-iv`, `x-amz-cek-alg`, `x-amz-wrap-alg`, `x-amz-tag-len`,
//! `x-amz-matdesc`, and `x-amz-unencrypted-content-length`.
//!
//! Grounded on `examples/original_source/aioboto3/s3/cse.py`, which builds
//! and parses exactly this header set, and on the teacher's
//! `citadel-envelope::wire` module for the encode/decode-pair shape (a pure
//! struct <-> bytes/headers codec with no cryptographic operations of its
//! own).

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use base64::Engine;

use crate::error::MalformedMetadata;

/// Content encryption key algorithm named in `x-amz-cek-alg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CekAlg {
    AesGcm,
    AesCbc,
}

impl CekAlg {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AesGcm => "AES/GCM/NoPadding",
            Self::AesCbc => "AES/CBC/PKCS5Padding",
        }
    }

    pub fn parse(s: &str) -> Result<Self, MalformedMetadata> {
        match s {
            "AES/GCM/NoPadding" => Ok(Self::AesGcm),
            "AES/CBC/PKCS5Padding" => Ok(Self::AesCbc),
            _ => Err(MalformedMetadata::UnsupportedAlgorithm("x-amz-cek-alg")),
        }
    }
}

/// Key-wrap algorithm named in `x-amz-wrap-alg` (absent for the legacy v1
/// symmetric format, which wraps with raw AES key-wrap and carries no
/// algorithm header at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapAlg {
    /// `x-amz-wrap-alg: AESWrap` for v2 objects; absent header (legacy v1)
    /// decodes to this variant too, since v1 only ever wrapped with AES.
    AesWrap,
    RsaOaepSha256,
    Kms,
    KmsContext,
}

impl WrapAlg {
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Self::AesWrap => Some("AESWrap"),
            Self::RsaOaepSha256 => Some("RSA/ECB/OAEPWithSHA-256AndMGF1Padding"),
            Self::Kms => Some("kms"),
            Self::KmsContext => Some("kms+context"),
        }
    }

    pub fn parse(s: Option<&str>) -> Result<Self, MalformedMetadata> {
        match s {
            None => Ok(Self::AesWrap),
            Some("AESWrap") => Ok(Self::AesWrap),
            Some("RSA/ECB/OAEPWithSHA-256AndMGF1Padding") => Ok(Self::RsaOaepSha256),
            Some("kms") => Ok(Self::Kms),
            Some("kms+context") => Ok(Self::KmsContext),
            Some(_) => Err(MalformedMetadata::UnsupportedAlgorithm("x-amz-wrap-alg")),
        }
    }
}

/// The decoded envelope metadata for one object: the wrapped content key,
/// the IV, the algorithm choices, the material description, and the
/// plaintext length (so callers can size buffers and compute ranges before
/// any bytes arrive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeMetadata {
    /// Raw (still-wrapped) content encryption key bytes.
    pub wrapped_key: Vec<u8>,
    /// Raw IV bytes (12 for GCM, 16 for CBC).
    pub iv: Vec<u8>,
    pub cek_alg: CekAlg,
    pub wrap_alg: WrapAlg,
    /// GCM tag length in bits, e.g. 128. Absent for CBC.
    pub tag_len_bits: Option<u32>,
    /// Material description, a flat string->string map, serialized
    /// canonically (keys sorted) into `x-amz-matdesc`.
    pub matdesc: BTreeMap<String, String>,
    pub unencrypted_content_length: Option<u64>,
    /// True if `x-amz-key-v2` was used instead of the legacy `x-amz-key`.
    pub is_v2: bool,
}

const HDR_KEY_V1: &str = "x-amz-key";
const HDR_KEY_V2: &str = "x-amz-key-v2";
const HDR_IV: &str = "x-amz-iv";
const HDR_CEK_ALG: &str = "x-amz-cek-alg";
const HDR_WRAP_ALG: &str = "x-amz-wrap-alg";
const HDR_TAG_LEN: &str = "x-amz-tag-len";
const HDR_MATDESC: &str = "x-amz-matdesc";
const HDR_UNENC_LEN: &str = "x-amz-unencrypted-content-length";

fn b64_decode(field: &'static str, s: &str) -> Result<Vec<u8>, MalformedMetadata> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|_| MalformedMetadata::BadBase64(field))
}

fn b64_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

impl EnvelopeMetadata {
    /// Parse a metadata/header map (as returned verbatim by an S3-compatible
    /// object store's `HeadObject`/`GetObject`) into a typed struct.
    ///
    /// Matches `CryptoContext._build_crypto_config` / the header-reading
    /// half of `aioboto3/s3/cse.py`: v2 is tried first, falling back to v1.
    pub fn decode(headers: &BTreeMap<String, String>) -> Result<Self, MalformedMetadata> {
        let (is_v2, key_field) = if headers.contains_key(HDR_KEY_V2) {
            (true, HDR_KEY_V2)
        } else if headers.contains_key(HDR_KEY_V1) {
            (false, HDR_KEY_V1)
        } else {
            return Err(MalformedMetadata::MissingHeader(HDR_KEY_V2));
        };

        let wrapped_key = b64_decode(key_field, headers.get(key_field).unwrap())?;

        let iv_raw = headers
            .get(HDR_IV)
            .ok_or(MalformedMetadata::MissingHeader(HDR_IV))?;
        let iv = b64_decode(HDR_IV, iv_raw)?;

        let cek_alg = match headers.get(HDR_CEK_ALG) {
            Some(s) => CekAlg::parse(s)?,
            // Legacy v1 objects may omit x-amz-cek-alg entirely; CBC was
            // the only cipher the original format supported.
            None if !is_v2 => CekAlg::AesCbc,
            None => return Err(MalformedMetadata::MissingHeader(HDR_CEK_ALG)),
        };

        let wrap_alg = WrapAlg::parse(headers.get(HDR_WRAP_ALG).map(String::as_str))?;

        let tag_len_bits = match headers.get(HDR_TAG_LEN) {
            Some(s) => Some(
                s.parse::<u32>()
                    .map_err(|_| MalformedMetadata::BadJson)?,
            ),
            None => None,
        };

        let matdesc = match headers.get(HDR_MATDESC) {
            Some(s) => serde_json::from_str::<BTreeMap<String, String>>(s)
                .map_err(|_| MalformedMetadata::BadJson)?,
            None => BTreeMap::new(),
        };

        let unencrypted_content_length = match headers.get(HDR_UNENC_LEN) {
            Some(s) => Some(s.parse::<u64>().map_err(|_| MalformedMetadata::BadJson)?),
            None => None,
        };

        Ok(Self {
            wrapped_key,
            iv,
            cek_alg,
            wrap_alg,
            tag_len_bits,
            matdesc,
            unencrypted_content_length,
            is_v2,
        })
    }

    /// Serialize back into the header map uploaded alongside ciphertext.
    /// `is_v2` controls whether `x-amz-key` or `x-amz-key-v2` is emitted;
    /// new objects should always set `is_v2 = true` (v1 is decode-only
    /// going forward, matching the original library's deprecation of v1
    /// encryption while still reading it).
    pub fn encode(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        let key_field = if self.is_v2 { HDR_KEY_V2 } else { HDR_KEY_V1 };
        headers.insert(key_field.to_string(), b64_encode(&self.wrapped_key));
        headers.insert(HDR_IV.to_string(), b64_encode(&self.iv));
        headers.insert(HDR_CEK_ALG.to_string(), self.cek_alg.as_str().to_string());
        // Legacy v1 objects carry no `x-amz-wrap-alg` header at all (AES key
        // wrap was the only format); v2 objects always name their wrap
        // algorithm explicitly, including plain AES wrap.
        if self.is_v2 || self.wrap_alg != WrapAlg::AesWrap {
            if let Some(wrap) = self.wrap_alg.as_str() {
                headers.insert(HDR_WRAP_ALG.to_string(), wrap.to_string());
            }
        }
        if let Some(tag_len) = self.tag_len_bits {
            headers.insert(HDR_TAG_LEN.to_string(), tag_len.to_string());
        }
        if !self.matdesc.is_empty() {
            // BTreeMap iterates in sorted key order, giving the canonical
            // matdesc serialization the spec requires for interop.
            let json = serde_json::to_string(&self.matdesc).unwrap_or_default();
            headers.insert(HDR_MATDESC.to_string(), json);
        }
        if let Some(len) = self.unencrypted_content_length {
            headers.insert(HDR_UNENC_LEN.to_string(), len.to_string());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EnvelopeMetadata {
        let mut matdesc = BTreeMap::new();
        matdesc.insert("project".to_string(), "s3cse".to_string());
        EnvelopeMetadata {
            wrapped_key: vec![1, 2, 3, 4],
            iv: vec![0u8; 12],
            cek_alg: CekAlg::AesGcm,
            wrap_alg: WrapAlg::AesWrap,
            tag_len_bits: Some(128),
            matdesc,
            unencrypted_content_length: Some(42),
            is_v2: true,
        }
    }

    #[test]
    fn roundtrips_through_headers() {
        let meta = sample();
        let headers = meta.encode();
        let decoded = EnvelopeMetadata::decode(&headers).unwrap();
        assert_eq!(meta, decoded);
    }

    #[test]
    fn v2_key_field_takes_priority_over_v1() {
        let meta = sample();
        let mut headers = meta.encode();
        headers.insert(HDR_KEY_V1.to_string(), b64_encode(b"stale-v1-value"));
        let decoded = EnvelopeMetadata::decode(&headers).unwrap();
        assert!(decoded.is_v2);
        assert_eq!(decoded.wrapped_key, meta.wrapped_key);
    }

    #[test]
    fn missing_key_header_is_rejected() {
        let headers = BTreeMap::new();
        let err = EnvelopeMetadata::decode(&headers).unwrap_err();
        assert_eq!(err, MalformedMetadata::MissingHeader(HDR_KEY_V2));
    }

    #[test]
    fn legacy_v1_without_cek_alg_defaults_to_cbc() {
        let mut headers = BTreeMap::new();
        headers.insert(HDR_KEY_V1.to_string(), b64_encode(b"wrapped"));
        headers.insert(HDR_IV.to_string(), b64_encode(&[0u8; 16]));
        let decoded = EnvelopeMetadata::decode(&headers).unwrap();
        assert_eq!(decoded.cek_alg, CekAlg::AesCbc);
        assert!(!decoded.is_v2);
    }

    #[test]
    fn unsupported_cek_alg_is_rejected() {
        let mut headers = BTreeMap::new();
        headers.insert(HDR_KEY_V2.to_string(), b64_encode(b"wrapped"));
        headers.insert(HDR_IV.to_string(), b64_encode(&[0u8; 12]));
        headers.insert(HDR_CEK_ALG.to_string(), "AES/ECB/NoPadding".to_string());
        let err = EnvelopeMetadata::decode(&headers).unwrap_err();
        assert_eq!(err, MalformedMetadata::UnsupportedAlgorithm("x-amz-cek-alg"));
    }
}
