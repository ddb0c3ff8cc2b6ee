//! The `ObjectStore` capability this crate consumes, plus an in-process
//! mock used by tests.
//!
//! Grounded on `examples/original_source/aioboto3/s3/inject.py`'s use of
//! the boto3 S3 client surface (`create_multipart_upload`, `upload_part`,
//! `complete_multipart_upload`, `abort_multipart_upload`, `put_object`,
//! `get_object`, `head_object`) and on the teacher's
//! `citadel_keystore::storage::StorageBackend` + `InMemoryBackend` pattern
//! for the trait/mock shape: an `#[async_trait]` object-safe trait with an
//! `Arc<Mutex<...>>`-guarded in-memory implementation beside it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::S3cseError;
use crate::types::CompletedPart;

/// A GET's response: the body plus whatever header/user-metadata map the
/// store attached (this is where the envelope headers from
/// `s3cse_crypto::EnvelopeMetadata` travel).
pub struct GetObjectOutput {
    pub body: Bytes,
    pub metadata: BTreeMap<String, String>,
}

/// A HEAD's response.
pub struct HeadObjectOutput {
    pub content_length: u64,
    pub metadata: BTreeMap<String, String>,
}

/// The basic S3 request surface this crate needs. Implement this against
/// a real SDK client (aws-sdk-s3, rusoto, a hand-rolled signed-request
/// client, ...); request signing and retries are that implementation's
/// job, not this crate's.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String, S3cseError>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, S3cseError>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), S3cseError>;

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3cseError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), S3cseError>;

    /// `range`, if present, is an inclusive `(start, end)` byte range.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, u64)>,
    ) -> Result<GetObjectOutput, S3cseError>;

    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObjectOutput, S3cseError>;
}

struct StoredObject {
    body: Bytes,
    metadata: BTreeMap<String, String>,
}

struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<u32, Bytes>,
    metadata: BTreeMap<String, String>,
}

/// In-memory `ObjectStore`, grounded on
/// `citadel_keystore::storage::InMemoryBackend`'s
/// `Mutex<HashMap<...>>`-guarded shape. Deterministic, single-process,
/// suitable for tests and the CLI's demo mode — not a real network client.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    uploads: Mutex<BTreeMap<String, PendingUpload>>,
    next_upload_id: Mutex<u64>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: read back the metadata a committed object was stored
    /// with, without going through the full `get_object` path.
    pub fn metadata_of(&self, bucket: &str, key: &str) -> Option<BTreeMap<String, String>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.metadata.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String, S3cseError> {
        let mut counter = self.next_upload_id.lock().unwrap();
        *counter += 1;
        let upload_id = format!("upload-{counter}");
        self.uploads.lock().unwrap().insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
                metadata: metadata.clone(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, S3cseError> {
        let mut uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get_mut(upload_id)
            .ok_or_else(|| S3cseError::TransferFailed(format!("no such upload: {upload_id}")))?;
        let etag = format!("etag-{part_number}-{}", body.len());
        upload.parts.insert(part_number, body);
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), S3cseError> {
        let upload = self
            .uploads
            .lock()
            .unwrap()
            .remove(upload_id)
            .ok_or_else(|| S3cseError::TransferFailed(format!("no such upload: {upload_id}")))?;

        let mut body = Vec::new();
        for part in parts {
            let chunk = upload.parts.get(&part.part_number).ok_or_else(|| {
                S3cseError::TransferFailed(format!("missing part {}", part.part_number))
            })?;
            body.extend_from_slice(chunk);
        }

        self.objects.lock().unwrap().insert(
            (upload.bucket, upload.key),
            StoredObject {
                body: Bytes::from(body),
                metadata: upload.metadata,
            },
        );
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<(), S3cseError> {
        self.uploads.lock().unwrap().remove(upload_id);
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: &BTreeMap<String, String>,
    ) -> Result<(), S3cseError> {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, u64)>,
    ) -> Result<GetObjectOutput, S3cseError> {
        let objects = self.objects.lock().unwrap();
        let object = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| S3cseError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        let body = match range {
            Some((start, end)) => {
                let start = start as usize;
                let end = ((end as usize) + 1).min(object.body.len());
                object.body.slice(start.min(object.body.len())..end)
            }
            None => object.body.clone(),
        };

        Ok(GetObjectOutput {
            body,
            metadata: object.metadata.clone(),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObjectOutput, S3cseError> {
        let objects = self.objects.lock().unwrap();
        let object = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| S3cseError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok(HeadObjectOutput {
            content_length: object.body.len() as u64,
            metadata: object.metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = InMemoryObjectStore::new();
        let mut meta = BTreeMap::new();
        meta.insert("x-amz-iv".to_string(), "abcd".to_string());
        store
            .put_object("bucket", "key", Bytes::from_static(b"hello"), &meta)
            .await
            .unwrap();

        let out = store.get_object("bucket", "key", None).await.unwrap();
        assert_eq!(out.body, Bytes::from_static(b"hello"));
        assert_eq!(out.metadata.get("x-amz-iv").unwrap(), "abcd");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get_object("bucket", "missing", None).await.unwrap_err();
        assert!(matches!(err, S3cseError::NotFound { .. }));
    }

    #[tokio::test]
    async fn multipart_upload_commits_parts_in_order_regardless_of_upload_order() {
        let store = InMemoryObjectStore::new();
        let meta = BTreeMap::new();
        let upload_id = store
            .create_multipart_upload("bucket", "key", &meta)
            .await
            .unwrap();

        store
            .upload_part("bucket", "key", &upload_id, 2, Bytes::from_static(b"world"))
            .await
            .unwrap();
        store
            .upload_part("bucket", "key", &upload_id, 1, Bytes::from_static(b"hello "))
            .await
            .unwrap();

        let parts = vec![
            CompletedPart { part_number: 1, etag: "e1".into() },
            CompletedPart { part_number: 2, etag: "e2".into() },
        ];
        store
            .complete_multipart_upload("bucket", "key", &upload_id, &parts)
            .await
            .unwrap();

        let out = store.get_object("bucket", "key", None).await.unwrap();
        assert_eq!(out.body, Bytes::from_static(b"hello world"));
    }
}
