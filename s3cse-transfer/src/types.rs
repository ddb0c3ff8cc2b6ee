//! Core types shared by the facade and both orchestrators.

use std::collections::BTreeMap;

use bytes::Bytes;

/// A completed multipart part: the number assigned at upload time and the
/// ETag the object store returned for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// One chunk handed from the upload reader task to the uploader pool.
#[derive(Clone, Debug)]
pub struct PartUpload {
    pub part_number: u32,
    pub body: Bytes,
}

/// Transient entity representing an in-progress multipart upload.
///
/// Created by `create_multipart_upload`, destroyed by either
/// `complete_multipart_upload` (success) or `abort_multipart_upload`
/// (failure path, best-effort). Every successful creation must be paired
/// with exactly one terminal call — the orchestrator in `upload.rs`
/// enforces this.
#[derive(Clone, Debug)]
pub struct MultipartSession {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

/// Tunables for the multipart upload orchestrator. Defaults match the
/// original client's.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// Size of each part handed to `upload_part`.
    pub multipart_chunksize: usize,
    /// Size of each read from the byte source.
    pub io_chunksize: usize,
    /// Number of concurrent uploader tasks.
    pub max_concurrency: usize,
    /// Bounded capacity of the reader-to-uploader queue.
    pub max_io_queue: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            multipart_chunksize: 8 * 1024 * 1024,
            io_chunksize: 256 * 1024,
            max_concurrency: 10,
            max_io_queue: 100,
        }
    }
}

/// Tunables for the multipart download orchestrator.
#[derive(Clone, Debug)]
pub struct DownloadConfig {
    pub max_concurrency: usize,
    pub part_size: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            part_size: 8 * 1024 * 1024,
        }
    }
}

/// Extra string key/value pairs forwarded to the object store on
/// `create_multipart_upload`/`put_object` (storage class, content type,
/// ACL, etc.) — opaque to this crate beyond the envelope headers it adds
/// on top.
pub type ExtraArgs = BTreeMap<String, String>;
