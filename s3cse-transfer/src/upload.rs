//! Component F: Multipart Upload Orchestrator.
//!
//! One reader task pulls `io_chunksize` chunks off a [`ByteSource`],
//! accumulates them into `multipart_chunksize` parts, and hands each to a
//! bounded queue. A fixed pool of `max_concurrency` uploader tasks drains
//! the queue and calls `ObjectStore::upload_part`. The first task to hit an
//! error latches it into a shared slot; every other task notices on its
//! next loop iteration and winds down.
//!
//! Grounded 1:1 on `examples/original_source/aioboto3/s3/inject.py`'s
//! `upload_fileobj` (`io_queue` → `mpsc::channel`, `exception_event` →
//! `Notify`, `finished_parts.sort(...)` → the same sort here, the trailing
//! "cancel any remaining futures" loop → the `abort_all` cleanup below).

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, Notify};

use crate::error::S3cseError;
use crate::object_store::ObjectStore;
use crate::stream::ByteSource;
use crate::types::{CompletedPart, ExtraArgs, PartUpload, UploadConfig};

/// Result of a successful multipart (or single-shot) upload.
pub struct UploadSummary {
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
    pub bytes_sent: u64,
}

struct FirstError {
    slot: Mutex<Option<S3cseError>>,
    notify: Notify,
}

impl FirstError {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    fn set(&self, err: S3cseError) {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
            self.notify.notify_waiters();
        }
    }

    fn is_set(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    fn take(&self) -> Option<S3cseError> {
        self.slot.lock().unwrap().take()
    }
}

/// Upload `source` to `bucket`/`key` as a multipart object, pre-encrypted —
/// this orchestrator moves opaque bytes, it does not know about envelope
/// encryption. The facade is responsible for handing it already-encrypted
/// ciphertext plus the envelope headers to attach as object metadata.
pub async fn upload(
    store: Arc<dyn ObjectStore>,
    bucket: &str,
    key: &str,
    mut source: ByteSource,
    metadata: ExtraArgs,
    config: UploadConfig,
    processing: Option<Arc<dyn Fn(Bytes) -> Bytes + Send + Sync>>,
    callback: Option<Arc<dyn Fn(usize) + Send + Sync>>,
) -> Result<UploadSummary, S3cseError> {
    let upload_id = store
        .create_multipart_upload(bucket, key, &metadata)
        .await?;

    let (tx, rx) = mpsc::channel::<PartUpload>(config.max_io_queue);
    let first_error = Arc::new(FirstError::new());
    let finished_parts: Arc<Mutex<Vec<CompletedPart>>> = Arc::new(Mutex::new(Vec::new()));
    let bytes_sent = Arc::new(Mutex::new(0u64));

    let mut uploader_handles = Vec::with_capacity(config.max_concurrency);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    for _ in 0..config.max_concurrency {
        let store = store.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        let upload_id = upload_id.clone();
        let rx = rx.clone();
        let first_error = first_error.clone();
        let finished_parts = finished_parts.clone();
        let bytes_sent = bytes_sent.clone();
        let callback = callback.clone();

        uploader_handles.push(tokio::spawn(async move {
            loop {
                if first_error.is_set() {
                    break;
                }
                let part = {
                    let mut rx = rx.lock().await;
                    rx.recv().await
                };
                let Some(part) = part else { break };

                match store
                    .upload_part(&bucket, &key, &upload_id, part.part_number, part.body.clone())
                    .await
                {
                    Ok(etag) => {
                        finished_parts.lock().unwrap().push(CompletedPart {
                            part_number: part.part_number,
                            etag,
                        });
                        let len = part.body.len();
                        *bytes_sent.lock().unwrap() += len as u64;
                        if let Some(cb) = &callback {
                            let cb = cb.clone();
                            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| cb(len)));
                        }
                    }
                    Err(e) => {
                        first_error.set(e);
                        break;
                    }
                }
            }
        }));
    }

    let reader_handle = {
        let first_error = first_error.clone();
        tokio::spawn(async move {
            reader_loop(&mut source, &tx, &config, processing, &first_error).await;
        })
    };

    let reader_result = reader_handle.await;
    if let Err(join_err) = reader_result {
        if !join_err.is_cancelled() {
            first_error.set(S3cseError::TransferFailed(join_err.to_string()));
        }
    }

    // task-leak invariant: every handle gets `.abort()`-ed on every exit
    // path, mirroring `inject.py`'s final "cancel any remaining futures"
    // loop. Aborting an already-finished task is a harmless no-op.
    for handle in &uploader_handles {
        handle.abort();
    }
    for handle in uploader_handles {
        if let Err(join_err) = handle.await {
            if !join_err.is_cancelled() {
                first_error.set(S3cseError::TransferFailed(join_err.to_string()));
            }
        }
    }

    let mut parts = finished_parts.lock().unwrap().clone();
    parts.sort_by_key(|p| p.part_number);

    if let Some(err) = first_error.take() {
        abort_best_effort(&store, bucket, key, &upload_id).await;
        return Err(err);
    }

    if let Err(e) = store
        .complete_multipart_upload(bucket, key, &upload_id, &parts)
        .await
    {
        abort_best_effort(&store, bucket, key, &upload_id).await;
        return Err(e);
    }

    Ok(UploadSummary {
        upload_id,
        parts,
        bytes_sent: *bytes_sent.lock().unwrap(),
    })
}

async fn abort_best_effort(store: &Arc<dyn ObjectStore>, bucket: &str, key: &str, upload_id: &str) {
    if let Err(e) = store.abort_multipart_upload(bucket, key, upload_id).await {
        tracing::warn!(bucket, key, upload_id, error = %e, "abort_multipart_upload failed");
    }
}

async fn reader_loop(
    source: &mut ByteSource,
    tx: &mpsc::Sender<PartUpload>,
    config: &UploadConfig,
    processing: Option<Arc<dyn Fn(Bytes) -> Bytes + Send + Sync>>,
    first_error: &Arc<FirstError>,
) {
    let mut part_number = 0u32;
    let mut first_read = true;

    loop {
        if first_error.is_set() {
            return;
        }

        part_number += 1;
        let mut accumulated = BytesMut::new();
        let mut eof = false;

        while accumulated.len() < config.multipart_chunksize {
            if first_error.is_set() {
                return;
            }
            let mut chunk = vec![0u8; config.io_chunksize];
            match source.read(&mut chunk).await {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => {
                    accumulated.extend_from_slice(&chunk[..n]);
                    first_read = false;
                }
                Err(e) => {
                    first_error.set(S3cseError::TransferFailed(e.to_string()));
                    return;
                }
            }
        }

        if accumulated.is_empty() {
            // The empty-file special case: the very first read hit EOF
            // immediately, so emit exactly one zero-length part so
            // complete_multipart_upload has something to commit.
            if first_read && part_number == 1 {
                let body = processing
                    .as_ref()
                    .map(|f| f(Bytes::new()))
                    .unwrap_or_default();
                if tx
                    .send(PartUpload { part_number, body })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            return;
        }

        let mut body = accumulated.freeze();
        if let Some(f) = &processing {
            body = f(body);
        }

        if tx.send(PartUpload { part_number, body }).await.is_err() {
            return;
        }

        if eof {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::InMemoryObjectStore;
    use std::io::Cursor;

    fn meta() -> ExtraArgs {
        BTreeMap::new()
    }

    #[tokio::test]
    async fn uploads_small_body_as_single_part() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let source = ByteSource::Sync(Box::new(Cursor::new(b"hello world".to_vec())));
        let summary = upload(
            store.clone(),
            "bucket",
            "key",
            source,
            meta(),
            UploadConfig::default(),
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(summary.parts.len(), 1);
        let out = store.get_object("bucket", "key", None).await.unwrap();
        assert_eq!(out.body, Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn empty_source_still_produces_one_part() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let source = ByteSource::Sync(Box::new(Cursor::new(Vec::<u8>::new())));
        let summary = upload(
            store.clone(),
            "bucket",
            "key",
            source,
            meta(),
            UploadConfig::default(),
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(summary.parts.len(), 1);
        let out = store.get_object("bucket", "key", None).await.unwrap();
        assert_eq!(out.body.len(), 0);
    }

    #[tokio::test]
    async fn multiple_parts_are_committed_in_order() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let config = UploadConfig {
            multipart_chunksize: 16,
            io_chunksize: 4,
            max_concurrency: 3,
            max_io_queue: 10,
        };
        let body: Vec<u8> = (0..80u32).map(|b| b as u8).collect();
        let source = ByteSource::Sync(Box::new(Cursor::new(body.clone())));
        let summary = upload(
            store.clone(),
            "bucket",
            "key",
            source,
            meta(),
            config,
            None,
            None,
        )
        .await
        .unwrap();

        assert_eq!(summary.parts.len(), 5);
        for (i, part) in summary.parts.iter().enumerate() {
            assert_eq!(part.part_number as usize, i + 1);
        }
        let out = store.get_object("bucket", "key", None).await.unwrap();
        assert_eq!(out.body.as_ref(), body.as_slice());
    }

    #[tokio::test]
    async fn processing_hook_transforms_parts_without_reordering() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        let source = ByteSource::Sync(Box::new(Cursor::new(b"HELLO".to_vec())));
        let lower: Arc<dyn Fn(Bytes) -> Bytes + Send + Sync> =
            Arc::new(|b: Bytes| Bytes::from(b.to_ascii_lowercase()));
        let summary = upload(
            store.clone(),
            "bucket",
            "key",
            source,
            meta(),
            UploadConfig::default(),
            Some(lower),
            None,
        )
        .await
        .unwrap();

        assert_eq!(summary.parts.len(), 1);
        let out = store.get_object("bucket", "key", None).await.unwrap();
        assert_eq!(out.body, Bytes::from_static(b"hello"));
    }
}
