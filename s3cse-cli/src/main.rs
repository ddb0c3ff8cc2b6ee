//! S3CSE CLI — local smoke-test tool for `s3cse-transfer`
//!
//! Usage:
//!   s3cse keygen --out <FILE>
//!   s3cse put --kek <FILE> --data-dir <DIR> --bucket <B> --object <K> --cipher gcm|cbc --input <FILE>
//!   s3cse get --kek <FILE> --data-dir <DIR> --bucket <B> --object <K> --output <FILE>
//!   s3cse inspect --data-dir <DIR> --bucket <B> --object <K>
//!
//! Wires the facade to a `FileObjectStore` (persists ciphertext + envelope
//! headers under `--data-dir`, one file pair per object) and a `Symmetric`
//! crypto context keyed from a 32-byte KEK file, for local round-trip
//! testing without a real S3-compatible endpoint.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use s3cse_crypto::context::Symmetric;
use s3cse_crypto::metadata::EnvelopeMetadata;
use s3cse_transfer::{
    CompletedPart, ContentCipherChoice, ExtraArgs, GetObjectOutput, HeadObjectOutput, ObjectStore,
    S3cse, S3cseError,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "s3cse_cli=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "keygen" => cmd_keygen(&args[2..]),
        "put" => cmd_put(&args[2..]).await,
        "get" => cmd_get(&args[2..]).await,
        "inspect" => cmd_inspect(&args[2..]),
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            println!("s3cse {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        cmd => {
            eprintln!("error: unknown command '{cmd}'");
            print_usage();
            Err("unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!(
        r#"S3CSE — client-side-encrypted S3 transfer smoke-test tool

USAGE:
    s3cse <COMMAND> [OPTIONS]

COMMANDS:
    keygen      Generate a 32-byte symmetric KEK
    put         Encrypt and upload a file
    get         Download and decrypt an object
    inspect     Show envelope metadata for a stored object (no decryption)

EXAMPLES:
    s3cse keygen --out kek.bin

    s3cse put --kek kek.bin --data-dir ./store --bucket demo --object file.txt \
        --cipher gcm --input file.txt

    s3cse get --kek kek.bin --data-dir ./store --bucket demo --object file.txt \
        --output file.out

    s3cse inspect --data-dir ./store --bucket demo --object file.txt

OPTIONS:
    -h, --help       Print help
    -V, --version    Print version
"#
    );
}

type BoxError = Box<dyn std::error::Error>;

fn get_flag(args: &[String], name: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == name {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

fn require_flag(args: &[String], name: &str) -> Result<String, BoxError> {
    get_flag(args, name).ok_or_else(|| format!("missing required flag: {name}").into())
}

// ---------------------------------------------------------------------------
// keygen
// ---------------------------------------------------------------------------

fn cmd_keygen(args: &[String]) -> Result<(), BoxError> {
    let out = require_flag(args, "--out")?;
    let mut kek = [0u8; 32];
    getrandom::getrandom(&mut kek).map_err(|e| format!("random generation failed: {e}"))?;
    fs::write(&out, kek)?;
    eprintln!("wrote 32-byte KEK to {out}");
    Ok(())
}

fn load_kek(path: &str) -> Result<Symmetric, BoxError> {
    let bytes = fs::read(path)?;
    if bytes.len() != 32 {
        return Err(format!("KEK file {path} is {} bytes, expected 32", bytes.len()).into());
    }
    let mut kek = [0u8; 32];
    kek.copy_from_slice(&bytes);
    Ok(Symmetric::new(kek))
}

// ---------------------------------------------------------------------------
// put
// ---------------------------------------------------------------------------

async fn cmd_put(args: &[String]) -> Result<(), BoxError> {
    let kek_path = require_flag(args, "--kek")?;
    let data_dir = require_flag(args, "--data-dir")?;
    let bucket = require_flag(args, "--bucket")?;
    let object = require_flag(args, "--object")?;
    let input = require_flag(args, "--input")?;
    let cipher = get_flag(args, "--cipher").unwrap_or_else(|| "gcm".to_string());

    let cipher_choice = match cipher.as_str() {
        "gcm" => ContentCipherChoice::Gcm,
        "cbc" => ContentCipherChoice::Cbc,
        other => return Err(format!("unknown cipher '{other}', expected gcm or cbc").into()),
    };

    let ctx = load_kek(&kek_path)?;
    let store = Arc::new(FileObjectStore::new(&data_dir)?);
    let facade = S3cse::new(store);

    let body = fs::read(&input)?;
    facade
        .put_object(&ctx, &bucket, &object, &body, cipher_choice, ExtraArgs::new())
        .await
        .map_err(|e| format!("put failed: {e}"))?;

    eprintln!(
        "encrypted {} bytes with {cipher} and stored s3://{bucket}/{object} under {data_dir}",
        body.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// get
// ---------------------------------------------------------------------------

async fn cmd_get(args: &[String]) -> Result<(), BoxError> {
    let kek_path = require_flag(args, "--kek")?;
    let data_dir = require_flag(args, "--data-dir")?;
    let bucket = require_flag(args, "--bucket")?;
    let object = require_flag(args, "--object")?;
    let output = require_flag(args, "--output")?;

    let ctx = load_kek(&kek_path)?;
    let store = Arc::new(FileObjectStore::new(&data_dir)?);
    let facade = S3cse::new(store);

    let plaintext = facade
        .get_object(&ctx, &bucket, &object)
        .await
        .map_err(|e| format!("get failed: {e}"))?;

    fs::write(&output, &plaintext)?;
    eprintln!(
        "decrypted s3://{bucket}/{object} -> {output} ({} bytes)",
        plaintext.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

fn cmd_inspect(args: &[String]) -> Result<(), BoxError> {
    let data_dir = require_flag(args, "--data-dir")?;
    let bucket = require_flag(args, "--bucket")?;
    let object = require_flag(args, "--object")?;

    let meta_path = FileObjectStore::meta_path(Path::new(&data_dir), &bucket, &object);
    let raw = fs::read_to_string(&meta_path)
        .map_err(|e| format!("no such object s3://{bucket}/{object}: {e}"))?;
    let headers: BTreeMap<String, String> = serde_json::from_str(&raw)?;
    let meta = EnvelopeMetadata::decode(&headers).map_err(|e| format!("malformed envelope metadata: {e}"))?;

    println!("S3CSE object: s3://{bucket}/{object}");
    println!("================================");
    println!("Envelope version:   {}", if meta.is_v2 { "v2" } else { "v1" });
    println!("Content cipher:     {}", meta.cek_alg.as_str());
    println!(
        "Wrap algorithm:     {}",
        meta.wrap_alg.as_str().unwrap_or("AESWrap (legacy v1, no header)")
    );
    println!("IV length:          {} bytes", meta.iv.len());
    if let Some(tag) = meta.tag_len_bits {
        println!("GCM tag length:     {tag} bits");
    }
    if let Some(len) = meta.unencrypted_content_length {
        println!("Plaintext length:   {len} bytes");
    }
    if !meta.matdesc.is_empty() {
        println!("Material description:");
        for (k, v) in &meta.matdesc {
            println!("  {k} = {v}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// FileObjectStore: persists ciphertext + envelope headers to disk so `put`
// and `get` can run as separate CLI invocations. Grounded on
// `citadel_keystore::storage::FileBackend`'s one-file-per-entity layout and
// write-to-temp-then-rename durability pattern; multipart parts are buffered
// in memory for the lifetime of a single upload, matching
// `s3cse_transfer::InMemoryObjectStore`'s `PendingUpload` shape.
// ---------------------------------------------------------------------------

struct PendingUpload {
    bucket: String,
    key: String,
    parts: std::sync::Mutex<BTreeMap<u32, Bytes>>,
    metadata: BTreeMap<String, String>,
}

struct FileObjectStore {
    dir: PathBuf,
    uploads: std::sync::Mutex<BTreeMap<String, PendingUpload>>,
    next_upload_id: std::sync::Mutex<u64>,
}

impl FileObjectStore {
    fn new(dir: impl Into<PathBuf>) -> Result<Self, BoxError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            uploads: std::sync::Mutex::new(BTreeMap::new()),
            next_upload_id: std::sync::Mutex::new(0),
        })
    }

    fn object_slug(bucket: &str, key: &str) -> String {
        format!("{bucket}__{}", key.replace('/', "_"))
    }

    fn data_path(dir: &Path, bucket: &str, key: &str) -> PathBuf {
        dir.join(format!("{}.data", Self::object_slug(bucket, key)))
    }

    fn meta_path(dir: &Path, bucket: &str, key: &str) -> PathBuf {
        dir.join(format!("{}.meta.json", Self::object_slug(bucket, key)))
    }

    fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)
    }

    fn persist(&self, bucket: &str, key: &str, body: &[u8], metadata: &BTreeMap<String, String>) -> Result<(), S3cseError> {
        let data_path = Self::data_path(&self.dir, bucket, key);
        let meta_path = Self::meta_path(&self.dir, bucket, key);
        Self::write_atomic(&data_path, body)
            .map_err(|e| S3cseError::TransferFailed(format!("write object data: {e}")))?;
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| S3cseError::TransferFailed(format!("serialize metadata: {e}")))?;
        Self::write_atomic(&meta_path, json.as_bytes())
            .map_err(|e| S3cseError::TransferFailed(format!("write object metadata: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FileObjectStore {
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
                parts: std::sync::Mutex::new(BTreeMap::new()),
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
        let uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get(upload_id)
            .ok_or_else(|| S3cseError::TransferFailed(format!("no such upload: {upload_id}")))?;
        let etag = format!("etag-{part_number}-{}", body.len());
        upload.parts.lock().unwrap().insert(part_number, body);
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), S3cseError> {
        let upload = self
            .uploads
            .lock()
            .unwrap()
            .remove(upload_id)
            .ok_or_else(|| S3cseError::TransferFailed(format!("no such upload: {upload_id}")))?;

        let stored_parts = upload.parts.lock().unwrap();
        let mut body = Vec::new();
        for part in parts {
            let chunk = stored_parts.get(&part.part_number).ok_or_else(|| {
                S3cseError::TransferFailed(format!("missing part {}", part.part_number))
            })?;
            body.extend_from_slice(chunk);
        }
        drop(stored_parts);

        self.persist(&upload.bucket, &upload.key, &body, &upload.metadata)?;
        let _ = (bucket, key);
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
        self.persist(bucket, key, &body, metadata)
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, u64)>,
    ) -> Result<GetObjectOutput, S3cseError> {
        let data_path = Self::data_path(&self.dir, bucket, key);
        let meta_path = Self::meta_path(&self.dir, bucket, key);
        if !data_path.exists() {
            return Err(S3cseError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        let data = fs::read(&data_path)
            .map_err(|e| S3cseError::TransferFailed(format!("read object data: {e}")))?;
        let meta_raw = fs::read_to_string(&meta_path)
            .map_err(|e| S3cseError::TransferFailed(format!("read object metadata: {e}")))?;
        let metadata: BTreeMap<String, String> = serde_json::from_str(&meta_raw)
            .map_err(|e| S3cseError::TransferFailed(format!("parse object metadata: {e}")))?;

        let body = match range {
            Some((start, end)) => {
                let start = (start as usize).min(data.len());
                let end = ((end as usize) + 1).min(data.len());
                Bytes::copy_from_slice(&data[start..end])
            }
            None => Bytes::from(data),
        };

        Ok(GetObjectOutput { body, metadata })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<HeadObjectOutput, S3cseError> {
        let data_path = Self::data_path(&self.dir, bucket, key);
        let meta_path = Self::meta_path(&self.dir, bucket, key);
        let content_length = fs::metadata(&data_path)
            .map_err(|_| S3cseError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?
            .len();
        let meta_raw = fs::read_to_string(&meta_path)
            .map_err(|e| S3cseError::TransferFailed(format!("read object metadata: {e}")))?;
        let metadata: BTreeMap<String, String> = serde_json::from_str(&meta_raw)
            .map_err(|e| S3cseError::TransferFailed(format!("parse object metadata: {e}")))?;
        Ok(HeadObjectOutput {
            content_length,
            metadata,
        })
    }
}
