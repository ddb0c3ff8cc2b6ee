#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use s3cse_crypto::EnvelopeMetadata;

// Splits the input into a handful of header values and makes sure decoding
// never panics, regardless of malformed base64/JSON/algorithm names.
fuzz_target!(|data: &[u8]| {
    let text = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return,
    };

    let mut headers = BTreeMap::new();
    for (i, chunk) in text.split('\n').take(8).enumerate() {
        let field = match i {
            0 => "x-amz-key-v2",
            1 => "x-amz-iv",
            2 => "x-amz-cek-alg",
            3 => "x-amz-wrap-alg",
            4 => "x-amz-tag-len",
            5 => "x-amz-matdesc",
            6 => "x-amz-unencrypted-content-length",
            _ => continue,
        };
        headers.insert(field.to_string(), chunk.to_string());
    }

    let _ = EnvelopeMetadata::decode(&headers);
});
