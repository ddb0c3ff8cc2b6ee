#![no_main]

use libfuzzer_sys::fuzz_target;
use s3cse_crypto::cipher;

// Feeds arbitrary bytes as a full GCM or CBC ciphertext under a fixed key/iv
// and makes sure decryption either succeeds or returns a typed error —
// never panics — regardless of how the fuzzer mangles tag/padding bytes.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let key = [0x7eu8; 32];

    if data[0] & 1 == 0 {
        let iv = [0x11u8; cipher::GCM_IV_LEN];
        let _ = cipher::gcm_decrypt(&key, &iv, &data[1..]);
    } else {
        let iv = [0x22u8; cipher::CBC_IV_LEN];
        let _ = cipher::cbc_decrypt(&key, &iv, &data[1..]);
    }
});
