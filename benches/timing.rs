use std::hint::black_box;
use std::time::Instant;

use s3cse_crypto::cipher;

fn time_it<F: FnMut()>(label: &str, iters: usize, mut f: F) {
    // warmup
    for _ in 0..(iters / 10).max(10) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    let per_iter = elapsed / (iters as u32);
    println!("{:<24} total={:?}  per_iter={:?}", label, elapsed, per_iter);
}

fn main() {
    let key = [0x42u8; 32];
    let gcm_iv = [0x11u8; cipher::GCM_IV_LEN];
    let cbc_iv = [0x22u8; cipher::CBC_IV_LEN];

    let plaintext = vec![0x42u8; 65_536];
    let gcm_ct = cipher::gcm_encrypt(&key, &gcm_iv, &plaintext);
    let cbc_ct = cipher::cbc_encrypt(&key, &cbc_iv, &plaintext);
    let gcm_ct_no_tag = &gcm_ct[..gcm_ct.len() - cipher::GCM_TAG_LEN];

    let iters = 2_000;

    time_it("gcm_encrypt_64k", iters, || {
        let ct = cipher::gcm_encrypt(black_box(&key), black_box(&gcm_iv), black_box(&plaintext));
        black_box(ct);
    });

    time_it("gcm_decrypt_64k", iters, || {
        let pt = cipher::gcm_decrypt(black_box(&key), black_box(&gcm_iv), black_box(&gcm_ct)).unwrap();
        black_box(pt);
    });

    time_it("gcm_decrypt_ranged_last_half", iters, || {
        let half = gcm_ct_no_tag.len() / 2;
        let pt = cipher::gcm_decrypt_range(
            black_box(&key),
            black_box(&gcm_iv),
            (half / cipher::AES_BLOCK_LEN) as u64,
            black_box(&gcm_ct_no_tag[half..]),
        );
        black_box(pt);
    });

    time_it("cbc_encrypt_64k", iters, || {
        let ct = cipher::cbc_encrypt(black_box(&key), black_box(&cbc_iv), black_box(&plaintext));
        black_box(ct);
    });

    time_it("cbc_decrypt_64k", iters, || {
        let pt = cipher::cbc_decrypt(black_box(&key), black_box(&cbc_iv), black_box(&cbc_ct)).unwrap();
        black_box(pt);
    });

    time_it("gcm_tampered_decrypt", iters, || {
        let mut tampered = gcm_ct.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        let r = cipher::gcm_decrypt(black_box(&key), black_box(&gcm_iv), black_box(&tampered));
        black_box(r.err());
    });

    println!("\nDone.");
}
