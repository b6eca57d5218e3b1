//! Short-ID generator: `RCL-` + 8 characters drawn uniformly from
//! `[A-Z0-9]` using a cryptographic random source.
//!
//! Collision probability is negligible at expected corpus size (36^8
//! possibilities); callers retry with a freshly generated id on the rare
//! unique-constraint violation (see [`crate::store::Store::insert_memory_and_probe`]).

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 8;

/// Generate a new `RCL-XXXXXXXX` short id.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect();
    format!("RCL-{suffix}")
}
