//! Huellas SHA-256 de entrada y salida.

use sha2::{Digest, Sha256};

const CHUNK: usize = 8192;

/// Devuelve el SHA-256 de `bytes` en hexadecimal.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for chunk in bytes.chunks(CHUNK) {
        hasher.update(chunk);
    }
    format!("{:x}", hasher.finalize())
}
