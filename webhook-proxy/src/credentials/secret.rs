//! Random secret generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// Generates `len` random bytes from the OS and hex-encodes them.
pub fn generate_secret(len: usize) -> Result<String, rand::Error> {
    let mut buf = vec![0u8; len];
    OsRng.try_fill_bytes(&mut buf)?;
    Ok(hex::encode(buf))
}
