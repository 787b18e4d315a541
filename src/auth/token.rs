//! Random identifiers for sessions and reset tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand_core::{OsRng, RngCore};

/// Bytes of entropy in a generated token.
pub const TOKEN_BYTES: usize = 32;

/// Generate an unguessable token: 32 bytes from the OS RNG, URL-safe base64
/// without padding.
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
